//! GraphQL directory client
//!
//! Talks to a Fly-style platform API. Every request carries the caller's own
//! token, so the directory decides what that token is allowed to see.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::{DirectoryService, DomainError, OrganizationRecord, TenantRecord};

const TENANT_QUERY: &str = r#"query ($appName: String!) {
  app(name: $appName) {
    id
    name
    organization { id slug }
  }
}"#;

const ORGANIZATION_QUERY: &str = r#"query ($slug: String!) {
  organization(slug: $slug) {
    id
    slug
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TenantData {
    app: Option<TenantRecord>,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    organization: Option<OrganizationRecord>,
}

/// Directory service backed by a GraphQL endpoint
#[derive(Debug, Clone)]
pub struct GraphQlDirectoryClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphQlDirectoryClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("build-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        credential: &str,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>, DomainError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| DomainError::directory(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::directory(format!("HTTP {}: {}", status, body)));
        }

        let payload: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| DomainError::directory(format!("Failed to parse response: {}", e)))?;

        if !payload.errors.is_empty() {
            let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
            return Err(DomainError::directory(messages.join("; ")));
        }

        Ok(payload.data)
    }
}

#[async_trait]
impl DirectoryService for GraphQlDirectoryClient {
    async fn find_tenant(
        &self,
        credential: &str,
        name: &str,
    ) -> Result<Option<TenantRecord>, DomainError> {
        debug!(tenant = %name, "Looking up tenant");

        let data: Option<TenantData> = self
            .query(credential, TENANT_QUERY, json!({ "appName": name }))
            .await?;

        Ok(data.and_then(|d| d.app))
    }

    async fn find_organization(
        &self,
        credential: &str,
        slug: &str,
    ) -> Result<Option<OrganizationRecord>, DomainError> {
        debug!(org = %slug, "Looking up organization");

        let data: Option<OrganizationData> = self
            .query(credential, ORGANIZATION_QUERY, json!({ "slug": slug }))
            .await?;

        Ok(data.and_then(|d| d.organization))
    }
}
