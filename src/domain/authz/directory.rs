//! Directory service trait and ownership records

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Organization reference embedded in a tenant record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Tenant (application) record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub organization: OrganizationRef,
}

/// Organization record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrganizationRecord {
    pub id: String,
    pub slug: String,
}

/// Read-only view of the system of record for tenant ownership.
///
/// Every lookup is performed with the caller's own credential, so a token that
/// cannot see a record gets `Ok(None)` or an error, never someone else's data.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Finds a tenant record by name
    async fn find_tenant(
        &self,
        credential: &str,
        name: &str,
    ) -> Result<Option<TenantRecord>, DomainError>;

    /// Finds an organization record by slug
    async fn find_organization(
        &self,
        credential: &str,
        slug: &str,
    ) -> Result<Option<OrganizationRecord>, DomainError>;
}
