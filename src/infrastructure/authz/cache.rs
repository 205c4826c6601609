//! Authorization verdict cache
//!
//! Memoizes directory-backed ownership checks per (tenant, credential) pair.
//! Denials are cached as well, which bounds how hard a bad token can hammer
//! the directory service.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use crate::domain::{AuthorizationKey, DirectoryService};

/// Configuration for the verdict cache
#[derive(Debug, Clone)]
pub struct AuthorizationCacheConfig {
    /// How long a verdict stays valid after it was computed
    pub ttl: Duration,
    /// Entries not read for this long are evicted
    pub time_to_idle: Duration,
    /// Maximum number of verdicts kept
    pub max_capacity: u64,
}

impl Default for AuthorizationCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            time_to_idle: Duration::from_secs(600),
            max_capacity: 10_000,
        }
    }
}

/// Decides whether a caller may use this builder.
///
/// A verdict is `true` only when the tenant record and the configured
/// organization both resolve and the tenant belongs to that organization.
/// Directory errors count as a denial and are never retried.
pub struct AuthorizationCache {
    /// `None` when authorization is bypassed
    directory: Option<Arc<dyn DirectoryService>>,
    org_slug: String,
    verdicts: Cache<AuthorizationKey, bool>,
}

impl AuthorizationCache {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        org_slug: impl Into<String>,
        config: AuthorizationCacheConfig,
    ) -> Self {
        let verdicts = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .time_to_idle(config.time_to_idle)
            .build();

        Self {
            directory: Some(directory),
            org_slug: org_slug.into(),
            verdicts,
        }
    }

    /// Admits everyone without touching the directory (local/offline use)
    pub fn bypass() -> Self {
        Self {
            directory: None,
            org_slug: String::new(),
            verdicts: Cache::new(0),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.directory.is_none()
    }

    /// Checks raw basic-auth credentials. Empty parts are denied without a
    /// lookup and without caching.
    pub async fn authorize_credentials(&self, tenant: &str, credential: &str) -> bool {
        if self.is_bypassed() {
            return true;
        }

        match AuthorizationKey::new(tenant, credential) {
            Ok(key) => self.authorize(&key).await,
            Err(_) => false,
        }
    }

    pub async fn authorize(&self, key: &AuthorizationKey) -> bool {
        let Some(directory) = &self.directory else {
            return true;
        };

        // Concurrent misses for the same key share one lookup.
        let entry = self
            .verdicts
            .entry(key.clone())
            .or_insert_with(self.lookup(directory.as_ref(), key))
            .await;

        if entry.is_fresh() {
            debug!(tenant = %key.tenant(), authorized = entry.value(), "Authorized from directory");
        } else {
            debug!(tenant = %key.tenant(), authorized = entry.value(), "Authorized from cache");
        }

        entry.into_value()
    }

    async fn lookup(&self, directory: &dyn DirectoryService, key: &AuthorizationKey) -> bool {
        let (tenant, organization) = tokio::join!(
            directory.find_tenant(key.credential(), key.tenant()),
            directory.find_organization(key.credential(), &self.org_slug),
        );

        let tenant = match tenant {
            Ok(Some(tenant)) => tenant,
            Ok(None) => {
                warn!(tenant = %key.tenant(), "Tenant not found");
                return false;
            }
            Err(e) => {
                warn!(tenant = %key.tenant(), error = %e, "Error fetching tenant");
                return false;
            }
        };

        let organization = match organization {
            Ok(Some(org)) => org,
            Ok(None) => {
                warn!(org = %self.org_slug, "Organization not found");
                return false;
            }
            Err(e) => {
                warn!(org = %self.org_slug, error = %e, "Error fetching organization");
                return false;
            }
        };

        if tenant.organization.id != organization.id {
            warn!(
                tenant = %tenant.name,
                org = %organization.slug,
                "Tenant does not belong to organization"
            );
            return false;
        }

        true
    }

    /// Approximate number of cached verdicts
    pub fn cached_entries(&self) -> u64 {
        self.verdicts.entry_count()
    }
}
