//! Authorization cache key

use std::fmt;

use crate::domain::DomainError;

/// Identity presented by a caller: the tenant (app) name and its access token.
///
/// Both parts are non-empty; equality is exact and case-sensitive.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationKey {
    tenant: String,
    credential: String,
}

impl AuthorizationKey {
    pub fn new(tenant: impl Into<String>, credential: impl Into<String>) -> Result<Self, DomainError> {
        let tenant = tenant.into();
        let credential = credential.into();

        if tenant.is_empty() {
            return Err(DomainError::validation("tenant name must not be empty"));
        }

        if credential.is_empty() {
            return Err(DomainError::validation("credential must not be empty"));
        }

        Ok(Self { tenant, credential })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

// Keeps tokens out of logs.
impl fmt::Debug for AuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationKey")
            .field("tenant", &self.tenant)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}
