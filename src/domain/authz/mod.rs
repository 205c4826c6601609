//! Authorization domain: cache keys and the directory service contract

mod directory;
mod key;

pub use directory::{DirectoryService, OrganizationRecord, OrganizationRef, TenantRecord};
pub use key::AuthorizationKey;

#[cfg(test)]
pub use directory::MockDirectoryService;
