//! Domain layer - Core types and contracts

pub mod authz;
pub mod error;
pub mod lifecycle;

pub use authz::{
    AuthorizationKey, DirectoryService, OrganizationRecord, OrganizationRef, TenantRecord,
};
pub use error::DomainError;
pub use lifecycle::{ControlEvent, DaemonState, ShutdownOutcome, ShutdownReason};
