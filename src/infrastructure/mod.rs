//! Infrastructure layer - External service implementations

pub mod authz;
pub mod daemon;
pub mod directory;
pub mod logging;
