//! Request pipeline stages

pub mod activity;
pub mod auth;
pub mod logging;

pub use activity::track_activity;
pub use auth::{extract_basic_credentials, require_builder_access, BasicCredentials};
pub use logging::logging_middleware;
