//! Build Gateway
//!
//! Authenticating front door for a remote image-build daemon:
//! - Basic-auth callers are checked against a directory service, with
//!   verdicts cached for a few minutes
//! - Admitted requests are proxied verbatim to the daemon's Unix socket,
//!   including upgraded sessions
//! - The process stops itself after a period without build traffic, or on
//!   interrupt, draining in-flight builds before stopping the daemon

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod lifecycle;

pub use config::AppConfig;
