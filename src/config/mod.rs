//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, DaemonConfig, LifecycleConfig, LogFormat, LoggingConfig, ServerConfig,
};
