use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub daemon: DaemonConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Directory-backed authorization settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Admit every request without a lookup (dev and testing only)
    pub disabled: bool,
    /// Organization that must own the tenant
    pub org_slug: String,
    /// GraphQL endpoint of the directory service
    pub api_url: String,
    pub cache_ttl_secs: u64,
    pub cache_idle_secs: u64,
    pub request_timeout_secs: u64,
}

/// Build daemon launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Skip launching the daemon (dev and testing only)
    pub disabled: bool,
    pub program: String,
    pub args: Vec<String>,
    pub pid_file: Option<PathBuf>,
    pub socket_path: PathBuf,
    /// Best-effort warm-up command; empty to skip
    pub bootstrap: Vec<String>,
    pub warmup_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub max_idle_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            org_slug: String::new(),
            api_url: "https://api.fly.io/graphql".to_string(),
            cache_ttl_secs: 300,  // 5 minutes
            cache_idle_secs: 600, // 10 minutes
            request_timeout_secs: 10,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            program: "dockerd".to_string(),
            args: Vec::new(),
            pid_file: Some(PathBuf::from("/var/run/docker.pid")),
            socket_path: PathBuf::from("/var/run/docker.sock"),
            bootstrap: vec![
                "docker".to_string(),
                "buildx".to_string(),
                "inspect".to_string(),
                "--bootstrap".to_string(),
            ],
            warmup_secs: 2,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_idle_secs: 600, // 10 minutes
            shutdown_grace_secs: 5,
        }
    }
}

impl AuthConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_idle(&self) -> Duration {
        Duration::from_secs(self.cache_idle_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DaemonConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

impl LifecycleConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Deployment variables of the builder image
            .set_override_option("auth.org_slug", std::env::var("ALLOW_ORG_SLUG").ok())?
            .set_override_option("auth.disabled", flag_from_env("NO_AUTH"))?
            .set_override_option("daemon.disabled", flag_from_env("NO_DOCKERD"))?
            .set_override_option("logging.level", std::env::var("LOG_LEVEL").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Rejects settings the gateway cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.auth.disabled && self.auth.org_slug.trim().is_empty() {
            return Err(DomainError::configuration(
                "an organization slug is required unless authorization is disabled",
            ));
        }

        if self.lifecycle.max_idle_secs == 0 {
            return Err(DomainError::configuration("max idle duration must be positive"));
        }

        if !self.daemon.disabled && self.daemon.program.trim().is_empty() {
            return Err(DomainError::configuration("daemon program must not be empty"));
        }

        Ok(())
    }
}

/// Reads a `1`-style toggle; unset or any other value leaves the default alone
fn flag_from_env(name: &str) -> Option<bool> {
    std::env::var(name).ok().filter(|v| v == "1").map(|_| true)
}
