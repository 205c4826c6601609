//! Serve command - runs the gateway until it goes idle or is interrupted

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::api::{create_router, AppState, DaemonProxy, ServerHandle};
use crate::config::{AppConfig, AuthConfig};
use crate::domain::ShutdownOutcome;
use crate::infrastructure::authz::{AuthorizationCache, AuthorizationCacheConfig};
use crate::infrastructure::daemon;
use crate::infrastructure::directory::GraphQlDirectoryClient;
use crate::infrastructure::logging;
use crate::lifecycle::{control, GatewayRuntime, ShutdownSequencer};

/// Run the gateway and return the process exit code
pub async fn run() -> i32 {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };
    logging::init_logging(&config.logging);

    match serve(config).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("Gateway failed to start: {:#}", e);
            1
        }
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

async fn serve(config: AppConfig) -> anyhow::Result<ShutdownOutcome> {
    let (events_tx, mut events) = control::channel();
    control::spawn_signal_listener(events_tx).context("failed to install signal handlers")?;

    let daemon = daemon::start(&config.daemon)
        .await
        .context("failed to start build daemon")?;

    let (runtime, mut monitor) = GatewayRuntime::new(config.lifecycle.max_idle());
    let server = match start_server(&config, runtime.clone()).await {
        Ok(server) => server,
        Err(e) => {
            daemon.stop().await;
            return Err(e);
        }
    };

    let reason = control::wait_for_trigger(&mut events, runtime.idle(), &mut monitor).await;

    let outcome = ShutdownSequencer::new(&runtime, daemon, config.lifecycle.shutdown_grace())
        .run(reason, server, &mut events)
        .await;

    Ok(outcome)
}

async fn start_server(config: &AppConfig, runtime: GatewayRuntime) -> anyhow::Result<ServerHandle> {
    let authorizer = build_authorizer(&config.auth)?;
    let proxy = DaemonProxy::new(config.daemon.socket_path.clone());
    let app = create_router(AppState::new(authorizer, runtime, proxy));

    let addr = build_socket_addr(config)?;
    info!(
        %addr,
        socket = %config.daemon.socket_path.display(),
        max_idle = ?config.lifecycle.max_idle(),
        "Starting gateway"
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    Ok(ServerHandle::spawn(listener, app)?)
}

fn build_authorizer(config: &AuthConfig) -> anyhow::Result<AuthorizationCache> {
    if config.disabled {
        warn!("Authorization disabled, every request will be admitted");
        return Ok(AuthorizationCache::bypass());
    }

    let directory = GraphQlDirectoryClient::new(config.api_url.clone(), config.request_timeout())?;
    info!(org_slug = %config.org_slug, "Authorizing callers against directory");

    Ok(AuthorizationCache::new(
        Arc::new(directory),
        config.org_slug.clone(),
        AuthorizationCacheConfig {
            ttl: config.cache_ttl(),
            time_to_idle: config.cache_idle(),
            ..Default::default()
        },
    ))
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    let host = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid server host '{}'", config.server.host))?;

    Ok(SocketAddr::from((host, config.server.port)))
}
