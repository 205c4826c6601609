//! Application state shared by the request pipeline

use std::sync::Arc;

use super::proxy::DaemonProxy;
use crate::infrastructure::authz::AuthorizationCache;
use crate::lifecycle::GatewayRuntime;

/// Everything a request needs: who may build, where the daemon lives, and
/// the lifecycle runtime that request activity feeds.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<AuthorizationCache>,
    pub runtime: GatewayRuntime,
    pub proxy: Arc<DaemonProxy>,
}

impl AppState {
    pub fn new(authorizer: AuthorizationCache, runtime: GatewayRuntime, proxy: DaemonProxy) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            runtime,
            proxy: Arc::new(proxy),
        }
    }
}
