//! API layer - HTTP pipeline in front of the build daemon

pub mod middleware;
pub mod proxy;
pub mod router;
pub mod server;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use proxy::DaemonProxy;
pub use router::create_router;
pub use server::ServerHandle;
pub use state::AppState;
