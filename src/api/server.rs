//! HTTP server task with bounded graceful stop

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::domain::DomainError;

/// Running HTTP server
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Starts serving `router` on `listener` in a background task
    pub fn spawn(listener: TcpListener, router: Router) -> std::io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
        });

        info!(addr = %local_addr, "Listening");

        Ok(Self {
            local_addr,
            stop,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits up to `grace` for open
    /// connections to finish. Connections still open after the grace period
    /// keep running in the background; the error only reports it.
    pub async fn shutdown(self, grace: Duration) -> Result<(), DomainError> {
        let _ = self.stop.send(());

        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(DomainError::shutdown(format!("server error: {}", e))),
            Ok(Err(e)) => Err(DomainError::shutdown(format!("server task failed: {}", e))),
            Err(_) => Err(DomainError::shutdown(format!(
                "connections still open after {:?}",
                grace
            ))),
        }
    }
}
