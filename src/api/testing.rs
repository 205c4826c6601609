//! Test support: a fake build daemon on a temporary Unix socket

use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub struct MockDaemon {
    socket_path: PathBuf,
    task: JoinHandle<()>,
}

impl MockDaemon {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Serves `router` on a fresh socket under the system temp directory
pub async fn spawn_mock_daemon(router: Router) -> MockDaemon {
    let socket_path =
        std::env::temp_dir().join(format!("build-gateway-{}.sock", uuid::Uuid::new_v4()));
    let listener = UnixListener::bind(&socket_path).unwrap();

    let task = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockDaemon { socket_path, task }
}
