//! Build daemon process lifecycle

use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::domain::{DaemonState, DomainError};

/// Handle to the running build daemon.
///
/// Cloneable; every clone observes the same state. `stop` is safe to call any
/// number of times, including on a handle whose process never started. Only
/// the watcher task that owns the child signals it.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    pid: Option<u32>,
    state: Arc<watch::Sender<DaemonState>>,
}

impl DaemonHandle {
    /// Handle with no process behind it
    pub fn detached() -> Self {
        let (state, _) = watch::channel(DaemonState::NotStarted);

        Self {
            pid: None,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    /// Asks the daemon to stop and waits until it has exited. Returns early,
    /// leaving the daemon `Ready`, if it could not be signalled.
    pub async fn stop(&self) {
        let Some(pid) = self.pid else {
            return;
        };

        let mut state = self.state.subscribe();

        let claimed = self.state.send_if_modified(|s| match s {
            DaemonState::Starting | DaemonState::Ready => {
                *s = DaemonState::Stopping;
                true
            }
            _ => false,
        });

        if claimed {
            info!(pid, "Waiting for daemon to exit");
        }

        // Another caller may already be stopping it; wait for the same result.
        let _ = state.wait_for(|s| *s != DaemonState::Stopping).await;
    }

    /// Resolves once the process has exited
    #[cfg(test)]
    pub async fn exited(&self) {
        if self.pid.is_none() {
            return;
        }

        let mut state = self.state.subscribe();
        let _ = state.wait_for(DaemonState::has_exited).await;
    }
}

/// Starts the build daemon described by `config`.
///
/// Spawn failure is an error; a failing bootstrap command is only logged.
/// Returns after the warm-up grace period so early clients do not race an
/// unready builder.
pub async fn start(config: &DaemonConfig) -> Result<DaemonHandle, DomainError> {
    if config.disabled {
        info!("Daemon launch disabled, running without a build daemon");
        return Ok(DaemonHandle::detached());
    }

    let mut command = Command::new(&config.program);
    if let Some(pid_file) = &config.pid_file {
        command.arg("-p").arg(pid_file);
    }
    command
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(std::io::stderr()))
        .stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(|e| {
        DomainError::daemon(format!("could not start {}: {}", config.program, e))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| DomainError::daemon(format!("{} exited during spawn", config.program)))?;

    info!(program = %config.program, pid, "Daemon started");

    let (state, _) = watch::channel(DaemonState::Starting);
    let state = Arc::new(state);

    tokio::spawn(watch_child(child, state.clone(), config.program.clone()));

    bootstrap(&config.bootstrap).await;

    let warmup = config.warmup();
    if !warmup.is_zero() {
        tokio::time::sleep(warmup).await;
    }

    state.send_if_modified(|s| {
        if *s == DaemonState::Starting {
            *s = DaemonState::Ready;
            true
        } else {
            false
        }
    });

    Ok(DaemonHandle {
        pid: Some(pid),
        state,
    })
}

/// Owns the child until it exits. Interrupts it when a handle moves the state
/// to `Stopping`, and records `Exited` once it has been reaped.
async fn watch_child(mut child: Child, state: Arc<watch::Sender<DaemonState>>, program: String) {
    let mut requests = state.subscribe();

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = stop_requested(&mut requests) => {
                match interrupt(&child) {
                    Ok(()) => break child.wait().await,
                    Err(e) => {
                        error!(program = %program, error = %e, "Error signaling daemon to interrupt");
                        state.send_replace(DaemonState::Ready);
                    }
                }
            }
        }
    };

    match status {
        Ok(status) if status.success() => info!(program = %program, "Daemon has exited"),
        Ok(status) => error!(program = %program, %status, "Daemon exited with error"),
        Err(e) => error!(program = %program, error = %e, "Error waiting on daemon"),
    }
    state.send_replace(DaemonState::Exited);
}

async fn stop_requested(requests: &mut watch::Receiver<DaemonState>) {
    let _ = requests.wait_for(|s| *s == DaemonState::Stopping).await;
}

/// Sends SIGINT unless the child has already been reaped, so a recycled pid
/// is never signalled.
fn interrupt(child: &Child) -> nix::Result<()> {
    match child.id() {
        Some(id) => kill(Pid::from_raw(id as i32), Signal::SIGINT),
        None => Ok(()),
    }
}

async fn bootstrap(command: &[String]) {
    let Some((program, args)) = command.split_first() else {
        return;
    };

    match Command::new(program).args(args).status().await {
        Ok(status) if status.success() => info!(program = %program, "Builder bootstrapped"),
        Ok(status) => warn!(program = %program, %status, "Error bootstrapping builder"),
        Err(e) => warn!(program = %program, error = %e, "Error bootstrapping builder"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sleeper(bootstrap: &[&str]) -> DaemonConfig {
        DaemonConfig {
            disabled: false,
            program: "sleep".to_string(),
            args: vec!["30".to_string()],
            pid_file: None,
            bootstrap: bootstrap.iter().map(|s| s.to_string()).collect(),
            warmup_secs: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_returns_detached_handle() {
        let config = DaemonConfig {
            disabled: true,
            ..Default::default()
        };

        let handle = start(&config).await.unwrap();
        assert_eq!(handle.state(), DaemonState::NotStarted);

        handle.stop().await;
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_start_and_stop_twice() {
        let handle = start(&sleeper(&["true"])).await.unwrap();
        assert_eq!(handle.state(), DaemonState::Ready);

        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("first stop hung");
        assert_eq!(handle.state(), DaemonState::Exited);

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("second stop hung");
    }

    #[tokio::test]
    async fn test_concurrent_stops_both_return() {
        let handle = start(&sleeper(&[])).await.unwrap();
        let other = handle.clone();

        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(handle.stop(), other.stop());
        })
        .await
        .expect("stop hung");

        assert!(handle.state().has_exited());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_not_fatal() {
        let handle = start(&sleeper(&["false"])).await.unwrap();
        assert_eq!(handle.state(), DaemonState::Ready);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_missing_program_is_fatal() {
        let config = DaemonConfig {
            program: "definitely-not-a-real-daemon-binary".to_string(),
            pid_file: None,
            bootstrap: Vec::new(),
            warmup_secs: 0,
            ..Default::default()
        };

        let err = start(&config).await.unwrap_err();
        assert!(matches!(err, DomainError::Daemon { .. }));
    }

    #[tokio::test]
    async fn test_self_exit_is_recorded() {
        let config = DaemonConfig {
            program: "true".to_string(),
            pid_file: None,
            bootstrap: Vec::new(),
            warmup_secs: 0,
            ..Default::default()
        };

        let handle = start(&config).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle.exited())
            .await
            .expect("exit not observed");

        assert_eq!(handle.state(), DaemonState::Exited);
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop after exit hung");
    }

    #[tokio::test]
    async fn test_reaped_child_is_not_signalled() {
        let mut child = Command::new("true").spawn().unwrap();
        assert!(child.wait().await.unwrap().success());

        assert!(child.id().is_none());
        assert!(interrupt(&child).is_ok());
    }

    #[tokio::test]
    async fn test_stop_is_delivered_by_watcher() {
        let handle = start(&sleeper(&[])).await.unwrap();

        let stopper = handle.clone();
        tokio::time::timeout(Duration::from_secs(5), stopper.stop())
            .await
            .expect("stop hung");

        assert_eq!(handle.state(), DaemonState::Exited);
        tokio::time::timeout(Duration::from_secs(1), handle.exited())
            .await
            .expect("exit not recorded");
    }
}
