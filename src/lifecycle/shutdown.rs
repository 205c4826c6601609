//! Shutdown sequencing
//!
//! Order: stop the listener (bounded), drain in-flight requests when an
//! operator asked for the stop, stop the daemon. A second interrupt at any
//! point abandons the sequence.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::drain::InFlightTracker;
use super::runtime::GatewayRuntime;
use crate::api::ServerHandle;
use crate::domain::{ControlEvent, ShutdownOutcome, ShutdownReason};
use crate::infrastructure::daemon::DaemonHandle;

/// Interrupts needed before the sequence is abandoned
const FORCE_AFTER_INTERRUPTS: usize = 2;

pub struct ShutdownSequencer {
    in_flight: InFlightTracker,
    daemon: DaemonHandle,
    connection_grace: Duration,
}

impl ShutdownSequencer {
    pub fn new(runtime: &GatewayRuntime, daemon: DaemonHandle, connection_grace: Duration) -> Self {
        Self {
            in_flight: runtime.in_flight().clone(),
            daemon,
            connection_grace,
        }
    }

    /// Runs the shutdown sequence while watching `events` for a forced exit.
    /// The interrupt that triggered the shutdown counts towards the limit.
    pub async fn run(
        self,
        reason: ShutdownReason,
        server: ServerHandle,
        events: &mut mpsc::Receiver<ControlEvent>,
    ) -> ShutdownOutcome {
        let seen = usize::from(reason == ShutdownReason::OperatorInterrupt);

        tokio::select! {
            outcome = self.sequence(reason, server) => outcome,
            _ = wait_for_interrupts(events, FORCE_AFTER_INTERRUPTS - seen) => {
                error!(in_flight = self.in_flight.count(), "Interrupted again, terminating abruptly");
                ShutdownOutcome::Forced
            }
        }
    }

    async fn sequence(&self, reason: ShutdownReason, server: ServerHandle) -> ShutdownOutcome {
        info!(%reason, "Shutting down");
        let mut outcome = ShutdownOutcome::Clean;

        match server.shutdown(self.connection_grace).await {
            Ok(()) => info!("Gracefully stopped accepting connections"),
            Err(e) => {
                warn!(error = %e, "Shutdown error");
                outcome = ShutdownOutcome::ListenerError;
            }
        }

        if reason.drains_in_flight() {
            info!(in_flight = self.in_flight.count(), "Waiting for builds to finish");
            self.in_flight.wait_idle().await;
        } else {
            let in_flight = self.in_flight.count();
            // Idle implies no recent traffic; this is not re-verified.
            if in_flight > 0 {
                warn!(in_flight, "Idle shutdown with requests still in flight");
            }
        }

        self.daemon.stop().await;
        info!(outcome = ?outcome, "Shutdown complete");

        outcome
    }
}

async fn wait_for_interrupts(events: &mut mpsc::Receiver<ControlEvent>, needed: usize) {
    let mut seen = 0;

    while seen < needed {
        match events.recv().await {
            Some(ControlEvent::Interrupt) => {
                seen += 1;
                if seen < needed {
                    warn!("Interrupt received during shutdown; send another to terminate immediately");
                }
            }
            Some(ControlEvent::KeepAlive) => debug!("Ignoring keep-alive during shutdown"),
            None => std::future::pending::<()>().await,
        }
    }
}
