//! Idle deadline
//!
//! One deadline per runtime. Any number of tasks may push it out through an
//! [`IdleDeadline`] handle; a single [`IdleMonitor`] waits for it to pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Reset side of the idle deadline. Cheap to clone and share across tasks.
#[derive(Debug, Clone)]
pub struct IdleDeadline {
    max_idle: Duration,
    deadline: Arc<watch::Sender<Instant>>,
}

/// Expiry side of the idle deadline. Fires at most once.
#[derive(Debug)]
pub struct IdleMonitor {
    deadline: watch::Receiver<Instant>,
    fired: bool,
}

impl IdleDeadline {
    /// Arms a deadline `max_idle` from now
    pub fn new(max_idle: Duration) -> (Self, IdleMonitor) {
        let (tx, rx) = watch::channel(Instant::now() + max_idle);

        let deadline = Self {
            max_idle,
            deadline: Arc::new(tx),
        };
        let monitor = IdleMonitor {
            deadline: rx,
            fired: false,
        };

        (deadline, monitor)
    }

    /// Moves the deadline to `now + max_idle`. Last write wins.
    pub fn reset(&self) {
        self.deadline.send_replace(Instant::now() + self.max_idle);
    }

    pub fn max_idle(&self) -> Duration {
        self.max_idle
    }

    /// Time left before expiry
    pub fn remaining(&self) -> Duration {
        self.deadline
            .borrow()
            .saturating_duration_since(Instant::now())
    }
}

impl IdleMonitor {
    /// Resolves when the deadline passes without a reset. Once it has
    /// resolved, later calls never resolve.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn expired(&mut self) {
        if self.fired {
            std::future::pending::<()>().await;
        }

        loop {
            let deadline = *self.deadline.borrow_and_update();

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if *self.deadline.borrow() > deadline {
                        continue;
                    }
                    break;
                }
                changed = self.deadline.changed() => {
                    if changed.is_err() {
                        // No handle can reset it any more.
                        tokio::time::sleep_until(*self.deadline.borrow()).await;
                        break;
                    }
                }
            }
        }

        self.fired = true;
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
