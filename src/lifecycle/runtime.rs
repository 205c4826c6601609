//! Per-process gateway runtime context

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::drain::{InFlightGuard, InFlightTracker};
use super::idle::{IdleDeadline, IdleMonitor};

/// Shared lifecycle state of one gateway instance: the idle deadline and the
/// in-flight counter. Independent runtimes do not interact.
#[derive(Debug, Clone)]
pub struct GatewayRuntime {
    idle: IdleDeadline,
    in_flight: InFlightTracker,
}

/// Marks one request as active. Clones share the same registration; the idle
/// deadline is reset when the request is accepted and again when the last
/// clone drops, at which point the request leaves the in-flight count.
#[derive(Debug, Clone)]
pub struct ActivityGuard {
    _inner: Arc<ActivityInner>,
}

#[derive(Debug)]
struct ActivityInner {
    idle: IdleDeadline,
    _in_flight: InFlightGuard,
}

impl GatewayRuntime {
    pub fn new(max_idle: Duration) -> (Self, IdleMonitor) {
        let (idle, monitor) = IdleDeadline::new(max_idle);

        let runtime = Self {
            idle,
            in_flight: InFlightTracker::new(),
        };

        (runtime, monitor)
    }

    /// Registers an accepted request
    pub fn begin_request(&self) -> ActivityGuard {
        self.idle.reset();

        ActivityGuard {
            _inner: Arc::new(ActivityInner {
                idle: self.idle.clone(),
                _in_flight: self.in_flight.enter(),
            }),
        }
    }

    pub fn idle(&self) -> &IdleDeadline {
        &self.idle
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }
}

impl Drop for ActivityInner {
    fn drop(&mut self) {
        debug!("Resetting idle deadline");
        self.idle.reset();
    }
}
