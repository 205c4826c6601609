//! Lifecycle domain types shared by the control loop, the daemon manager and
//! the shutdown sequencer

use std::fmt;

/// Why the gateway is shutting down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// No build traffic or keep-alive before the idle deadline
    IdleTimeout,
    /// An operator asked the process to stop
    OperatorInterrupt,
}

impl ShutdownReason {
    /// Only operator-initiated shutdowns wait for in-flight requests
    pub fn drains_in_flight(&self) -> bool {
        matches!(self, Self::OperatorInterrupt)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdleTimeout => write!(f, "idle_timeout"),
            Self::OperatorInterrupt => write!(f, "operator_interrupt"),
        }
    }
}

/// How the shutdown sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every step completed
    Clean,
    /// The listener did not stop cleanly; remaining steps still ran
    ListenerError,
    /// A second interrupt abandoned the sequence
    Forced,
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::ListenerError | Self::Forced => 1,
        }
    }
}

/// External stimulus delivered to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Work is ongoing elsewhere; push the idle deadline out
    KeepAlive,
    /// Graceful shutdown on first receipt, forced exit on the second
    Interrupt,
}

/// Observable state of the build daemon process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotStarted,
    Starting,
    Ready,
    Stopping,
    Exited,
}

impl DaemonState {
    pub fn has_exited(&self) -> bool {
        matches!(self, Self::Exited)
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Stopping => write!(f, "stopping"),
            Self::Exited => write!(f, "exited"),
        }
    }
}
