//! Gateway lifecycle: idle deadline, in-flight drain, control loop and
//! shutdown sequencing

pub mod control;
pub mod drain;
pub mod idle;
pub mod runtime;
pub mod shutdown;

pub use control::{spawn_signal_listener, wait_for_trigger};
pub use drain::{InFlightGuard, InFlightTracker};
pub use idle::{IdleDeadline, IdleMonitor};
pub use runtime::{ActivityGuard, GatewayRuntime};
pub use shutdown::ShutdownSequencer;
