//! Build daemon process management

mod manager;

pub use manager::{start, DaemonHandle};
