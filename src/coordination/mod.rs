//! Coordination primitives for the long-running service
//!
//! - Cancellation tokens and OS signal handling
//! - Cron spec parsing and fire-time calculation
//! - The job scheduler that hosts periodic work

pub mod cron;
pub mod scheduler;
pub mod shutdown;

pub use cron::CronSpec;
pub use scheduler::{Job, Scheduler};
pub use shutdown::{shutdown_signal, ShutdownToken};
