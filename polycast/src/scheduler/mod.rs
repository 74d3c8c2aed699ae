//! Scheduler driving periodic channel maintenance.
//!
//! Channels have no internal timers; this loop polls the shared manager for
//! due health checks, deferred reconnects and expired previews.

mod service;

pub use service::{HealthScheduler, SchedulerConfig, TickSummary};
