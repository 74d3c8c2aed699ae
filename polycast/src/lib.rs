//! polycast: multi-destination restream orchestration.
//!
//! Channels own a list of outputs and drive one remote Restreamer process
//! each. The engine covers the lifecycle state machine, health checks with
//! deferred reconnects, primary/backup failover, bulk operations and output
//! templates. Settings persist as a JSON document.

pub mod api;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod scheduler;
pub mod template;

pub use error::{Error, Result};
