//! Channel engine.
//!
//! Lifecycle, health, failover and bulk operations are implemented directly
//! on [`Channel`](crate::domain::Channel) and take the control plane as an
//! argument; [`ChannelManager`] owns the channels and the API handle.

mod bulk;
mod events;
mod failover;
mod health;
mod lifecycle;
mod manager;
mod remote;

pub use bulk::{BulkFailure, BulkReport};
pub use events::{ChannelEvent, ChannelEventBroadcaster};
pub use health::{HealthReport, ReconnectOutcome};
pub use lifecycle::{NO_API_CONNECTION, NO_ENABLED_OUTPUTS, NO_INPUT_URL};
pub use manager::{ChannelManager, ManagerSummary};
