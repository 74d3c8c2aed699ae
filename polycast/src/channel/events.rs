//! Channel events.
//!
//! Broadcast whenever the manager or scheduler changes something a
//! presentation layer would want to re-render.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::ChannelStatus;

/// Events broadcast by the channel manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    Created { channel_id: String },
    Deleted { channel_id: String },
    StatusChanged {
        channel_id: String,
        from: ChannelStatus,
        to: ChannelStatus,
    },
    /// An output failed a health check.
    OutputUnhealthy { channel_id: String, index: usize },
    OutputReconnected { channel_id: String, index: usize },
    /// At least one primary was switched to its backup.
    FailoverTriggered { channel_id: String },
    PrimaryRestored { channel_id: String, index: usize },
    /// A preview outlived its duration and was stopped.
    PreviewTimedOut { channel_id: String },
}

impl ChannelEvent {
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Created { channel_id }
            | Self::Deleted { channel_id }
            | Self::StatusChanged { channel_id, .. }
            | Self::OutputUnhealthy { channel_id, .. }
            | Self::OutputReconnected { channel_id, .. }
            | Self::FailoverTriggered { channel_id }
            | Self::PrimaryRestored { channel_id, .. }
            | Self::PreviewTimedOut { channel_id } => channel_id,
        }
    }

    /// Get a description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            Self::Created { channel_id } => format!("Channel created: {}", channel_id),
            Self::Deleted { channel_id } => format!("Channel deleted: {}", channel_id),
            Self::StatusChanged {
                channel_id,
                from,
                to,
            } => format!("Channel {} status {} -> {}", channel_id, from, to),
            Self::OutputUnhealthy { channel_id, index } => {
                format!("Output {} of channel {} unhealthy", index, channel_id)
            }
            Self::OutputReconnected { channel_id, index } => {
                format!("Output {} of channel {} reconnected", index, channel_id)
            }
            Self::FailoverTriggered { channel_id } => {
                format!("Failover triggered in channel {}", channel_id)
            }
            Self::PrimaryRestored { channel_id, index } => {
                format!("Primary {} of channel {} restored", index, channel_id)
            }
            Self::PreviewTimedOut { channel_id } => {
                format!("Preview of channel {} timed out", channel_id)
            }
        }
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of [`ChannelEvent`]s to any number of subscribers.
pub struct ChannelEventBroadcaster {
    sender: broadcast::Sender<ChannelEvent>,
}

impl ChannelEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of receivers, 0 when nobody listens.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        tracing::debug!("Publishing channel event: {}", event.description());
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChannelEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
