//! Channel aggregate.

mod entity;
mod state;

pub use entity::{
    Channel, DEFAULT_INPUT_URL, HealthPolicy, PreviewState, ReconnectPolicy, SourceConfig,
    generate_channel_id,
};
pub use state::ChannelStatus;
