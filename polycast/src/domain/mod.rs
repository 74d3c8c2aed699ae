//! Domain layer for polycast.
//!
//! Entities and value objects for channels, their outputs and templates.
//! Nothing here talks to the control plane.

pub mod channel;
pub mod encoding;
pub mod output;
pub mod service;
pub mod template;

pub use channel::{Channel, ChannelStatus};
pub use encoding::EncodingSettings;
pub use output::{ChannelOutput, OutputId};
pub use service::{StreamOrientation, StreamingService, video_filter};
pub use template::{OutputTemplate, builtin_templates};
