//! Settings persistence.

mod settings;
mod store;

pub use settings::{ChannelSettings, OutputSettings, SettingsDocument, TemplateSettings};
pub use store::{JsonFileSettingsStore, SettingsStore};
