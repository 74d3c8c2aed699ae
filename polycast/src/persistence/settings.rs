//! Settings document shape.
//!
//! Key names follow the plugin's `stream_channels` / `output_templates`
//! layout so existing documents load unchanged. Newer keys are optional and
//! default to what older documents implied.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channel::ChannelManager;
use crate::domain::channel::{DEFAULT_INPUT_URL, HealthPolicy, ReconnectPolicy, SourceConfig};
use crate::domain::{
    Channel, ChannelOutput, EncodingSettings, OutputId, OutputTemplate, StreamOrientation,
    StreamingService,
};

fn default_true() -> bool {
    true
}

fn default_reconnect_delay() -> u32 {
    ReconnectPolicy::default().reconnect_delay_sec
}

/// Top-level persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub stream_channels: Vec<ChannelSettings>,
    /// Custom templates only; built-ins are re-seeded on load.
    #[serde(default)]
    pub output_templates: Vec<TemplateSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub source_orientation: StreamOrientation,
    #[serde(default = "default_true")]
    pub auto_detect_orientation: bool,
    #[serde(default)]
    pub source_width: u32,
    #[serde(default)]
    pub source_height: u32,
    #[serde(default)]
    pub input_url: String,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_sec: u32,
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default)]
    pub health_monitoring_enabled: bool,
    #[serde(default)]
    pub health_check_interval_sec: u32,
    #[serde(default)]
    pub failure_threshold: u32,
    #[serde(default)]
    pub outputs: Vec<OutputSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub service: StreamingService,
    #[serde(default)]
    pub stream_key: String,
    #[serde(default)]
    pub target_orientation: StreamOrientation,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Only stored for custom destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,
    /// Id of this output's backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    #[serde(flatten)]
    pub encoding: EncodingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSettings {
    pub name: String,
    pub id: String,
    pub service: StreamingService,
    #[serde(default)]
    pub orientation: StreamOrientation,
    #[serde(flatten)]
    pub encoding: EncodingSettings,
}

// ========== Channel conversion ==========

impl From<&Channel> for ChannelSettings {
    fn from(channel: &Channel) -> Self {
        Self {
            name: channel.name.clone(),
            id: channel.id.clone(),
            source_orientation: channel.source.orientation,
            auto_detect_orientation: channel.source.auto_detect,
            source_width: channel.source.width,
            source_height: channel.source.height,
            input_url: channel.input_url.clone(),
            auto_start: channel.policy.auto_start,
            auto_reconnect: channel.policy.auto_reconnect,
            reconnect_delay_sec: channel.policy.reconnect_delay_sec,
            max_reconnect_attempts: channel.policy.max_reconnect_attempts,
            health_monitoring_enabled: channel.health.enabled,
            health_check_interval_sec: channel.health.check_interval_sec,
            failure_threshold: channel.health.failure_threshold,
            outputs: channel.outputs.iter().map(OutputSettings::from).collect(),
        }
    }
}

impl From<&ChannelOutput> for OutputSettings {
    fn from(output: &ChannelOutput) -> Self {
        // a failed-over primary is only disabled for the current run
        let enabled =
            output.enabled || (output.failover.active && !output.failover.is_backup);
        Self {
            id: Some(output.id.to_string()),
            service: output.service,
            stream_key: output.stream_key.clone(),
            target_orientation: output.target_orientation,
            enabled,
            rtmp_url: output
                .service
                .is_custom()
                .then(|| output.rtmp_url.clone()),
            backup_id: output.failover.backup.as_ref().map(OutputId::to_string),
            encoding: output.encoding,
        }
    }
}

impl ChannelSettings {
    /// Rebuild an inactive channel.
    pub fn to_channel(&self) -> Channel {
        let input_url = if self.input_url.trim().is_empty() {
            DEFAULT_INPUT_URL.to_string()
        } else {
            self.input_url.clone()
        };

        let mut channel = Channel::new(self.name.clone())
            .with_id(self.id.clone())
            .with_input_url(input_url)
            .with_source(SourceConfig {
                orientation: self.source_orientation,
                auto_detect: self.auto_detect_orientation,
                width: self.source_width,
                height: self.source_height,
            })
            .with_policy(ReconnectPolicy {
                auto_start: self.auto_start,
                auto_reconnect: self.auto_reconnect,
                reconnect_delay_sec: self.reconnect_delay_sec,
                max_reconnect_attempts: self.max_reconnect_attempts,
            });
        channel.health = HealthPolicy {
            enabled: self.health_monitoring_enabled,
            check_interval_sec: self.health_check_interval_sec,
            failure_threshold: self.failure_threshold,
        };

        channel.outputs = self
            .outputs
            .iter()
            .map(|o| o.to_output(self.health_monitoring_enabled))
            .collect();

        for (primary, settings) in self.outputs.iter().enumerate() {
            let Some(backup_id) = &settings.backup_id else {
                continue;
            };
            let Some(backup) = channel.position_of(&OutputId::from(backup_id.clone())) else {
                warn!(channel_id = %self.id, backup_id = %backup_id, "Backup output not found, dropping link");
                continue;
            };
            if let Err(e) = channel.set_output_backup(primary, backup) {
                warn!(channel_id = %self.id, error = %e, "Dropping invalid backup link");
            }
        }
        channel
    }
}

impl OutputSettings {
    fn to_output(&self, auto_reconnect: bool) -> ChannelOutput {
        let mut output = ChannelOutput::new(
            self.service,
            self.stream_key.clone(),
            self.target_orientation,
            self.encoding,
        );
        if let Some(id) = &self.id {
            output = output.with_id(OutputId::from(id.clone()));
        }
        if let Some(url) = &self.rtmp_url {
            output = output.with_rtmp_url(url.clone());
        }
        output.enabled = self.enabled;
        output.health.auto_reconnect_enabled = auto_reconnect;
        output
    }
}

// ========== Template conversion ==========

impl From<&OutputTemplate> for TemplateSettings {
    fn from(template: &OutputTemplate) -> Self {
        Self {
            name: template.name.clone(),
            id: template.id.clone(),
            service: template.service,
            orientation: template.orientation,
            encoding: template.encoding,
        }
    }
}

impl TemplateSettings {
    pub fn to_template(&self) -> OutputTemplate {
        OutputTemplate::custom(self.name.clone(), self.service, self.orientation, self.encoding)
            .with_id(self.id.clone())
    }
}

// ========== Manager ==========

impl ChannelManager {
    /// Snapshot every channel and custom template.
    pub fn save_to_settings(&self) -> SettingsDocument {
        SettingsDocument {
            stream_channels: self.channels().iter().map(ChannelSettings::from).collect(),
            output_templates: self
                .templates()
                .customs()
                .map(TemplateSettings::from)
                .collect(),
        }
    }

    /// Load a document. Channels are appended inactive; custom templates
    /// replace the current ones. Returns the number of channels loaded.
    pub fn load_from_settings(&mut self, document: &SettingsDocument) -> usize {
        let templates = self.templates_mut();
        templates.clear_customs();
        for settings in &document.output_templates {
            if let Err(e) = templates.insert_custom(settings.to_template()) {
                warn!(template_id = %settings.id, error = %e, "Skipping template");
            }
        }

        let mut loaded = 0;
        for settings in &document.stream_channels {
            if self.get(&settings.id).is_some() {
                warn!(channel_id = %settings.id, "Channel already loaded, skipping");
                continue;
            }
            self.insert_channel(settings.to_channel());
            loaded += 1;
        }

        info!(
            channels = loaded,
            templates = document.output_templates.len(),
            "Loaded settings"
        );
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loads_minimal_document() {
        let document: SettingsDocument = serde_json::from_value(json!({
            "stream_channels": [{
                "name": "Main",
                "id": "channel_1_2",
                "source_orientation": 1,
                "auto_detect_orientation": false,
                "source_width": 1920,
                "source_height": 1080,
                "input_url": "",
                "auto_start": true,
                "auto_reconnect": true,
                "reconnect_delay_sec": 10,
                "outputs": [{
                    "service": 1,
                    "stream_key": "live_abc",
                    "target_orientation": 0,
                    "enabled": true,
                    "width": 1280,
                    "height": 720,
                    "bitrate": 4500,
                    "audio_bitrate": 160,
                    "audio_track": 1
                }]
            }],
            "output_templates": [{
                "name": "Mine",
                "id": "custom_template_1",
                "service": 2,
                "orientation": 1,
                "bitrate": 5000,
                "width": 1920,
                "height": 1080,
                "audio_bitrate": 128
            }]
        }))
        .unwrap();

        let channel = document.stream_channels[0].to_channel();
        assert_eq!(channel.input_url, DEFAULT_INPUT_URL);
        assert_eq!(channel.source.orientation, StreamOrientation::Horizontal);
        assert!(!channel.source.auto_detect);
        assert!(channel.policy.auto_start);
        assert_eq!(channel.policy.reconnect_delay_sec, 10);

        let output = &channel.outputs[0];
        assert_eq!(output.service, StreamingService::Twitch);
        assert_eq!(output.encoding.bitrate, 4500);
        assert_eq!(output.encoding.audio_track, 1);
        assert_eq!(output.encoding.fps_num, 0);

        let template = document.output_templates[0].to_template();
        assert_eq!(template.service, StreamingService::YouTube);
        assert!(!template.is_builtin);
    }

    #[test]
    fn test_out_of_range_enums_do_not_reject_document() {
        let document: SettingsDocument = serde_json::from_value(json!({
            "stream_channels": [{
                "name": "Legacy",
                "id": "channel_3_4",
                "source_orientation": -1,
                "outputs": [
                    { "service": 300, "stream_key": "a", "target_orientation": 7 },
                    { "service": -1, "stream_key": "b", "target_orientation": 2 }
                ]
            }]
        }))
        .unwrap();

        let channel = document.stream_channels[0].to_channel();
        assert_eq!(channel.source.orientation, StreamOrientation::Auto);
        assert_eq!(channel.outputs.len(), 2);
        assert_eq!(channel.outputs[0].service, StreamingService::Custom);
        assert_eq!(channel.outputs[0].target_orientation, StreamOrientation::Auto);
        assert_eq!(channel.outputs[1].service, StreamingService::Custom);
        assert_eq!(channel.outputs[1].target_orientation, StreamOrientation::Vertical);
    }

    #[test]
    fn test_output_keys_are_flat() {
        let mut channel = Channel::new("c");
        channel
            .add_custom_output("rtmp://ingest/live", "", StreamOrientation::Auto, None)
            .unwrap();
        let value = serde_json::to_value(ChannelSettings::from(&channel)).unwrap();
        let output = &value["outputs"][0];
        assert_eq!(output["service"], 0);
        assert_eq!(output["rtmp_url"], "rtmp://ingest/live");
        assert!(output.get("bitrate").is_some());
        assert!(output.get("encoding").is_none());
    }

    #[test]
    fn test_backup_links_round_trip() {
        let mut channel = Channel::new("c");
        for key in ["a", "b", "c"] {
            channel
                .add_output(StreamingService::Twitch, key, StreamOrientation::Auto, None)
                .unwrap();
        }
        channel.set_output_backup(0, 2).unwrap();

        let restored = ChannelSettings::from(&channel).to_channel();
        assert_eq!(restored.outputs[0].id, channel.outputs[0].id);
        assert_eq!(restored.backup_index(0), Some(2));
        assert_eq!(restored.primary_index(2), Some(0));
        assert!(!restored.outputs[2].enabled);
    }

    #[test]
    fn test_failed_over_primary_saved_enabled() {
        let mut channel = Channel::new("c");
        channel
            .add_output(StreamingService::Twitch, "a", StreamOrientation::Auto, None)
            .unwrap();
        channel
            .add_output(StreamingService::Twitch, "b", StreamOrientation::Auto, None)
            .unwrap();
        channel.set_output_backup(0, 1).unwrap();
        channel.outputs[0].enabled = false;
        channel.outputs[0].failover.active = true;

        let settings = ChannelSettings::from(&channel);
        assert!(settings.outputs[0].enabled);
    }
}
