//! Request and response bodies of the remote-control API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Channel, ChannelOutput, ChannelStatus, EncodingSettings, OutputTemplate, StreamOrientation,
    StreamingService,
};

// ========== Channels ==========

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub input_url: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateChannelRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    /// Zero keeps the preview running until it is promoted or cancelled.
    #[serde(default)]
    pub duration_sec: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelResponse {
    pub id: String,
    pub name: String,
    pub status: ChannelStatus,
    pub input_url: String,
    pub last_error: Option<String>,
    pub process_reference: Option<String>,
    pub auto_start: bool,
    pub health_monitoring: bool,
    pub preview_started_at: Option<DateTime<Utc>>,
    pub outputs: Vec<OutputResponse>,
}

impl From<&Channel> for ChannelResponse {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id.clone(),
            name: channel.name.clone(),
            status: channel.display_status(),
            input_url: channel.input_url.clone(),
            last_error: channel.last_error.clone(),
            process_reference: channel.process_reference.clone(),
            auto_start: channel.policy.auto_start,
            health_monitoring: channel.health.enabled,
            preview_started_at: channel.preview.started_at,
            outputs: channel
                .outputs
                .iter()
                .enumerate()
                .map(|(index, output)| {
                    OutputResponse::new(index, output, channel.backup_index(index))
                })
                .collect(),
        }
    }
}

// ========== Outputs ==========

#[derive(Debug, Clone, Deserialize)]
pub struct AddOutputRequest {
    /// Service position; custom destinations also need `rtmp_url`.
    #[serde(default)]
    pub service: StreamingService,
    #[serde(default)]
    pub stream_key: String,
    #[serde(default)]
    pub orientation: StreamOrientation,
    #[serde(default)]
    pub rtmp_url: Option<String>,
    #[serde(default)]
    pub encoding: Option<EncodingSettings>,
}

/// Partial update of one output. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOutputRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub encoding: Option<EncodingSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetBackupRequest {
    pub backup_index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthMonitoringRequest {
    pub enabled: bool,
    #[serde(default)]
    pub check_interval_sec: Option<u32>,
    #[serde(default)]
    pub failure_threshold: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Enable,
    Disable,
    Delete,
    UpdateEncoding,
    Start,
    Stop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkOutputRequest {
    pub action: BulkAction,
    pub indices: Vec<usize>,
    /// Required for `update_encoding`.
    #[serde(default)]
    pub encoding: Option<EncodingSettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputResponse {
    pub index: usize,
    pub id: String,
    pub service_name: String,
    pub rtmp_url: String,
    pub target_orientation: StreamOrientation,
    pub encoding: EncodingSettings,
    pub enabled: bool,
    pub connected: bool,
    pub consecutive_failures: u32,
    pub is_backup: bool,
    /// Position of this output's backup, if it has one.
    pub backup_index: Option<usize>,
    pub failover_active: bool,
}

impl OutputResponse {
    fn new(index: usize, output: &ChannelOutput, backup_index: Option<usize>) -> Self {
        Self {
            index,
            id: output.id.as_str().to_string(),
            service_name: output.service_name.clone(),
            rtmp_url: output.rtmp_url.clone(),
            target_orientation: output.target_orientation,
            encoding: output.encoding,
            enabled: output.enabled,
            connected: output.stats.connected,
            consecutive_failures: output.health.consecutive_failures,
            is_backup: output.failover.is_backup,
            backup_index,
            failover_active: output.failover.active,
        }
    }
}

// ========== Templates ==========

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub service: StreamingService,
    #[serde(default)]
    pub orientation: StreamOrientation,
    #[serde(default)]
    pub encoding: EncodingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyTemplateRequest {
    #[serde(default)]
    pub stream_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub service: StreamingService,
    pub service_name: &'static str,
    pub orientation: StreamOrientation,
    pub encoding: EncodingSettings,
    pub is_builtin: bool,
}

impl From<&OutputTemplate> for TemplateResponse {
    fn from(template: &OutputTemplate) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            service: template.service,
            service_name: template.service.name(),
            orientation: template.orientation,
            encoding: template.encoding,
            is_builtin: template.is_builtin,
        }
    }
}

// ========== Health ==========

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub restreamer_configured: bool,
}
