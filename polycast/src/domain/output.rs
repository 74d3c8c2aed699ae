//! Output (egress destination) entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::encoding::EncodingSettings;
use super::service::{StreamOrientation, StreamingService};

/// Stable identity of an output within its channel.
///
/// Backup links refer to outputs by id so that removing an unrelated output
/// never re-targets a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(String);

impl OutputId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OutputId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for OutputId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for OutputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime counters reported for a live output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStats {
    pub bytes_sent: u64,
    /// Current bitrate in kbps.
    pub current_bitrate: u32,
    pub dropped_frames: u32,
    pub connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHealth {
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub auto_reconnect_enabled: bool,
    /// Deadline of a scheduled re-add after a reconnect teardown.
    pub reconnect_due: Option<DateTime<Utc>>,
}

/// Primary/backup linkage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverState {
    pub is_backup: bool,
    /// Set on a backup: the primary it stands in for.
    pub primary: Option<OutputId>,
    /// Set on a primary: its backup.
    pub backup: Option<OutputId>,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// One configured egress target of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub id: OutputId,
    pub service: StreamingService,
    pub service_name: String,
    pub stream_key: String,
    pub rtmp_url: String,
    pub target_orientation: StreamOrientation,
    pub encoding: EncodingSettings,
    pub enabled: bool,
    pub stats: OutputStats,
    pub health: OutputHealth,
    pub failover: FailoverState,
}

impl ChannelOutput {
    pub fn new(
        service: StreamingService,
        stream_key: impl Into<String>,
        target_orientation: StreamOrientation,
        encoding: EncodingSettings,
    ) -> Self {
        Self {
            id: OutputId::new(),
            service,
            service_name: service.name().to_string(),
            stream_key: stream_key.into(),
            rtmp_url: service.rtmp_url(target_orientation).to_string(),
            target_orientation,
            encoding,
            enabled: true,
            stats: OutputStats::default(),
            health: OutputHealth::default(),
            failover: FailoverState::default(),
        }
    }

    /// Point the output at an explicit ingest URL.
    pub fn with_rtmp_url(mut self, rtmp_url: impl Into<String>) -> Self {
        self.rtmp_url = rtmp_url.into();
        self
    }

    pub fn with_id(mut self, id: OutputId) -> Self {
        self.id = id;
        self
    }

    /// Full publish URL: `<rtmp_url>/<stream_key>`.
    ///
    /// Custom destinations may already carry the key in their URL, so an empty
    /// key appends nothing.
    pub fn publish_url(&self) -> String {
        if self.service.is_custom() && self.stream_key.is_empty() {
            self.rtmp_url.clone()
        } else {
            format!("{}/{}", self.rtmp_url, self.stream_key)
        }
    }

    /// Id of this output on the remote process when it sits at `index`.
    pub fn remote_id(&self, index: usize) -> String {
        format!("{}_{}", self.service_name, index)
    }

    pub fn is_primary_with_backup(&self) -> bool {
        !self.failover.is_backup && self.failover.backup.is_some()
    }

    pub fn mark_healthy(&mut self) {
        self.stats.connected = true;
        self.health.consecutive_failures = 0;
    }

    pub fn mark_unhealthy(&mut self) {
        self.stats.connected = false;
        self.health.consecutive_failures += 1;
    }

    /// Forget runtime state that belongs to a previous run.
    pub fn reset_runtime(&mut self) {
        self.stats = OutputStats::default();
        self.health.last_check = None;
        self.health.consecutive_failures = 0;
        self.health.reconnect_due = None;
        self.failover.active = false;
        self.failover.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_resolves_service_url() {
        let output = ChannelOutput::new(
            StreamingService::YouTube,
            "abcd",
            StreamOrientation::Horizontal,
            EncodingSettings::default(),
        );
        assert!(output.enabled);
        assert_eq!(output.service_name, "YouTube");
        assert_eq!(output.publish_url(), "rtmp://a.rtmp.youtube.com/live2/abcd");
        assert_eq!(output.remote_id(3), "YouTube_3");
    }

    #[test]
    fn test_custom_publish_url() {
        let output = ChannelOutput::new(
            StreamingService::Custom,
            "",
            StreamOrientation::Auto,
            EncodingSettings::default(),
        )
        .with_rtmp_url("rtmp://example.com/live/full-key");
        assert_eq!(output.publish_url(), "rtmp://example.com/live/full-key");

        let output = output.clone();
        let keyed = ChannelOutput {
            stream_key: "k".to_string(),
            ..output
        };
        assert_eq!(keyed.publish_url(), "rtmp://example.com/live/full-key/k");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(OutputId::new(), OutputId::new());
    }

    #[test]
    fn test_health_counters() {
        let mut output = ChannelOutput::new(
            StreamingService::Twitch,
            "k",
            StreamOrientation::Auto,
            EncodingSettings::default(),
        );
        output.mark_unhealthy();
        output.mark_unhealthy();
        assert_eq!(output.health.consecutive_failures, 2);
        assert!(!output.stats.connected);

        output.mark_healthy();
        assert_eq!(output.health.consecutive_failures, 0);
        assert!(output.stats.connected);
    }
}
