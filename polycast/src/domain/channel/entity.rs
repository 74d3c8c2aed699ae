//! Channel entity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ChannelStatus;
use crate::Error;
use crate::domain::{
    ChannelOutput, EncodingSettings, OutputId, StreamOrientation, StreamingService,
};

/// Input URL used when none is configured.
pub const DEFAULT_INPUT_URL: &str = "rtmp://localhost/live/obs_input";

/// Health defaults seeded the first time monitoring is enabled.
const DEFAULT_HEALTH_INTERVAL_SEC: u32 = 30;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Source framing the channel receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub orientation: StreamOrientation,
    pub auto_detect: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            orientation: StreamOrientation::Auto,
            auto_detect: true,
            width: 0,
            height: 0,
        }
    }
}

/// Start and reconnect behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Included in `start_all`/`stop_all`.
    pub auto_start: bool,
    pub auto_reconnect: bool,
    pub reconnect_delay_sec: u32,
    /// Zero means unlimited.
    pub max_reconnect_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_start: false,
            auto_reconnect: true,
            reconnect_delay_sec: 5,
            max_reconnect_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    pub enabled: bool,
    pub check_interval_sec: u32,
    pub failure_threshold: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewState {
    pub enabled: bool,
    pub duration_sec: u32,
    pub started_at: Option<DateTime<Utc>>,
}

/// A named group of outputs fed by one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub source: SourceConfig,
    pub input_url: String,
    pub outputs: Vec<ChannelOutput>,
    pub status: ChannelStatus,
    pub last_error: Option<String>,
    /// Remote process handle, present only while live.
    pub process_reference: Option<String>,
    pub policy: ReconnectPolicy,
    pub health: HealthPolicy,
    pub preview: PreviewState,
    pub last_health_check_at: Option<DateTime<Utc>>,
}

/// Generate a channel id of the form `channel_<unix_ts>_<random>`.
pub fn generate_channel_id() -> String {
    format!(
        "channel_{}_{}",
        Utc::now().timestamp(),
        rand::random::<u32>()
    )
}

impl Channel {
    /// Create a new inactive channel with no outputs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_channel_id(),
            name: name.into(),
            source: SourceConfig::default(),
            input_url: DEFAULT_INPUT_URL.to_string(),
            outputs: Vec::new(),
            status: ChannelStatus::Inactive,
            last_error: None,
            process_reference: None,
            policy: ReconnectPolicy::default(),
            health: HealthPolicy::default(),
            preview: PreviewState::default(),
            last_health_check_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_input_url(mut self, input_url: impl Into<String>) -> Self {
        self.input_url = input_url.into();
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ========== Queries ==========

    pub fn output(&self, index: usize) -> Result<&ChannelOutput, Error> {
        self.outputs
            .get(index)
            .ok_or_else(|| Error::output_index(index, self.outputs.len()))
    }

    pub fn output_mut(&mut self, index: usize) -> Result<&mut ChannelOutput, Error> {
        let len = self.outputs.len();
        self.outputs
            .get_mut(index)
            .ok_or_else(|| Error::output_index(index, len))
    }

    /// Current position of the output with `id`.
    pub fn position_of(&self, id: &OutputId) -> Option<usize> {
        self.outputs.iter().position(|o| &o.id == id)
    }

    /// Position of the backup linked to the primary at `primary`.
    pub fn backup_index(&self, primary: usize) -> Option<usize> {
        let backup = self.outputs.get(primary)?.failover.backup.as_ref()?;
        self.position_of(backup)
    }

    /// Position of the primary a backup at `backup` stands in for.
    pub fn primary_index(&self, backup: usize) -> Option<usize> {
        let primary = self.outputs.get(backup)?.failover.primary.as_ref()?;
        self.position_of(primary)
    }

    pub fn enabled_output_count(&self) -> usize {
        self.outputs.iter().filter(|o| o.enabled).count()
    }

    /// Status as presented to users: a live channel with an enabled but
    /// disconnected output is reported as an error.
    pub fn display_status(&self) -> ChannelStatus {
        if self.status == ChannelStatus::Active
            && self.outputs.iter().any(|o| o.enabled && !o.stats.connected)
        {
            ChannelStatus::Error
        } else {
            self.status
        }
    }

    /// True once a running preview has outlived its duration.
    pub fn check_preview_timeout(&self, now: DateTime<Utc>) -> bool {
        if !self.preview.enabled || self.preview.duration_sec == 0 {
            return false;
        }
        match self.preview.started_at {
            Some(started) => {
                now - started >= Duration::seconds(i64::from(self.preview.duration_sec))
            }
            None => false,
        }
    }

    /// Whether a health check is due at `now`.
    pub fn health_check_due(&self, now: DateTime<Utc>) -> bool {
        if !self.health.enabled || self.status != ChannelStatus::Active {
            return false;
        }
        match self.last_health_check_at {
            Some(last) => {
                now - last >= Duration::seconds(i64::from(self.health.check_interval_sec))
            }
            None => true,
        }
    }

    // ========== Output editing ==========

    /// Append an output. Returns its position.
    pub fn add_output(
        &mut self,
        service: StreamingService,
        stream_key: impl Into<String>,
        target_orientation: StreamOrientation,
        encoding: Option<EncodingSettings>,
    ) -> Result<usize, Error> {
        let stream_key = stream_key.into();
        if stream_key.trim().is_empty() && !service.is_custom() {
            return Err(Error::validation("Stream key must not be empty"));
        }

        let output = ChannelOutput::new(
            service,
            stream_key,
            target_orientation,
            encoding.unwrap_or_default(),
        );
        Ok(self.push_output(output))
    }

    /// Append a custom destination with an explicit ingest URL.
    pub fn add_custom_output(
        &mut self,
        rtmp_url: impl Into<String>,
        stream_key: impl Into<String>,
        target_orientation: StreamOrientation,
        encoding: Option<EncodingSettings>,
    ) -> Result<usize, Error> {
        let rtmp_url = rtmp_url.into();
        if rtmp_url.trim().is_empty() {
            return Err(Error::validation("Custom destination needs an ingest URL"));
        }

        let output = ChannelOutput::new(
            StreamingService::Custom,
            stream_key,
            target_orientation,
            encoding.unwrap_or_default(),
        )
        .with_rtmp_url(rtmp_url);
        Ok(self.push_output(output))
    }

    fn push_output(&mut self, mut output: ChannelOutput) -> usize {
        output.health.auto_reconnect_enabled = self.health.enabled;
        info!(
            channel_id = %self.id,
            output = %output.service_name,
            "Added output"
        );
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    /// Remove the output at `index`, severing any backup link first.
    pub fn remove_output(&mut self, index: usize) -> Result<ChannelOutput, Error> {
        self.output(index)?;
        self.sever_links(index);
        let removed = self.outputs.remove(index);
        info!(
            channel_id = %self.id,
            output = %removed.service_name,
            index,
            "Removed output"
        );
        Ok(removed)
    }

    /// Clear both sides of whatever failover link the output at `index` is part of.
    pub(crate) fn sever_links(&mut self, index: usize) {
        if let Some(backup) = self.backup_index(index) {
            let b = &mut self.outputs[backup].failover;
            b.is_backup = false;
            b.primary = None;
            b.active = false;
        }
        if let Some(primary) = self.primary_index(index) {
            let p = &mut self.outputs[primary].failover;
            p.backup = None;
            p.active = false;
        }
        let f = &mut self.outputs[index].failover;
        f.backup = None;
        f.primary = None;
        f.is_backup = false;
        f.active = false;
    }

    /// Replace an output's encoding locally.
    pub fn update_output_encoding(
        &mut self,
        index: usize,
        encoding: EncodingSettings,
    ) -> Result<(), Error> {
        self.output_mut(index)?.encoding = encoding;
        Ok(())
    }

    pub fn set_output_enabled(&mut self, index: usize, enabled: bool) -> Result<(), Error> {
        self.output_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// Link `backup` as the standby for `primary`. The backup is disabled.
    pub fn set_output_backup(&mut self, primary: usize, backup: usize) -> Result<(), Error> {
        self.output(primary)?;
        self.output(backup)?;

        if primary == backup {
            return Err(Error::validation("Cannot set output as backup for itself"));
        }
        if self.outputs[primary].failover.is_backup {
            return Err(Error::validation("A backup output cannot have its own backup"));
        }
        if self.outputs[backup].failover.backup.is_some() {
            return Err(Error::validation(
                "An output that has a backup cannot become a backup",
            ));
        }
        if let Some(existing) = self.primary_index(backup)
            && existing != primary
        {
            return Err(Error::validation(
                "Output is already the backup of another output",
            ));
        }

        if let Some(old) = self.backup_index(primary)
            && old != backup
        {
            warn!(
                channel_id = %self.id,
                primary = %self.outputs[primary].service_name,
                "Primary output already has a backup, replacing"
            );
            let f = &mut self.outputs[old].failover;
            f.is_backup = false;
            f.primary = None;
        }

        let primary_id = self.outputs[primary].id.clone();
        let backup_id = self.outputs[backup].id.clone();

        self.outputs[primary].failover.backup = Some(backup_id);
        let b = &mut self.outputs[backup];
        b.failover.is_backup = true;
        b.failover.primary = Some(primary_id);
        b.enabled = false;

        info!(
            channel_id = %self.id,
            primary = %self.outputs[primary].service_name,
            backup = %self.outputs[backup].service_name,
            "Linked backup output"
        );
        Ok(())
    }

    pub fn remove_output_backup(&mut self, primary: usize) -> Result<(), Error> {
        self.output(primary)?;
        let Some(backup) = self.backup_index(primary) else {
            return Err(Error::validation("Primary output has no backup to remove"));
        };

        let b = &mut self.outputs[backup].failover;
        b.is_backup = false;
        b.primary = None;
        b.active = false;
        let p = &mut self.outputs[primary].failover;
        p.backup = None;
        p.active = false;
        Ok(())
    }

    // ========== Source & policy ==========

    /// Record the source frame size, re-detecting orientation when enabled.
    pub fn set_source_dimensions(&mut self, width: u32, height: u32) {
        self.source.width = width;
        self.source.height = height;
        if self.source.auto_detect {
            self.source.orientation = StreamOrientation::detect(width, height);
        }
    }

    /// Toggle health monitoring. Enabling for the first time seeds the policy
    /// with defaults; disabling keeps the numbers.
    pub fn set_health_monitoring(&mut self, enabled: bool) {
        self.health.enabled = enabled;
        if enabled && self.health.check_interval_sec == 0 {
            self.health.check_interval_sec = DEFAULT_HEALTH_INTERVAL_SEC;
            self.health.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
            self.policy.max_reconnect_attempts = DEFAULT_MAX_RECONNECT_ATTEMPTS;
        }
        for output in &mut self.outputs {
            output.health.auto_reconnect_enabled = enabled;
        }
        info!(
            channel_id = %self.id,
            enabled,
            "Health monitoring toggled"
        );
    }

    // ========== Copies ==========

    /// Copy configuration and outputs into a new inactive channel.
    ///
    /// Outputs get fresh ids; backup links are carried over to the copies.
    pub fn duplicate(&self, new_name: impl Into<String>) -> Channel {
        let mut copy = Channel::new(new_name);
        copy.source = self.source.clone();
        copy.input_url = self.input_url.clone();
        copy.policy = self.policy.clone();
        copy.health = self.health.clone();

        let fresh: Vec<OutputId> = self.outputs.iter().map(|_| OutputId::new()).collect();
        let remap = |id: &Option<OutputId>| {
            id.as_ref()
                .and_then(|id| self.position_of(id))
                .map(|pos| fresh[pos].clone())
        };

        copy.outputs = self
            .outputs
            .iter()
            .zip(&fresh)
            .map(|(output, id)| {
                let mut o = output.clone().with_id(id.clone());
                o.reset_runtime();
                o.failover.primary = remap(&output.failover.primary);
                o.failover.backup = remap(&output.failover.backup);
                o
            })
            .collect();
        copy
    }

    /// Drop everything that only made sense for a running process.
    pub fn reset_runtime(&mut self) {
        self.status = ChannelStatus::Inactive;
        self.last_error = None;
        self.process_reference = None;
        self.preview = PreviewState::default();
        self.last_health_check_at = None;
        for output in &mut self.outputs {
            output.reset_runtime();
        }
    }
}
