//! Channel manager.
//!
//! Aggregate root over every channel and the template registry. Operations
//! forward to the per-channel engine and publish a [`ChannelEvent`] for
//! anything a presentation layer would re-render.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use restreamer_api::RestreamerApi;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::bulk::BulkReport;
use super::events::{ChannelEvent, ChannelEventBroadcaster};
use super::health::{HealthReport, ReconnectOutcome};
use crate::domain::{
    Channel, ChannelStatus, EncodingSettings, OutputId, StreamOrientation, StreamingService,
};
use crate::template::TemplateRegistry;
use crate::{Error, Result};

/// Aggregate counts for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerSummary {
    pub channels: usize,
    pub active: usize,
    pub preview: usize,
    pub errored: usize,
    pub outputs: usize,
    pub enabled_outputs: usize,
    pub templates: usize,
}

pub struct ChannelManager {
    channels: Vec<Channel>,
    templates: TemplateRegistry,
    api: Option<Arc<dyn RestreamerApi>>,
    events: ChannelEventBroadcaster,
}

impl ChannelManager {
    /// Create a manager with the built-in templates and no channels.
    pub fn new(api: Option<Arc<dyn RestreamerApi>>) -> Self {
        Self::with_broadcaster(api, ChannelEventBroadcaster::new())
    }

    pub fn with_broadcaster(
        api: Option<Arc<dyn RestreamerApi>>,
        events: ChannelEventBroadcaster,
    ) -> Self {
        Self {
            channels: Vec::new(),
            templates: TemplateRegistry::with_builtins(),
            api,
            events,
        }
    }

    pub fn api(&self) -> Option<&dyn RestreamerApi> {
        self.api.as_deref()
    }

    pub fn events(&self) -> &ChannelEventBroadcaster {
        &self.events
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub(crate) fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    fn split(&mut self, id: &str) -> Result<(&mut Channel, Option<&dyn RestreamerApi>)> {
        let api = self.api.as_deref();
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("Channel", id))?;
        Ok((channel, api))
    }

    fn channel_mut(&mut self, id: &str) -> Result<&mut Channel> {
        self.split(id).map(|(channel, _)| channel)
    }

    fn status_changed(&self, channel_id: &str, from: ChannelStatus, to: ChannelStatus) {
        if from != to {
            self.events.publish(ChannelEvent::StatusChanged {
                channel_id: channel_id.to_string(),
                from,
                to,
            });
        }
    }

    // ========== Queries ==========

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    pub fn get_at(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn count(&self) -> usize {
        self.channels.len()
    }

    pub fn active_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.status == ChannelStatus::Active)
            .count()
    }

    pub fn summary(&self) -> ManagerSummary {
        let mut summary = ManagerSummary {
            channels: self.channels.len(),
            templates: self.templates.len(),
            ..Default::default()
        };
        for channel in &self.channels {
            match channel.display_status() {
                ChannelStatus::Active => summary.active += 1,
                ChannelStatus::Preview => summary.preview += 1,
                ChannelStatus::Error => summary.errored += 1,
                _ => {}
            }
            summary.outputs += channel.outputs.len();
            summary.enabled_outputs += channel.enabled_output_count();
        }
        summary
    }

    // ========== Channel CRUD ==========

    /// Create an empty inactive channel.
    pub fn create_channel(&mut self, name: &str) -> Result<&mut Channel> {
        if name.trim().is_empty() {
            return Err(Error::validation("Channel name must not be empty"));
        }
        Ok(self.insert_channel(Channel::new(name)))
    }

    pub(crate) fn insert_channel(&mut self, channel: Channel) -> &mut Channel {
        info!(channel_id = %channel.id, name = %channel.name, "Created channel");
        self.events.publish(ChannelEvent::Created {
            channel_id: channel.id.clone(),
        });
        self.channels.push(channel);
        let last = self.channels.len() - 1;
        &mut self.channels[last]
    }

    /// Delete a channel, stopping it first when it has a remote process.
    pub async fn delete_channel(&mut self, id: &str) -> Result<Channel> {
        let (channel, api) = self.split(id)?;
        if channel.status != ChannelStatus::Inactive {
            let from = channel.status;
            channel.stop(api).await?;
            self.status_changed(id, from, ChannelStatus::Inactive);
        }

        let position = self
            .channels
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::not_found("Channel", id))?;
        let removed = self.channels.remove(position);
        info!(channel_id = %id, "Deleted channel");
        self.events.publish(ChannelEvent::Deleted {
            channel_id: removed.id.clone(),
        });
        Ok(removed)
    }

    /// Copy a channel's configuration into a new inactive channel.
    pub fn duplicate_channel(&mut self, id: &str, new_name: &str) -> Result<&mut Channel> {
        if new_name.trim().is_empty() {
            return Err(Error::validation("Channel name must not be empty"));
        }
        let copy = self
            .get(id)
            .ok_or_else(|| Error::not_found("Channel", id))?
            .duplicate(new_name);
        Ok(self.insert_channel(copy))
    }

    // ========== Lifecycle ==========

    pub async fn start_channel(&mut self, id: &str) -> Result<()> {
        let (channel, api) = self.split(id)?;
        let from = channel.status;
        let result = channel.start(api).await;
        let to = channel.status;
        self.status_changed(id, from, to);
        result
    }

    pub async fn stop_channel(&mut self, id: &str) -> Result<()> {
        let (channel, api) = self.split(id)?;
        let from = channel.status;
        let result = channel.stop(api).await;
        let to = channel.status;
        self.status_changed(id, from, to);
        result
    }

    pub async fn restart_channel(&mut self, id: &str) -> Result<()> {
        let (channel, api) = self.split(id)?;
        let from = channel.status;
        let result = channel.restart(api).await;
        let to = channel.status;
        self.status_changed(id, from, to);
        result
    }

    pub async fn start_preview(&mut self, id: &str, duration_sec: u32) -> Result<()> {
        let (channel, api) = self.split(id)?;
        let from = channel.status;
        let result = channel.start_preview(api, duration_sec).await;
        let to = channel.status;
        self.status_changed(id, from, to);
        result
    }

    pub fn preview_to_live(&mut self, id: &str) -> Result<()> {
        let channel = self.channel_mut(id)?;
        let from = channel.status;
        channel.preview_to_live()?;
        self.status_changed(id, from, ChannelStatus::Active);
        Ok(())
    }

    pub async fn cancel_preview(&mut self, id: &str) -> Result<()> {
        let (channel, api) = self.split(id)?;
        let from = channel.status;
        let result = channel.cancel_preview(api).await;
        let to = channel.status;
        self.status_changed(id, from, to);
        result
    }

    /// Start every channel flagged for auto-start.
    pub async fn start_all(&mut self) -> BulkReport<String> {
        let ids: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.policy.auto_start)
            .map(|c| c.id.clone())
            .collect();
        info!(count = ids.len(), "Starting all auto-start channels");

        let mut report = BulkReport::default();
        for id in ids {
            let result = self.start_channel(&id).await;
            report.record(id, result);
        }
        report
    }

    pub async fn stop_all(&mut self) -> BulkReport<String> {
        let ids: Vec<String> = self.channels.iter().map(|c| c.id.clone()).collect();
        info!(count = ids.len(), "Stopping all channels");

        let mut report = BulkReport::default();
        for id in ids {
            let result = self.stop_channel(&id).await;
            report.record(id, result);
        }
        report
    }

    // ========== Outputs ==========

    /// Add an output; on an active channel it is attached to the running
    /// process as well, and rolled back if that fails.
    pub async fn add_output(
        &mut self,
        channel_id: &str,
        service: StreamingService,
        stream_key: &str,
        orientation: StreamOrientation,
        encoding: Option<EncodingSettings>,
    ) -> Result<usize> {
        let (channel, api) = self.split(channel_id)?;
        let index = channel.add_output(service, stream_key, orientation, encoding)?;
        attach_new_output(channel, api, index).await?;
        Ok(index)
    }

    pub async fn add_custom_output(
        &mut self,
        channel_id: &str,
        rtmp_url: &str,
        stream_key: &str,
        orientation: StreamOrientation,
        encoding: Option<EncodingSettings>,
    ) -> Result<usize> {
        let (channel, api) = self.split(channel_id)?;
        let index = channel.add_custom_output(rtmp_url, stream_key, orientation, encoding)?;
        attach_new_output(channel, api, index).await?;
        Ok(index)
    }

    pub async fn remove_output(&mut self, channel_id: &str, index: usize) -> Result<OutputId> {
        let (channel, api) = self.split(channel_id)?;
        Ok(channel.delete_output(api, index).await?.id)
    }

    pub async fn set_output_enabled(
        &mut self,
        channel_id: &str,
        index: usize,
        enabled: bool,
    ) -> Result<()> {
        let (channel, api) = self.split(channel_id)?;
        match api {
            Some(api) if channel.status == ChannelStatus::Active => {
                channel.set_output_enabled_live(api, index, enabled).await
            }
            _ => channel.set_output_enabled(index, enabled),
        }
    }

    pub async fn update_output_encoding(
        &mut self,
        channel_id: &str,
        index: usize,
        encoding: EncodingSettings,
    ) -> Result<()> {
        let (channel, api) = self.split(channel_id)?;
        match api {
            Some(api) if channel.status == ChannelStatus::Active => {
                channel.update_encoding_live(api, index, encoding).await
            }
            _ => channel.update_output_encoding(index, encoding),
        }
    }

    pub fn set_output_backup(&mut self, channel_id: &str, primary: usize, backup: usize) -> Result<()> {
        self.channel_mut(channel_id)?.set_output_backup(primary, backup)
    }

    pub fn remove_output_backup(&mut self, channel_id: &str, primary: usize) -> Result<()> {
        self.channel_mut(channel_id)?.remove_output_backup(primary)
    }

    pub fn set_health_monitoring(&mut self, channel_id: &str, enabled: bool) -> Result<()> {
        self.channel_mut(channel_id)?.set_health_monitoring(enabled);
        Ok(())
    }

    // ========== Failover ==========

    pub async fn trigger_failover(&mut self, channel_id: &str, primary: usize) -> Result<()> {
        let (channel, api) = self.split(channel_id)?;
        let was_active = channel.output(primary)?.failover.active;
        channel.trigger_failover(api, primary).await?;
        if !was_active {
            self.events.publish(ChannelEvent::FailoverTriggered {
                channel_id: channel_id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn restore_primary(&mut self, channel_id: &str, primary: usize) -> Result<()> {
        let (channel, api) = self.split(channel_id)?;
        let was_active = channel.output(primary)?.failover.active;
        channel.restore_primary(api, primary).await?;
        if was_active {
            self.events.publish(ChannelEvent::PrimaryRestored {
                channel_id: channel_id.to_string(),
                index: primary,
            });
        }
        Ok(())
    }

    // ========== Bulk ==========

    pub async fn bulk_enable(
        &mut self,
        channel_id: &str,
        indices: &[usize],
        enabled: bool,
    ) -> Result<BulkReport> {
        let (channel, api) = self.split(channel_id)?;
        channel.bulk_enable(api, indices, enabled).await
    }

    pub async fn bulk_delete(&mut self, channel_id: &str, indices: &[usize]) -> Result<BulkReport> {
        let (channel, api) = self.split(channel_id)?;
        channel.bulk_delete(api, indices).await
    }

    pub async fn bulk_update_encoding(
        &mut self,
        channel_id: &str,
        indices: &[usize],
        encoding: EncodingSettings,
    ) -> Result<BulkReport> {
        let (channel, api) = self.split(channel_id)?;
        channel.bulk_update_encoding(api, indices, encoding).await
    }

    pub async fn bulk_start(&mut self, channel_id: &str, indices: &[usize]) -> Result<BulkReport> {
        let (channel, api) = self.split(channel_id)?;
        channel.bulk_start(api, indices).await
    }

    pub async fn bulk_stop(&mut self, channel_id: &str, indices: &[usize]) -> Result<BulkReport> {
        let (channel, api) = self.split(channel_id)?;
        channel.bulk_stop(api, indices).await
    }

    // ========== Templates ==========

    pub fn create_template(
        &mut self,
        name: &str,
        service: StreamingService,
        orientation: StreamOrientation,
        encoding: EncodingSettings,
    ) -> Result<String> {
        Ok(self
            .templates
            .create(name, service, orientation, encoding)?
            .id
            .clone())
    }

    pub fn delete_template(&mut self, id: &str) -> Result<()> {
        self.templates.delete(id).map(|_| ())
    }

    /// Add an output stamped from a template.
    pub async fn apply_template(
        &mut self,
        channel_id: &str,
        template_id: &str,
        stream_key: &str,
    ) -> Result<usize> {
        let template = self
            .templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Template", template_id))?;
        debug!(channel_id, template_id, "Applying template");
        self.add_output(
            channel_id,
            template.service,
            stream_key,
            template.orientation,
            Some(template.encoding),
        )
        .await
    }

    // ========== Health ==========

    /// Run one health sweep on a channel and publish what changed.
    pub async fn check_health(&mut self, channel_id: &str, now: DateTime<Utc>) -> Result<HealthReport> {
        let (channel, api) = self.split(channel_id)?;
        if channel.status != ChannelStatus::Active || !channel.health.enabled {
            return Ok(HealthReport::default());
        }
        let api = api.ok_or(Error::NoApiConnection)?;

        let failed_over: Vec<usize> = failed_over_primaries(channel);
        let report = channel.check_health(api, now).await?;
        let restored: Vec<usize> = failed_over
            .into_iter()
            .filter(|&i| channel.outputs.get(i).is_some_and(|o| !o.failover.active))
            .collect();

        for &index in &report.unhealthy {
            self.events.publish(ChannelEvent::OutputUnhealthy {
                channel_id: channel_id.to_string(),
                index,
            });
        }
        for (index, outcome) in &report.reconnects {
            if *outcome == ReconnectOutcome::Reconnected {
                self.events.publish(ChannelEvent::OutputReconnected {
                    channel_id: channel_id.to_string(),
                    index: *index,
                });
            }
        }
        if report.failover_triggered {
            self.events.publish(ChannelEvent::FailoverTriggered {
                channel_id: channel_id.to_string(),
            });
        }
        for index in restored {
            self.events.publish(ChannelEvent::PrimaryRestored {
                channel_id: channel_id.to_string(),
                index,
            });
        }
        Ok(report)
    }

    /// Check every channel whose interval has elapsed.
    pub async fn run_due_health_checks(&mut self, now: DateTime<Utc>) -> BulkReport<String> {
        let due: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.health_check_due(now))
            .map(|c| c.id.clone())
            .collect();

        let mut report = BulkReport::default();
        for id in due {
            let result = self.check_health(&id, now).await;
            if let Err(e) = &result {
                warn!(channel_id = %id, error = %e, "Health check failed");
            }
            report.record(id, result);
        }
        report
    }

    /// Finish deferred reconnects. Returns how many outputs came back.
    pub async fn complete_due_reconnects(&mut self, now: DateTime<Utc>) -> usize {
        let Some(api) = self.api.as_deref() else {
            return 0;
        };

        let mut reconnected = Vec::new();
        for channel in &mut self.channels {
            let has_due = channel
                .outputs
                .iter()
                .any(|o| o.health.reconnect_due.is_some_and(|due| due <= now));
            if !has_due {
                continue;
            }
            let report = channel.complete_due_reconnects(api, now).await;
            reconnected.extend(report.succeeded.into_iter().map(|i| (channel.id.clone(), i)));
        }

        for (channel_id, index) in &reconnected {
            self.events.publish(ChannelEvent::OutputReconnected {
                channel_id: channel_id.clone(),
                index: *index,
            });
        }
        reconnected.len()
    }

    /// Stop previews that outlived their duration. Returns the affected ids.
    pub async fn cancel_timed_out_previews(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.status == ChannelStatus::Preview && c.check_preview_timeout(now))
            .map(|c| c.id.clone())
            .collect();

        for id in &expired {
            info!(channel_id = %id, "Preview timed out");
            if let Err(e) = self.cancel_preview(id).await {
                warn!(channel_id = %id, error = %e, "Failed to cancel timed out preview");
                continue;
            }
            self.events.publish(ChannelEvent::PreviewTimedOut {
                channel_id: id.clone(),
            });
        }
        expired
    }
}

fn failed_over_primaries(channel: &Channel) -> Vec<usize> {
    channel
        .outputs
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_primary_with_backup() && o.failover.active)
        .map(|(i, _)| i)
        .collect()
}

async fn attach_new_output(
    channel: &mut Channel,
    api: Option<&dyn RestreamerApi>,
    index: usize,
) -> Result<()> {
    let Some(api) = api else {
        return Ok(());
    };
    if channel.status != ChannelStatus::Active {
        return Ok(());
    }
    if let Err(e) = channel.add_output_live(api, index).await {
        channel.remove_output(index)?;
        return Err(e);
    }
    channel.outputs[index].mark_healthy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restreamer_api::{FailPoint, InMemoryRestreamer};

    fn manager() -> (ChannelManager, Arc<InMemoryRestreamer>) {
        let api = Arc::new(InMemoryRestreamer::new());
        (ChannelManager::new(Some(api.clone())), api)
    }

    async fn channel_with_output(manager: &mut ChannelManager, name: &str) -> String {
        let id = manager.create_channel(name).unwrap().id.clone();
        manager
            .add_output(&id, StreamingService::Twitch, "key", StreamOrientation::Auto, None)
            .await
            .unwrap();
        id
    }

    #[test]
    fn test_create_channel() {
        let (mut manager, _) = manager();
        let mut rx = manager.events().subscribe();

        let id = manager.create_channel("Main").unwrap().id.clone();
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.get(&id).unwrap().name, "Main");
        assert_eq!(manager.get_at(0).unwrap().id, id);
        assert!(manager.create_channel("  ").is_err());
        assert!(matches!(rx.try_recv().unwrap(), ChannelEvent::Created { .. }));
    }

    #[tokio::test]
    async fn test_start_stop_publish_status_events() {
        let (mut manager, _) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        let mut rx = manager.events().subscribe();

        manager.start_channel(&id).await.unwrap();
        assert_eq!(manager.active_count(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ChannelEvent::StatusChanged {
                channel_id: id.clone(),
                from: ChannelStatus::Inactive,
                to: ChannelStatus::Active,
            }
        );

        manager.stop_channel(&id).await.unwrap();
        assert_eq!(manager.active_count(), 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChannelEvent::StatusChanged { to: ChannelStatus::Inactive, .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_active_channel_stops_it() {
        let (mut manager, api) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.start_channel(&id).await.unwrap();

        let removed = manager.delete_channel(&id).await.unwrap();
        assert_eq!(removed.status, ChannelStatus::Inactive);
        assert_eq!(manager.count(), 0);
        assert_eq!(api.process_count(&id), 0);
        assert!(matches!(
            manager.delete_channel(&id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_channel() {
        let (mut manager, _) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.start_channel(&id).await.unwrap();

        let copy_id = manager.duplicate_channel(&id, "Backup").unwrap().id.clone();
        let copy = manager.get(&copy_id).unwrap();
        assert_eq!(copy.status, ChannelStatus::Inactive);
        assert_eq!(copy.outputs.len(), 1);
        assert!(manager.duplicate_channel("missing", "x").is_err());
    }

    #[tokio::test]
    async fn test_start_all_only_auto_start() {
        let (mut manager, _) = manager();
        let a = channel_with_output(&mut manager, "A").await;
        let b = channel_with_output(&mut manager, "B").await;
        manager.get_mut(&a).unwrap().policy.auto_start = true;

        let report = manager.start_all().await;
        assert_eq!(report.succeeded, vec![a.clone()]);
        assert_eq!(manager.get(&b).unwrap().status, ChannelStatus::Inactive);

        let report = manager.stop_all().await;
        assert!(report.is_success());
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_add_output_to_live_channel() {
        let (mut manager, api) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.start_channel(&id).await.unwrap();

        let index = manager
            .add_output(&id, StreamingService::YouTube, "yt", StreamOrientation::Auto, None)
            .await
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(api.outputs(&id).len(), 2);

        api.fail(FailPoint::AddOutput);
        assert!(
            manager
                .add_output(&id, StreamingService::Kick, "k", StreamOrientation::Auto, None)
                .await
                .is_err()
        );
        assert_eq!(manager.get(&id).unwrap().outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_output_from_live_channel() {
        let (mut manager, api) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.start_channel(&id).await.unwrap();

        manager.remove_output(&id, 0).await.unwrap();
        assert!(api.outputs(&id).is_empty());
        assert!(manager.get(&id).unwrap().outputs.is_empty());
    }

    #[tokio::test]
    async fn test_apply_template() {
        let (mut manager, _) = manager();
        let id = manager.create_channel("Main").unwrap().id.clone();

        let index = manager
            .apply_template(&id, "builtin_tiktok_vertical", "tt")
            .await
            .unwrap();
        let output = &manager.get(&id).unwrap().outputs[index];
        assert_eq!(output.service, StreamingService::TikTok);
        assert_eq!(output.target_orientation, StreamOrientation::Vertical);
        assert_eq!(output.encoding.bitrate, 3000);

        assert!(manager.apply_template(&id, "nope", "k").await.is_err());
    }

    #[test]
    fn test_builtin_template_delete_fails() {
        let (mut manager, _) = manager();
        let before = manager.templates().len();
        assert!(manager.delete_template("builtin_youtube_1080p60").is_err());
        assert_eq!(manager.templates().len(), before);
    }

    #[tokio::test]
    async fn test_health_events() {
        let (mut manager, api) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.set_health_monitoring(&id, true).unwrap();
        manager.start_channel(&id).await.unwrap();
        let mut rx = manager.events().subscribe();

        api.drop_output(&id, "Twitch_0");
        let now = Utc::now();
        let report = manager.run_due_health_checks(now).await;
        assert_eq!(report.succeeded, vec![id.clone()]);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChannelEvent::OutputUnhealthy { index: 0, .. }
        ));

        // interval not elapsed yet
        let report = manager.run_due_health_checks(now).await;
        assert!(report.succeeded.is_empty());
    }

    #[tokio::test]
    async fn test_health_check_without_api() {
        let mut manager = ChannelManager::new(None);
        let id = manager.create_channel("Main").unwrap().id.clone();
        let report = manager.check_health(&id, Utc::now()).await.unwrap();
        assert!(!report.checked);
    }

    #[tokio::test]
    async fn test_preview_timeout_cancels_preview() {
        let (mut manager, api) = manager();
        let id = channel_with_output(&mut manager, "Main").await;
        manager.start_preview(&id, 10).await.unwrap();
        let mut rx = manager.events().subscribe();

        let later = Utc::now() + chrono::Duration::seconds(11);
        assert_eq!(manager.cancel_timed_out_previews(later).await, vec![id.clone()]);
        assert_eq!(manager.get(&id).unwrap().status, ChannelStatus::Inactive);
        assert_eq!(api.process_count(&id), 0);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.contains(&ChannelEvent::PreviewTimedOut { channel_id: id }));
    }

    #[tokio::test]
    async fn test_summary() {
        let (mut manager, _) = manager();
        let id = channel_with_output(&mut manager, "A").await;
        channel_with_output(&mut manager, "B").await;
        manager.start_channel(&id).await.unwrap();

        let summary = manager.summary();
        assert_eq!(summary.channels, 2);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.outputs, 2);
        assert_eq!(summary.templates, 6);
    }
}
