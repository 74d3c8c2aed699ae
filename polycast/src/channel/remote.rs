//! Live edits against a channel's remote process.

use restreamer_api::{ProcessOutputSpec, ProcessSpec, RestreamerApi};
use tracing::{debug, info, warn};

use crate::domain::{
    Channel, ChannelOutput, EncodingSettings, OutputId, StreamOrientation, video_filter,
};
use crate::{Error, Result};

/// Resolve the remote process id registered under `reference`.
pub(crate) async fn resolve_process_id(api: &dyn RestreamerApi, reference: &str) -> Result<String> {
    api.find_process_id(reference)
        .await?
        .ok_or_else(|| Error::not_found("Process", reference))
}

impl Channel {
    /// Source orientation used for filter decisions.
    pub fn effective_source_orientation(&self) -> StreamOrientation {
        match self.source.orientation {
            StreamOrientation::Auto if self.source.auto_detect => {
                StreamOrientation::detect(self.source.width, self.source.height)
            }
            other => other,
        }
    }

    /// Remote egress definition for the output at `index`.
    pub(crate) fn output_spec(&self, index: usize) -> Result<ProcessOutputSpec> {
        let output = self.output(index)?;
        Ok(ProcessOutputSpec {
            id: output.remote_id(index),
            url: output.publish_url(),
            video_filter: video_filter(
                self.effective_source_orientation(),
                output.target_orientation,
            )
            .map(str::to_string),
        })
    }

    /// Process definition covering every enabled output.
    pub(crate) fn process_spec(&self) -> Result<ProcessSpec> {
        let outputs = self
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.enabled)
            .map(|(index, _)| self.output_spec(index))
            .collect::<Result<Vec<_>>>()?;

        Ok(ProcessSpec {
            reference: self.id.clone(),
            input_url: self.input_url.clone(),
            outputs,
        })
    }

    /// Reference of the running process, or an error when not live.
    pub(crate) fn live_reference(&self) -> Result<&str> {
        if !self.status.is_live() {
            return Err(Error::validation(format!(
                "Channel '{}' is not active",
                self.name
            )));
        }
        self.process_reference.as_deref().ok_or_else(|| {
            Error::Other(format!(
                "No process reference for active channel '{}'",
                self.name
            ))
        })
    }

    /// Attach the output at `index` to the running process.
    ///
    /// Leaves the local `enabled` flag untouched.
    pub(crate) async fn add_output_live(
        &self,
        api: &dyn RestreamerApi,
        index: usize,
    ) -> Result<()> {
        let spec = self.output_spec(index)?;
        let process_id = resolve_process_id(api, self.live_reference()?).await?;
        api.add_process_output(&process_id, &spec).await?;
        debug!(channel_id = %self.id, output = %spec.id, "Attached output to live process");
        Ok(())
    }

    /// Detach the output at `index` from the running process.
    pub(crate) async fn remove_output_live(
        &self,
        api: &dyn RestreamerApi,
        index: usize,
    ) -> Result<()> {
        let remote_id = self.output(index)?.remote_id(index);
        let process_id = resolve_process_id(api, self.live_reference()?).await?;
        api.remove_process_output(&process_id, &remote_id).await?;
        debug!(channel_id = %self.id, output = %remote_id, "Detached output from live process");
        Ok(())
    }

    /// Toggle an output, pushing the change to the running process.
    ///
    /// The local flag only changes once the remote call succeeded.
    pub async fn set_output_enabled_live(
        &mut self,
        api: &dyn RestreamerApi,
        index: usize,
        enabled: bool,
    ) -> Result<()> {
        if self.output(index)?.enabled == enabled {
            return Ok(());
        }
        if enabled {
            self.add_output_live(api, index).await?;
        } else {
            self.remove_output_live(api, index).await?;
        }
        self.outputs[index].enabled = enabled;
        Ok(())
    }

    /// Push new encode parameters to a live output, then store them locally.
    pub async fn update_encoding_live(
        &mut self,
        api: &dyn RestreamerApi,
        index: usize,
        encoding: EncodingSettings,
    ) -> Result<()> {
        let remote_id = self.output(index)?.remote_id(index);
        let process_id = resolve_process_id(api, self.live_reference()?).await?;

        let live = api.list_process_outputs(&process_id).await?;
        if !live.iter().any(|id| id == &remote_id) {
            return Err(Error::not_found("Output", remote_id));
        }

        api.update_output_encoding(&process_id, &remote_id, &encoding.to_params())
            .await?;
        self.outputs[index].encoding = encoding;

        info!(
            channel_id = %self.id,
            output = %remote_id,
            bitrate = encoding.bitrate,
            "Updated encoding on live output"
        );
        Ok(())
    }

    // ========== Structural edits on a live process ==========

    /// Remote ids of the outputs currently attached, keyed by stable id.
    pub(crate) fn attached_remote_ids(&self) -> Vec<(OutputId, String)> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.enabled && o.health.reconnect_due.is_none())
            .map(|(index, o)| (o.id.clone(), o.remote_id(index)))
            .collect()
    }

    /// Detach the output at `index` ahead of deleting it. Failures are logged.
    pub(crate) async fn detach_for_removal(&self, api: &dyn RestreamerApi, index: usize) {
        let attached = self
            .outputs
            .get(index)
            .is_some_and(|o| o.enabled && o.health.reconnect_due.is_none());
        if attached && let Err(e) = self.remove_output_live(api, index).await {
            warn!(channel_id = %self.id, index, error = %e, "Failed to detach removed output");
        }
    }

    /// Move attached outputs whose position changed onto the remote id of
    /// their new position.
    ///
    /// `attached` must be in ascending position order: survivors only move
    /// down, so each target id has been vacated by the time it is reused.
    /// Returns the positions that could not be moved; the health sweep
    /// reconnects those.
    pub(crate) async fn rekey_live_outputs(
        &mut self,
        api: &dyn RestreamerApi,
        attached: &[(OutputId, String)],
    ) -> Vec<usize> {
        let mut failed = Vec::new();
        for (id, old_remote) in attached {
            let Some(index) = self.position_of(id) else {
                continue;
            };
            if self.outputs[index].remote_id(index) == *old_remote {
                continue;
            }
            if let Err(e) = self.move_remote_output(api, old_remote, index).await {
                warn!(
                    channel_id = %self.id,
                    from = %old_remote,
                    index,
                    error = %e,
                    "Failed to re-key shifted output"
                );
                self.last_error = Some(e.to_string());
                failed.push(index);
            }
        }
        failed
    }

    async fn move_remote_output(
        &self,
        api: &dyn RestreamerApi,
        old_remote: &str,
        index: usize,
    ) -> Result<()> {
        let process_id = resolve_process_id(api, self.live_reference()?).await?;
        api.remove_process_output(&process_id, old_remote).await?;
        self.add_output_live(api, index).await?;
        debug!(channel_id = %self.id, from = %old_remote, index, "Re-keyed shifted output");
        Ok(())
    }

    /// Remove one output. On a live channel it is detached first and the
    /// outputs behind it move to the remote ids of their new positions.
    pub async fn delete_output(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        index: usize,
    ) -> Result<ChannelOutput> {
        self.output(index)?;
        let Some(api) = api.filter(|_| self.status.is_live()) else {
            return self.remove_output(index);
        };

        let attached = self.attached_remote_ids();
        self.detach_for_removal(api, index).await;
        let removed = self.remove_output(index)?;
        self.rekey_live_outputs(api, &attached).await;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelStatus, StreamingService};
    use restreamer_api::InMemoryRestreamer;

    async fn live_channel(api: &InMemoryRestreamer) -> Channel {
        let mut channel = Channel::new("live");
        channel
            .add_output(StreamingService::Twitch, "tw", StreamOrientation::Horizontal, None)
            .unwrap();
        channel
            .add_output(StreamingService::TikTok, "tt", StreamOrientation::Vertical, None)
            .unwrap();
        channel.source.orientation = StreamOrientation::Horizontal;
        channel.start(Some(api)).await.unwrap();
        channel
    }

    #[test]
    fn test_process_spec_skips_disabled_outputs() {
        let mut channel = Channel::new("c");
        channel
            .add_output(StreamingService::Twitch, "a", StreamOrientation::Auto, None)
            .unwrap();
        channel
            .add_output(StreamingService::YouTube, "b", StreamOrientation::Auto, None)
            .unwrap();
        channel.outputs[0].enabled = false;

        let spec = channel.process_spec().unwrap();
        assert_eq!(spec.reference, channel.id);
        assert_eq!(spec.outputs.len(), 1);
        assert_eq!(spec.outputs[0].id, "YouTube_1");
        assert_eq!(spec.outputs[0].url, "rtmp://a.rtmp.youtube.com/live2/b");
    }

    #[test]
    fn test_output_spec_adds_filter_for_orientation_change() {
        let mut channel = Channel::new("c");
        channel.set_source_dimensions(1920, 1080);
        channel
            .add_output(StreamingService::TikTok, "k", StreamOrientation::Vertical, None)
            .unwrap();

        let spec = channel.output_spec(0).unwrap();
        assert_eq!(
            spec.video_filter.as_deref(),
            Some("crop=ih*9/16:ih,scale=1080:1920")
        );
    }

    #[tokio::test]
    async fn test_update_encoding_live() {
        let api = InMemoryRestreamer::new();
        let mut channel = live_channel(&api).await;

        let encoding = EncodingSettings::video(3500, 1280, 720, 128);
        channel.update_encoding_live(&api, 0, encoding).await.unwrap();

        assert_eq!(channel.outputs[0].encoding, encoding);
        assert_eq!(
            api.encoding("Twitch_0").unwrap().video_bitrate,
            Some(3_500_000)
        );
    }

    #[tokio::test]
    async fn test_update_encoding_live_requires_remote_output() {
        let api = InMemoryRestreamer::new();
        let mut channel = live_channel(&api).await;
        api.drop_output(&channel.id, "Twitch_0");

        let before = channel.outputs[0].encoding;
        let err = channel
            .update_encoding_live(&api, 0, EncodingSettings::video(1000, 0, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(channel.outputs[0].encoding, before);
    }

    #[tokio::test]
    async fn test_live_edits_require_active_channel() {
        let api = InMemoryRestreamer::new();
        let mut channel = Channel::new("idle");
        channel
            .add_output(StreamingService::Twitch, "k", StreamOrientation::Auto, None)
            .unwrap();
        assert_eq!(channel.status, ChannelStatus::Inactive);

        assert!(channel.set_output_enabled_live(&api, 0, false).await.is_err());
        assert!(channel.outputs[0].enabled);
    }

    #[tokio::test]
    async fn test_toggle_output_live() {
        let api = InMemoryRestreamer::new();
        let mut channel = live_channel(&api).await;

        channel.set_output_enabled_live(&api, 1, false).await.unwrap();
        assert!(!channel.outputs[1].enabled);
        assert_eq!(api.outputs(&channel.id).len(), 1);

        channel.set_output_enabled_live(&api, 1, true).await.unwrap();
        let outputs = api.outputs(&channel.id);
        let tiktok = outputs.iter().find(|o| o.id == "TikTok_1").unwrap();
        assert_eq!(
            tiktok.video_filter.as_deref(),
            Some("crop=ih*9/16:ih,scale=1080:1920")
        );
    }
}
