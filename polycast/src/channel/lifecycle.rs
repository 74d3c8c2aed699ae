//! Start/stop/preview lifecycle.

use chrono::Utc;
use restreamer_api::RestreamerApi;
use tracing::{error, info, warn};

use crate::domain::channel::PreviewState;
use crate::domain::{Channel, ChannelStatus};
use crate::{Error, Result};

pub const NO_ENABLED_OUTPUTS: &str = "No enabled outputs configured";
pub const NO_API_CONNECTION: &str = "No Restreamer API connection";
pub const NO_INPUT_URL: &str = "No input URL configured";

impl Channel {
    /// Start streaming to every enabled output.
    ///
    /// A no-op when already active. Every failure leaves the channel in
    /// `ERROR` with `last_error` set and returns [`Error::StartFailed`].
    pub async fn start(&mut self, api: Option<&dyn RestreamerApi>) -> Result<()> {
        if self.status == ChannelStatus::Active {
            return Ok(());
        }
        self.launch(api, ChannelStatus::Active).await
    }

    async fn launch(&mut self, api: Option<&dyn RestreamerApi>, target: ChannelStatus) -> Result<()> {
        // Preview and Stopping cannot restart in place
        self.status.transition_to(ChannelStatus::Starting)?;

        let enabled = self.enabled_output_count();
        if enabled == 0 {
            return Err(self.fail_start(NO_ENABLED_OUTPUTS));
        }
        let Some(api) = api else {
            return Err(self.fail_start(NO_API_CONNECTION));
        };
        if self.input_url.trim().is_empty() {
            return Err(self.fail_start(NO_INPUT_URL));
        }

        self.status = ChannelStatus::Starting;
        info!(
            channel_id = %self.id,
            channel_name = %self.name,
            outputs = enabled,
            "Starting channel"
        );

        // the control plane keeps same-reference processes side by side
        match api.delete_processes_by_reference(&self.id).await {
            Ok(0) => {}
            Ok(removed) => warn!(channel_id = %self.id, removed, "Removed stale remote processes"),
            Err(e) => warn!(channel_id = %self.id, error = %e, "Failed to clear stale remote processes"),
        }

        let spec = self.process_spec()?;
        match api.create_process(&spec).await {
            Ok(reference) => {
                self.process_reference = Some(reference);
                self.last_error = None;
                self.status = target;
                for output in self.outputs.iter_mut().filter(|o| o.enabled) {
                    output.mark_healthy();
                }
                info!(
                    channel_id = %self.id,
                    reference = ?self.process_reference,
                    "Channel started"
                );
                Ok(())
            }
            Err(e) => {
                let message = api.last_error().unwrap_or_else(|| e.to_string());
                Err(self.fail_start(&message))
            }
        }
    }

    fn fail_start(&mut self, message: &str) -> Error {
        error!(channel_id = %self.id, channel_name = %self.name, error = %message, "Channel failed to start");
        self.last_error = Some(message.to_string());
        self.status = ChannelStatus::Error;
        Error::StartFailed(message.to_string())
    }

    /// Stop and delete the remote process. Idempotent.
    ///
    /// Failed remote calls are logged; the channel still ends up inactive.
    pub async fn stop(&mut self, api: Option<&dyn RestreamerApi>) -> Result<()> {
        if self.status == ChannelStatus::Inactive {
            return Ok(());
        }
        self.status = self.status.transition_to(ChannelStatus::Stopping)?;

        if let Some(reference) = self.process_reference.as_deref() {
            match api {
                Some(api) => {
                    if let Err(e) = api.stop_process_by_reference(reference).await {
                        warn!(channel_id = %self.id, error = %e, "Failed to stop remote process");
                    }
                    if let Err(e) = api.delete_processes_by_reference(reference).await {
                        warn!(channel_id = %self.id, error = %e, "Failed to delete remote process");
                    }
                }
                None => warn!(channel_id = %self.id, "No API to stop remote process"),
            }
        }

        self.process_reference = None;
        self.last_error = None;
        for output in &mut self.outputs {
            output.stats.connected = false;
            output.health.reconnect_due = None;
        }
        self.status = ChannelStatus::Inactive;
        info!(channel_id = %self.id, "Channel stopped");
        Ok(())
    }

    /// Stop then start. Not atomic: a failed start leaves the channel in `ERROR`.
    pub async fn restart(&mut self, api: Option<&dyn RestreamerApi>) -> Result<()> {
        self.stop(api).await?;
        self.start(api).await
    }

    /// Start as a time-boxed preview. Only legal from `INACTIVE`.
    pub async fn start_preview(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        duration_sec: u32,
    ) -> Result<()> {
        if self.status != ChannelStatus::Inactive {
            return Err(Error::invalid_transition(self.status, ChannelStatus::Preview));
        }

        self.preview = PreviewState {
            enabled: true,
            duration_sec,
            started_at: Some(Utc::now()),
        };

        if let Err(e) = self.launch(api, ChannelStatus::Preview).await {
            self.preview = PreviewState::default();
            return Err(e);
        }
        info!(channel_id = %self.id, duration_sec, "Preview started");
        Ok(())
    }

    /// Promote a running preview to a regular live session.
    pub fn preview_to_live(&mut self) -> Result<()> {
        if self.status != ChannelStatus::Preview {
            return Err(Error::invalid_transition(self.status, ChannelStatus::Active));
        }
        self.preview = PreviewState::default();
        self.last_error = None;
        self.status = self.status.transition_to(ChannelStatus::Active)?;
        info!(channel_id = %self.id, "Preview went live");
        Ok(())
    }

    /// Abort a running preview.
    pub async fn cancel_preview(&mut self, api: Option<&dyn RestreamerApi>) -> Result<()> {
        if self.status != ChannelStatus::Preview {
            return Err(Error::invalid_transition(self.status, ChannelStatus::Inactive));
        }
        self.preview = PreviewState::default();
        self.stop(api).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StreamOrientation, StreamingService};
    use restreamer_api::{FailPoint, InMemoryRestreamer};

    fn channel() -> Channel {
        let mut channel = Channel::new("Main");
        channel
            .add_output(StreamingService::Twitch, "tw", StreamOrientation::Auto, None)
            .unwrap();
        channel
            .add_output(StreamingService::YouTube, "yt", StreamOrientation::Auto, None)
            .unwrap();
        channel
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();

        channel.start(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Active);
        assert_eq!(channel.process_reference.as_deref(), Some(channel.id.as_str()));
        assert_eq!(api.outputs(&channel.id).len(), 2);

        // already active
        channel.start(Some(&api)).await.unwrap();
        assert_eq!(api.calls_starting_with("create:").len(), 1);

        channel.stop(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Inactive);
        assert!(channel.process_reference.is_none());
        assert_eq!(api.calls_starting_with("stop:").len(), 1);
        assert_eq!(api.process_count(&channel.id), 0);
    }

    #[tokio::test]
    async fn test_restart_leaves_single_process() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();

        channel.start(Some(&api)).await.unwrap();
        channel.restart(Some(&api)).await.unwrap();
        assert_eq!(api.process_count(&channel.id), 1);
        assert_eq!(api.process_state(&channel.id).as_deref(), Some("running"));
    }

    #[tokio::test]
    async fn test_start_clears_leftover_process() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        // a process from an earlier run that was never cleaned up
        api.create_process(&channel.process_spec().unwrap()).await.unwrap();
        api.set_state(&channel.id, "finished");

        channel.start(Some(&api)).await.unwrap();
        assert_eq!(api.process_count(&channel.id), 1);
        assert_eq!(api.process_state(&channel.id).as_deref(), Some("running"));
    }

    #[tokio::test]
    async fn test_start_without_enabled_outputs() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        for output in &mut channel.outputs {
            output.enabled = false;
        }

        let err = channel.start(Some(&api)).await.unwrap_err();
        assert!(matches!(err, Error::StartFailed(_)));
        assert_eq!(channel.status, ChannelStatus::Error);
        assert!(channel.last_error.as_deref().unwrap().contains("No enabled outputs"));
        assert!(channel.process_reference.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_without_api() {
        let mut channel = channel();
        channel.start(None).await.unwrap_err();
        assert_eq!(channel.status, ChannelStatus::Error);
        assert_eq!(channel.last_error.as_deref(), Some(NO_API_CONNECTION));
    }

    #[tokio::test]
    async fn test_start_without_input_url() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel().with_input_url("");
        channel.start(Some(&api)).await.unwrap_err();
        assert_eq!(channel.last_error.as_deref(), Some(NO_INPUT_URL));
    }

    #[tokio::test]
    async fn test_remote_failure_copies_error_text() {
        let api = InMemoryRestreamer::new();
        api.fail(FailPoint::CreateProcess);
        let mut channel = channel();

        channel.start(Some(&api)).await.unwrap_err();
        assert_eq!(channel.status, ChannelStatus::Error);
        assert!(channel.last_error.as_deref().unwrap().contains("injected failure"));
        assert!(channel.process_reference.is_none());

        // recover from error
        api.clear_failure(FailPoint::CreateProcess);
        channel.start(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Active);
        assert!(channel.last_error.is_none());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        channel.start(Some(&api)).await.unwrap();

        channel.stop(Some(&api)).await.unwrap();
        channel.stop(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Inactive);
        assert_eq!(api.calls_starting_with("stop:").len(), 1);
    }

    #[tokio::test]
    async fn test_stop_survives_remote_failure() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        channel.start(Some(&api)).await.unwrap();
        api.fail(FailPoint::StopProcess);

        channel.stop(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Inactive);
        assert!(channel.process_reference.is_none());
    }

    #[tokio::test]
    async fn test_preview_flow() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();

        channel.start_preview(Some(&api), 60).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Preview);
        assert!(channel.preview.enabled);

        // only one preview at a time
        assert!(channel.start_preview(Some(&api), 60).await.is_err());

        channel.preview_to_live().unwrap();
        assert_eq!(channel.status, ChannelStatus::Active);
        assert!(!channel.preview.enabled);
        assert!(channel.preview_to_live().is_err());
    }

    #[tokio::test]
    async fn test_cancel_preview() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        assert!(channel.cancel_preview(Some(&api)).await.is_err());

        channel.start_preview(Some(&api), 30).await.unwrap();
        channel.cancel_preview(Some(&api)).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Inactive);
        assert_eq!(channel.preview, PreviewState::default());
    }

    #[tokio::test]
    async fn test_failed_preview_reverts_fields() {
        let mut channel = channel();
        channel.start_preview(None, 30).await.unwrap_err();
        assert_eq!(channel.status, ChannelStatus::Error);
        assert_eq!(channel.preview, PreviewState::default());
    }

    #[tokio::test]
    async fn test_restart_creates_new_process() {
        let api = InMemoryRestreamer::new();
        let mut channel = channel();
        channel.start(Some(&api)).await.unwrap();
        channel.restart(Some(&api)).await.unwrap();

        assert_eq!(channel.status, ChannelStatus::Active);
        assert_eq!(api.calls_starting_with("create:").len(), 2);
        assert_eq!(api.process_state(&channel.id).as_deref(), Some("running"));
    }
}
