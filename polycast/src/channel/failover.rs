//! Primary/backup failover.

use chrono::Utc;
use restreamer_api::RestreamerApi;
use tracing::{error, info, warn};

use crate::domain::{Channel, ChannelStatus};
use crate::{Error, Result};

impl Channel {
    fn require_backup(&self, primary: usize) -> Result<usize> {
        let output = self.output(primary)?;
        self.backup_index(primary).ok_or_else(|| {
            Error::validation(format!(
                "Output {} has no backup configured",
                output.service_name
            ))
        })
    }

    /// Switch traffic from `primary` to its backup.
    ///
    /// While active the backup is attached before the primary is detached.
    /// A failure to attach the backup is returned with the primary left
    /// untouched; a failure to detach the primary is only logged.
    /// On an inactive channel only the bookkeeping changes.
    pub async fn trigger_failover(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        primary: usize,
    ) -> Result<()> {
        let backup = self.require_backup(primary)?;
        if self.outputs[primary].failover.active {
            return Ok(());
        }

        info!(
            channel_id = %self.id,
            primary = %self.outputs[primary].service_name,
            backup = %self.outputs[backup].service_name,
            "Triggering failover"
        );

        if self.status == ChannelStatus::Active {
            let api = api.ok_or(Error::NoApiConnection)?;

            if let Err(e) = self.add_output_live(api, backup).await {
                error!(channel_id = %self.id, error = %e, "Failed to attach backup output");
                return Err(e);
            }
            self.outputs[backup].enabled = true;
            self.outputs[backup].mark_healthy();

            if self.outputs[primary].enabled {
                if let Err(e) = self.remove_output_live(api, primary).await {
                    warn!(channel_id = %self.id, error = %e, "Failed to detach primary during failover");
                }
                self.outputs[primary].enabled = false;
            }
        }

        let started = Utc::now();
        for index in [primary, backup] {
            let f = &mut self.outputs[index].failover;
            f.active = true;
            f.started_at = Some(started);
        }
        Ok(())
    }

    /// Hand traffic back from the backup to `primary`.
    pub async fn restore_primary(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        primary: usize,
    ) -> Result<()> {
        let backup = self.require_backup(primary)?;
        if !self.outputs[primary].failover.active {
            return Ok(());
        }

        if self.status == ChannelStatus::Active {
            let api = api.ok_or(Error::NoApiConnection)?;

            self.add_output_live(api, primary).await?;
            self.outputs[primary].enabled = true;

            if let Err(e) = self.remove_output_live(api, backup).await {
                warn!(channel_id = %self.id, error = %e, "Failed to detach backup during restore");
            }
            self.outputs[backup].enabled = false;
        }

        let duration = self.outputs[primary]
            .failover
            .started_at
            .map(|at| (Utc::now() - at).num_seconds())
            .unwrap_or_default();
        for index in [primary, backup] {
            let f = &mut self.outputs[index].failover;
            f.active = false;
            f.started_at = None;
        }
        self.outputs[primary].health.consecutive_failures = 0;

        info!(
            channel_id = %self.id,
            primary = %self.outputs[primary].service_name,
            failover_secs = duration,
            "Primary restored"
        );
        Ok(())
    }

    /// Fail over unhealthy primaries and restore recovered ones.
    ///
    /// Returns true iff a new failover was triggered.
    pub async fn check_failover(&mut self, api: Option<&dyn RestreamerApi>) -> Result<bool> {
        if self.status != ChannelStatus::Active {
            return Ok(false);
        }

        let threshold = self.health.failure_threshold.max(1);
        let mut triggered = false;

        for index in 0..self.outputs.len() {
            let output = &self.outputs[index];
            if !output.is_primary_with_backup() {
                continue;
            }

            if !output.failover.active
                && !output.stats.connected
                && output.health.consecutive_failures >= threshold
            {
                warn!(
                    channel_id = %self.id,
                    output = %output.service_name,
                    failures = output.health.consecutive_failures,
                    "Primary output failing, switching to backup"
                );
                match self.trigger_failover(api, index).await {
                    Ok(()) => triggered = true,
                    Err(e) => warn!(channel_id = %self.id, error = %e, "Failover failed"),
                }
            } else if output.failover.active
                && output.stats.connected
                && output.health.consecutive_failures == 0
            {
                if let Err(e) = self.restore_primary(api, index).await {
                    warn!(channel_id = %self.id, error = %e, "Restoring primary failed");
                }
            }
        }
        Ok(triggered)
    }
}
