//! Health checks and auto-reconnect.
//!
//! Reconnects never sleep: tearing down the stale remote output schedules a
//! re-add deadline that [`Channel::complete_due_reconnects`] picks up on a
//! later scheduler tick.

use chrono::{DateTime, Duration, Utc};
use restreamer_api::RestreamerApi;
use tracing::{debug, info, warn};

use super::bulk::BulkReport;
use super::remote::resolve_process_id;
use crate::domain::{Channel, ChannelStatus};
use crate::{Error, Result};

/// What a reconnect attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The output was re-added right away.
    Reconnected,
    /// The output was torn down; it is re-added once the deadline passes.
    Scheduled(DateTime<Utc>),
}

/// Result of one health sweep over a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    /// False when the channel was not eligible for checking.
    pub checked: bool,
    /// Positions of enabled outputs found unhealthy.
    pub unhealthy: Vec<usize>,
    pub reconnects: Vec<(usize, ReconnectOutcome)>,
    /// Outputs disabled because they ran out of reconnect attempts.
    pub exhausted: Vec<usize>,
    pub failover_triggered: bool,
}

impl HealthReport {
    fn skipped() -> Self {
        Self::default()
    }

    /// True iff every enabled output was healthy.
    pub fn all_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }
}

impl Channel {
    /// Poll the control plane and update every enabled output's health.
    ///
    /// Outputs past the failure threshold are reconnected, and failover is
    /// evaluated when anything was unhealthy.
    pub async fn check_health(
        &mut self,
        api: &dyn RestreamerApi,
        now: DateTime<Utc>,
    ) -> Result<HealthReport> {
        if self.status != ChannelStatus::Active || !self.health.enabled {
            return Ok(HealthReport::skipped());
        }
        let Some(reference) = self.process_reference.clone() else {
            return Err(Error::Other(format!(
                "Channel '{}' is active without a process reference",
                self.name
            )));
        };

        // stamped up front so a failing control plane is not re-polled every tick
        self.last_health_check_at = Some(now);

        let process_id = resolve_process_id(api, &reference).await?;
        let process = api.get_process(&process_id).await?;
        let live_outputs = match api.list_process_outputs(&process_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(channel_id = %self.id, error = %e, "Failed to list live outputs");
                Vec::new()
            }
        };
        let running = process.is_running();

        let mut report = HealthReport {
            checked: true,
            ..Default::default()
        };

        for index in 0..self.outputs.len() {
            let output = &mut self.outputs[index];
            if !output.enabled {
                continue;
            }
            output.health.last_check = Some(now);

            if output.health.reconnect_due.is_some() {
                // torn down on purpose, waiting for its re-add
                report.unhealthy.push(index);
                continue;
            }

            let remote_id = output.remote_id(index);
            if running && live_outputs.contains(&remote_id) {
                output.mark_healthy();
                continue;
            }

            output.mark_unhealthy();
            report.unhealthy.push(index);
            warn!(
                channel_id = %self.id,
                output = %remote_id,
                failures = output.health.consecutive_failures,
                process_state = %process.state,
                "Output is unhealthy"
            );

            if output.health.auto_reconnect_enabled
                && output.health.consecutive_failures >= self.health.failure_threshold
            {
                match self.reconnect_output(api, index, now).await {
                    Ok(outcome) => report.reconnects.push((index, outcome)),
                    Err(Error::ReconnectExhausted { .. }) => report.exhausted.push(index),
                    Err(e) => {
                        warn!(channel_id = %self.id, output = %remote_id, error = %e, "Reconnect failed");
                        self.last_error = Some(e.to_string());
                    }
                }
            }
        }

        if !report.all_healthy() {
            report.failover_triggered = self.check_failover(Some(api)).await?;
        }

        debug!(
            channel_id = %self.id,
            unhealthy = report.unhealthy.len(),
            "Health check complete"
        );
        Ok(report)
    }

    /// Tear down and re-add one output.
    ///
    /// With a zero reconnect delay the output is re-added immediately;
    /// otherwise a deadline is recorded and the re-add happens in
    /// [`Channel::complete_due_reconnects`].
    pub async fn reconnect_output(
        &mut self,
        api: &dyn RestreamerApi,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<ReconnectOutcome> {
        if self.status != ChannelStatus::Active {
            return Err(Error::validation(format!(
                "Channel '{}' is not active",
                self.name
            )));
        }
        let reference = self
            .process_reference
            .clone()
            .ok_or_else(|| Error::Other(format!("No process reference for '{}'", self.name)))?;

        let max_attempts = self.policy.max_reconnect_attempts;
        let output = self.output_mut(index)?;
        let failures = output.health.consecutive_failures;
        if max_attempts > 0 && failures >= max_attempts {
            output.enabled = false;
            output.health.reconnect_due = None;
            warn!(
                output = %output.service_name,
                attempts = failures,
                "Max reconnect attempts reached, disabling output"
            );
            return Err(Error::ReconnectExhausted {
                output: output.service_name.clone(),
                attempts: failures,
            });
        }

        let remote_id = output.remote_id(index);
        let process_id = resolve_process_id(api, &reference).await?;
        if let Err(e) = api.remove_process_output(&process_id, &remote_id).await {
            debug!(output = %remote_id, error = %e, "Stale output removal failed");
        }

        let delay = self.policy.reconnect_delay_sec;
        if delay > 0 {
            let at = now + Duration::seconds(i64::from(delay));
            self.outputs[index].health.reconnect_due = Some(at);
            info!(
                channel_id = %self.id,
                output = %remote_id,
                due = %at,
                "Reconnect scheduled"
            );
            return Ok(ReconnectOutcome::Scheduled(at));
        }

        self.readd_output(api, index).await?;
        Ok(ReconnectOutcome::Reconnected)
    }

    /// Re-add every output whose reconnect deadline has passed.
    pub async fn complete_due_reconnects(
        &mut self,
        api: &dyn RestreamerApi,
        now: DateTime<Utc>,
    ) -> BulkReport {
        let mut report = BulkReport::default();

        if self.status != ChannelStatus::Active {
            for output in &mut self.outputs {
                output.health.reconnect_due = None;
            }
            return report;
        }

        for index in 0..self.outputs.len() {
            let output = &mut self.outputs[index];
            match output.health.reconnect_due {
                Some(due) if due <= now => output.health.reconnect_due = None,
                _ => continue,
            }
            if !output.enabled {
                // disabled meanwhile, e.g. by failover
                continue;
            }

            match self.readd_output(api, index).await {
                Ok(()) => report.succeeded.push(index),
                Err(e) => {
                    warn!(channel_id = %self.id, index, error = %e, "Deferred reconnect failed");
                    self.last_error = Some(e.to_string());
                    report.fail(index, e);
                }
            }
        }
        report
    }

    async fn readd_output(&mut self, api: &dyn RestreamerApi, index: usize) -> Result<()> {
        self.add_output_live(api, index).await?;
        let output = &mut self.outputs[index];
        output.mark_healthy();
        info!(
            channel_id = %self.id,
            output = %output.remote_id(index),
            "Output reconnected"
        );
        Ok(())
    }
}
