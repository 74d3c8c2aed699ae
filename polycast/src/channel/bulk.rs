//! Batch operations over explicit output positions.
//!
//! Every item is attempted; failures are collected per item instead of
//! aborting the batch.

use restreamer_api::RestreamerApi;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Channel, ChannelStatus, EncodingSettings};
use crate::{Error, Result};

/// Why one item of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure<K = usize> {
    pub item: K,
    pub reason: String,
}

/// Per-item outcome of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport<K = usize> {
    pub succeeded: Vec<K>,
    pub failed: Vec<BulkFailure<K>>,
}

impl<K> Default for BulkReport<K> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<K> BulkReport<K> {
    pub fn fail(&mut self, item: K, reason: impl ToString) {
        self.failed.push(BulkFailure {
            item,
            reason: reason.to_string(),
        });
    }

    pub fn record<T>(&mut self, item: K, result: Result<T>) {
        match result {
            Ok(_) => self.succeeded.push(item),
            Err(e) => self.fail(item, e),
        }
    }

    /// True iff no item failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn require_indices(indices: &[usize]) -> Result<()> {
    if indices.is_empty() {
        return Err(Error::validation("No outputs selected"));
    }
    Ok(())
}

impl Channel {
    fn reject_backup(&self, index: usize) -> Result<()> {
        if self.output(index)?.failover.is_backup {
            return Err(Error::validation(
                "Backup outputs are managed by failover",
            ));
        }
        Ok(())
    }

    async fn enable_one(
        &mut self,
        live: Option<&dyn RestreamerApi>,
        index: usize,
        enabled: bool,
    ) -> Result<()> {
        // already in the requested state counts as done, even for a backup
        if self.output(index)?.enabled == enabled {
            return Ok(());
        }
        self.reject_backup(index)?;
        match live {
            Some(api) => self.set_output_enabled_live(api, index, enabled).await,
            None => self.set_output_enabled(index, enabled),
        }
    }

    fn require_live_batch<'a>(
        &self,
        api: Option<&'a dyn RestreamerApi>,
    ) -> Result<&'a dyn RestreamerApi> {
        let api = api.ok_or(Error::NoApiConnection)?;
        if self.status != ChannelStatus::Active {
            return Err(Error::validation(format!(
                "Channel '{}' must be active",
                self.name
            )));
        }
        Ok(api)
    }

    /// Enable or disable outputs. Changes reach the running process when
    /// the channel is active and an API is available.
    pub async fn bulk_enable(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        indices: &[usize],
        enabled: bool,
    ) -> Result<BulkReport> {
        require_indices(indices)?;
        let live = api.filter(|_| self.status == ChannelStatus::Active);

        let mut report = BulkReport::default();
        for &index in indices {
            let result = self.enable_one(live, index, enabled).await;
            report.record(index, result);
        }

        info!(
            channel_id = %self.id,
            enabled,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk enable finished"
        );
        Ok(report)
    }

    /// Remove outputs, highest position first so earlier positions stay valid.
    ///
    /// On a live channel deleted outputs are detached and the survivors are
    /// moved to the remote ids of their new positions.
    pub async fn bulk_delete(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        indices: &[usize],
    ) -> Result<BulkReport> {
        require_indices(indices)?;
        let live = api.filter(|_| self.status.is_live());
        let attached = match live {
            Some(_) => self.attached_remote_ids(),
            None => Vec::new(),
        };

        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let mut report = BulkReport::default();
        for index in sorted {
            if let Some(api) = live {
                self.detach_for_removal(api, index).await;
            }
            let result = self.remove_output(index);
            report.record(index, result);
        }

        if let Some(api) = live {
            let stranded = self.rekey_live_outputs(api, &attached).await;
            if !stranded.is_empty() {
                warn!(channel_id = %self.id, ?stranded, "Some shifted outputs kept their old remote id");
            }
        }
        Ok(report)
    }

    /// Apply one encoding to several outputs, live when the channel is active.
    pub async fn bulk_update_encoding(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        indices: &[usize],
        encoding: EncodingSettings,
    ) -> Result<BulkReport> {
        require_indices(indices)?;
        let live = api.filter(|_| self.status == ChannelStatus::Active);

        let mut report = BulkReport::default();
        for &index in indices {
            let result = match live {
                Some(api) => self.update_encoding_live(api, index, encoding).await,
                None => self.update_output_encoding(index, encoding),
            };
            report.record(index, result);
        }
        Ok(report)
    }

    /// Attach outputs to the running process.
    pub async fn bulk_start(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        indices: &[usize],
    ) -> Result<BulkReport> {
        require_indices(indices)?;
        let api = self.require_live_batch(api)?;

        let mut report = BulkReport::default();
        for &index in indices {
            let result = self.enable_one(Some(api), index, true).await;
            report.record(index, result);
        }
        Ok(report)
    }

    /// Detach outputs from the running process.
    pub async fn bulk_stop(
        &mut self,
        api: Option<&dyn RestreamerApi>,
        indices: &[usize],
    ) -> Result<BulkReport> {
        require_indices(indices)?;
        let api = self.require_live_batch(api)?;

        let mut report = BulkReport::default();
        for &index in indices {
            let result = self.set_output_enabled_live(api, index, false).await;
            report.record(index, result);
        }
        Ok(report)
    }
}
