//! The control-plane capability consumed by the orchestration core.

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::types::{EncodingParams, ProcessDetail, ProcessOutputSpec, ProcessSpec, ProcessSummary};

/// Remote multiplexing-process control plane.
///
/// Every call may fail; implementations remember the most recent failure text
/// for [`RestreamerApi::last_error`].
#[async_trait]
pub trait RestreamerApi: Send + Sync {
    /// Create and start a process. Returns the reference it was registered under.
    async fn create_process(&self, spec: &ProcessSpec) -> Result<String>;

    async fn stop_process(&self, process_id: &str) -> Result<()>;

    async fn delete_process(&self, process_id: &str) -> Result<()>;

    async fn list_processes(&self) -> Result<Vec<ProcessSummary>>;

    async fn get_process(&self, process_id: &str) -> Result<ProcessDetail>;

    /// Ids of the outputs currently attached to a running process.
    async fn list_process_outputs(&self, process_id: &str) -> Result<Vec<String>>;

    async fn add_process_output(
        &self,
        process_id: &str,
        output: &ProcessOutputSpec,
    ) -> Result<()>;

    async fn remove_process_output(&self, process_id: &str, output_id: &str) -> Result<()>;

    async fn update_output_encoding(
        &self,
        process_id: &str,
        output_id: &str,
        params: &EncodingParams,
    ) -> Result<()>;

    fn last_error(&self) -> Option<String>;

    /// Resolve a process id from the reference it was created with.
    async fn find_process_id(&self, reference: &str) -> Result<Option<String>> {
        let processes = self.list_processes().await?;
        Ok(processes
            .into_iter()
            .find(|p| p.reference.as_deref() == Some(reference))
            .map(|p| p.id))
    }

    /// Stop the process registered under `reference`.
    async fn stop_process_by_reference(&self, reference: &str) -> Result<()> {
        match self.find_process_id(reference).await? {
            Some(id) => self.stop_process(&id).await,
            None => Err(ApiError::ProcessNotFound(reference.to_string())),
        }
    }

    /// Delete every process registered under `reference`.
    ///
    /// Returns how many were removed.
    async fn delete_processes_by_reference(&self, reference: &str) -> Result<usize> {
        let stale: Vec<String> = self
            .list_processes()
            .await?
            .into_iter()
            .filter(|p| p.reference.as_deref() == Some(reference))
            .map(|p| p.id)
            .collect();
        for id in &stale {
            self.delete_process(id).await?;
        }
        Ok(stale.len())
    }
}
