//! In-memory control plane.
//!
//! Keeps processes in a local table and records every call. Used by tests and
//! by offline runs where no Restreamer is reachable.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::RestreamerApi;
use crate::error::{ApiError, Result};
use crate::types::{EncodingParams, ProcessDetail, ProcessOutputSpec, ProcessSpec, ProcessSummary};

/// Calls that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateProcess,
    StopProcess,
    ListProcesses,
    GetProcess,
    ListOutputs,
    AddOutput,
    RemoveOutput,
    UpdateEncoding,
}

#[derive(Debug, Clone)]
struct MemoryProcess {
    id: String,
    reference: String,
    state: String,
    outputs: Vec<ProcessOutputSpec>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    processes: Vec<MemoryProcess>,
    failures: HashSet<FailPoint>,
    calls: Vec<String>,
    encodings: HashMap<String, EncodingParams>,
    last_error: Option<String>,
}

impl Inner {
    fn check(&mut self, point: FailPoint) -> Result<()> {
        if self.failures.contains(&point) {
            let err = ApiError::other(format!("injected failure: {:?}", point));
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn process_mut(&mut self, process_id: &str) -> Result<&mut MemoryProcess> {
        match self.processes.iter_mut().find(|p| p.id == process_id) {
            Some(p) => Ok(p),
            None => {
                let err = ApiError::ProcessNotFound(process_id.to_string());
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRestreamer {
    inner: Mutex<Inner>,
}

impl InMemoryRestreamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `point` fail until cleared.
    pub fn fail(&self, point: FailPoint) {
        self.inner.lock().failures.insert(point);
    }

    pub fn clear_failure(&self, point: FailPoint) {
        self.inner.lock().failures.remove(&point);
    }

    /// Every call made so far, formatted as `op:args`.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Override the execution state of the newest process registered under `reference`.
    pub fn set_state(&self, reference: &str, state: &str) {
        let mut inner = self.inner.lock();
        if let Some(p) = inner.processes.iter_mut().rev().find(|p| p.reference == reference) {
            p.state = state.to_string();
        }
    }

    /// Detach an output without going through the API, simulating a dropped egress.
    pub fn drop_output(&self, reference: &str, output_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(p) = inner.processes.iter_mut().rev().find(|p| p.reference == reference) {
            p.outputs.retain(|o| o.id != output_id);
        }
    }

    pub fn process_state(&self, reference: &str) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .processes
            .iter()
            .rev()
            .find(|p| p.reference == reference)
            .map(|p| p.state.clone())
    }

    /// Outputs attached to the newest process registered under `reference`.
    pub fn outputs(&self, reference: &str) -> Vec<ProcessOutputSpec> {
        let inner = self.inner.lock();
        inner
            .processes
            .iter()
            .rev()
            .find(|p| p.reference == reference)
            .map(|p| p.outputs.clone())
            .unwrap_or_default()
    }

    /// Number of processes registered under `reference`.
    pub fn process_count(&self, reference: &str) -> usize {
        let inner = self.inner.lock();
        inner.processes.iter().filter(|p| p.reference == reference).count()
    }

    pub fn encoding(&self, output_id: &str) -> Option<EncodingParams> {
        self.inner.lock().encodings.get(output_id).cloned()
    }
}

#[async_trait]
impl RestreamerApi for InMemoryRestreamer {
    async fn create_process(&self, spec: &ProcessSpec) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("create:{}", spec.reference));
        inner.check(FailPoint::CreateProcess)?;

        inner.next_id += 1;
        let id = format!("proc-{}", inner.next_id);
        // like the real server, an existing process with the same reference is kept
        inner.processes.push(MemoryProcess {
            id,
            reference: spec.reference.clone(),
            state: "running".to_string(),
            outputs: spec.outputs.clone(),
        });
        Ok(spec.reference.clone())
    }

    async fn stop_process(&self, process_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("stop:{}", process_id));
        inner.check(FailPoint::StopProcess)?;
        inner.process_mut(process_id)?.state = "finished".to_string();
        Ok(())
    }

    async fn delete_process(&self, process_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("delete:{}", process_id));
        inner.process_mut(process_id)?;
        inner.processes.retain(|p| p.id != process_id);
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ProcessSummary>> {
        let mut inner = self.inner.lock();
        inner.check(FailPoint::ListProcesses)?;
        Ok(inner
            .processes
            .iter()
            .map(|p| ProcessSummary {
                id: p.id.clone(),
                reference: Some(p.reference.clone()),
                state: Some(p.state.clone()),
            })
            .collect())
    }

    async fn get_process(&self, process_id: &str) -> Result<ProcessDetail> {
        let mut inner = self.inner.lock();
        inner.check(FailPoint::GetProcess)?;
        let p = inner.process_mut(process_id)?;
        Ok(ProcessDetail {
            id: p.id.clone(),
            reference: Some(p.reference.clone()),
            state: p.state.clone(),
            ..Default::default()
        })
    }

    async fn list_process_outputs(&self, process_id: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        inner.check(FailPoint::ListOutputs)?;
        let p = inner.process_mut(process_id)?;
        Ok(p.outputs.iter().map(|o| o.id.clone()).collect())
    }

    async fn add_process_output(
        &self,
        process_id: &str,
        output: &ProcessOutputSpec,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("add_output:{}", output.id));
        inner.check(FailPoint::AddOutput)?;
        let p = inner.process_mut(process_id)?;
        p.outputs.retain(|o| o.id != output.id);
        p.outputs.push(output.clone());
        Ok(())
    }

    async fn remove_process_output(&self, process_id: &str, output_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("remove_output:{}", output_id));
        inner.check(FailPoint::RemoveOutput)?;
        let p = inner.process_mut(process_id)?;
        p.outputs.retain(|o| o.id != output_id);
        Ok(())
    }

    async fn update_output_encoding(
        &self,
        process_id: &str,
        output_id: &str,
        params: &EncodingParams,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("encoding:{}", output_id));
        inner.check(FailPoint::UpdateEncoding)?;
        inner.process_mut(process_id)?;
        inner.encodings.insert(output_id.to_string(), params.clone());
        Ok(())
    }

    fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(reference: &str) -> ProcessSpec {
        ProcessSpec {
            reference: reference.to_string(),
            input_url: "rtmp://localhost/live/obs_input".to_string(),
            outputs: vec![ProcessOutputSpec {
                id: "Twitch_0".to_string(),
                url: "rtmp://live.twitch.tv/app/key".to_string(),
                video_filter: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_keeps_same_reference_processes() {
        let api = InMemoryRestreamer::new();
        api.create_process(&spec("a")).await.unwrap();
        api.create_process(&spec("a")).await.unwrap();
        assert_eq!(api.process_count("a"), 2);
        assert_eq!(
            api.find_process_id("a").await.unwrap().as_deref(),
            Some("proc-1")
        );

        assert_eq!(api.delete_processes_by_reference("a").await.unwrap(), 2);
        assert_eq!(api.process_count("a"), 0);
        assert_eq!(api.delete_processes_by_reference("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_sets_last_error() {
        let api = InMemoryRestreamer::new();
        api.fail(FailPoint::CreateProcess);
        assert!(api.create_process(&spec("a")).await.is_err());
        assert!(api.last_error().unwrap().contains("CreateProcess"));

        api.clear_failure(FailPoint::CreateProcess);
        assert!(api.create_process(&spec("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_by_reference() {
        let api = InMemoryRestreamer::new();
        api.create_process(&spec("a")).await.unwrap();
        api.stop_process_by_reference("a").await.unwrap();
        assert_eq!(api.process_state("a").as_deref(), Some("finished"));

        let err = api.stop_process_by_reference("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::ProcessNotFound(_)));
    }
}
