//! Wire types exchanged with the Restreamer control plane.

use serde::{Deserialize, Serialize};

/// Process entry as returned by `GET /api/v3/process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub id: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Process detail as returned by `GET /api/v3/process/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub id: String,
    #[serde(default)]
    pub reference: Option<String>,
    /// Execution state, `"running"` when the process is healthy.
    #[serde(default)]
    pub state: String,
    #[serde(default, rename = "uptime")]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default, rename = "memory")]
    pub memory_bytes: u64,
    #[serde(default)]
    pub command: Option<String>,
}

impl ProcessDetail {
    pub const STATE_RUNNING: &'static str = "running";

    pub fn is_running(&self) -> bool {
        self.state == Self::STATE_RUNNING
    }
}

/// A single named egress on a remote process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutputSpec {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_filter: Option<String>,
}

/// Everything needed to create a multiplexing process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Caller-chosen correlation handle, stored on the remote process.
    pub reference: String,
    pub input_url: String,
    pub outputs: Vec<ProcessOutputSpec>,
}

impl ProcessSpec {
    /// Build the ffmpeg tee command line the Restreamer runs for this process.
    ///
    /// Contains stream keys; never log the result.
    pub fn to_command(&self) -> String {
        let targets = self
            .outputs
            .iter()
            .map(|o| format!("[f=flv]{}", o.url))
            .collect::<Vec<_>>()
            .join("|");
        format!(
            "-re -i {} -c:v copy -c:a copy -f tee -map 0:v -map 0:a \"{}\"",
            self.input_url, targets
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

/// Live encode parameters for `PUT .../outputs/{id}/encoding`.
///
/// Bitrates are in bits per second on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<FrameRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl EncodingParams {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutputList {
    #[serde(default)]
    pub outputs: Vec<OutputEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutputEntry {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}
