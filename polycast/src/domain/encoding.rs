//! Per-output encode parameters.

use restreamer_api::{EncodingParams, FrameRate, Resolution};
use serde::{Deserialize, Serialize};

/// Target video/audio encode parameters for one output.
///
/// A zero field means "inherit from the source". Values are always replaced
/// as a whole, never patched field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingSettings {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Video bitrate in kbps.
    #[serde(default)]
    pub bitrate: u32,
    #[serde(default)]
    pub fps_num: u32,
    #[serde(default)]
    pub fps_den: u32,
    /// Audio bitrate in kbps.
    #[serde(default)]
    pub audio_bitrate: u32,
    #[serde(default)]
    pub audio_track: u32,
    /// Bandwidth ceiling in kbps.
    #[serde(default)]
    pub max_bandwidth: u32,
    #[serde(default)]
    pub low_latency: bool,
}

impl EncodingSettings {
    /// Video settings with the given bitrate and resolution, audio at `audio_bitrate`.
    pub fn video(bitrate: u32, width: u32, height: u32, audio_bitrate: u32) -> Self {
        Self {
            width,
            height,
            bitrate,
            audio_bitrate,
            ..Default::default()
        }
    }

    /// Whether every field inherits from the source.
    pub fn is_inherit(&self) -> bool {
        *self == Self::default()
    }

    /// Translate into the control-plane parameter shape (kbps to bps).
    pub fn to_params(&self) -> EncodingParams {
        EncodingParams {
            video_bitrate: (self.bitrate > 0).then(|| u64::from(self.bitrate) * 1000),
            audio_bitrate: (self.audio_bitrate > 0).then(|| u64::from(self.audio_bitrate) * 1000),
            resolution: (self.width > 0 && self.height > 0).then_some(Resolution {
                width: self.width,
                height: self.height,
            }),
            fps: (self.fps_num > 0 && self.fps_den > 0).then_some(FrameRate {
                num: self.fps_num,
                den: self.fps_den,
            }),
            preset: None,
            profile: None,
        }
    }
}
