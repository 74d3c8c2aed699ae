//! Output templates.

use serde::{Deserialize, Serialize};

use super::encoding::EncodingSettings;
use super::service::{StreamOrientation, StreamingService};

/// A named encoding preset used to stamp out outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTemplate {
    pub id: String,
    pub name: String,
    pub service: StreamingService,
    pub orientation: StreamOrientation,
    pub encoding: EncodingSettings,
    pub is_builtin: bool,
}

impl OutputTemplate {
    /// Create a user-defined template.
    pub fn custom(
        name: impl Into<String>,
        service: StreamingService,
        orientation: StreamOrientation,
        encoding: EncodingSettings,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            service,
            orientation,
            encoding,
            is_builtin: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn builtin(
        id: &str,
        name: &str,
        service: StreamingService,
        orientation: StreamOrientation,
        bitrate: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            service,
            orientation,
            encoding: EncodingSettings::video(bitrate, width, height, BUILTIN_AUDIO_BITRATE),
            is_builtin: true,
        }
    }
}

const BUILTIN_AUDIO_BITRATE: u32 = 128;

/// Presets shipped with every manager.
pub fn builtin_templates() -> Vec<OutputTemplate> {
    use StreamOrientation::{Horizontal, Vertical};
    use StreamingService::{Facebook, TikTok, Twitch, YouTube};

    vec![
        OutputTemplate::builtin(
            "builtin_youtube_1080p60",
            "YouTube 1080p60",
            YouTube,
            Horizontal,
            6000,
            1920,
            1080,
        ),
        OutputTemplate::builtin(
            "builtin_youtube_720p60",
            "YouTube 720p60",
            YouTube,
            Horizontal,
            4500,
            1280,
            720,
        ),
        OutputTemplate::builtin(
            "builtin_twitch_1080p60",
            "Twitch 1080p60",
            Twitch,
            Horizontal,
            6000,
            1920,
            1080,
        ),
        OutputTemplate::builtin(
            "builtin_twitch_720p60",
            "Twitch 720p60",
            Twitch,
            Horizontal,
            4500,
            1280,
            720,
        ),
        OutputTemplate::builtin(
            "builtin_facebook_1080p",
            "Facebook 1080p",
            Facebook,
            Horizontal,
            4000,
            1920,
            1080,
        ),
        OutputTemplate::builtin(
            "builtin_tiktok_vertical",
            "TikTok Vertical",
            TikTok,
            Vertical,
            3000,
            1080,
            1920,
        ),
    ]
}
