//! Streaming services and frame orientation.

use serde::{Deserialize, Serialize};

/// Known ingest services. Persisted as its integer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum StreamingService {
    #[default]
    Custom,
    Twitch,
    YouTube,
    Facebook,
    Kick,
    TikTok,
    Instagram,
    XTwitter,
}

impl StreamingService {
    pub const ALL: [StreamingService; 8] = [
        Self::Custom,
        Self::Twitch,
        Self::YouTube,
        Self::Facebook,
        Self::Kick,
        Self::TikTok,
        Self::Instagram,
        Self::XTwitter,
    ];

    /// Display name, also used as the prefix of remote output ids.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::Twitch => "Twitch",
            Self::YouTube => "YouTube",
            Self::Facebook => "Facebook",
            Self::Kick => "Kick",
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::XTwitter => "X (Twitter)",
        }
    }

    /// Ingest URL for the given output orientation. Empty for [`Self::Custom`].
    pub fn rtmp_url(&self, orientation: StreamOrientation) -> &'static str {
        match self {
            Self::Custom => "",
            Self::Twitch => "rtmp://live.twitch.tv/app",
            Self::YouTube => "rtmp://a.rtmp.youtube.com/live2",
            Self::Facebook => "rtmps://live-api-s.facebook.com:443/rtmp",
            Self::Kick => "rtmp://stream.kick.com/app",
            Self::TikTok => match orientation {
                StreamOrientation::Vertical => "rtmp://live.tiktok.com/live",
                _ => "rtmp://live.tiktok.com/live/horizontal",
            },
            Self::Instagram => "rtmps://live-upload.instagram.com:443/rtmp",
            Self::XTwitter => "rtmp://ingest.pscp.tv:80/x",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom)
    }
}

/// Out-of-range values, negative ones included, fall back to [`Self::Custom`].
impl From<i64> for StreamingService {
    fn from(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or_default()
    }
}

impl From<StreamingService> for u8 {
    fn from(value: StreamingService) -> Self {
        value as u8
    }
}

impl std::fmt::Display for StreamingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame orientation of a source or an output. Persisted as its integer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum StreamOrientation {
    #[default]
    Auto,
    Horizontal,
    Vertical,
    Square,
}

impl StreamOrientation {
    /// Aspect ratios within this distance of 1.0 count as square.
    const SQUARE_TOLERANCE: f64 = 0.05;

    /// Classify a frame size. Unknown (zero) dimensions give [`Self::Auto`].
    pub fn detect(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::Auto;
        }
        let aspect = f64::from(width) / f64::from(height);
        if (aspect - 1.0).abs() < Self::SQUARE_TOLERANCE {
            Self::Square
        } else if aspect < 1.0 {
            Self::Vertical
        } else {
            Self::Horizontal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Square => "square",
        }
    }
}

impl From<i64> for StreamOrientation {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Horizontal,
            2 => Self::Vertical,
            3 => Self::Square,
            _ => Self::Auto,
        }
    }
}

impl From<StreamOrientation> for u8 {
    fn from(value: StreamOrientation) -> Self {
        value as u8
    }
}

impl std::fmt::Display for StreamOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ffmpeg filter converting `source` framing into `target` framing.
///
/// `None` when no conversion is needed or either side is [`StreamOrientation::Auto`].
pub fn video_filter(source: StreamOrientation, target: StreamOrientation) -> Option<&'static str> {
    use StreamOrientation::*;

    match (source, target) {
        (from, to) if from == to => None,
        (Auto, _) | (_, Auto) => None,
        (Horizontal, Vertical) => Some("crop=ih*9/16:ih,scale=1080:1920"),
        (Vertical, Horizontal) => Some("crop=iw:iw*9/16,scale=1920:1080"),
        (Square, Horizontal) => Some("scale=1920:1080,setsar=1"),
        (Square, Vertical) => Some("scale=1080:1920,setsar=1"),
        (_, Square) => Some("scale=1080:1080,setsar=1"),
        _ => None,
    }
}
