//! Canonical output target and encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// Canonical timeline resolution (1080p, 16:9)
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Canonical timeline frame rate
pub const DEFAULT_FPS: u32 = 30;
/// Canonical pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// The fixed resolution, frame rate and pixel format every clip is
/// normalized to before concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalTarget {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pixel_format: String,
}

impl Default for CanonicalTarget {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

impl CanonicalTarget {
    /// Create a target with the default pixel format.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }

    /// Parse a resolution string like `1080p` (16:9) or `1280x720`.
    pub fn from_resolution(resolution: &str, fps: u32) -> Option<Self> {
        let resolution = resolution.trim().to_ascii_lowercase();
        if let Some(height) = resolution.strip_suffix('p') {
            let height: u32 = height.parse().ok()?;
            // 16:9, rounded down to an even width
            let width = (height * 16 / 9) & !1;
            return Some(Self::new(width, height, fps));
        }
        let (w, h) = resolution.split_once('x')?;
        Some(Self::new(w.parse().ok()?, h.parse().ok()?, fps))
    }

    /// Width / height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Duration of a single frame in seconds.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }

    /// `WxH` as used by FFmpeg size options.
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Video-only encoder arguments.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ];
        args.extend(self.extra_args.clone());
        args
    }

    /// Audio-only encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Convert to FFmpeg command arguments (video then audio).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, DEFAULT_CRF);
    }

    #[test]
    fn test_ffmpeg_args() {
        let config = EncodingConfig::default().with_crf(23);
        let args = config.to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_resolution_parsing() {
        let target = CanonicalTarget::from_resolution("1080p", 30).unwrap();
        assert_eq!((target.width, target.height), (1920, 1080));

        let target = CanonicalTarget::from_resolution("720p", 24).unwrap();
        assert_eq!((target.width, target.height, target.fps), (1280, 720, 24));

        let target = CanonicalTarget::from_resolution("1080x1920", 30).unwrap();
        assert_eq!((target.width, target.height), (1080, 1920));

        assert!(CanonicalTarget::from_resolution("huge", 30).is_none());
    }

    #[test]
    fn test_frame_duration() {
        let target = CanonicalTarget::new(640, 360, 25);
        assert!((target.frame_duration() - 0.04).abs() < 1e-9);
        assert_eq!(target.size_arg(), "640x360");
    }
}
