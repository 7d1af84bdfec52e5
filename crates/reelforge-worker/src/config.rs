//! Composer configuration.

use std::path::PathBuf;
use std::sync::Arc;

use reelforge_media::{
    ChainedDepthEstimator, CommandDepthEstimator, DepthEstimator, MotionSettings, SidecarDepthMap,
    DEFAULT_MUSIC_VOLUME,
};
use reelforge_models::{CanonicalTarget, EncodingConfig};
use reelforge_models::encoding::{DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_PIXEL_FORMAT, DEFAULT_WIDTH};

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// Root of the persistent output area
    pub output_dir: PathBuf,
    /// Canonical output width
    pub width: u32,
    /// Canonical output height
    pub height: u32,
    /// Canonical frame rate
    pub fps: u32,
    /// Canonical pixel format
    pub pixel_format: String,
    /// Candidates requested per search term
    pub candidate_pool: usize,
    /// Music bed volume relative to narration at 1.0
    pub music_volume: f64,
    /// Outputs shorter than this are failed renders
    pub min_output_secs: f64,
    /// Trim chosen footage to the narration length
    pub trim_to_narration: bool,
    /// Try depth parallax before Ken Burns
    pub parallax: bool,
    /// External depth estimator, run as `<cmd> <image> <out.png>`
    pub depth_command: Option<String>,
    /// External speech synthesizer, run as `<cmd> <out>` with text on stdin
    pub tts_command: Option<String>,
    /// Concurrent narration clips while producing speech
    pub narration_parallel: usize,
    /// Extra attempts per FFmpeg job
    pub media_retries: u32,
    /// Fixed motion seed; random when unset
    pub motion_seed: Option<u64>,
    /// Video/audio encoding settings
    pub encoding: EncodingConfig,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelforge"),
            output_dir: PathBuf::from("output"),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            candidate_pool: 5,
            music_volume: DEFAULT_MUSIC_VOLUME,
            min_output_secs: 1.0,
            trim_to_narration: true,
            parallax: true,
            depth_command: None,
            tts_command: None,
            narration_parallel: 4,
            media_retries: 0,
            motion_seed: None,
            encoding: EncodingConfig::default(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ComposerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unset or unparsable keys keep
    /// their defaults.
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| var(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            work_dir: non_empty("REELFORGE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: non_empty("REELFORGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            width: non_empty("REELFORGE_WIDTH")
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|w| *w > 0)
                .unwrap_or(defaults.width),
            height: non_empty("REELFORGE_HEIGHT")
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|h| *h > 0)
                .unwrap_or(defaults.height),
            fps: non_empty("REELFORGE_FPS")
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|f| *f > 0)
                .unwrap_or(defaults.fps),
            pixel_format: non_empty("REELFORGE_PIX_FMT").unwrap_or(defaults.pixel_format),
            candidate_pool: non_empty("REELFORGE_CANDIDATE_POOL")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.candidate_pool),
            music_volume: non_empty("REELFORGE_MUSIC_VOLUME")
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.music_volume),
            min_output_secs: non_empty("REELFORGE_MIN_OUTPUT_SECS")
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.min_output_secs),
            trim_to_narration: non_empty("REELFORGE_TRIM_TO_NARRATION")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.trim_to_narration),
            parallax: non_empty("REELFORGE_PARALLAX")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.parallax),
            depth_command: non_empty("REELFORGE_DEPTH_COMMAND"),
            tts_command: non_empty("REELFORGE_TTS_COMMAND"),
            narration_parallel: non_empty("REELFORGE_NARRATION_PARALLEL")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.narration_parallel),
            media_retries: non_empty("REELFORGE_MEDIA_RETRIES")
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.media_retries),
            motion_seed: non_empty("REELFORGE_MOTION_SEED").and_then(|s| s.parse::<u64>().ok()),
            encoding: defaults.encoding,
        }
    }

    /// Canonical target all clips are normalized to.
    pub fn target(&self) -> CanonicalTarget {
        CanonicalTarget {
            pixel_format: self.pixel_format.clone(),
            ..CanonicalTarget::new(self.width, self.height, self.fps)
        }
    }

    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            target: self.target(),
            encoding: self.encoding.clone(),
            seed: self.motion_seed,
        }
    }

    /// Depth sources for parallax, or `None` when parallax is disabled.
    ///
    /// The external command, when configured, is tried before sidecar maps.
    pub fn depth_estimator(&self) -> Option<Arc<dyn DepthEstimator>> {
        if !self.parallax {
            return None;
        }
        let mut chain = ChainedDepthEstimator::new();
        if let Some(est) = self
            .depth_command
            .as_deref()
            .and_then(CommandDepthEstimator::from_command_line)
        {
            chain = chain.with(Arc::new(est));
        }
        chain = chain.with(Arc::new(SidecarDepthMap));
        Some(Arc::new(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ComposerConfig::from_lookup(|_| None);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/reelforge"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!((config.width, config.height, config.fps), (1920, 1080, 30));
        assert_eq!(config.pixel_format, "yuv420p");
        assert_eq!(config.candidate_pool, 5);
        assert!((config.music_volume - 0.15).abs() < 1e-9);
        assert!((config.min_output_secs - 1.0).abs() < 1e-9);
        assert!(config.trim_to_narration);
        assert!(config.parallax);
        assert_eq!(config.narration_parallel, 4);
        assert_eq!(config.media_retries, 0);
        assert!(config.motion_seed.is_none());
        assert!(config.depth_command.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ComposerConfig::from_lookup(lookup(&[
            ("REELFORGE_WIDTH", "1280"),
            ("REELFORGE_HEIGHT", "720"),
            ("REELFORGE_FPS", "25"),
            ("REELFORGE_TRIM_TO_NARRATION", "false"),
            ("REELFORGE_PARALLAX", "0"),
            ("REELFORGE_MOTION_SEED", "42"),
            ("REELFORGE_MUSIC_VOLUME", "0.3"),
        ]));
        let target = config.target();
        assert_eq!(target.size_arg(), "1280x720");
        assert_eq!(target.fps, 25);
        assert!(!config.trim_to_narration);
        assert!(config.depth_estimator().is_none());
        assert_eq!(config.motion_settings().seed, Some(42));
        assert!((config.music_volume - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ComposerConfig::from_lookup(lookup(&[
            ("REELFORGE_FPS", "0"),
            ("REELFORGE_CANDIDATE_POOL", "many"),
            ("REELFORGE_MUSIC_VOLUME", "-1"),
            ("REELFORGE_DEPTH_COMMAND", "   "),
        ]));
        assert_eq!(config.fps, 30);
        assert_eq!(config.candidate_pool, 5);
        assert!((config.music_volume - 0.15).abs() < 1e-9);
        assert!(config.depth_command.is_none());
    }
}
