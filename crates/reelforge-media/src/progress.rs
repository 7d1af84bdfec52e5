//! FFmpeg progress reporting.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output position in seconds.
    pub fn out_seconds(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }

    /// Progress percentage given the expected output length in seconds.
    pub fn percentage(&self, expected_secs: f64) -> Option<f64> {
        if expected_secs <= 0.0 {
            return None;
        }
        Some((self.out_seconds() / expected_secs * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10.0).unwrap() - 50.0).abs() < 0.01);
        assert!((progress.percentage(2.0).unwrap() - 100.0).abs() < 0.01);
        assert!(progress.percentage(0.0).is_none());
    }
}
