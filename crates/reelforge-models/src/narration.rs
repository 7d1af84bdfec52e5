//! Narration segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One sentence (or utterance) of narration with its synthesized audio.
///
/// The duration is derived from the audio file and fixed once probed, so the
/// field is private and only exposed through [`NarrationSegment::duration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationSegment {
    /// Narrated text
    pub text: String,

    /// Path to the audio clip
    pub audio_path: PathBuf,

    /// Audio duration in seconds
    duration: f64,
}

impl NarrationSegment {
    /// Build a segment from a probed audio duration.
    pub fn new(text: impl Into<String>, audio_path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            text: text.into(),
            audio_path: audio_path.into(),
            duration: duration.max(0.0),
        }
    }

    /// Audio duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }
}

/// Sum of narration durations.
pub fn total_duration<'a, I>(segments: I) -> f64
where
    I: IntoIterator<Item = &'a NarrationSegment>,
{
    segments.into_iter().map(NarrationSegment::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_duration_is_clamped() {
        let seg = NarrationSegment::new("hi", "/tmp/a.mp3", -1.0);
        assert_eq!(seg.duration(), 0.0);
    }

    #[test]
    fn test_total_duration() {
        let segs = vec![
            NarrationSegment::new("a", "a.mp3", 2.1),
            NarrationSegment::new("b", "b.mp3", 3.4),
            NarrationSegment::new("c", "c.mp3", 1.8),
        ];
        assert!((total_duration(&segs) - 7.3).abs() < 1e-9);
    }
}
