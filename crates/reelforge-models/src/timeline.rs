//! Per-run timeline and the terminal composition result.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::narration::total_duration;
use crate::Scene;

/// Ordered scenes plus an optional music bed. Built per composition and
/// never persisted.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub scenes: Vec<Scene>,
    pub background_music: Option<PathBuf>,
}

impl Timeline {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            background_music: None,
        }
    }

    pub fn with_music(mut self, music: Option<PathBuf>) -> Self {
        self.background_music = music;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Total narration seconds over included scenes.
    pub fn narration_duration(&self) -> f64 {
        total_duration(self.scenes.iter().map(Scene::narration))
    }

    /// Total visual seconds over included scenes.
    pub fn visual_duration(&self) -> f64 {
        self.scenes.iter().map(Scene::visual_duration).sum()
    }

    /// Remove scenes by index, keeping order of the rest.
    pub fn retain_indices(&mut self, keep: &[bool]) {
        let mut idx = 0;
        self.scenes.retain(|_| {
            let k = keep.get(idx).copied().unwrap_or(true);
            idx += 1;
            k
        });
    }
}

/// Terminal outcome of one composition, written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionResult {
    pub output_path: Option<PathBuf>,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompositionResult {
    pub fn succeeded(output_path: PathBuf, duration_seconds: f64) -> Self {
        Self {
            output_path: Some(output_path),
            duration_seconds,
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            output_path: None,
            duration_seconds: 0.0,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NarrationSegment, VisualCandidate};

    fn scene(narr: f64, vis: f64) -> Scene {
        Scene::new(
            NarrationSegment::new("t", "n.mp3", narr),
            VisualCandidate::video("v.mp4", vis, 1920, 1080, 30.0),
            "q",
        )
        .unwrap()
    }

    #[test]
    fn test_durations() {
        let timeline = Timeline::new(vec![scene(2.1, 2.5), scene(3.4, 5.0), scene(1.8, 2.0)]);
        assert!((timeline.narration_duration() - 7.3).abs() < 1e-9);
        assert!((timeline.visual_duration() - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_retain_indices() {
        let mut timeline = Timeline::new(vec![scene(1.0, 1.0), scene(2.0, 2.0), scene(3.0, 3.0)]);
        timeline.retain_indices(&[true, false, true]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.scenes[1].narration().duration(), 3.0);
    }

    #[test]
    fn test_failed_result_has_no_path() {
        let result = CompositionResult::failed("boom");
        assert!(!result.success);
        assert!(result.output_path.is_none());
    }
}
