//! Visual candidates returned by the asset source and validated by probing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of visual material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    /// Time-based footage
    #[default]
    Video,
    /// Single frame; only usable through motion synthesis
    Still,
}

impl VisualKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualKind::Video => "video",
            VisualKind::Still => "still",
        }
    }
}

impl std::fmt::Display for VisualKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A probed visual asset that may be paired with a narration segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisualCandidate {
    /// Local file path
    pub path: PathBuf,
    /// Duration in seconds (0 for stills)
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Frames per second (0 when unknown)
    pub frame_rate: f64,
    pub kind: VisualKind,
}

impl VisualCandidate {
    /// Create a video candidate.
    pub fn video(path: impl Into<PathBuf>, duration: f64, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            path: path.into(),
            duration,
            width,
            height,
            frame_rate,
            kind: VisualKind::Video,
        }
    }

    /// Create a still-image candidate.
    pub fn still(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            duration: 0.0,
            width,
            height,
            frame_rate: 0.0,
            kind: VisualKind::Still,
        }
    }

    pub fn is_still(&self) -> bool {
        self.kind == VisualKind::Still
    }

    /// Whether this candidate can cover `narration` seconds on its own.
    pub fn covers(&self, narration: f64) -> bool {
        self.kind == VisualKind::Video && self.duration >= narration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers() {
        let clip = VisualCandidate::video("a.mp4", 2.5, 1920, 1080, 30.0);
        assert!(clip.covers(2.1));
        assert!(clip.covers(2.5));
        assert!(!clip.covers(2.6));
    }

    #[test]
    fn test_still_never_covers_directly() {
        let img = VisualCandidate::still("a.jpg", 800, 600);
        assert!(img.is_still());
        assert!(!img.covers(0.1));
    }
}
