//! Matched scenes.

use schemars::JsonSchema;
use serde::Serialize;

use crate::{NarrationSegment, VisualCandidate, VisualKind};

/// A visual chosen for a scene.
pub type SceneVisual = VisualCandidate;

/// One narration segment paired with a visual whose duration covers it.
///
/// Scenes can only be built through [`Scene::new`], which refuses visuals
/// shorter than the narration. Stills cover exactly the narration because
/// their motion is synthesized at narration length.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Scene {
    narration: NarrationSegment,
    visual: SceneVisual,
    match_quality: f64,
    query: String,
}

impl Scene {
    /// Pair `narration` with `visual`, or `None` if the visual is too short.
    pub fn new(narration: NarrationSegment, visual: SceneVisual, query: impl Into<String>) -> Option<Self> {
        let match_quality = match visual.kind {
            VisualKind::Still => 0.0,
            VisualKind::Video => {
                let slack = visual.duration - narration.duration();
                if slack < 0.0 {
                    return None;
                }
                slack
            }
        };

        Some(Self {
            narration,
            visual,
            match_quality,
            query: query.into(),
        })
    }

    pub fn narration(&self) -> &NarrationSegment {
        &self.narration
    }

    pub fn visual(&self) -> &SceneVisual {
        &self.visual
    }

    /// Visual duration minus narration duration (always >= 0).
    pub fn match_quality(&self) -> f64 {
        self.match_quality
    }

    /// Search term that produced the visual.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Seconds of footage the scene contributes to the timeline.
    pub fn visual_duration(&self) -> f64 {
        match self.visual.kind {
            VisualKind::Still => self.narration.duration(),
            VisualKind::Video => self.visual.duration,
        }
    }

    pub fn needs_motion(&self) -> bool {
        self.visual.is_still()
    }
}
