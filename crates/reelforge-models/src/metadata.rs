//! Sidecar metadata stored next to each final artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{JobContext, JobStatus, Scene};

/// Query/asset/duration mapping of a composed scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub index: usize,
    pub text: String,
    pub query: String,
    pub asset: PathBuf,
    pub kind: String,
    pub narration_seconds: f64,
    pub visual_seconds: f64,
}

impl SceneRecord {
    pub fn from_scene(index: usize, scene: &Scene) -> Self {
        Self {
            index,
            text: scene.narration().text.clone(),
            query: scene.query().to_string(),
            asset: scene.visual().path.clone(),
            kind: scene.visual().kind.as_str().to_string(),
            narration_seconds: scene.narration().duration(),
            visual_seconds: scene.visual_duration(),
        }
    }
}

/// Descriptive metadata written as `{script_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub job_id: String,
    pub script_id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub script_text: String,
    pub scenes: Vec<SceneRecord>,
    pub duration_seconds: f64,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoMetadata {
    pub fn new(ctx: &JobContext, scenes: &[Scene], status: JobStatus, duration_seconds: f64) -> Self {
        Self {
            job_id: ctx.job_id.to_string(),
            script_id: ctx.script_id.to_string(),
            title: ctx.title.clone(),
            tags: ctx.tags.clone(),
            script_text: ctx.script_text.clone(),
            scenes: scenes
                .iter()
                .enumerate()
                .map(|(i, s)| SceneRecord::from_scene(i, s))
                .collect(),
            duration_seconds,
            status,
            video_file: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_video_file(mut self, name: impl Into<String>) -> Self {
        self.video_file = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NarrationSegment, VisualCandidate};

    #[test]
    fn test_metadata_from_scenes() {
        let ctx = JobContext::new("job".into(), "s1".into()).with_title("Title");
        let scene = Scene::new(
            NarrationSegment::new("Hello there.", "n.mp3", 2.0),
            VisualCandidate::video("/lib/ocean.mp4", 4.0, 1280, 720, 25.0),
            "ocean",
        )
        .unwrap();

        let meta = VideoMetadata::new(&ctx, &[scene], JobStatus::Done, 2.0).with_video_file("s1.mp4");
        assert_eq!(meta.scenes.len(), 1);
        assert_eq!(meta.scenes[0].query, "ocean");
        assert_eq!(meta.scenes[0].kind, "video");

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["video_file"], "s1.mp4");
    }
}
