//! Job manifest: everything one render needs, as JSON.
//!
//! ```json
//! {
//!   "job_id": "job-42",
//!   "script_id": "long-form",
//!   "title": "The Deep Sea",
//!   "tags": ["ocean"],
//!   "topic": "ocean",
//!   "script_text": "The deep sea is dark. Light never reaches it.",
//!   "segments": [
//!     { "text": "The deep sea is dark.", "audio_path": "tts/s0.mp3" }
//!   ],
//!   "background_music": "music/calm.mp3",
//!   "asset_library": "library"
//! }
//! ```
//!
//! Relative paths resolve against the manifest's directory. When
//! `segments` is empty the script text is narrated by the configured
//! speech synthesizer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use reelforge_models::{JobContext, JobId, ScriptId};

use crate::collaborators::{ManifestNarration, NarrationInput};
use crate::error::{WorkerError, WorkerResult};

/// A render job described on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManifest {
    /// Generated when absent
    #[serde(default)]
    pub job_id: Option<String>,
    pub script_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub script_text: String,
    #[serde(default)]
    pub segments: Vec<NarrationInput>,
    #[serde(default)]
    pub background_music: Option<PathBuf>,
    pub asset_library: PathBuf,
}

impl JobManifest {
    /// Read, resolve and validate a manifest file.
    pub async fn load(path: &Path) -> WorkerResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            WorkerError::invalid_manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut manifest: Self = serde_json::from_slice(&bytes)
            .map_err(|e| WorkerError::invalid_manifest(format!("{}: {}", path.display(), e)))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.resolve_paths(base);
        manifest.validate()?;
        Ok(manifest)
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };

        self.asset_library = resolve(&self.asset_library);
        self.background_music = self.background_music.as_deref().map(resolve);
        for seg in &mut self.segments {
            seg.audio_path = resolve(&seg.audio_path);
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.script_id.trim().is_empty() {
            return Err(WorkerError::invalid_manifest("script_id is empty"));
        }
        if self.segments.is_empty() && self.script_text.trim().is_empty() {
            return Err(WorkerError::invalid_manifest(
                "manifest has neither segments nor script_text",
            ));
        }
        Ok(())
    }

    /// Whether narration still has to be synthesized from the script.
    pub fn needs_speech(&self) -> bool {
        self.segments.is_empty()
    }

    /// Job identity for output naming and the sidecar.
    pub fn context(&self) -> JobContext {
        let job_id = match &self.job_id {
            Some(id) if !id.trim().is_empty() => JobId::from_string(id.trim()),
            _ => JobId::new(),
        };

        // Script text defaults to the narrated sentences
        let script_text = if self.script_text.trim().is_empty() {
            self.segments
                .iter()
                .map(|s| s.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            self.script_text.clone()
        };

        let mut ctx = JobContext::new(job_id, ScriptId::from_string(self.script_id.trim()))
            .with_title(self.title.clone())
            .with_tags(self.tags.clone())
            .with_script_text(script_text);
        if let Some(topic) = self.topic.as_deref().filter(|t| !t.trim().is_empty()) {
            ctx = ctx.with_topic(topic.trim());
        }
        ctx
    }

    pub fn narration(&self) -> ManifestNarration {
        ManifestNarration::new(self.segments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "job_id": "job-42",
        "script_id": "long-form",
        "title": "The Deep Sea",
        "tags": ["ocean"],
        "topic": "ocean",
        "segments": [
            { "text": "The deep sea is dark.", "audio_path": "tts/s0.mp3" },
            { "text": "Light never reaches it.", "audio_path": "/abs/s1.mp3" }
        ],
        "background_music": "music/calm.mp3",
        "asset_library": "library"
    }"#;

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        tokio::fs::write(&path, MANIFEST).await.unwrap();

        let manifest = JobManifest::load(&path).await.unwrap();
        assert_eq!(manifest.asset_library, dir.path().join("library"));
        assert_eq!(manifest.segments[0].audio_path, dir.path().join("tts/s0.mp3"));
        assert_eq!(manifest.segments[1].audio_path, PathBuf::from("/abs/s1.mp3"));
        assert_eq!(manifest.background_music, Some(dir.path().join("music/calm.mp3")));
        assert!(!manifest.needs_speech());
    }

    #[test]
    fn test_context() {
        let manifest: JobManifest = serde_json::from_str(MANIFEST).unwrap();
        let ctx = manifest.context();
        assert_eq!(ctx.job_id.as_str(), "job-42");
        assert_eq!(ctx.script_id.as_str(), "long-form");
        assert_eq!(ctx.topic.as_deref(), Some("ocean"));
        assert_eq!(ctx.script_text, "The deep sea is dark. Light never reaches it.");
    }

    #[test]
    fn test_missing_job_id_is_generated() {
        let manifest: JobManifest = serde_json::from_str(
            r#"{ "script_id": "s", "script_text": "Hello.", "asset_library": "lib" }"#,
        )
        .unwrap();
        assert!(!manifest.context().job_id.as_str().is_empty());
        assert!(manifest.needs_speech());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_empty_manifest_is_invalid() {
        let manifest: JobManifest =
            serde_json::from_str(r#"{ "script_id": "s", "asset_library": "lib" }"#).unwrap();
        assert!(matches!(manifest.validate(), Err(WorkerError::InvalidManifest(_))));
    }

    #[tokio::test]
    async fn test_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(
            JobManifest::load(&path).await,
            Err(WorkerError::InvalidManifest(_))
        ));
    }
}
