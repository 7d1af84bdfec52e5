//! Boundaries to the systems around the compositor.
//!
//! Narration, asset search and job persistence live outside this crate.
//! Each is an async trait here, with a local implementation that is enough
//! to drive a render from a manifest and a directory of cached media.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use reelforge_models::{CompositionResult, JobId, JobStatus, JobStatusRecord};

use crate::error::{WorkerError, WorkerResult};
use crate::query::tokenize;

/// One narration clip as handed over by the speech side, before probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationInput {
    pub text: String,
    pub audio_path: PathBuf,
}

/// Ordered narration clips for a script.
#[async_trait]
pub trait NarrationSource: Send + Sync {
    async fn segments(&self) -> WorkerResult<Vec<NarrationInput>>;
}

/// Candidate visuals for a search term. Returned paths carry no guarantee;
/// they are validated by probing.
#[async_trait]
pub trait VisualAssetSource: Send + Sync {
    async fn fetch(&self, query: &str, count: usize) -> WorkerResult<Vec<PathBuf>>;
}

/// Status persistence for render jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> WorkerResult<()>;

    /// Attach the artifact path or failure reason of a finished render.
    async fn record_result(&self, _job_id: &JobId, _result: &CompositionResult) -> WorkerResult<()> {
        Ok(())
    }
}

/// Narration listed up front, e.g. in a job manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestNarration {
    segments: Vec<NarrationInput>,
}

impl ManifestNarration {
    pub fn new(segments: Vec<NarrationInput>) -> Self {
        Self { segments }
    }
}

#[async_trait]
impl NarrationSource for ManifestNarration {
    async fn segments(&self) -> WorkerResult<Vec<NarrationInput>> {
        Ok(self.segments.clone())
    }
}

/// Extensions the library considers visual media.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "mkv", "webm", "m4v", "avi", "png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff",
];

/// A directory of cached media searched by keyword.
///
/// A file matches when any query word appears among the words of its stem
/// (`ocean_waves-4k.mp4` matches "ocean"). Files with more matching words
/// rank first; ties are broken by file name so results are stable.
#[derive(Debug, Clone)]
pub struct LocalAssetLibrary {
    root: PathBuf,
}

impl LocalAssetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_media(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Number of query words present in the file stem.
    fn score(path: &Path, words: &[String]) -> usize {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem_words = tokenize(&stem);
        words.iter().filter(|w| stem_words.contains(w)).count()
    }
}

#[async_trait]
impl VisualAssetSource for LocalAssetLibrary {
    async fn fetch(&self, query: &str, count: usize) -> WorkerResult<Vec<PathBuf>> {
        let words = tokenize(query);
        if words.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            WorkerError::asset_source_failed(format!("{}: {}", self.root.display(), e))
        })?;

        let mut scored = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || !Self::is_media(&path) {
                continue;
            }
            let score = Self::score(&path, &words);
            if score > 0 {
                scored.push((score, path));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        let found: Vec<PathBuf> = scored.into_iter().take(count).map(|(_, p)| p).collect();

        debug!(query, found = found.len(), root = %self.root.display(), "Library search");
        Ok(found)
    }
}

/// Job store kept in memory; enforces the status state machine.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobStatusRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, job_id: &JobId) -> Option<JobStatusRecord> {
        self.records.read().await.get(job_id.as_str()).cloned()
    }

    pub async fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.get(job_id).await.map(|r| r.status)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn set_status(&self, job_id: &JobId, status: JobStatus) -> WorkerResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .entry(job_id.to_string())
            .or_insert_with(|| JobStatusRecord::new(job_id.as_str()));
        record.transition(status)?;
        debug!(job_id = %job_id, status = %status, "Job status updated");
        Ok(())
    }

    async fn record_result(&self, job_id: &JobId, result: &CompositionResult) -> WorkerResult<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(job_id.as_str()).ok_or_else(|| {
            WorkerError::job_store_failed(format!("unknown job {}", job_id))
        })?;
        record.output_path = result.output_path.clone();
        record.error_message = result.error.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(dir: &Path, name: &str) {
        tokio::fs::write(dir.join(name), b"x").await.unwrap();
    }

    #[tokio::test]
    async fn test_library_matches_stem_words() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ocean_waves.mp4").await;
        touch(dir.path(), "ocean-sunset-waves.mov").await;
        touch(dir.path(), "city_night.mp4").await;
        touch(dir.path(), "ocean_notes.txt").await;

        let library = LocalAssetLibrary::new(dir.path());
        let found = library.fetch("ocean waves", 5).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["ocean-sunset-waves.mov", "ocean_waves.mp4"]);
    }

    #[tokio::test]
    async fn test_library_respects_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            touch(dir.path(), &format!("forest_{}.mp4", i)).await;
        }
        let library = LocalAssetLibrary::new(dir.path());
        assert_eq!(library.fetch("forest", 2).await.unwrap().len(), 2);
        assert!(library.fetch("desert", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_library_is_source_failure() {
        let library = LocalAssetLibrary::new("/nonexistent/library");
        let err = library.fetch("ocean", 5).await.unwrap_err();
        assert!(matches!(err, WorkerError::AssetSourceFailed(_)));
    }

    #[tokio::test]
    async fn test_job_store_state_machine() {
        let store = InMemoryJobStore::new();
        let job = JobId::from_string("job-1");

        store.set_status(&job, JobStatus::Rendering).await.unwrap();
        store.set_status(&job, JobStatus::Done).await.unwrap();
        store
            .record_result(&job, &CompositionResult::succeeded("out/s1.mp4".into(), 7.3))
            .await
            .unwrap();
        let record = store.get(&job).await.unwrap();
        assert_eq!(record.status, JobStatus::Done);
        assert_eq!(record.output_path, Some(PathBuf::from("out/s1.mp4")));

        let err = store.set_status(&job, JobStatus::Pending).await.unwrap_err();
        assert!(matches!(err, WorkerError::Status(_)));

        // A finished job may be re-triggered
        store.set_status(&job, JobStatus::Rendering).await.unwrap();
    }
}
