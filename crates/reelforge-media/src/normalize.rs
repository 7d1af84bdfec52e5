//! Asset normalizer.
//!
//! Rewrites heterogeneous source clips (any resolution, frame rate, aspect
//! ratio or codec) to the canonical target by scaling to cover, center
//! cropping and re-encoding video only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use reelforge_models::{CanonicalTarget, EncodingConfig};

use crate::error::{MediaError, MediaResult};
use crate::filters::ScalePlan;
use crate::job::{MediaJob, MediaJobRunner};
use crate::probe::Prober;
use crate::workdir::WorkDir;

/// A clip rewritten to the canonical target, owned by one composition run.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedClip {
    /// Original asset
    pub source: PathBuf,
    /// Canonical clip inside the run's work dir
    pub path: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// One normalization request of a batch.
#[derive(Debug, Clone)]
pub struct NormalizeRequest {
    pub source: PathBuf,
    /// Keep only the first `trim` seconds
    pub trim: Option<f64>,
}

/// Result of a batch: successes in request order plus per-asset failures.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub clips: Vec<(usize, NormalizedClip)>,
    pub failures: Vec<(usize, MediaError)>,
}

/// Normalizes clips to one canonical target.
#[derive(Clone)]
pub struct Normalizer {
    prober: Arc<dyn Prober>,
    jobs: MediaJobRunner,
    target: CanonicalTarget,
    encoding: EncodingConfig,
}

impl Normalizer {
    pub fn new(
        prober: Arc<dyn Prober>,
        jobs: MediaJobRunner,
        target: CanonicalTarget,
        encoding: EncodingConfig,
    ) -> Self {
        Self {
            prober,
            jobs,
            target,
            encoding,
        }
    }

    pub fn target(&self) -> &CanonicalTarget {
        &self.target
    }

    /// Normalize `source` into `output`.
    pub async fn normalize(
        &self,
        source: &Path,
        output: &Path,
        trim: Option<f64>,
    ) -> MediaResult<NormalizedClip> {
        let info = self.prober.probe(source).await?;
        if !info.has_video {
            return Err(MediaError::normalization_failed(source, "no video stream"));
        }
        if info.is_still {
            return Err(MediaError::normalization_failed(
                source,
                "still image needs motion synthesis",
            ));
        }

        // Trimming past the end is a no-op
        let trim = trim.filter(|secs| *secs > 0.0 && *secs < info.duration);

        let job = MediaJob::Normalize {
            input: source.to_path_buf(),
            output: output.to_path_buf(),
            target: self.target.clone(),
            plan: ScalePlan::cover(info.width, info.height, &self.target),
            trim,
            encoding: self.encoding.clone(),
        };

        self.jobs.run(&job).await.map_err(|e| match e {
            MediaError::FfmpegNotFound => e,
            other => MediaError::normalization_failed(source, other.to_string()),
        })?;

        let out = self
            .prober
            .probe(output)
            .await
            .map_err(|e| MediaError::normalization_failed(source, e.to_string()))?;

        if out.width != self.target.width || out.height != self.target.height {
            return Err(MediaError::normalization_failed(
                source,
                format!(
                    "produced {}x{}, expected {}",
                    out.width,
                    out.height,
                    self.target.size_arg()
                ),
            ));
        }
        if (out.fps - self.target.fps as f64).abs() > 0.1 {
            return Err(MediaError::normalization_failed(
                source,
                format!("produced {:.2} fps, expected {}", out.fps, self.target.fps),
            ));
        }

        debug!(
            source = %source.display(),
            from = %format!("{}x{}@{:.2}", info.width, info.height, info.fps),
            duration = out.duration,
            "Normalized clip"
        );

        Ok(NormalizedClip {
            source: source.to_path_buf(),
            path: output.to_path_buf(),
            duration: out.duration,
            width: out.width,
            height: out.height,
            fps: out.fps,
        })
    }

    /// Normalize a batch into `workdir`; one failing asset never stops the rest.
    pub async fn normalize_batch(&self, requests: &[NormalizeRequest], workdir: &WorkDir) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (idx, req) in requests.iter().enumerate() {
            let output = workdir.unique_path("norm", "mp4");
            match self.normalize(&req.source, &output, req.trim).await {
                Ok(clip) => outcome.clips.push((idx, clip)),
                Err(e) => {
                    warn!(source = %req.source.display(), error = %e, "Excluding asset");
                    outcome.failures.push((idx, e));
                }
            }
        }

        info!(
            normalized = outcome.clips.len(),
            failed = outcome.failures.len(),
            "Normalization batch complete"
        );
        outcome
    }
}
