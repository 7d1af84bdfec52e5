//! Depth map sources for parallax.
//!
//! Depth maps are grayscale images where brighter means nearer, the
//! convention of common monocular depth models.

use async_trait::async_trait;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::workdir::WorkDir;

/// Produces a depth map for a still.
#[async_trait]
pub trait DepthEstimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Depth map for `image`; fails with `MotionSynthesisFailure` when no
    /// depth is available.
    async fn estimate(&self, image: &Path, workdir: &WorkDir) -> MediaResult<GrayImage>;
}

async fn load_luma(path: PathBuf) -> MediaResult<GrayImage> {
    tokio::task::spawn_blocking(move || {
        image::open(&path)
            .map(|img| img.to_luma8())
            .map_err(|e| MediaError::motion_failed(format!("cannot decode depth map {}: {}", path.display(), e)))
    })
    .await
    .map_err(|e| MediaError::internal(format!("depth loader panicked: {}", e)))?
}

/// Reads a precomputed `<stem>.depth.png` stored next to the still.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarDepthMap;

impl SidecarDepthMap {
    /// Where the depth map for `image` is expected.
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        image.with_file_name(format!("{}.depth.png", stem))
    }
}

#[async_trait]
impl DepthEstimator for SidecarDepthMap {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    async fn estimate(&self, image: &Path, _workdir: &WorkDir) -> MediaResult<GrayImage> {
        let path = Self::sidecar_path(image);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(MediaError::motion_failed(format!(
                "no depth map at {}",
                path.display()
            )));
        }
        load_luma(path).await
    }
}

/// Runs an external estimator as `<program> [args...] <image> <output.png>`.
#[derive(Debug, Clone)]
pub struct CommandDepthEstimator {
    program: String,
    args: Vec<String>,
}

impl CommandDepthEstimator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl DepthEstimator for CommandDepthEstimator {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn estimate(&self, image: &Path, workdir: &WorkDir) -> MediaResult<GrayImage> {
        let output = workdir.unique_path("depth", "png");
        debug!(program = %self.program, image = %image.display(), "Running depth estimator");

        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::motion_failed(format!("cannot run {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::motion_failed(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        load_luma(output).await
    }
}

/// Tries estimators in order and returns the first depth map produced.
#[derive(Clone, Default)]
pub struct ChainedDepthEstimator {
    estimators: Vec<Arc<dyn DepthEstimator>>,
}

impl ChainedDepthEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, estimator: Arc<dyn DepthEstimator>) -> Self {
        self.estimators.push(estimator);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }
}

#[async_trait]
impl DepthEstimator for ChainedDepthEstimator {
    fn name(&self) -> &'static str {
        "chained"
    }

    async fn estimate(&self, image: &Path, workdir: &WorkDir) -> MediaResult<GrayImage> {
        let mut last_error = None;
        for estimator in &self.estimators {
            match estimator.estimate(image, workdir).await {
                Ok(map) => return Ok(map),
                Err(e) => {
                    debug!(estimator = estimator.name(), error = %e, "Depth estimator unavailable");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| MediaError::motion_failed("no depth estimator configured")))
    }
}
