//! Error types for media operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
///
/// The composition-facing variants map onto how a failure is absorbed:
/// unreadable media skips an asset, an unfit candidate pool drops a scene,
/// a normalization failure excludes an asset, a motion failure falls back
/// (parallax) or drops the scene (Ken Burns), and a compose failure is fatal
/// for the job.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Unreadable media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("No candidate fits {needed:.2}s for query '{query}'")]
    NoCandidateFits { query: String, needed: f64 },

    #[error("Normalization failed for {path}: {reason}")]
    NormalizationFailure { path: PathBuf, reason: String },

    #[error("Motion synthesis failed: {0}")]
    MotionSynthesisFailure(String),

    #[error("Composition failed: {0}")]
    ComposeFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an unreadable-media error.
    pub fn unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a no-fit error for a segment.
    pub fn no_candidate_fits(query: impl Into<String>, needed: f64) -> Self {
        Self::NoCandidateFits {
            query: query.into(),
            needed,
        }
    }

    /// Create a normalization failure error.
    pub fn normalization_failed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::NormalizationFailure {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a motion synthesis failure error.
    pub fn motion_failed(message: impl Into<String>) -> Self {
        Self::MotionSynthesisFailure(message.into())
    }

    /// Create a composition failure error.
    pub fn compose_failed(message: impl Into<String>) -> Self {
        Self::ComposeFailure(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Failures that only affect one asset or scene and are absorbed by the
    /// compositor.
    pub fn is_scene_local(&self) -> bool {
        matches!(
            self,
            MediaError::UnreadableMedia { .. }
                | MediaError::NoCandidateFits { .. }
                | MediaError::NormalizationFailure { .. }
                | MediaError::MotionSynthesisFailure(_)
        )
    }

    /// Failures worth repeating the same media job for.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. } | MediaError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MediaError::unreadable("a.mp4", "too small").is_scene_local());
        assert!(MediaError::no_candidate_fits("ocean", 2.0).is_scene_local());
        assert!(!MediaError::compose_failed("no scenes").is_scene_local());

        assert!(MediaError::ffmpeg_failed("exit 1", None, Some(1)).is_retryable());
        assert!(!MediaError::FfmpegNotFound.is_retryable());
    }

    #[test]
    fn test_display_includes_path() {
        let err = MediaError::unreadable("/tmp/x.mp4", "duration 0.20s below floor");
        assert!(err.to_string().contains("/tmp/x.mp4"));
    }
}
