//! Worker error types.

use thiserror::Error;

use reelforge_models::StatusTransitionError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Narration failed: {0}")]
    NarrationFailed(String),

    #[error("Asset source failed: {0}")]
    AssetSourceFailed(String),

    #[error("Job store failed: {0}")]
    JobStoreFailed(String),

    #[error("Status error: {0}")]
    Status(#[from] StatusTransitionError),

    #[error("Media error: {0}")]
    Media(#[from] reelforge_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }

    pub fn narration_failed(msg: impl Into<String>) -> Self {
        Self::NarrationFailed(msg.into())
    }

    pub fn asset_source_failed(msg: impl Into<String>) -> Self {
        Self::AssetSourceFailed(msg.into())
    }

    pub fn job_store_failed(msg: impl Into<String>) -> Self {
        Self::JobStoreFailed(msg.into())
    }

    /// Check if error is retryable.
    ///
    /// Composition itself never retries; this only tells a caller whether
    /// re-triggering the job could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::AssetSourceFailed(_)
            | WorkerError::JobStoreFailed(_)
            | WorkerError::Io(_) => true,
            WorkerError::Media(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_media::MediaError;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::asset_source_failed("library offline").is_retryable());
        assert!(!WorkerError::invalid_manifest("no segments").is_retryable());
        assert!(WorkerError::from(MediaError::ffmpeg_failed("exit 1", None, Some(1))).is_retryable());
        assert!(!WorkerError::from(MediaError::FfmpegNotFound).is_retryable());
    }
}
