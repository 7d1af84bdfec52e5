//! Shared data models for the ReelForge narrated video assembler.
//!
//! This crate provides Serde-serializable types for:
//! - Job identity and composition status
//! - Narration segments, visual candidates and matched scenes
//! - The per-run timeline and its terminal composition result
//! - Canonical output target and encoding configuration
//! - Sidecar metadata written next to every final artifact

pub mod encoding;
pub mod job;
pub mod job_status;
pub mod metadata;
pub mod narration;
pub mod scene;
pub mod timeline;
pub mod visual;

// Re-export common types
pub use encoding::{CanonicalTarget, EncodingConfig};
pub use job::{JobContext, JobId, ScriptId};
pub use job_status::{JobStatus, JobStatusRecord, StatusTransitionError};
pub use metadata::{SceneRecord, VideoMetadata};
pub use narration::{total_duration, NarrationSegment};
pub use scene::{Scene, SceneVisual};
pub use timeline::{CompositionResult, Timeline};
pub use visual::{VisualCandidate, VisualKind};
