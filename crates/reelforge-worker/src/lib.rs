//! Narrated video assembly worker.
//!
//! This crate provides:
//! - Configuration, logging and metrics for the render worker
//! - Collaborator traits for narration, asset search and job status
//! - Narration production with bounded, order-preserving synthesis
//! - The scene matcher and the timeline compositor
//! - A job pipeline writing the final artifact and its sidecar

pub mod collaborators;
pub mod compositor;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod matcher;
pub mod metrics;
pub mod narration;
pub mod pipeline;
pub mod query;
pub mod sidecar;

pub use collaborators::{
    InMemoryJobStore, JobStore, LocalAssetLibrary, ManifestNarration, NarrationInput,
    NarrationSource, VisualAssetSource,
};
pub use compositor::{Composition, CompositorSettings, TimelineCompositor};
pub use config::ComposerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use manifest::JobManifest;
pub use matcher::{MatchReport, SceneMatcher};
pub use narration::{split_sentences, CommandSpeechSynthesizer, NarrationProducer, SpeechSynthesizer};
pub use pipeline::{JobOutcome, RenderPipeline};
pub use query::SceneQuery;
