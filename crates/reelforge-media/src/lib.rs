#![deny(unreachable_patterns)]
//! Media layer of the ReelForge narrated video assembler.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with progress parsing
//! - A fallible duration prober over FFprobe
//! - Media jobs (normalize, concat, mix, mux, motion encode) with retry and
//!   cleanup of partial outputs
//! - Per-job scratch directories
//! - Procedural motion for stills: Ken Burns and depth-layered parallax

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod job;
pub mod motion;
pub mod normalize;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod workdir;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{ScalePlan, DEFAULT_MUSIC_VOLUME};
pub use fs_utils::move_file;
pub use job::{MediaJob, MediaJobRunner};
pub use motion::{
    AdaptiveDepthParallax, ChainedDepthEstimator, CommandDepthEstimator, DepthEstimator,
    MotionRequest, MotionSettings, MotionStrategy, MotionSynthesizer, ParametricKenBurns,
    SidecarDepthMap, SynthesizedClip,
};
pub use normalize::{BatchOutcome, NormalizeRequest, NormalizedClip, Normalizer};
pub use probe::{probe_media, FfprobeProber, MediaInfo, Prober};
pub use progress::FfmpegProgress;
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use workdir::WorkDir;
