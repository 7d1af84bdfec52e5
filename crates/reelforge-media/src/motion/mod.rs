//! Procedural motion synthesis for still images.
//!
//! A still becomes a clip of exactly the narration length through one of
//! the registered [`MotionStrategy`] implementations. Strategies are tried
//! in priority order; Ken Burns always comes last and never needs more
//! than the image itself.

pub mod depth;
pub mod frames;
pub mod ken_burns;
pub mod parallax;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use reelforge_models::{CanonicalTarget, EncodingConfig};

use crate::error::{MediaError, MediaResult};
use crate::job::{MediaJob, MediaJobRunner};
use crate::workdir::WorkDir;

pub use depth::{ChainedDepthEstimator, CommandDepthEstimator, DepthEstimator, SidecarDepthMap};
pub use ken_burns::{KenBurnsParams, ParametricKenBurns};
pub use parallax::AdaptiveDepthParallax;

/// One still to animate.
#[derive(Debug, Clone)]
pub struct MotionRequest {
    /// Source still
    pub image: PathBuf,
    /// Narration to mux with the motion; `None` renders video only
    pub audio: Option<PathBuf>,
    /// Clip length in seconds
    pub duration: f64,
    /// Destination clip
    pub output: PathBuf,
    /// Distinguishes requests within a run (scene index)
    pub salt: u64,
}

/// A way of turning a still into motion.
#[async_trait]
pub trait MotionStrategy: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Render `request.output`, returning its path.
    async fn synthesize(
        &self,
        request: &MotionRequest,
        workdir: &WorkDir,
        jobs: &MediaJobRunner,
    ) -> MediaResult<PathBuf>;
}

/// Encode a rendered sequence in `frames_dir` and drop the frames.
pub(crate) async fn encode_frames(
    jobs: &MediaJobRunner,
    frames_dir: &Path,
    request: &MotionRequest,
    target: &CanonicalTarget,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    let job = MediaJob::SynthesizeMotion {
        frame_pattern: frames_dir.join(frames::FRAME_PATTERN),
        fps: target.fps,
        duration: request.duration,
        audio: request.audio.clone(),
        output: request.output.clone(),
        pixel_format: target.pixel_format.clone(),
        encoding: encoding.clone(),
    };
    let result = jobs.run(&job).await;

    if let Err(e) = tokio::fs::remove_dir_all(frames_dir).await {
        warn!(dir = %frames_dir.display(), error = %e, "Failed to remove frame directory");
    }
    result
}

/// Settings shared by the built-in strategies.
#[derive(Debug, Clone, Default)]
pub struct MotionSettings {
    pub target: CanonicalTarget,
    pub encoding: EncodingConfig,
    /// Fixed seed for reproducible moves
    pub seed: Option<u64>,
}

/// Output of a successful synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub path: PathBuf,
    pub strategy: &'static str,
}

/// Runs strategies in order until one succeeds.
#[derive(Clone)]
pub struct MotionSynthesizer {
    strategies: Vec<Arc<dyn MotionStrategy>>,
    jobs: MediaJobRunner,
}

impl MotionSynthesizer {
    /// Ken Burns only.
    pub fn ken_burns(settings: &MotionSettings, jobs: MediaJobRunner) -> Self {
        Self {
            strategies: vec![Arc::new(
                ParametricKenBurns::new(settings.target.clone(), settings.encoding.clone())
                    .with_seed(settings.seed),
            )],
            jobs,
        }
    }

    /// Parallax from `depth` first, Ken Burns as the fallback.
    pub fn with_parallax(settings: &MotionSettings, depth: Arc<dyn DepthEstimator>, jobs: MediaJobRunner) -> Self {
        let parallax: Arc<dyn MotionStrategy> = Arc::new(AdaptiveDepthParallax::new(
            depth,
            settings.target.clone(),
            settings.encoding.clone(),
        ));
        let mut synth = Self::ken_burns(settings, jobs);
        synth.strategies.insert(0, parallax);
        synth
    }

    /// Build from explicit strategies (highest priority first).
    pub fn from_strategies(strategies: Vec<Arc<dyn MotionStrategy>>, jobs: MediaJobRunner) -> Self {
        Self { strategies, jobs }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Animate one still, falling back through the strategies.
    pub async fn synthesize(&self, request: &MotionRequest, workdir: &WorkDir) -> MediaResult<SynthesizedClip> {
        let mut last_error = None;

        for strategy in &self.strategies {
            match strategy.synthesize(request, workdir, &self.jobs).await {
                Ok(path) => {
                    info!(
                        strategy = strategy.name(),
                        image = %request.image.display(),
                        duration = request.duration,
                        "Synthesized motion"
                    );
                    return Ok(SynthesizedClip {
                        path,
                        strategy: strategy.name(),
                    });
                }
                Err(MediaError::FfmpegNotFound) => return Err(MediaError::FfmpegNotFound),
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        image = %request.image.display(),
                        error = %e,
                        "Motion strategy failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(MediaError::motion_failed(match last_error {
            Some(e) => e.to_string(),
            None => "no motion strategy configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing(AtomicUsize);

    #[async_trait]
    impl MotionStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn synthesize(&self, _: &MotionRequest, _: &WorkDir, _: &MediaJobRunner) -> MediaResult<PathBuf> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(MediaError::motion_failed("no depth"))
        }
    }

    struct Succeeding;

    #[async_trait]
    impl MotionStrategy for Succeeding {
        fn name(&self) -> &'static str {
            "succeeding"
        }

        async fn synthesize(&self, request: &MotionRequest, _: &WorkDir, _: &MediaJobRunner) -> MediaResult<PathBuf> {
            Ok(request.output.clone())
        }
    }

    fn request() -> MotionRequest {
        MotionRequest {
            image: "still.png".into(),
            audio: None,
            duration: 2.0,
            output: "motion.mp4".into(),
            salt: 0,
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_next_strategy() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path(), "motion").unwrap();
        let failing = Arc::new(Failing(AtomicUsize::new(0)));
        let strategies: Vec<Arc<dyn MotionStrategy>> = vec![failing.clone(), Arc::new(Succeeding)];

        let synth = MotionSynthesizer::from_strategies(strategies, MediaJobRunner::new());
        let clip = synth.synthesize(&request(), &work).await.unwrap();

        assert_eq!(clip.strategy, "succeeding");
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_motion_failure() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path(), "motion").unwrap();
        let strategies: Vec<Arc<dyn MotionStrategy>> = vec![Arc::new(Failing(AtomicUsize::new(0)))];
        let synth = MotionSynthesizer::from_strategies(strategies, MediaJobRunner::new());
        let err = synth.synthesize(&request(), &work).await.unwrap_err();
        assert!(matches!(err, MediaError::MotionSynthesisFailure(_)));
    }

    #[test]
    fn test_parallax_is_tried_before_ken_burns() {
        let synth = MotionSynthesizer::with_parallax(
            &MotionSettings::default(),
            Arc::new(SidecarDepthMap),
            MediaJobRunner::new(),
        );
        assert_eq!(synth.strategy_names(), vec!["parallax", "ken_burns"]);
    }
}
