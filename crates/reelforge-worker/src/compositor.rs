//! Timeline compositor.
//!
//! Renders a matched [`Timeline`] into one file:
//!
//! 1. Tile the visuals when their total falls short of the narration
//! 2. Normalize footage and synthesize motion for stills, dropping scenes
//!    whose visual cannot be produced together with their narration
//! 3. Concatenate the canonical clips (video only, stream copy)
//! 4. Concatenate narration audio
//! 5. Loop and mix the music bed under the narration, if any
//! 6. Mux video against audio, bounded by the shorter stream
//! 7. Probe the result and reject outputs below the minimum length
//! 8. Remove every intermediate with the run's [`WorkDir`]
//!
//! [`TimelineCompositor::compose`] never returns an error; every path ends
//! in a [`CompositionResult`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use reelforge_media::{
    move_file, MediaError, MediaJob, MediaJobRunner, MediaResult, MotionRequest, MotionSynthesizer,
    Normalizer, Prober, WorkDir, DEFAULT_MUSIC_VOLUME,
};
use reelforge_models::{CanonicalTarget, CompositionResult, EncodingConfig, JobId, Scene, Timeline};

use crate::config::ComposerConfig;
use crate::logging::JobLogger;
use crate::metrics;

/// Compositor settings.
#[derive(Debug, Clone)]
pub struct CompositorSettings {
    /// Root under which each run gets its scratch directory
    pub work_root: PathBuf,
    pub target: CanonicalTarget,
    pub encoding: EncodingConfig,
    pub music_volume: f64,
    pub min_output_secs: f64,
    pub trim_to_narration: bool,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("reelforge"),
            target: CanonicalTarget::default(),
            encoding: EncodingConfig::default(),
            music_volume: DEFAULT_MUSIC_VOLUME,
            min_output_secs: 1.0,
            trim_to_narration: true,
        }
    }
}

impl From<&ComposerConfig> for CompositorSettings {
    fn from(config: &ComposerConfig) -> Self {
        Self {
            work_root: config.work_dir.clone(),
            target: config.target(),
            encoding: config.encoding.clone(),
            music_volume: config.music_volume,
            min_output_secs: config.min_output_secs,
            trim_to_narration: config.trim_to_narration,
        }
    }
}

/// Terminal outcome plus the scenes that made it into the output.
#[derive(Debug)]
pub struct Composition {
    pub result: CompositionResult,
    pub timeline: Timeline,
}

/// One scene's canonical clip.
#[derive(Debug, Clone)]
struct RenderedClip {
    path: PathBuf,
    duration: f64,
}

/// Order in which clips play so their total reaches `needed` seconds.
///
/// Every clip plays once in order; when the total is short the list is
/// repeated from the start until it covers the deficit.
pub fn tile_to_cover(durations: &[f64], needed: f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..durations.len()).collect();
    let total: f64 = durations.iter().sum();
    if total <= 0.0 || total >= needed {
        return order;
    }

    let mut covered = total;
    let mut next = 0;
    while covered < needed {
        let idx = next % durations.len();
        order.push(idx);
        covered += durations[idx];
        next += 1;
    }
    order
}

/// Assembles the final artifact of a job.
#[derive(Clone)]
pub struct TimelineCompositor {
    prober: Arc<dyn Prober>,
    normalizer: Normalizer,
    motion: MotionSynthesizer,
    jobs: MediaJobRunner,
    settings: CompositorSettings,
}

impl TimelineCompositor {
    pub fn new(
        prober: Arc<dyn Prober>,
        jobs: MediaJobRunner,
        motion: MotionSynthesizer,
        settings: CompositorSettings,
    ) -> Self {
        let normalizer = Normalizer::new(
            prober.clone(),
            jobs.clone(),
            settings.target.clone(),
            settings.encoding.clone(),
        );
        Self {
            prober,
            normalizer,
            motion,
            jobs,
            settings,
        }
    }

    /// Build from configuration: Ken Burns always, parallax first when enabled.
    pub fn from_config(config: &ComposerConfig, prober: Arc<dyn Prober>) -> Self {
        let jobs = MediaJobRunner::new().with_retries(config.media_retries);
        let motion_settings = config.motion_settings();
        let motion = match config.depth_estimator() {
            Some(depth) => MotionSynthesizer::with_parallax(&motion_settings, depth, jobs.clone()),
            None => MotionSynthesizer::ken_burns(&motion_settings, jobs.clone()),
        };
        Self::new(prober, jobs, motion, CompositorSettings::from(config))
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Compose `timeline` into `output`.
    pub async fn compose(&self, job_id: &JobId, mut timeline: Timeline, output: &Path) -> Composition {
        let started = Instant::now();
        let logger = JobLogger::new(job_id, "compose");
        logger.log_start(&format!(
            "{} scenes, {:.2}s narration",
            timeline.len(),
            timeline.narration_duration()
        ));

        let rendered = match WorkDir::create(&self.settings.work_root, job_id.as_str()) {
            Ok(workdir) => {
                let rendered = self.render(&workdir, &mut timeline, output).await;
                if let Err(e) = workdir.close() {
                    logger.log_warning(&format!("work dir cleanup failed: {}", e));
                }
                rendered
            }
            Err(e) => Err(MediaError::compose_failed(format!("cannot create work dir: {}", e))),
        };

        let result = match rendered {
            Ok(duration) => {
                logger.log_completion(&format!("{} ({:.2}s)", output.display(), duration));
                CompositionResult::succeeded(output.to_path_buf(), duration)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                CompositionResult::failed(e.to_string())
            }
        };

        metrics::record_composition(
            result.success,
            started.elapsed().as_secs_f64(),
            result.duration_seconds,
        );
        Composition { result, timeline }
    }

    async fn render(&self, workdir: &WorkDir, timeline: &mut Timeline, output: &Path) -> MediaResult<f64> {
        if timeline.is_empty() {
            return Err(MediaError::compose_failed("no scenes to compose"));
        }

        let shortfall = timeline.narration_duration() - timeline.visual_duration();
        if shortfall > 0.0 {
            info!(shortfall, "Visuals shorter than narration, tiling");
        }

        let clips = self.render_scenes(workdir, timeline).await?;

        let narration_secs = timeline.narration_duration();
        let durations: Vec<f64> = clips.iter().map(|c| c.duration).collect();
        // one frame of tolerance before repeating footage
        let order = tile_to_cover(&durations, narration_secs - self.settings.target.frame_duration());
        if order.len() > clips.len() {
            info!(clips = clips.len(), tiled = order.len(), "Tiled clips to cover narration");
        }

        let video = self
            .jobs
            .run(&MediaJob::Concat {
                inputs: order.iter().map(|&i| clips[i].path.clone()).collect(),
                list_file: workdir.path_for("concat.txt"),
                output: workdir.path_for("video.mp4"),
            })
            .await
            .map_err(|e| stage_failed("video concat", e))?;

        let audio = self.narration_track(workdir, &timeline.scenes).await?;
        let audio = match &timeline.background_music {
            Some(music) => self.mix_music(workdir, audio, music).await?,
            None => audio,
        };

        let muxed = self
            .jobs
            .run(&MediaJob::MuxAv {
                video,
                audio,
                duration: narration_secs,
                output: workdir.path_for("final.mp4"),
                pixel_format: self.settings.target.pixel_format.clone(),
                encoding: self.settings.encoding.clone(),
            })
            .await
            .map_err(|e| stage_failed("mux", e))?;

        let info = self
            .prober
            .probe(&muxed)
            .await
            .map_err(|e| stage_failed("output probe", e))?;
        if info.duration < self.settings.min_output_secs {
            return Err(MediaError::compose_failed(format!(
                "output is {:.2}s, below the {:.2}s minimum",
                info.duration, self.settings.min_output_secs
            )));
        }

        debug!(
            output = info.duration,
            narration = narration_secs,
            drift = (info.duration - narration_secs).abs(),
            "Output probed"
        );

        move_file(&muxed, output)
            .await
            .map_err(|e| stage_failed("move to output", e))?;
        Ok(info.duration)
    }

    /// Render every scene, dropping the ones that fail.
    async fn render_scenes(&self, workdir: &WorkDir, timeline: &mut Timeline) -> MediaResult<Vec<RenderedClip>> {
        let mut keep = Vec::with_capacity(timeline.len());
        let mut clips = Vec::with_capacity(timeline.len());

        for (index, scene) in timeline.scenes.iter().enumerate() {
            match self.render_scene(index, scene, workdir).await {
                Ok(clip) => {
                    keep.push(true);
                    clips.push(clip);
                }
                Err(MediaError::FfmpegNotFound) => return Err(MediaError::FfmpegNotFound),
                Err(e) => {
                    warn!(
                        scene = index,
                        asset = %scene.visual().path.display(),
                        error = %e,
                        "Dropping scene and its narration"
                    );
                    metrics::record_scene_dropped("render");
                    keep.push(false);
                }
            }
        }

        timeline.retain_indices(&keep);
        if clips.is_empty() {
            return Err(MediaError::compose_failed("no scene could be rendered"));
        }
        Ok(clips)
    }

    async fn render_scene(&self, index: usize, scene: &Scene, workdir: &WorkDir) -> MediaResult<RenderedClip> {
        let needed = scene.narration().duration();

        if scene.needs_motion() {
            let request = MotionRequest {
                image: scene.visual().path.clone(),
                audio: Some(scene.narration().audio_path.clone()),
                duration: needed,
                output: workdir.unique_path("motion", "mp4"),
                salt: index as u64,
            };
            let clip = self.motion.synthesize(&request, workdir).await?;
            metrics::record_motion_clip(clip.strategy);
            return Ok(RenderedClip {
                path: clip.path,
                duration: needed,
            });
        }

        let trim = self.settings.trim_to_narration.then_some(needed);
        let clip = self
            .normalizer
            .normalize(&scene.visual().path, &workdir.unique_path("norm", "mp4"), trim)
            .await?;
        Ok(RenderedClip {
            path: clip.path,
            duration: clip.duration,
        })
    }

    /// Narration of the remaining scenes as one track.
    async fn narration_track(&self, workdir: &WorkDir, scenes: &[Scene]) -> MediaResult<PathBuf> {
        let inputs: Vec<PathBuf> = scenes
            .iter()
            .map(|s| s.narration().audio_path.clone())
            .collect();

        if let [single] = inputs.as_slice() {
            return Ok(single.clone());
        }

        self.jobs
            .run(&MediaJob::ConcatAudio {
                inputs,
                output: workdir.path_for("narration.m4a"),
                encoding: self.settings.encoding.clone(),
            })
            .await
            .map_err(|e| stage_failed("narration concat", e))
    }

    /// Mix a looped music bed under `narration`. An unusable music file is
    /// skipped and the narration used alone.
    async fn mix_music(&self, workdir: &WorkDir, narration: PathBuf, music: &Path) -> MediaResult<PathBuf> {
        match self.prober.probe(music).await {
            Ok(info) if info.has_audio => {}
            Ok(_) => {
                warn!(music = %music.display(), "Music file has no audio, skipping music");
                return Ok(narration);
            }
            Err(e) => {
                warn!(music = %music.display(), error = %e, "Unreadable music, skipping music");
                return Ok(narration);
            }
        }

        self.jobs
            .run(&MediaJob::MixMusic {
                narration,
                music: music.to_path_buf(),
                volume: self.settings.music_volume,
                output: workdir.path_for("mixed.m4a"),
                encoding: self.settings.encoding.clone(),
            })
            .await
            .map_err(|e| stage_failed("music mix", e))
    }
}

fn stage_failed(stage: &str, e: MediaError) -> MediaError {
    match e {
        MediaError::ComposeFailure(_) => e,
        other => MediaError::compose_failed(format!("{}: {}", stage, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelforge_media::MediaInfo;
    use reelforge_models::{NarrationSegment, VisualCandidate};

    struct Unreadable;

    #[async_trait]
    impl Prober for Unreadable {
        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            Err(MediaError::unreadable(path, "truncated"))
        }
    }

    fn compositor(work_root: &Path) -> TimelineCompositor {
        let jobs = MediaJobRunner::new();
        let settings = CompositorSettings {
            work_root: work_root.to_path_buf(),
            ..Default::default()
        };
        let motion = reelforge_media::MotionSynthesizer::ken_burns(&Default::default(), jobs.clone());
        TimelineCompositor::new(Arc::new(Unreadable), jobs, motion, settings)
    }

    fn scene(text: &str, narr: f64, vis: f64) -> Scene {
        Scene::new(
            NarrationSegment::new(text, format!("{}.mp3", text), narr),
            VisualCandidate::video(format!("{}.mp4", text), vis, 1280, 720, 25.0),
            text,
        )
        .unwrap()
    }

    #[test]
    fn test_tile_not_needed() {
        assert_eq!(tile_to_cover(&[2.5, 5.0, 2.0], 7.3), vec![0, 1, 2]);
    }

    #[test]
    fn test_tile_repeats_from_start() {
        assert_eq!(tile_to_cover(&[1.0, 2.0], 6.5), vec![0, 1, 0, 1, 0]);
        assert_eq!(tile_to_cover(&[4.0], 9.0), vec![0, 0, 0]);
    }

    #[test]
    fn test_tile_degenerate_inputs() {
        assert!(tile_to_cover(&[], 5.0).is_empty());
        assert_eq!(tile_to_cover(&[0.0, 0.0], 5.0), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_timeline_fails_without_error() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out/s1.mp4");
        let composition = compositor(root.path())
            .compose(&JobId::from_string("empty"), Timeline::default(), &out)
            .await;

        assert!(!composition.result.success);
        assert!(composition.result.output_path.is_none());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_all_scenes_failing_is_compose_failure_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let work_root = root.path().join("work");
        let out = root.path().join("out/s1.mp4");

        let timeline = Timeline::new(vec![scene("a", 2.0, 3.0), scene("b", 1.0, 4.0)]);
        let composition = compositor(&work_root)
            .compose(&JobId::from_string("job-x"), timeline, &out)
            .await;

        assert!(!composition.result.success);
        assert!(composition
            .result
            .error
            .as_deref()
            .unwrap()
            .contains("no scene could be rendered"));
        assert!(composition.timeline.is_empty());
        assert!(!out.exists());
        // Scratch directory removed with the run
        assert_eq!(std::fs::read_dir(&work_root).unwrap().count(), 0);
    }
}
