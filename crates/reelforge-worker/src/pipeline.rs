//! Render job pipeline.
//!
//! Drives one job through `pending → rendering → done | render_failed`:
//! match narration to visuals, compose the timeline into the output area
//! and write the sidecar. No retries happen here; a failed job stays
//! `render_failed` until the caller re-triggers it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use reelforge_media::Prober;
use reelforge_models::{
    CompositionResult, JobContext, JobStatus, NarrationSegment, Timeline, VideoMetadata,
};

use crate::collaborators::{JobStore, VisualAssetSource};
use crate::compositor::{Composition, TimelineCompositor};
use crate::config::ComposerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::matcher::SceneMatcher;
use crate::sidecar;

/// What a finished job produced.
#[derive(Debug)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub result: CompositionResult,
    pub metadata: VideoMetadata,
    /// `None` when the sidecar could not be written
    pub sidecar_path: Option<PathBuf>,
}

/// Matches, composes and records one job at a time.
#[derive(Clone)]
pub struct RenderPipeline {
    store: Arc<dyn JobStore>,
    matcher: SceneMatcher,
    compositor: TimelineCompositor,
    output_root: PathBuf,
}

impl RenderPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        matcher: SceneMatcher,
        compositor: TimelineCompositor,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            matcher,
            compositor,
            output_root: output_root.into(),
        }
    }

    /// Wire the default matcher and compositor from configuration.
    pub fn from_config(
        config: &ComposerConfig,
        prober: Arc<dyn Prober>,
        assets: Arc<dyn VisualAssetSource>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let matcher = SceneMatcher::new(assets, prober.clone()).with_pool_size(config.candidate_pool);
        let compositor = TimelineCompositor::from_config(config, prober);
        Self::new(store, matcher, compositor, config.output_dir.clone())
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Render `segments` for `ctx`.
    ///
    /// Only a failure to enter `rendering` is returned as an error. Once the
    /// job is rendering every path ends in `done` or `render_failed`; render,
    /// sidecar and store problems after that point are logged and folded
    /// into the outcome.
    pub async fn run(
        &self,
        ctx: &JobContext,
        segments: Vec<NarrationSegment>,
        background_music: Option<PathBuf>,
    ) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&ctx.job_id, "render");
        let span = logger.span();
        async {
            self.store.set_status(&ctx.job_id, JobStatus::Rendering).await?;
            Ok::<_, WorkerError>(self.render(ctx, segments, background_music, &logger).await)
        }
        .instrument(span)
        .await
    }

    async fn render(
        &self,
        ctx: &JobContext,
        segments: Vec<NarrationSegment>,
        background_music: Option<PathBuf>,
        logger: &JobLogger,
    ) -> JobOutcome {
        logger.log_start(&format!("{} narration segments", segments.len()));

        let matcher = self.matcher.clone().with_topic(ctx.topic.clone());
        let report = matcher.match_all(segments).await;
        if !report.dropped.is_empty() {
            logger.log_warning(&format!("{} scenes without a usable visual", report.dropped.len()));
        }
        logger.log_progress(&format!("{} scenes matched", report.scenes.len()));

        let output = sidecar::video_path(&self.output_root, ctx);
        let timeline = Timeline::new(report.scenes).with_music(background_music);
        let Composition { mut result, timeline } =
            self.compositor.compose(&ctx.job_id, timeline, &output).await;

        let metadata_for = |result: &CompositionResult| {
            let status = if result.success {
                JobStatus::Done
            } else {
                JobStatus::RenderFailed
            };
            let metadata = VideoMetadata::new(ctx, &timeline.scenes, status, result.duration_seconds);
            match result.output_path.as_deref().and_then(Path::file_name) {
                Some(name) => metadata.with_video_file(name.to_string_lossy()),
                None => metadata,
            }
        };

        let mut metadata = metadata_for(&result);
        let path = sidecar::sidecar_path(&self.output_root, ctx);
        let sidecar_path = match sidecar::write_sidecar(&path, &metadata).await {
            Ok(()) => Some(path),
            Err(e) => {
                logger.log_error(&format!("sidecar write failed: {}", e));
                if result.success {
                    // An artifact without its metadata is not a finished render
                    if let Err(e) = tokio::fs::remove_file(&output).await {
                        logger.log_warning(&format!("cannot remove {}: {}", output.display(), e));
                    }
                    result = CompositionResult::failed(format!("sidecar write failed: {}", e));
                    metadata = metadata_for(&result);
                }
                None
            }
        };

        let status = metadata.status;
        if let Err(e) = self.store.set_status(&ctx.job_id, status).await {
            logger.log_error(&format!("cannot record status {}: {}", status, e));
        }
        if let Err(e) = self.store.record_result(&ctx.job_id, &result).await {
            logger.log_error(&format!("cannot record result: {}", e));
        }

        match status {
            JobStatus::Done => logger.log_completion(&format!(
                "{} scenes, {:.2}s",
                metadata.scenes.len(),
                metadata.duration_seconds
            )),
            _ => logger.log_error(result.error.as_deref().unwrap_or("render failed")),
        }

        JobOutcome {
            status,
            result,
            metadata,
            sidecar_path,
        }
    }
}
