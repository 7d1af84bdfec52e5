//! Scene matcher.
//!
//! Pairs every narration segment with the tightest-fitting visual from a
//! small candidate pool. Segments are matched strictly in narration order;
//! a segment nothing fits is dropped rather than stalling the job.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use reelforge_media::{MediaError, MediaResult, Prober};
use reelforge_models::{NarrationSegment, Scene, VisualCandidate};

use crate::collaborators::VisualAssetSource;
use crate::metrics;
use crate::query::SceneQuery;

/// Default number of candidates requested per search term.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Probed candidates of one search, split by kind in pool order.
#[derive(Debug, Default)]
struct ProbedPool {
    videos: Vec<VisualCandidate>,
    stills: Vec<VisualCandidate>,
}

/// A segment that could not be matched.
#[derive(Debug)]
pub struct DroppedSegment {
    /// Position in the narration
    pub index: usize,
    pub segment: NarrationSegment,
    pub reason: MediaError,
}

/// Outcome of matching a whole narration.
#[derive(Debug, Default)]
pub struct MatchReport {
    /// Matched scenes in narration order
    pub scenes: Vec<Scene>,
    pub dropped: Vec<DroppedSegment>,
}

/// Candidate with the least slack over `needed` seconds.
///
/// Stills and candidates shorter than `needed` never qualify. On equal
/// slack the earlier candidate wins.
pub fn select_tightest(candidates: &[VisualCandidate], needed: f64) -> Option<&VisualCandidate> {
    candidates
        .iter()
        .filter(|c| c.covers(needed))
        .min_by(|a, b| (a.duration - needed).total_cmp(&(b.duration - needed)))
}

/// Matches narration segments against a visual asset source.
#[derive(Clone)]
pub struct SceneMatcher {
    source: Arc<dyn VisualAssetSource>,
    prober: Arc<dyn Prober>,
    pool_size: usize,
    topic: Option<String>,
}

impl SceneMatcher {
    pub fn new(source: Arc<dyn VisualAssetSource>, prober: Arc<dyn Prober>) -> Self {
        Self {
            source,
            prober,
            pool_size: DEFAULT_POOL_SIZE,
            topic: None,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// Broad topic used as the fallback search term.
    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic;
        self
    }

    /// Fetch and probe one pool. Source and probe failures only shrink it.
    async fn probe_pool(&self, query: &str) -> ProbedPool {
        let paths: Vec<PathBuf> = match self.source.fetch(query, self.pool_size).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(query, error = %e, "Asset source failed, treating pool as empty");
                Vec::new()
            }
        };

        let mut pool = ProbedPool::default();
        for path in paths.into_iter().take(self.pool_size) {
            match self.prober.probe(&path).await {
                Ok(info) => match info.to_candidate(&path) {
                    Some(c) if c.is_still() => pool.stills.push(c),
                    Some(c) => pool.videos.push(c),
                    None => debug!(path = %path.display(), "Candidate has no picture, skipping"),
                },
                Err(e) => debug!(path = %path.display(), error = %e, "Unreadable candidate, skipping"),
            }
        }
        pool
    }

    /// Match one segment.
    ///
    /// Tries the primary term, then the fallback term once. When no video
    /// covers the segment but a still turned up in either pool, the scene
    /// is built from the first still and animated later.
    pub async fn match_segment(&self, segment: &NarrationSegment) -> MediaResult<Scene> {
        let query = SceneQuery::derive(&segment.text, self.topic.as_deref());
        let needed = segment.duration();

        let mut searches = vec![query.primary.clone()];
        if query.fallback_is_distinct() {
            searches.push(query.fallback.clone());
        }

        let mut stills: Vec<(String, VisualCandidate)> = Vec::new();
        for term in &searches {
            let pool = self.probe_pool(term).await;
            if let Some(best) = select_tightest(&pool.videos, needed) {
                debug!(
                    query = %term,
                    path = %best.path.display(),
                    duration = best.duration,
                    needed,
                    "Selected candidate"
                );
                if let Some(scene) = Scene::new(segment.clone(), best.clone(), term.clone()) {
                    return Ok(scene);
                }
            }
            debug!(query = %term, videos = pool.videos.len(), needed, "No candidate covers segment");
            stills.extend(pool.stills.into_iter().map(|s| (term.clone(), s)));
        }

        if let Some((term, still)) = stills.into_iter().next() {
            debug!(query = %term, path = %still.path.display(), "Falling back to still image");
            if let Some(scene) = Scene::new(segment.clone(), still, term) {
                return Ok(scene);
            }
        }

        Err(MediaError::no_candidate_fits(query.primary, needed))
    }

    /// Match every segment in narration order.
    pub async fn match_all(&self, segments: Vec<NarrationSegment>) -> MatchReport {
        let mut report = MatchReport::default();

        for (index, segment) in segments.into_iter().enumerate() {
            match self.match_segment(&segment).await {
                Ok(scene) => {
                    metrics::record_scene_matched(scene.visual().kind.as_str(), scene.match_quality());
                    report.scenes.push(scene);
                }
                Err(reason) => {
                    warn!(index, text = %segment.text, error = %reason, "Dropping scene");
                    metrics::record_scene_dropped("match");
                    report.dropped.push(DroppedSegment {
                        index,
                        segment,
                        reason,
                    });
                }
            }
        }

        info!(
            matched = report.scenes.len(),
            dropped = report.dropped.len(),
            "Scene matching complete"
        );
        report
    }
}
