//! Metrics for scene matching and composition.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    // Matching
    pub const SCENES_MATCHED_TOTAL: &str = "reelforge_scenes_matched_total";
    pub const SCENES_DROPPED_TOTAL: &str = "reelforge_scenes_dropped_total";
    pub const MATCH_SLACK_SECONDS: &str = "reelforge_match_slack_seconds";

    // Composition
    pub const MOTION_CLIPS_TOTAL: &str = "reelforge_motion_clips_total";
    pub const COMPOSITIONS_TOTAL: &str = "reelforge_compositions_total";
    pub const COMPOSITION_DURATION_SECONDS: &str = "reelforge_composition_duration_seconds";
    pub const OUTPUT_DURATION_SECONDS: &str = "reelforge_output_duration_seconds";
}

/// Serve Prometheus metrics on `addr`. Must be called inside a tokio runtime.
pub fn init_prometheus(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Record a matched scene (`kind` is "video" or "still").
pub fn record_scene_matched(kind: &str, slack_secs: f64) {
    let labels = [("kind", kind.to_string())];
    counter!(names::SCENES_MATCHED_TOTAL, &labels).increment(1);
    histogram!(names::MATCH_SLACK_SECONDS).record(slack_secs);
}

/// Record a dropped scene; `stage` is "match" or "render".
pub fn record_scene_dropped(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::SCENES_DROPPED_TOTAL, &labels).increment(1);
}

/// Record a synthesized motion clip.
pub fn record_motion_clip(strategy: &str) {
    let labels = [("strategy", strategy.to_string())];
    counter!(names::MOTION_CLIPS_TOTAL, &labels).increment(1);
}

/// Record a finished composition.
pub fn record_composition(success: bool, elapsed_secs: f64, output_secs: f64) {
    let status = if success { "done" } else { "render_failed" };
    let labels = [("status", status.to_string())];
    counter!(names::COMPOSITIONS_TOTAL, &labels).increment(1);
    histogram!(names::COMPOSITION_DURATION_SECONDS, &labels).record(elapsed_secs);
    if success {
        histogram!(names::OUTPUT_DURATION_SECONDS).record(output_secs);
    }
}
