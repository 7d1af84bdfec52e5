//! Composition job status.
//!
//! The status field is the sole source of truth for whether a composition
//! succeeded. A job moves `pending → rendering → {done | render_failed}`.
//! Terminal states are left only by a re-trigger, which starts a fresh
//! `rendering` pass, and a job stranded in `rendering` by a worker that
//! died mid-render may be picked up again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Composition job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is approved and waiting to be rendered
    #[default]
    Pending,
    /// Composition is in progress
    Rendering,
    /// Final artifact written and verified
    Done,
    /// Composition failed; must be re-triggered by the caller
    RenderFailed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Rendering => "rendering",
            JobStatus::Done => "done",
            JobStatus::RenderFailed => "render_failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::RenderFailed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Any state but `rendering` itself is left only for `rendering`;
    /// `done` and `render_failed` are never entered from anything else.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Rendering)
                | (JobStatus::Rendering, JobStatus::Rendering)
                | (JobStatus::Rendering, JobStatus::Done)
                | (JobStatus::Rendering, JobStatus::RenderFailed)
                | (JobStatus::Done, JobStatus::Rendering)
                | (JobStatus::RenderFailed, JobStatus::Rendering)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal status transition {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Snapshot of a job's status as held by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusRecord {
    /// Job identifier
    pub job_id: String,
    /// Current status
    pub status: JobStatus,
    /// Final artifact path once `done`
    pub output_path: Option<PathBuf>,
    /// Failure reason once `render_failed`
    pub error_message: Option<String>,
    /// When the status was last updated
    pub updated_at: DateTime<Utc>,
}

impl JobStatusRecord {
    /// Create a new pending record.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            output_path: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply a transition, rejecting illegal ones.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        if next == JobStatus::Rendering {
            self.output_path = None;
            self.error_message = None;
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
