//! Job identity supplied by the job/script store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a composition job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the script being rendered within a job.
///
/// A job may own several scripts (long and short form); each renders to its
/// own artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ScriptId(pub String);

impl ScriptId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScriptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Everything the compositor needs to know about the job it is rendering.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobContext {
    /// Job identifier (output directory name)
    pub job_id: JobId,

    /// Script identifier (output file stem)
    pub script_id: ScriptId,

    /// Human-readable title for the sidecar
    #[serde(default)]
    pub title: String,

    /// Tags for the sidecar
    #[serde(default)]
    pub tags: Vec<String>,

    /// Full script text as narrated
    #[serde(default)]
    pub script_text: String,

    /// Broad topic used as the fallback asset search term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl JobContext {
    /// Create a context with only the identifiers set.
    pub fn new(job_id: JobId, script_id: ScriptId) -> Self {
        Self {
            job_id,
            script_id,
            title: String::new(),
            tags: Vec::new(),
            script_text: String::new(),
            topic: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_script_text(mut self, text: impl Into<String>) -> Self {
        self.script_text = text.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrip_is_transparent() {
        let id = JobId::from_string("job-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"job-42\"");
    }

    #[test]
    fn test_new_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_context_builder() {
        let ctx = JobContext::new("job-1".into(), "script-7".into())
            .with_title("Smart pens")
            .with_topic("productivity")
            .with_tags(["tech", "review"]);

        assert_eq!(ctx.script_id.as_str(), "script-7");
        assert_eq!(ctx.topic.as_deref(), Some("productivity"));
        assert_eq!(ctx.tags, vec!["tech".to_string(), "review".to_string()]);
    }
}
