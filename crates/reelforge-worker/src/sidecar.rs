//! Sidecar metadata written next to each final artifact.

use std::path::{Path, PathBuf};
use tracing::debug;

use reelforge_media::fs_utils::ensure_parent;
use reelforge_models::{JobContext, VideoMetadata};

use crate::error::WorkerResult;

/// `{output_root}/{job_id}/{script_id}.mp4`
pub fn video_path(output_root: &Path, ctx: &JobContext) -> PathBuf {
    output_root
        .join(ctx.job_id.as_str())
        .join(format!("{}.mp4", ctx.script_id))
}

/// `{output_root}/{job_id}/{script_id}.json`
pub fn sidecar_path(output_root: &Path, ctx: &JobContext) -> PathBuf {
    output_root
        .join(ctx.job_id.as_str())
        .join(format!("{}.json", ctx.script_id))
}

/// Write `metadata` as pretty JSON, replacing any previous sidecar whole.
pub async fn write_sidecar(path: &Path, metadata: &VideoMetadata) -> WorkerResult<()> {
    ensure_parent(path).await?;
    let json = serde_json::to_vec_pretty(metadata)?;

    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, json).await?;
    tokio::fs::rename(&staging, path).await?;

    debug!(path = %path.display(), "Wrote sidecar");
    Ok(())
}

pub async fn read_sidecar(path: &Path) -> WorkerResult<VideoMetadata> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_models::{JobStatus, NarrationSegment, Scene, VisualCandidate};

    fn ctx() -> JobContext {
        JobContext::new("job-9".into(), "script-3".into())
            .with_title("Deep Sea")
            .with_tags(["ocean", "science"])
            .with_script_text("The deep sea is dark.")
    }

    #[test]
    fn test_output_layout() {
        let root = Path::new("/srv/out");
        assert_eq!(video_path(root, &ctx()), PathBuf::from("/srv/out/job-9/script-3.mp4"));
        assert_eq!(sidecar_path(root, &ctx()), PathBuf::from("/srv/out/job-9/script-3.json"));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let scene = Scene::new(
            NarrationSegment::new("The deep sea is dark.", "n0.mp3", 2.4),
            VisualCandidate::still("/lib/abyss.png", 800, 600),
            "deep sea",
        )
        .unwrap();
        let meta = VideoMetadata::new(&ctx(), &[scene], JobStatus::Done, 2.4).with_video_file("script-3.mp4");

        let path = sidecar_path(dir.path(), &ctx());
        write_sidecar(&path, &meta).await.unwrap();
        let back = read_sidecar(&path).await.unwrap();

        assert_eq!(back.title, "Deep Sea");
        assert_eq!(back.tags, vec!["ocean", "science"]);
        assert_eq!(back.scenes[0].kind, "still");
        assert_eq!(back.scenes[0].visual_seconds, 2.4);
        assert_eq!(back.status, JobStatus::Done);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
