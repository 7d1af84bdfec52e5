//! Moving finished artifacts out of the scratch area.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// EXDEV on Linux and macOS.
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Move `src` to `dst`, creating `dst`'s parent directory.
///
/// Scratch space and the output area often sit on different filesystems;
/// when a rename is refused as cross-device the file is copied next to
/// `dst` under a temporary name, renamed into place and the source removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), dst = %dst.display(), "Cross-device move, copying");
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Create the parent directory of `path` if missing.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(CROSS_DEVICE_ERRNO)
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::remove_file(src).await {
        warn!(src = %src.display(), error = %e, "Source left behind after cross-device move");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_into_new_output_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("final.mp4");
        let dst = dir.path().join("output").join("job-1").join("script.mp4");

        fs::write(&src, b"video").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_move_replaces_previous_render() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("script.mp4");

        fs::write(&src, b"second").await.unwrap();
        fs::write(&dst, b"first").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_copy_then_remove() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("b.mp4");

        fs::write(&src, b"data").await.unwrap();
        copy_then_remove(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(!dir.path().join("b.partial").exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"data");
    }

    #[test]
    fn test_cross_device_detection() {
        assert!(is_cross_device(&io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device(&io::Error::from_raw_os_error(2)));
    }
}
