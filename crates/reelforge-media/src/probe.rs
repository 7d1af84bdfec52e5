//! Duration prober backed by FFprobe.
//!
//! Probing is always fallible: corrupt, truncated or undersized files come
//! back as [`MediaError::UnreadableMedia`] so callers can skip them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use reelforge_models::VisualCandidate;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Files smaller than this are treated as corrupt downloads.
pub const MIN_FILE_BYTES: u64 = 1024;

/// Time-based media shorter than this is treated as corrupt.
pub const MIN_MEDIA_SECS: f64 = 0.5;

/// Single-image codecs reported by FFprobe.
const STILL_CODECS: &[&str] = &["png", "mjpeg", "jpeg", "webp", "bmp", "tiff"];

/// Probed media information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds (0 for stills)
    pub duration: f64,
    /// Width in pixels (0 without video)
    pub width: u32,
    /// Height in pixels (0 without video)
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Primary codec (video if present, else audio)
    pub codec: String,
    pub has_video: bool,
    pub has_audio: bool,
    /// Single image rather than time-based footage
    pub is_still: bool,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    /// Convert to a visual candidate, if the file carries a picture.
    pub fn to_candidate(&self, path: impl Into<PathBuf>) -> Option<VisualCandidate> {
        if !self.has_video {
            return None;
        }
        Some(if self.is_still {
            VisualCandidate::still(path, self.width, self.height)
        } else {
            VisualCandidate::video(path, self.duration, self.width, self.height, self.fps)
        })
    }
}

/// Anything that can report duration and stream metadata for a file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `path`, failing with `UnreadableMedia` for unusable files.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Duration in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        Ok(self.probe(path).await?.duration)
    }
}

/// [`Prober`] that shells out to `ffprobe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProber;

impl FfprobeProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| MediaError::unreadable(path, format!("cannot stat file: {}", e)))?;
    if metadata.len() < MIN_FILE_BYTES {
        return Err(MediaError::unreadable(
            path,
            format!("file is {} bytes, below {} byte floor", metadata.len(), MIN_FILE_BYTES),
        ));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(path = %path.display(), stderr = %stderr.trim(), "ffprobe rejected file");
        return Err(MediaError::unreadable(path, "ffprobe could not read the file"));
    }

    parse_probe_output(path, &output.stdout, metadata.len())
}

/// Interpret FFprobe JSON for `path`, applying the corruption floors.
pub fn parse_probe_output(path: &Path, json: &[u8], file_size: u64) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| MediaError::unreadable(path, format!("malformed ffprobe output: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    if video.is_none() && audio.is_none() {
        return Err(MediaError::unreadable(path, "no audio or video stream"));
    }

    let format_name = probe
        .format
        .as_ref()
        .and_then(|f| f.format_name.clone())
        .unwrap_or_default();

    let is_still = video
        .and_then(|v| v.codec_name.as_deref())
        .map(|codec| STILL_CODECS.contains(&codec) && is_image_container(&format_name))
        .unwrap_or(false);

    // Container duration first, else the longest stream
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    if !is_still && duration < MIN_MEDIA_SECS {
        return Err(MediaError::unreadable(
            path,
            format!("duration {:.2}s below {:.1}s floor", duration, MIN_MEDIA_SECS),
        ));
    }

    let size = probe
        .format
        .as_ref()
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(file_size);

    let fps = video
        .and_then(|v| {
            v.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate))
        })
        .unwrap_or(0.0);

    let codec = video
        .or(audio)
        .and_then(|s| s.codec_name.clone())
        .unwrap_or_default();

    Ok(MediaInfo {
        duration: if is_still { 0.0 } else { duration },
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        fps,
        codec,
        has_video: video.is_some(),
        has_audio: audio.is_some(),
        is_still,
        size,
    })
}

/// Image demuxers (`image2`, `png_pipe`, `jpeg_pipe`, ...).
fn is_image_container(format_name: &str) -> bool {
    format_name
        .split(',')
        .any(|name| name == "image2" || name.ends_with("_pipe"))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "4.004000", "size": "812345"}
    }"#;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_video() {
        let info = parse_probe_output(Path::new("a.mp4"), VIDEO_JSON.as_bytes(), 0).unwrap();
        assert!((info.duration - 4.004).abs() < 1e-6);
        assert_eq!((info.width, info.height), (1280, 720));
        assert!(info.has_video && info.has_audio && !info.is_still);
        assert_eq!(info.codec, "h264");
        assert_eq!(info.size, 812345);

        let candidate = info.to_candidate("a.mp4").unwrap();
        assert!(!candidate.is_still());
    }

    #[test]
    fn test_parse_audio_only() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3","duration":"2.1"}],
                       "format":{"format_name":"mp3"}}"#;
        let info = parse_probe_output(Path::new("n.mp3"), json.as_bytes(), 4096).unwrap();
        assert!((info.duration - 2.1).abs() < 1e-9);
        assert!(!info.has_video);
        assert!(info.to_candidate("n.mp3").is_none());
        assert_eq!(info.size, 4096);
    }

    #[test]
    fn test_still_is_exempt_from_duration_floor() {
        let json = r#"{"streams":[{"codec_type":"video","codec_name":"png","width":800,"height":600}],
                       "format":{"format_name":"png_pipe"}}"#;
        let info = parse_probe_output(Path::new("s.png"), json.as_bytes(), 50_000).unwrap();
        assert!(info.is_still);
        assert_eq!(info.duration, 0.0);
        assert!(info.to_candidate("s.png").unwrap().is_still());
    }

    #[test]
    fn test_short_media_is_unreadable() {
        let json = r#"{"streams":[{"codec_type":"video","codec_name":"h264","width":640,"height":360}],
                       "format":{"format_name":"mov,mp4","duration":"0.3"}}"#;
        let err = parse_probe_output(Path::new("short.mp4"), json.as_bytes(), 9000).unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = parse_probe_output(Path::new("x"), b"not json", 9000).unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));

        let err = parse_probe_output(Path::new("x"), br#"{"streams":[]}"#, 9000).unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }

    #[tokio::test]
    async fn test_tiny_file_is_unreadable_without_ffprobe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.mp4");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let err = FfprobeProber::new().probe(&path).await.unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let err = probe_media("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }
}
