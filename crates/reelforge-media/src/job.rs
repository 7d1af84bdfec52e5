//! Media jobs and their runner.
//!
//! Every FFmpeg invocation the compositor makes is described as a
//! [`MediaJob`] and executed through one [`MediaJobRunner`], which owns the
//! retry policy, metrics and cleanup of partial outputs.

use metrics::{counter, histogram};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

use reelforge_models::{CanonicalTarget, EncodingConfig};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_concat_filter, concat_list, music_mix_filter, normalize_filter, ScalePlan};
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Metric names recorded by the runner.
pub mod names {
    pub const MEDIA_JOBS_TOTAL: &str = "reelforge_media_jobs_total";
    pub const MEDIA_JOB_DURATION: &str = "reelforge_media_job_duration_seconds";
}

/// One FFmpeg operation of a composition run.
#[derive(Debug, Clone)]
pub enum MediaJob {
    /// Rewrite a clip to the canonical target, video only.
    Normalize {
        input: PathBuf,
        output: PathBuf,
        target: CanonicalTarget,
        plan: Option<ScalePlan>,
        trim: Option<f64>,
        encoding: EncodingConfig,
    },
    /// Join canonical clips with the concat demuxer (stream copy, video only).
    Concat {
        inputs: Vec<PathBuf>,
        list_file: PathBuf,
        output: PathBuf,
    },
    /// Join narration clips in order.
    ConcatAudio {
        inputs: Vec<PathBuf>,
        output: PathBuf,
        encoding: EncodingConfig,
    },
    /// Loop and attenuate a music bed under the narration.
    MixMusic {
        narration: PathBuf,
        music: PathBuf,
        volume: f64,
        output: PathBuf,
        encoding: EncodingConfig,
    },
    /// Mux video against audio, bounded by the shorter stream and by
    /// `duration`.
    MuxAv {
        video: PathBuf,
        audio: PathBuf,
        duration: f64,
        output: PathBuf,
        pixel_format: String,
        encoding: EncodingConfig,
    },
    /// Encode a rendered frame sequence, optionally muxed with audio.
    SynthesizeMotion {
        frame_pattern: PathBuf,
        fps: u32,
        duration: f64,
        audio: Option<PathBuf>,
        output: PathBuf,
        pixel_format: String,
        encoding: EncodingConfig,
    },
}

impl MediaJob {
    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaJob::Normalize { .. } => "normalize",
            MediaJob::Concat { .. } => "concat",
            MediaJob::ConcatAudio { .. } => "concat_audio",
            MediaJob::MixMusic { .. } => "mix_music",
            MediaJob::MuxAv { .. } => "mux_av",
            MediaJob::SynthesizeMotion { .. } => "synthesize_motion",
        }
    }

    /// File the job produces.
    pub fn output(&self) -> &Path {
        match self {
            MediaJob::Normalize { output, .. }
            | MediaJob::Concat { output, .. }
            | MediaJob::ConcatAudio { output, .. }
            | MediaJob::MixMusic { output, .. }
            | MediaJob::MuxAv { output, .. }
            | MediaJob::SynthesizeMotion { output, .. } => output,
        }
    }

    /// Expected output length, when known up front.
    fn expected_secs(&self) -> Option<f64> {
        match self {
            MediaJob::Normalize { trim, .. } => *trim,
            MediaJob::MuxAv { duration, .. } | MediaJob::SynthesizeMotion { duration, .. } => {
                Some(*duration)
            }
            _ => None,
        }
    }

    /// Build the FFmpeg command for this job.
    pub fn to_command(&self) -> MediaResult<FfmpegCommand> {
        let cmd = match self {
            MediaJob::Normalize {
                input,
                output,
                target,
                plan,
                trim,
                encoding,
            } => {
                let mut cmd = FfmpegCommand::new(output);
                if let Some(secs) = trim {
                    cmd = cmd.duration(*secs);
                }
                cmd.input(input)
                    .video_filter(normalize_filter(*plan, target))
                    .output_args(encoding.video_args())
                    .pixel_format(target.pixel_format.clone())
                    .output_arg("-r")
                    .output_arg(target.fps.to_string())
                    .no_audio()
            }
            MediaJob::Concat {
                inputs,
                list_file,
                output,
            } => {
                if inputs.is_empty() {
                    return Err(MediaError::compose_failed("nothing to concatenate"));
                }
                FfmpegCommand::new(output)
                    .input_args(["-f", "concat", "-safe", "0"])
                    .input(list_file)
                    .video_codec("copy")
                    .no_audio()
            }
            MediaJob::ConcatAudio {
                inputs,
                output,
                encoding,
            } => {
                if inputs.is_empty() {
                    return Err(MediaError::compose_failed("no narration audio"));
                }
                let cmd = inputs
                    .iter()
                    .fold(FfmpegCommand::new(output), |cmd, input| cmd.input(input));
                cmd.filter_complex(audio_concat_filter(inputs.len()))
                    .map("[a]")
                    .output_args(encoding.audio_args())
            }
            MediaJob::MixMusic {
                narration,
                music,
                volume,
                output,
                encoding,
            } => FfmpegCommand::new(output)
                .input(narration)
                .input_args(["-stream_loop", "-1"])
                .input(music)
                .filter_complex(music_mix_filter(*volume))
                .map("[a]")
                .output_args(encoding.audio_args()),
            MediaJob::MuxAv {
                video,
                audio,
                duration,
                output,
                pixel_format,
                encoding,
            } => FfmpegCommand::new(output)
                .input(video)
                .input(audio)
                .map("0:v:0")
                .map("1:a:0")
                .output_args(encoding.to_ffmpeg_args())
                .pixel_format(pixel_format.clone())
                .shortest()
                .output_duration(*duration)
                .output_args(["-movflags", "+faststart"]),
            MediaJob::SynthesizeMotion {
                frame_pattern,
                fps,
                duration,
                audio,
                output,
                pixel_format,
                encoding,
            } => {
                let mut cmd = FfmpegCommand::new(output)
                    .input_args(["-framerate".to_string(), fps.to_string()])
                    .input(frame_pattern);
                cmd = match audio {
                    Some(audio) => cmd
                        .input(audio)
                        .map("0:v:0")
                        .map("1:a:0")
                        .output_args(encoding.to_ffmpeg_args())
                        .shortest(),
                    None => cmd.output_args(encoding.video_args()).no_audio(),
                };
                cmd.pixel_format(pixel_format.clone())
                    .output_arg("-r")
                    .output_arg(fps.to_string())
                    .output_duration(*duration)
            }
        };
        Ok(cmd)
    }

    /// Write any side files the command reads.
    async fn prepare(&self) -> MediaResult<()> {
        if let MediaJob::Concat {
            inputs, list_file, ..
        } = self
        {
            tokio::fs::write(list_file, concat_list(inputs)).await?;
        }
        Ok(())
    }
}

/// Executes [`MediaJob`]s with a shared retry policy.
#[derive(Debug, Clone, Default)]
pub struct MediaJobRunner {
    ffmpeg: FfmpegRunner,
    retry: RetryConfig,
}

impl MediaJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry failed jobs up to `max_retries` more times.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = self.retry.with_max_retries(max_retries);
        self
    }

    /// Run a job, returning its output path.
    ///
    /// A failed attempt never leaves a partial output behind.
    pub async fn run(&self, job: &MediaJob) -> MediaResult<PathBuf> {
        check_ffmpeg()?;
        job.prepare().await?;

        let kind = job.kind();
        let cmd = job.to_command()?;
        let output = job.output().to_path_buf();
        let expected = job.expected_secs();
        let started = Instant::now();

        let retry = RetryConfig {
            operation_name: kind.to_string(),
            ..self.retry.clone()
        };

        let result = retry_async(
            &retry,
            || {
                let cmd = &cmd;
                let output = &output;
                async move {
                    let run = self
                        .ffmpeg
                        .run_with_progress(cmd, move |p| {
                            if let Some(pct) = expected.and_then(|secs| p.percentage(secs)) {
                                debug!(job = kind, percent = pct.round() as u64, "FFmpeg progress");
                            }
                        })
                        .await;
                    if run.is_err() {
                        remove_partial(output).await;
                    }
                    run
                }
            },
            MediaError::is_retryable,
        )
        .await;

        if let MediaJob::Concat { list_file, .. } = job {
            let _ = tokio::fs::remove_file(list_file).await;
        }

        histogram!(names::MEDIA_JOB_DURATION, "kind" => kind).record(started.elapsed().as_secs_f64());

        match result {
            RetryResult::Success(()) => {
                counter!(names::MEDIA_JOBS_TOTAL, "kind" => kind, "status" => "success").increment(1);
                debug!(job = kind, output = %output.display(), "Media job finished");
                Ok(output)
            }
            RetryResult::Failed { error, attempts } => {
                counter!(names::MEDIA_JOBS_TOTAL, "kind" => kind, "status" => "failure").increment(1);
                warn!(job = kind, attempts, error = %error, "Media job failed");
                Err(error)
            }
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(job: &MediaJob) -> Vec<String> {
        job.to_command().unwrap().build_args()
    }

    fn pos(args: &[String], needle: &str) -> usize {
        args.iter().position(|a| a == needle).unwrap()
    }

    #[test]
    fn test_normalize_trims_input_and_drops_audio() {
        let target = CanonicalTarget::new(1920, 1080, 30);
        let job = MediaJob::Normalize {
            input: "src.mp4".into(),
            output: "norm.mp4".into(),
            plan: ScalePlan::cover(1280, 720, &target),
            target,
            trim: Some(2.1),
            encoding: EncodingConfig::default(),
        };
        let args = args(&job);

        assert!(pos(&args, "-t") < pos(&args, "src.mp4"));
        assert!(args.contains(&"2.100".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.iter().any(|a| a.starts_with("scale=1920:1080")));
        assert_eq!(job.kind(), "normalize");
    }

    #[test]
    fn test_concat_uses_demuxer_and_copy() {
        let job = MediaJob::Concat {
            inputs: vec!["a.mp4".into(), "b.mp4".into()],
            list_file: "list.txt".into(),
            output: "joined.mp4".into(),
        };
        let args = args(&job);
        assert!(pos(&args, "concat") < pos(&args, "list.txt"));
        assert_eq!(args[pos(&args, "-c:v") + 1], "copy");
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_empty_concat_is_compose_failure() {
        let job = MediaJob::Concat {
            inputs: vec![],
            list_file: "list.txt".into(),
            output: "joined.mp4".into(),
        };
        assert!(matches!(job.to_command(), Err(MediaError::ComposeFailure(_))));
    }

    #[test]
    fn test_music_is_looped() {
        let job = MediaJob::MixMusic {
            narration: "voice.m4a".into(),
            music: "bed.mp3".into(),
            volume: 0.15,
            output: "mixed.m4a".into(),
            encoding: EncodingConfig::default(),
        };
        let args = args(&job);
        assert!(pos(&args, "voice.m4a") < pos(&args, "-stream_loop"));
        assert!(pos(&args, "-stream_loop") < pos(&args, "bed.mp3"));
        assert!(args.iter().any(|a| a.contains("amix=inputs=2:duration=first")));
    }

    #[test]
    fn test_mux_is_bounded_by_shortest() {
        let job = MediaJob::MuxAv {
            video: "v.mp4".into(),
            audio: "a.m4a".into(),
            duration: 7.3,
            output: "final.mp4".into(),
            pixel_format: "yuv420p".into(),
            encoding: EncodingConfig::default(),
        };
        let args = args(&job);
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"0:v:0".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"aac".to_string()));
        // output-side cap, after the last input
        assert!(pos(&args, "-t") > pos(&args, "a.m4a"));
        assert_eq!(args[pos(&args, "-t") + 1], "7.300");
    }

    #[test]
    fn test_motion_encode_with_audio() {
        let job = MediaJob::SynthesizeMotion {
            frame_pattern: "frames/frame_%05d.png".into(),
            fps: 30,
            duration: 3.0,
            audio: Some("n.mp3".into()),
            output: "motion.mp4".into(),
            pixel_format: "yuv420p".into(),
            encoding: EncodingConfig::default(),
        };
        let args = args(&job);
        assert!(pos(&args, "-framerate") < pos(&args, "frames/frame_%05d.png"));
        assert!(args.contains(&"3.000".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        remove_partial(&path).await;

        tokio::fs::write(&path, b"half").await.unwrap();
        remove_partial(&path).await;
        assert!(!path.exists());
    }
}
