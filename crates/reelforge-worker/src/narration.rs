//! Narration production.
//!
//! Turns a script into ordered [`NarrationSegment`]s: split into sentences,
//! synthesize one clip per sentence with bounded concurrency, then probe
//! each clip. Clips that cannot be probed are skipped; order is kept.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use reelforge_media::Prober;
use reelforge_models::NarrationSegment;

use crate::collaborators::{NarrationInput, NarrationSource};
use crate::error::{WorkerError, WorkerResult};

/// Sentence end: `.`, `?` or `!` followed by whitespace.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!]\s+").expect("sentence pattern is valid"));

/// Split a script into sentences at `.`, `?` or `!` followed by whitespace.
///
/// Line breaks count as spaces; empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.replace(['\r', '\n'], " ");
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_BREAK.find_iter(&text) {
        // keep the punctuation, drop the whitespace
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text-to-speech engine producing one audio file per call.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Extension of the files this engine writes (without dot).
    fn extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, output: &Path) -> WorkerResult<()>;
}

/// Runs an external TTS command as `<program> [args...] <output>` with the
/// sentence on stdin.
#[derive(Debug, Clone)]
pub struct CommandSpeechSynthesizer {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandSpeechSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: "mp3".to_string(),
        }
    }

    /// Parse a whitespace-separated command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSpeechSynthesizer {
    fn extension(&self) -> &str {
        &self.extension
    }

    async fn synthesize(&self, text: &str, output: &Path) -> WorkerResult<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WorkerError::narration_failed(format!("cannot run {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            return Err(WorkerError::narration_failed(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Probes narration clips and synthesizes new ones.
#[derive(Clone)]
pub struct NarrationProducer {
    prober: Arc<dyn Prober>,
    parallel: usize,
}

impl NarrationProducer {
    pub fn new(prober: Arc<dyn Prober>, parallel: usize) -> Self {
        Self {
            prober,
            parallel: parallel.max(1),
        }
    }

    /// Probe one clip; `None` when it is unreadable or carries no audio.
    async fn probe_input(&self, index: usize, input: NarrationInput) -> Option<NarrationSegment> {
        match self.prober.probe(&input.audio_path).await {
            Ok(info) if info.has_audio => Some(NarrationSegment::new(input.text, input.audio_path, info.duration)),
            Ok(_) => {
                warn!(index, path = %input.audio_path.display(), "Narration clip has no audio stream, skipping");
                None
            }
            Err(e) => {
                warn!(index, path = %input.audio_path.display(), error = %e, "Unreadable narration clip, skipping");
                None
            }
        }
    }

    /// Probe existing clips in order.
    pub async fn probe_inputs(&self, inputs: Vec<NarrationInput>) -> Vec<NarrationSegment> {
        let total = inputs.len();
        let segments: Vec<NarrationSegment> = stream::iter(inputs.into_iter().enumerate())
            .map(|(i, input)| self.probe_input(i, input))
            .buffered(self.parallel)
            .filter_map(|seg| async move { seg })
            .collect()
            .await;

        info!(total, usable = segments.len(), "Narration probed");
        segments
    }

    /// Load and probe every clip of a narration source.
    pub async fn load(&self, source: &dyn NarrationSource) -> WorkerResult<Vec<NarrationSegment>> {
        let inputs = source.segments().await?;
        Ok(self.probe_inputs(inputs).await)
    }

    /// Synthesize one clip per sentence of `script` into `out_dir`.
    ///
    /// Files are named `{stem}_sentence_{i}`. At most `parallel` sentences are
    /// synthesized at once; a failing sentence is skipped.
    pub async fn synthesize_script(
        &self,
        tts: &dyn SpeechSynthesizer,
        script: &str,
        out_dir: &Path,
        stem: &str,
    ) -> WorkerResult<Vec<NarrationSegment>> {
        let sentences = split_sentences(script);
        if sentences.is_empty() {
            return Err(WorkerError::narration_failed("script has no sentences"));
        }
        tokio::fs::create_dir_all(out_dir).await?;

        let produced: Vec<NarrationInput> = stream::iter(sentences.into_iter().enumerate())
            .map(|(i, text)| {
                let output: PathBuf = out_dir.join(format!("{}_sentence_{}.{}", stem, i, tts.extension()));
                async move {
                    match tts.synthesize(&text, &output).await {
                        Ok(()) => {
                            debug!(index = i, path = %output.display(), "Synthesized sentence");
                            Some(NarrationInput {
                                text,
                                audio_path: output,
                            })
                        }
                        Err(e) => {
                            warn!(index = i, error = %e, "Speech synthesis failed, skipping sentence");
                            None
                        }
                    }
                }
            })
            .buffered(self.parallel)
            .filter_map(|input| async move { input })
            .collect()
            .await;

        Ok(self.probe_inputs(produced).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_media::{MediaError, MediaInfo, MediaResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_split_sentences() {
        let script = "Hello world. Is this thing on?\nYes!It works.  Trailing words";
        assert_eq!(
            split_sentences(script),
            vec!["Hello world.", "Is this thing on?", "Yes!It works.", "Trailing words"]
        );
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn test_split_keeps_decimal_numbers() {
        assert_eq!(split_sentences("Pi is 3.14 roughly. Done."), vec!["Pi is 3.14 roughly.", "Done."]);
    }

    #[test]
    fn test_split_on_runs_of_punctuation_and_whitespace() {
        assert_eq!(
            split_sentences("Wait...   really?\t\tYes! \r\nOkay"),
            vec!["Wait...", "really?", "Yes!", "Okay"]
        );
    }

    /// Durations by file name; unknown files are unreadable.
    struct TableProber(HashMap<String, f64>);

    #[async_trait]
    impl Prober for TableProber {
        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            match self.0.get(&name) {
                Some(d) => Ok(MediaInfo {
                    duration: *d,
                    width: 0,
                    height: 0,
                    fps: 0.0,
                    codec: "mp3".into(),
                    has_video: false,
                    has_audio: true,
                    is_still: false,
                    size: 10_000,
                }),
                None => Err(MediaError::unreadable(path, "missing")),
            }
        }
    }

    fn prober(pairs: &[(&str, f64)]) -> Arc<dyn Prober> {
        Arc::new(TableProber(
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        ))
    }

    #[tokio::test]
    async fn test_unreadable_inputs_are_skipped_in_order() {
        let producer = NarrationProducer::new(prober(&[("a.mp3", 2.1), ("c.mp3", 1.8)]), 2);
        let inputs = vec![
            NarrationInput { text: "A.".into(), audio_path: "a.mp3".into() },
            NarrationInput { text: "B.".into(), audio_path: "b.mp3".into() },
            NarrationInput { text: "C.".into(), audio_path: "c.mp3".into() },
        ];

        let segments = producer.probe_inputs(inputs).await;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "A.");
        assert_eq!(segments[1].text, "C.");
        assert!((segments[1].duration() - 1.8).abs() < 1e-9);
    }

    /// Slower for earlier sentences, to shake out ordering bugs.
    struct ReverseSpeedTts {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for ReverseSpeedTts {
        async fn synthesize(&self, text: &str, _output: &Path) -> WorkerResult<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = 40u64.saturating_sub(text.len() as u64 * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if text.starts_with("Fail") {
                return Err(WorkerError::narration_failed("voice unavailable"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_synthesis_is_bounded_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let producer = NarrationProducer::new(
            prober(&[
                ("s_sentence_0.mp3", 1.0),
                ("s_sentence_1.mp3", 1.0),
                ("s_sentence_3.mp3", 1.0),
                ("s_sentence_4.mp3", 1.0),
            ]),
            2,
        );
        let tts = ReverseSpeedTts {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };

        let segments = producer
            .synthesize_script(&tts, "One. Two two. Fail here. Four four four. Five!", dir.path(), "s")
            .await
            .unwrap();

        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["One.", "Two two.", "Four four four.", "Five!"]);
        assert!(tts.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let producer = NarrationProducer::new(prober(&[]), 1);
        let tts = ReverseSpeedTts {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        assert!(producer.synthesize_script(&tts, "  ", dir.path(), "s").await.is_err());
    }
}
