//! Render worker binary: composes one job from a JSON manifest.
//!
//! Usage: `reelforge-worker <manifest.json>`

use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use reelforge_media::{check_ffmpeg, check_ffprobe, FfprobeProber, Prober};
use reelforge_models::JobStatus;
use reelforge_worker::logging::init_tracing;
use reelforge_worker::metrics::init_prometheus;
use reelforge_worker::{
    CommandSpeechSynthesizer, ComposerConfig, InMemoryJobStore, JobManifest, LocalAssetLibrary,
    NarrationProducer, RenderPipeline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let manifest_path: PathBuf = match std::env::args_os().nth(1) {
        Some(p) => p.into(),
        None => bail!("usage: reelforge-worker <manifest.json>"),
    };

    info!("Starting reelforge-worker");

    let config = ComposerConfig::from_env();
    info!("Composer config: {:?}", config);

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().context("METRICS_ADDR is not a socket address")?;
        init_prometheus(addr)?;
        info!(%addr, "Serving Prometheus metrics");
    }

    check_ffmpeg()?;
    check_ffprobe()?;

    let manifest = JobManifest::load(&manifest_path).await?;
    let ctx = manifest.context();
    let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new());
    let producer = NarrationProducer::new(prober.clone(), config.narration_parallel);

    let segments = if manifest.needs_speech() {
        let command = config
            .tts_command
            .as_deref()
            .and_then(CommandSpeechSynthesizer::from_command_line)
            .context("manifest has no narration segments and REELFORGE_TTS_COMMAND is not set")?;
        let out_dir = config.output_dir.join(ctx.job_id.as_str()).join("narration");
        producer
            .synthesize_script(&command, &manifest.script_text, &out_dir, ctx.script_id.as_str())
            .await?
    } else {
        producer.load(&manifest.narration()).await?
    };
    if segments.is_empty() {
        warn!(job_id = %ctx.job_id, "No usable narration");
    }

    let store = Arc::new(InMemoryJobStore::new());
    let pipeline = RenderPipeline::from_config(
        &config,
        prober,
        Arc::new(LocalAssetLibrary::new(&manifest.asset_library)),
        store,
    );

    let outcome = pipeline
        .run(&ctx, segments, manifest.background_music.clone())
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome.result)?);

    if outcome.status != JobStatus::Done {
        bail!(
            "render failed: {}",
            outcome.result.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(sidecar) = &outcome.sidecar_path {
        info!(sidecar = %sidecar.display(), "Worker finished");
    }
    Ok(())
}
