//! # vox
//!
//! Speech recognition gateway binary: serves the recognition endpoint, or
//! sends one audio file to a running gateway.

#![deny(unsafe_code)]

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use vox_client::{DEFAULT_LANGUAGE, RecognitionClient};
use vox_recognition::{AzureSpeechEngine, Recognizer};
use vox_server::{ServerConfig, ShutdownOutcome, VoxServer};
use vox_settings::{SpeechSettings, VoxSettings};

/// Speech recognition gateway.
#[derive(Parser, Debug)]
#[command(name = "vox", about = "Speech recognition gateway", version)]
struct Cli {
    /// Settings file (defaults to `$VOX_SETTINGS` or `~/.vox/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /api/recognize/audio`.
    Serve(ServeArgs),
    /// Send an audio file to a running gateway and print the transcript.
    Recognize(RecognizeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Maximum concurrent recognition sessions (overrides settings).
    #[arg(long)]
    max_concurrency: Option<usize>,
}

impl ServeArgs {
    fn apply(&self, settings: &mut VoxSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_concurrency {
            settings.speech.max_concurrency = max;
        }
    }
}

#[derive(Args, Debug)]
struct RecognizeArgs {
    /// Audio file to send.
    #[arg(long)]
    file: PathBuf,

    /// Gateway base URL.
    #[arg(long, default_value = "http://localhost")]
    url: String,

    /// Language tag.
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    lang: String,
}

fn load(config: Option<&Path>) -> Result<VoxSettings> {
    let path = config.map_or_else(vox_settings::settings_path, Path::to_path_buf);
    vox_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn build_engine(speech: &SpeechSettings) -> AzureSpeechEngine {
    match &speech.endpoint {
        Some(endpoint) => AzureSpeechEngine::with_endpoint(speech.subscription_key.clone(), endpoint.clone()),
        None => AzureSpeechEngine::new(speech.subscription_key.clone(), &speech.region),
    }
}

fn build_recognizer(speech: &SpeechSettings) -> Recognizer {
    Recognizer::new(
        Arc::new(build_engine(speech)),
        speech.max_concurrency,
        Duration::from_secs(speech.timeout_secs),
    )
}

async fn serve(mut settings: VoxSettings, args: &ServeArgs) -> Result<()> {
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    let recognizer = Arc::new(build_recognizer(&settings.speech));
    let metrics = vox_server::metrics::install_recorder().context("Failed to install metrics recorder")?;
    let server = VoxServer::new(ServerConfig::from_settings(&settings), recognizer).with_metrics(metrics);

    let handle = server.listen().await.context("Failed to bind server")?;
    info!(
        addr = %handle.local_addr(),
        max_concurrency = settings.speech.max_concurrency,
        timeout_secs = settings.speech.timeout_secs,
        "vox listening"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("shutting down");
    match server.graceful_shutdown(handle, None).await {
        ShutdownOutcome::Drained => info!("shutdown complete"),
        ShutdownOutcome::TimedOut { abandoned_sessions } => {
            warn!(abandoned_sessions, "shutdown complete with sessions still running");
        }
    }
    Ok(())
}

async fn recognize(args: &RecognizeArgs) -> Result<()> {
    let audio = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let client = RecognitionClient::new(args.url.clone());
    let text = client
        .recognize_audio(Bytes::from(audio), &args.lang)
        .await
        .context("Recognition failed")?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.config.as_deref())?;
    logging::init_subscriber(&settings.logging.level, settings.logging.format);

    match &cli.command {
        Command::Serve(args) => serve(settings, args).await,
        Command::Recognize(args) => recognize(args).await,
    }
}
