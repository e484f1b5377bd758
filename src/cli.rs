//! Command-line front end: drives a `SessionController` against still images.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    analytics::{emotion_distribution, hourly_heatmap, TRACKED_EMOTIONS},
    backend::{HttpBackend, InferenceBackend, OfflineBackend},
    frame::{FrameSource, PhotoSource, StillFileSource},
    models::{EmotionObservation, ObservationType},
    session::{SessionController, SessionEvent},
    settings::{InferenceMethod, PipelineSettings, SettingsStore},
    utils,
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "cli";

use crate::{log_error, log_info};

const DEFAULT_CONFIG_FILE: &str = "emotion-sense.json";

#[derive(Parser)]
#[command(name = "emotion-sense")]
#[command(about = "Customer emotion capture against a remote inference service", long_about = None)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Candidate backend URL, probed in the order given (repeatable)
    #[arg(long = "backend-url", value_name = "URL")]
    backend_urls: Vec<String>,

    /// Inference method passed to the backend (fer, deepface, huggingface)
    #[arg(short, long)]
    method: Option<InferenceMethod>,

    /// Use the built-in simulated backend instead of the network
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the backend candidates and sync history
    Check,

    /// Analyze one image
    Analyze {
        image: PathBuf,

        /// entry, exit or ambient
        #[arg(short, long, default_value = "ambient")]
        kind: String,
    },

    /// Capture entry and exit images, then compare them
    Journey { entry: PathBuf, exit: PathBuf },

    /// Auto-capture from a snapshot file that another process keeps updating
    Watch {
        image: PathBuf,

        #[arg(short, long, default_value = "15")]
        seconds: u64,
    },

    /// Show the synced history with hourly and per-emotion breakdowns
    History {
        #[arg(long)]
        json: bool,
    },

    /// Print effective settings, optionally saving them to the config file
    Config {
        #[arg(long)]
        save: bool,
    },
}

/// Entry point for the binary.
pub fn run() {
    utils::logging::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log_error!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(execute(cli)) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

struct Pipeline {
    controller: SessionController,
    /// Set in offline mode so captures land in the simulated remote log.
    offline: Option<Arc<OfflineBackend>>,
    jpeg_quality: u8,
}

impl Pipeline {
    fn build(settings: &PipelineSettings, offline: bool) -> Result<Self> {
        let (backend, offline): (Arc<dyn InferenceBackend>, _) = if offline {
            let backend = Arc::new(OfflineBackend::new().with_realistic_latency());
            let shared: Arc<dyn InferenceBackend> = backend.clone();
            (shared, Some(backend))
        } else {
            let backend = HttpBackend::new(settings.request_timeout(), settings.probe_timeout())?;
            (Arc::new(backend), None)
        };

        let controller = SessionController::new(backend, settings);
        spawn_notice_printer(&controller);

        Ok(Self {
            controller,
            offline,
            jpeg_quality: settings.jpeg_quality,
        })
    }

    async fn connect(&self) -> Result<()> {
        if !self.controller.start().await {
            bail!("no inference backend reachable");
        }
        Ok(())
    }

    async fn open_photo(&self, path: PathBuf) -> Result<Arc<PhotoSource>> {
        let photo = PhotoSource::open(path, self.jpeg_quality).await?;
        Ok(Arc::new(photo))
    }

    async fn capture(&self, path: PathBuf, kind: ObservationType) -> Result<EmotionObservation> {
        let photo = self.open_photo(path).await?;
        let observation = match kind {
            ObservationType::Ambient => {
                let frame = photo.current_frame().await?;
                self.controller.detect_photo(frame).await?
            }
            ObservationType::Entry => {
                self.controller.select_frame_source(photo).await;
                self.controller.capture_entry().await?
            }
            ObservationType::Exit => {
                self.controller.select_frame_source(photo).await;
                self.controller.capture_exit().await?
            }
        }
        .ok_or_else(|| anyhow!("another inference is still in flight"))?;

        if let Some(offline) = &self.offline {
            if kind.is_checkpoint() {
                offline.record(&observation);
            }
        }
        Ok(observation)
    }

    async fn print_snapshot(&self) -> Result<()> {
        let snapshot = self.controller.snapshot().await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}

fn spawn_notice_printer(controller: &SessionController) {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Notice(notice)) => {
                    let marker = if notice.destructive { "!" } else { "-" };
                    eprintln!("{marker} {}: {}", notice.title, notice.description);
                }
                Ok(SessionEvent::UnhappyExit { emotion }) => {
                    eprintln!("! ALERT: unhappy customer leaving ({emotion})");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn load_settings(cli: &Cli) -> Result<(SettingsStore, PipelineSettings)> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let store = SettingsStore::new(path)?;

    let mut settings = store.effective();
    if !cli.backend_urls.is_empty() {
        settings.backend_urls = cli.backend_urls.clone();
    }
    if let Some(method) = cli.method {
        settings.method = method;
    }
    Ok((store, settings))
}

async fn execute(cli: Cli) -> Result<()> {
    let (store, settings) = load_settings(&cli)?;

    if let Commands::Config { save } = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        if save {
            store.update(settings)?;
            log_info!("settings saved");
        }
        return Ok(());
    }

    let pipeline = Pipeline::build(&settings, cli.offline)?;
    let result = dispatch(&pipeline, cli.command).await;
    pipeline.controller.shutdown().await;
    result
}

async fn dispatch(pipeline: &Pipeline, command: Commands) -> Result<()> {
    let controller = &pipeline.controller;

    match command {
        Commands::Check => {
            let connected = controller.retry_connection().await;
            let snapshot = controller.snapshot().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "connected": connected,
                    "backendUrl": snapshot.state.backend_url,
                    "historyLength": snapshot.state.history.len(),
                }))?
            );
            if !connected {
                bail!("no inference backend reachable");
            }
        }

        Commands::Analyze { image, kind } => {
            let kind = ObservationType::parse(&kind)
                .ok_or_else(|| anyhow!("unknown kind '{kind}' (expected entry, exit or ambient)"))?;
            pipeline.connect().await?;
            pipeline.capture(image, kind).await?;
            pipeline.print_snapshot().await?;
        }

        Commands::Journey { entry, exit } => {
            pipeline.connect().await?;
            pipeline
                .capture(entry, ObservationType::Entry)
                .await
                .context("entry capture failed")?;
            pipeline
                .capture(exit, ObservationType::Exit)
                .await
                .context("exit capture failed")?;
            controller.compare_satisfaction().await?;
            pipeline.print_snapshot().await?;
        }

        Commands::Watch { image, seconds } => {
            pipeline.connect().await?;
            let source = StillFileSource::new(image, pipeline.jpeg_quality);
            controller.select_frame_source(Arc::new(source)).await;
            controller.set_auto_capture(true).await?;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => log_info!("interrupted"),
            }
            controller.set_auto_capture(false).await?;
            pipeline.print_snapshot().await?;
        }

        Commands::History { json } => {
            pipeline.connect().await?;
            let history = controller.snapshot().await.state.history;
            let distribution = emotion_distribution(&history);
            let heatmap = hourly_heatmap(&history, &Local);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "history": history,
                        "distribution": distribution,
                        "heatmap": heatmap,
                    }))?
                );
                return Ok(());
            }

            println!(
                "{} observations, {:.1}% happy, {} unhappy exits",
                distribution.total, distribution.happy_percent, distribution.unhappy_exits
            );
            for share in &distribution.shares {
                println!("  {:<10} {:>4} {:>6.1}%", share.emotion, share.count, share.percent);
            }
            println!("hour  {}", TRACKED_EMOTIONS.join(" "));
            for row in heatmap.iter().filter(|row| row.total() > 0) {
                let cells: Vec<String> = TRACKED_EMOTIONS
                    .iter()
                    .zip(row.counts.iter())
                    .map(|(name, count)| format!("{count:>width$}", width = name.len()))
                    .collect();
                println!("{}:00 {}", row.hour, cells.join(" "));
            }
        }

        // handled in execute() before any backend is built
        Commands::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse() {
        let cli = Cli::try_parse_from([
            "emotion-sense",
            "--backend-url",
            "http://a:8000",
            "--backend-url",
            "http://b:8000",
            "--method",
            "fer",
            "--offline",
            "analyze",
            "face.jpg",
            "--kind",
            "exit",
        ])
        .unwrap();

        assert_eq!(cli.backend_urls, vec!["http://a:8000", "http://b:8000"]);
        assert_eq!(cli.method, Some(InferenceMethod::Fer));
        assert!(cli.offline);
        assert!(matches!(cli.command, Commands::Analyze { ref kind, .. } if kind == "exit"));
    }

    #[test]
    fn flags_override_file_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "method": "huggingface", "jpeg_quality": 60 }"#).unwrap();

        let cli = Cli::try_parse_from([
            "emotion-sense",
            "--config",
            path.to_str().unwrap(),
            "--backend-url",
            "http://edge:9000",
            "history",
        ])
        .unwrap();
        let (_, settings) = load_settings(&cli).unwrap();

        assert_eq!(settings.backend_urls, vec!["http://edge:9000"]);
        assert_eq!(settings.method, InferenceMethod::Huggingface);
        assert_eq!(settings.jpeg_quality, 60);
    }
}
