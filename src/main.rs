//! OCR Classifier - text presence detection service
//!
//! Serves the classifier over HTTP, or classifies files given on the
//! command line and prints one JSON line per file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ocr_classifier::config::{self, AppConfig};
use ocr_classifier::vision::{Classifier, OcrEngine, TesseractEngine};

/// OCR Classifier - detects readable text in images
#[derive(Parser, Debug)]
#[command(name = "ocr-classifier")]
#[command(about = "Estimates whether an image contains readable text")]
struct Args {
    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Classify image files and print one JSON line per file
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if let Command::InitConfig { force } = args.command {
        return init_config(args.config, force);
    }

    let mut config = load_or_default_config(args.config.as_deref())?;
    config::apply_env_overrides(&mut config);

    let engine = TesseractEngine::new(&config.ocr.language, config.ocr.granularity)
        .context("Failed to initialise OCR engine")?;
    info!("Using OCR engine: {} ({})", engine.name(), engine.language());
    let engine: Arc<dyn OcrEngine> = Arc::new(engine);
    let classifier = Arc::new(Classifier::from_config(engine, &config));
    let search = classifier.search_config();
    info!(
        "Rotation search: {} angles on {} workers, accept at {:.2}",
        search.candidate_angles.len(),
        search.worker_count,
        search.acceptance_threshold
    );

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(ocr_classifier::server::serve(classifier, &config.server))
        }
        Command::Classify { files } => {
            classify_files(&classifier, &files);
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn init_config(explicit: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    if config::write_default_config(&path, force)? {
        info!("Wrote default configuration to {:?}", path);
    } else {
        warn!("{:?} already exists, use --force to replace it", path);
    }
    Ok(())
}

/// Load configuration from the given path, the default location, or defaults
fn load_or_default_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = config::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn classify_files(classifier: &Classifier, files: &[PathBuf]) {
    for path in files {
        let file = path.display().to_string();
        let line = match std::fs::read(path) {
            Ok(data) => match classifier.detect_text(&data) {
                Ok(result) => serde_json::json!({ "file": file, "result": result }),
                Err(e) => serde_json::json!({ "file": file, "error": e.to_string() }),
            },
            Err(e) => serde_json::json!({ "file": file, "error": e.to_string() }),
        };
        println!("{line}");
    }
}
