//! SignLens - Webcam sign-language letter recognition
//!
//! Captures the camera, tracks one hand, and streams square crops of it to a
//! letter prediction service, showing the latest answer over a mirrored preview.

mod app;
mod capture;
mod config;
mod inference;
mod pipeline;
mod preview;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::CaptureSession;
use crate::capture::{list_cameras, replay_factory, webcam_factory, CaptureConfig};
use crate::config::AppConfig;
use crate::inference::{HttpPredictor, Predictor};
use crate::vision::HandLandmarker;

/// SignLens - sign-language letter recognition from a webcam
#[derive(Parser, Debug)]
#[command(name = "signlens")]
#[command(about = "Crops your hand from the webcam and asks a prediction service which letter it signs")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera index, overriding the configuration
    #[arg(long)]
    camera: Option<u32>,

    /// Replay a directory of images instead of opening a camera
    #[arg(long, value_name = "DIR")]
    replay: Option<PathBuf>,

    /// Prediction endpoint, overriding the configuration
    #[arg(long, value_name = "URL")]
    predictor_url: Option<String>,

    /// Run without the preview window (stop with Ctrl+C)
    #[arg(long)]
    headless: bool,

    /// List available cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Write the effective configuration and exit
    #[arg(long)]
    save_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.list_cameras {
        let cameras = list_cameras()?;
        println!("Available cameras:");
        if cameras.is_empty() {
            println!("  No cameras detected");
        }
        for camera in &cameras {
            println!("  [{}] {} - {}", camera.index, camera.name, camera.description);
        }
        return Ok(());
    }

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };
    let mut config = load_or_create_config(&config_path);
    apply_overrides(&mut config, &args);

    if args.save_config {
        config::save_config(&config, &config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    info!("SignLens starting...");

    let landmarker = HandLandmarker::from_settings(&config.landmarks)
        .context("Failed to initialize the hand landmark model")?;
    let http = HttpPredictor::from_settings(&config.predictor)?;
    info!("Sending crops to {}", http.url());
    let predictor: Arc<dyn Predictor> = Arc::new(http);

    let source = match &args.replay {
        Some(dir) => replay_factory(dir.clone(), config.camera.fps),
        None => webcam_factory(CaptureConfig::from(&config.camera)),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    if args.headless {
        let mut session = CaptureSession::start(
            &config,
            runtime.handle(),
            source,
            Box::new(landmarker),
            predictor,
            None,
        )?;

        info!("Running headless (press Ctrl+C to stop)");
        let source_stopped = runtime.block_on(async {
            let mut check = tokio::time::interval(Duration::from_millis(250));
            loop {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for Ctrl+C: {}", e);
                        }
                        break false;
                    }
                    _ = check.tick() => {
                        if !session.is_running() {
                            break true;
                        }
                    }
                }
            }
        });
        session.shutdown();

        if source_stopped {
            if let Some(error) = session.state().read().last_error() {
                anyhow::bail!("{}", error);
            }
        }
    } else {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let mut session = CaptureSession::start(
            &config,
            runtime.handle(),
            source,
            Box::new(landmarker),
            predictor,
            Some(tx),
        )?;

        if let Err(e) = preview::run_preview(rx, session.state(), session.queue().clone()) {
            error!("Preview window error: {}", e);
        }
        session.shutdown();
    }

    info!("SignLens shutdown complete");

    Ok(())
}

/// Load configuration from file, falling back to defaults
fn load_or_create_config(path: &std::path::Path) -> AppConfig {
    if path.exists() {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => warn!("Ignoring invalid configuration: {:#}", e),
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    if let Some(url) = &args.predictor_url {
        config.predictor.url = url.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "signlens",
            "--camera",
            "2",
            "--predictor-url",
            "http://10.0.0.5:9000/predict",
            "--headless",
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args);

        assert!(args.headless);
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.predictor.url, "http://10.0.0.5:9000/predict");
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "camera = [").unwrap();

        let config = load_or_create_config(file.path());
        assert_eq!(config.predictor.url, config::DEFAULT_PREDICTOR_URL);
    }
}
