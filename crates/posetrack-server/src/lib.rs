//! PoseTrack server application
//!
//! Loads configuration, builds the landmark source and runs the tracking
//! server until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use posetrack_core::config::PoseTrackConfig;
use posetrack_core::demo::DemoSource;
use posetrack_core::server::{SourceFactory, TrackingServer};
use posetrack_core::source::LandmarkSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::bytes::Bytes;
use tracing_subscriber::EnvFilter;

/// Build identifier: `YYYY.MM.DD` with `+g<short-sha>` when known
pub const BUILD_ID: &str = env!("POSETRACK_BUILD_ID");

/// Command line options
#[derive(Debug, Default, Clone, PartialEq, Parser)]
#[command(name = "posetrack-server", version, about = "Arm-curl pose tracking server")]
pub struct Options {
    /// Config file; defaults to the per-user config location
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JPEG shown on the live feed while the demo source runs
    #[arg(long, value_name = "PATH")]
    pub placeholder_jpeg: Option<PathBuf>,

    /// Write the effective configuration back to the config file and exit
    #[arg(long)]
    pub write_config: bool,
}

/// Install the global tracing subscriber (`RUST_LOG`, default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve and load the configuration, then apply environment overrides
pub fn load_config(options: &Options) -> anyhow::Result<(PoseTrackConfig, PathBuf)> {
    let path = match &options.config {
        Some(path) => path.clone(),
        None => PoseTrackConfig::default_path().context("no config path given")?,
    };

    let mut config = PoseTrackConfig::load_or_default(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    config.validate().context("invalid configuration")?;
    Ok((config, path))
}

fn demo_factory(frame_interval_ms: u64, placeholder: Option<Bytes>) -> SourceFactory {
    Arc::new(move || {
        let source = DemoSource::new(frame_interval_ms);
        let source = match &placeholder {
            Some(image) => source.with_image(image.clone()),
            None => source,
        };
        Box::new(source) as Box<dyn LandmarkSource>
    })
}

/// Run the server until Ctrl-C
pub async fn run(options: Options) -> anyhow::Result<()> {
    tracing::info!("PoseTrack server {} (build {})", posetrack_core::VERSION, BUILD_ID);

    let (config, path) = load_config(&options)?;
    if options.write_config {
        config
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let placeholder = match &options.placeholder_jpeg {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            Some(Bytes::from(bytes))
        }
        None => {
            tracing::info!("No placeholder image; the video feed stays empty in demo mode");
            None
        }
    };

    let factory = demo_factory(config.tracking.frame_interval_ms, placeholder);
    let server = TrackingServer::new(config, factory);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutting down"),
            Err(e) => tracing::warn!("Ctrl-C handler failed: {}", e),
        }
        shutdown.cancel();
    });

    server.run().await.context("tracking server failed")?;
    Ok(())
}
