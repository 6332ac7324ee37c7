//! Output Bridge - drives a media engine's outputs from another process.
//!
//! The bridge owns the streaming, recording and replay buffer outputs of a
//! native capture engine, provisions their encoders from the basic
//! configuration, and relays the engine's output signals to the caller.

pub mod commands;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod output;
pub mod service;
pub mod session;
pub mod signals;
pub mod utils;
pub mod video;

use anyhow::Context;
use commands::ServiceBridge;
use engine::{MediaEngine, SimulatedEngine};
use session::Session;
use signals::SignalRelay;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the configuration directory
pub const CONFIG_DIR_ENV: &str = "OUTPUT_BRIDGE_CONFIG_DIR";

/// Run the bridge over stdin/stdout until the caller closes its end
pub async fn run() -> anyhow::Result<()> {
    // stdout carries replies, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "output_bridge=debug,output_bridge_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Output Bridge v{}", env!("CARGO_PKG_VERSION"));

    let config_dir = std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory {:?}", config_dir))?;

    let engine: Arc<dyn MediaEngine> = Arc::new(SimulatedEngine::new());
    let relay = Arc::new(SignalRelay::new());
    let session = Session::open(engine, &config_dir, relay.clone())
        .with_context(|| format!("opening session in {:?}", config_dir))?;
    let bridge = Arc::new(ServiceBridge::new(session, relay));

    commands::transport::serve(
        bridge.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("serving requests")?;

    bridge.shutdown();
    tracing::info!("Output Bridge stopped");
    Ok(())
}
