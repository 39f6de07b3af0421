//! VoiceBridge relay daemon
//!
//! Runs the WebSocket bridge server plus the Unix-socket event intake. The
//! voice pipeline writes NDJSON events to the intake; connected clients
//! receive them as `voice_result` frames.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use voicebridge_relay::{BridgeServer, IngestServer, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "voicebridge-relay", version, about = "Voice-event bridge relay")]
struct Args {
    /// Listen address (overrides config)
    #[arg(long)]
    listen: Option<String>,

    /// Event-ingest socket path (overrides config)
    #[arg(long)]
    ingest_socket: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    info!("🎙️ Starting VoiceBridge relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RelayConfig::load().context("Failed to load configuration")?;
    info!("📋 Configuration loaded from {}", config.config_path.display());

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(ingest_socket) = args.ingest_socket {
        config.ingest_socket_path = ingest_socket;
    }

    let server = BridgeServer::new(config.clone());
    let addr = server.start().await.context("Failed to start bridge server")?;

    let ingest = IngestServer::bind(&config.ingest_socket_path, server.relay())
        .context("Failed to bind ingest socket")?;

    info!("🚀 VoiceBridge relay ready");
    info!("   Clients connect to ws://{}{}", addr, config.endpoint_path);
    info!("   Event source writes to {}", config.ingest_socket_path);

    tokio::select! {
        result = ingest.run() => {
            if let Err(e) = result {
                error!("Ingest server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    info!("🧹 Shutting down...");
    server.stop().await.context("Failed to stop bridge server")?;
    info!("👋 VoiceBridge relay stopped");

    Ok(())
}
