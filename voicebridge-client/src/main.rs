//! VoiceBridge automation client
//!
//! Connects to a relay and injects incoming voice events into the local
//! desktop session.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use voicebridge_client::{BridgeClient, ClientConfig, DesktopInjector, Dispatcher};
use voicebridge_protocol::ClientMode;

#[derive(Parser, Debug)]
#[command(name = "voicebridge-client", version, about = "Voice-event bridge client")]
struct Args {
    /// Bridge server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Client mode: type, command, or both (overrides config)
    #[arg(long)]
    mode: Option<String>,

    /// Exit instead of reconnecting when the connection drops
    #[arg(long)]
    no_reconnect: bool,

    /// Delay between injected keystrokes in milliseconds (overrides config)
    #[arg(long)]
    typing_delay: Option<u64>,

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

    info!("🖥️ Starting VoiceBridge client v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    info!("📋 Configuration loaded from {}", config.config_path.display());

    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(mode) = args.mode {
        config.mode = ClientMode::from_str(&mode)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("Invalid --mode")?;
    }
    if args.no_reconnect {
        config.auto_reconnect = false;
    }
    if let Some(typing_delay) = args.typing_delay {
        config.typing_delay_ms = typing_delay;
    }

    let injector =
        DesktopInjector::new(config.typing_delay_ms).context("No usable injection backend")?;
    info!("⌨️ Injection backend: {:?}", injector.display_server());

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(injector),
        config.mode,
        config.max_text_len,
        config.actions.clone(),
    ));
    let client = Arc::new(BridgeClient::new(config, dispatcher));

    let mut runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    tokio::select! {
        result = &mut runner => {
            result.context("Client task panicked")?.context("Client exited with error")?;
            info!("👋 VoiceBridge client stopped");
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    client.stop();
    runner
        .await
        .context("Client task panicked")?
        .context("Client exited with error")?;

    info!("👋 VoiceBridge client stopped");
    Ok(())
}
