mod logging;
mod synth;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use waterfall_stream::{ClientEvent, StreamClient, StreamConfig};

use logging::{LogConfig, LogLevel};
use synth::Waterfall;

#[derive(Parser, Debug)]
#[command(name = "waterfall-feed")]
#[command(about = "Streams a synthetic waterfall to a visualization endpoint")]
struct Cli {
    /// Endpoint to stream to (ws:// or wss://)
    #[arg(long, env = "WATERFALL_URL", default_value = "ws://127.0.0.1:8073/waterfall")]
    url: String,

    #[arg(long, env = "WATERFALL_CALLSIGN", default_value = "N0CALL")]
    callsign: String,

    #[arg(long, env = "WATERFALL_MODE", default_value = "USB")]
    mode: String,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 400)]
    height: u32,

    /// Milliseconds between rows
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Stop after this many rows (runs until interrupted when omitted)
    #[arg(long)]
    rows: Option<u64>,

    /// Seconds to wait for the endpoint to accept the connection
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(&LogConfig {
        level: cli.log_level,
        file: cli.log_file.clone(),
    })?;

    if cli.height == 0 {
        bail!("--height must be greater than zero");
    }

    let connect_timeout = Duration::from_secs(cli.connect_timeout);
    let config = StreamConfig::default().with_connect_timeout(connect_timeout);
    let client = StreamClient::with_config(config).context("starting stream client")?;
    let mut events = client.subscribe();

    client.open(&cli.url);
    let outcome = match wait_connected(&mut events, connect_timeout + Duration::from_secs(1)).await
    {
        Ok(()) => stream(&cli, &client, &mut events).await,
        Err(err) => Err(err),
    };

    // Joining the worker blocks; keep it off the async executor.
    tokio::task::spawn_blocking(move || client.shutdown()).await?;
    outcome
}

async fn wait_connected(
    events: &mut broadcast::Receiver<ClientEvent>,
    timeout: Duration,
) -> Result<()> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Connected) => return Ok(()),
                Ok(ClientEvent::Error(reason)) => return Err(anyhow!("connect failed: {reason}")),
                Ok(ClientEvent::Disconnected) => return Err(anyhow!("endpoint hung up")),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(anyhow!("stream worker stopped")),
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| anyhow!("no connection after {timeout:?}"))?
}

async fn stream(
    cli: &Cli,
    client: &StreamClient,
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<()> {
    info!(url = %cli.url, callsign = %cli.callsign, mode = %cli.mode, "connected; streaming");
    client.send_init(&cli.callsign, &cli.mode, cli.width, cli.height);

    let mut waterfall = Waterfall::new(cli.width, cli.seed);
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut y = 0u32;
    let mut sent = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!(sent, "interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(ClientEvent::Disconnected) => bail!("endpoint hung up after {sent} rows"),
                Ok(ClientEvent::Error(reason)) => bail!("stream failed after {sent} rows: {reason}"),
                Ok(ClientEvent::Connected) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed lifecycle events"),
                Err(RecvError::Closed) => bail!("stream worker stopped"),
            },
            _ = ticker.tick() => {
                client.send_row(y, &waterfall.next_row());
                y = (y + 1) % cli.height;
                sent += 1;
                if cli.rows.is_some_and(|limit| sent >= limit) {
                    info!(sent, "row limit reached");
                    return Ok(());
                }
            }
        }
    }
}
