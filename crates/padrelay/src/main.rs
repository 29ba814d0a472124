use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use padrelay::RelayServer;
use padrelay::room::RoomConfig;

/// Netplay input relay
#[derive(Parser, Debug)]
#[command(name = "padrelay")]
#[command(about = "Input relay and registration server for emulator netplay", long_about = None)]
struct Args {
    /// Address to bind the room sockets to (overrides the config file)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Port shared by the UDP and TCP sockets. 0 picks a free port.
    #[arg(short, long, default_value = "45000")]
    port: u16,

    /// Number of players the room waits for before sharing registrations
    #[arg(short, long)]
    clients: Option<usize>,

    /// JSON room configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RoomConfig> {
    let Some(path) = path else {
        return Ok(RoomConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut builder = RelayServer::builder()
        .config(load_config(args.config.as_ref())?)
        .port(args.port);
    if let Some(ip) = args.bind {
        builder = builder.bind(ip);
    }
    if let Some(count) = args.clients {
        builder = builder.expected_clients(count);
    }

    let server = builder.build().await?;
    info!(port = server.port(), "padrelay listening");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    Ok(())
}
