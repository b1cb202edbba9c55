//! Faultline - programmable HTTP fault-injection and observability server
//!
//! Serves a hot-reloadable table of synthetic endpoint behaviors (fixed
//! errors, delays, intermittent-error patterns), accumulates per-endpoint
//! statistics and a bounded request history, and streams change events to
//! WebSocket subscribers.

use clap::Parser;
use faultline::FaultServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Programmable HTTP fault-injection and observability server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "FAULTLINE_CONFIG", default_value = "configs/default.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FAULTLINE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Launch the terminal dashboard instead of the server
    #[arg(long)]
    client: bool,

    /// WebSocket URL the dashboard connects to (implies --client)
    #[arg(long, value_name = "WS_URL")]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    if cli.client || cli.server.is_some() {
        anyhow::bail!(
            "the terminal dashboard ships as a separate front-end; this binary runs the server only"
        );
    }

    info!("Faultline v{} starting...", env!("CARGO_PKG_VERSION"));

    let server = Arc::new(FaultServer::new(cli.config));

    let interrupt_target = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            interrupt_target.stop();
        }
    });

    server.run().await?;
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}
