// padsyncd: standalone bridge daemon.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use padsync_daemon::runtime::{run_standalone, RuntimeOptions};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "padsyncd", version, about = "Bridge collaborative pads to a workspace")]
struct Cli {
    /// Directory whose files back content pads.
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Unix socket to serve JSON-RPC on (default `~/.padsync/daemon.sock`).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Config file (default `~/.padsync/config.toml`).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("starting padsync daemon");
    run_standalone(RuntimeOptions {
        workspace_root: cli.workspace_root,
        socket_path: cli.socket,
        config_path: cli.config,
    })
    .await
    .context("padsync daemon terminated unexpectedly")
}
