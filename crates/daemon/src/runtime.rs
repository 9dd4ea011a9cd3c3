use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::config::DaemonConfig;
use crate::host::FsWorkspace;
use crate::rpc::methods::RpcServerState;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::startup::DaemonPaths;

/// Command-line overrides for a standalone daemon.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub workspace_root: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

/// A daemon serving on a socket from inside another process.
pub struct EmbeddedDaemonHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl EmbeddedDaemonHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EmbeddedDaemonHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub async fn run_standalone(options: RuntimeOptions) -> Result<()> {
    let config = match &options.config_path {
        Some(path) => DaemonConfig::load_from(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => DaemonConfig::load(),
    };

    let workspace_root = options
        .workspace_root
        .clone()
        .or_else(|| config.workspace_root.clone())
        .context("no workspace root: pass --workspace-root or set `workspace_root` in config")?;
    if !workspace_root.is_dir() {
        bail!("workspace root `{}` is not a directory", workspace_root.display());
    }

    let mut paths = DaemonPaths::resolve()?;
    if let Some(socket_path) = options.socket_path {
        paths.socket_path = socket_path;
    }

    let host = Arc::new(FsWorkspace::new(&workspace_root));
    let bridge = Arc::new(Bridge::new(host, config.bridge_options()));
    info!(workspace_root = %workspace_root.display(), "workspace attached");

    run_standalone_with(paths, bridge).await
}

async fn run_standalone_with(paths: DaemonPaths, bridge: Arc<Bridge>) -> Result<()> {
    let listener = paths.bind().await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = RpcServerState::new(bridge).with_shutdown_notifier(shutdown_tx.clone());
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    info!(socket_path = %paths.socket_path.display(), "standalone daemon started");
    let result = serve_unix_until_shutdown(listener, state, shutdown_rx).await;
    paths.release();
    result.context("standalone daemon exited with error")
}

/// Serves `bridge` on `paths.socket_path` until the handle is shut down or
/// dropped.
pub async fn start_embedded(paths: DaemonPaths, bridge: Arc<Bridge>) -> Result<EmbeddedDaemonHandle> {
    let listener = paths.bind().await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = RpcServerState::new(bridge).with_shutdown_notifier(shutdown_tx.clone());
    let task = tokio::spawn(async move {
        if let Err(error) = serve_unix_until_shutdown(listener, state, shutdown_rx).await {
            warn!(?error, "embedded daemon server terminated unexpectedly");
        }
        paths.release();
    });

    Ok(EmbeddedDaemonHandle { shutdown_tx, task: Some(task) })
}
