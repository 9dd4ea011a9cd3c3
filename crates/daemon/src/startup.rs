// Where a daemon lives on disk: state directory, socket, PID file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

const SOCKET_NAME: &str = "daemon.sock";
const PID_FILE_NAME: &str = "daemon.pid";

/// Runtime files of one daemon instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Informational; nothing reads it back.
    pub pid_path: PathBuf,
}

impl DaemonPaths {
    /// `~/.padsync/`, created owner-only if missing.
    pub fn resolve() -> Result<Self> {
        let base_dir = crate::config::global_dir().context("could not determine home directory")?;
        Self::under(base_dir)
    }

    pub fn under(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create `{}`", base_dir.display()))?;
        restrict_dir_to_owner(&base_dir)
            .with_context(|| format!("failed to restrict `{}`", base_dir.display()))?;
        Ok(Self {
            socket_path: base_dir.join(SOCKET_NAME),
            pid_path: base_dir.join(PID_FILE_NAME),
            base_dir,
        })
    }

    /// Takes over the socket and records our PID.
    ///
    /// A socket file nobody answers on is left over from a crashed daemon
    /// and gets replaced. One that still answers belongs to a live daemon,
    /// so binding fails instead of orphaning it.
    pub async fn bind(&self) -> Result<UnixListener> {
        if is_daemon_running(&self.socket_path).await {
            bail!("another daemon is already serving on `{}`", self.socket_path.display());
        }
        match fs::remove_file(&self.socket_path) {
            Ok(()) => info!(path = %self.socket_path.display(), "removed stale socket"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error).context("failed to remove stale socket"),
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("failed to bind `{}`", self.socket_path.display()))?;
        restrict_file_to_owner(&self.socket_path).context("failed to restrict socket")?;

        let pid = std::process::id();
        fs::write(&self.pid_path, format!("{pid}\n")).context("failed to write PID file")?;
        restrict_file_to_owner(&self.pid_path).context("failed to restrict PID file")?;
        info!(pid, socket = %self.socket_path.display(), "daemon socket ready");
        Ok(listener)
    }

    /// Removes the socket and PID file. Missing files are fine.
    pub fn release(&self) {
        for path in [&self.socket_path, &self.pid_path] {
            if let Err(error) = fs::remove_file(path) {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), %error, "failed to remove daemon file");
                }
            }
        }
    }
}

/// True when something accepts connections on the socket.
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    UnixStream::connect(socket_path).await.is_ok()
}

pub fn restrict_file_to_owner(path: &Path) -> std::io::Result<()> {
    set_mode(path, 0o600)
}

pub fn restrict_dir_to_owner(path: &Path) -> std::io::Result<()> {
    set_mode(path, 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = fs::metadata(path)?.permissions();
    if permissions.mode() & 0o777 == mode {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
