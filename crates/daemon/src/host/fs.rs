use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use padsync_common::path::{components, normalize_resource_path};
use uuid::Uuid;

use super::{HostError, ResourceHost, ResourceKind};

/// A workspace rooted at a local directory. Resource `/demo/A.java` maps to
/// `<root>/demo/A.java`.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a resource path onto disk. Components were already stripped of
    /// `.` and `..` by normalization; symlinks leaving the root are caught
    /// after canonicalization.
    fn locate(&self, path: &str) -> Result<PathBuf, HostError> {
        let normalized = normalize_resource_path(path)?;
        let mut local = self.root.clone();
        for component in components(&normalized) {
            local.push(component);
        }

        let canonical = local.canonicalize().map_err(|error| HostError::io("resolve", path, error))?;
        let root = self.root.canonicalize().map_err(|error| HostError::io("resolve", path, error))?;
        if !canonical.starts_with(&root) {
            return Err(HostError::OutsideWorkspace(path.to_string()));
        }
        Ok(canonical)
    }
}

impl ResourceHost for FsWorkspace {
    fn resolve(&self, path: &str) -> Result<ResourceKind, HostError> {
        let local = self.locate(path)?;
        let metadata = fs::metadata(&local).map_err(|error| HostError::io("stat", path, error))?;
        Ok(if metadata.is_dir() { ResourceKind::Folder } else { ResourceKind::File })
    }

    fn read_document(&self, path: &str) -> Result<String, HostError> {
        let local = self.locate(path)?;
        let bytes = fs::read(&local).map_err(|error| HostError::io("read", path, error))?;
        String::from_utf8(bytes).map_err(|_| HostError::NotUtf8(path.to_string()))
    }

    fn write_document(&self, path: &str, text: &str) -> Result<(), HostError> {
        let target = self.locate(path)?;
        let metadata = fs::metadata(&target).map_err(|error| HostError::io("stat", path, error))?;
        if metadata.is_dir() {
            return Err(HostError::NotAFile(path.to_string()));
        }

        let tmp_path = temp_path_for(&target);
        let result = write_staged(&tmp_path, text, metadata.permissions())
            .and_then(|()| fs::rename(&tmp_path, &target));
        if let Err(error) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(HostError::io("write", path, error));
        }
        Ok(())
    }
}

fn write_staged(tmp_path: &Path, text: &str, permissions: fs::Permissions) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(tmp_path)?;
    file.write_all(text.as_bytes())?;
    file.sync_data()?;
    drop(file);
    fs::set_permissions(tmp_path, permissions)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}
