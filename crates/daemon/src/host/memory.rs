use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use padsync_common::path::normalize_resource_path;

use super::{HostError, ResourceHost, ResourceKind};

#[derive(Debug, Clone)]
enum Entry {
    File(String),
    Folder,
}

/// In-process workspace, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    entries: Mutex<BTreeMap<String, Entry>>,
    reject_writes: AtomicBool,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. Invalid paths are ignored.
    pub fn insert_file(&self, path: &str, text: &str) {
        if let Ok(path) = normalize_resource_path(path) {
            self.entries().insert(path, Entry::File(text.to_string()));
        }
    }

    pub fn insert_folder(&self, path: &str) {
        if let Ok(path) = normalize_resource_path(path) {
            self.entries().insert(path, Entry::Folder);
        }
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        let path = normalize_resource_path(path).ok()?;
        match self.entries().get(&path) {
            Some(Entry::File(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// While set, every write fails as if the store were read-only.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, path: &str) -> Result<(String, Entry), HostError> {
        let normalized = normalize_resource_path(path)?;
        let entry = self
            .entries()
            .get(&normalized)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))?;
        Ok((normalized, entry))
    }
}

impl ResourceHost for MemoryWorkspace {
    fn resolve(&self, path: &str) -> Result<ResourceKind, HostError> {
        Ok(match self.entry(path)?.1 {
            Entry::File(_) => ResourceKind::File,
            Entry::Folder => ResourceKind::Folder,
        })
    }

    fn read_document(&self, path: &str) -> Result<String, HostError> {
        match self.entry(path)?.1 {
            Entry::File(text) => Ok(text),
            Entry::Folder => Err(HostError::NotAFile(path.to_string())),
        }
    }

    fn write_document(&self, path: &str, text: &str) -> Result<(), HostError> {
        let (normalized, entry) = self.entry(path)?;
        if matches!(entry, Entry::Folder) {
            return Err(HostError::NotAFile(path.to_string()));
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(HostError::io(
                "write",
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "workspace is read-only"),
            ));
        }
        self.entries().insert(normalized, Entry::File(text.to_string()));
        Ok(())
    }
}
