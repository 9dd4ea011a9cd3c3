// External resource store: resolution and document access for content pads.

pub mod fs;
pub mod memory;

use std::io;

use padsync_common::changeset::{apply_edits, DocumentSink, SinkError, TextBuffer, TextEdit};
use padsync_common::path::PathError;
use thiserror::Error;

pub use fs::FsWorkspace;
pub use memory::MemoryWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Folder,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error("resource `{0}` not found")]
    NotFound(String),

    #[error("resource `{0}` is not a file")]
    NotAFile(String),

    #[error("resource `{0}` resolves outside the workspace")]
    OutsideWorkspace(String),

    #[error("resource `{0}` is not valid UTF-8")]
    NotUtf8(String),

    #[error("failed to {action} `{path}`: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Edit(#[from] SinkError),
}

impl HostError {
    pub(crate) fn io(action: &'static str, path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.to_string());
        }
        Self::Io { action, path: path.to_string(), source }
    }
}

/// The resolution collaborator and document opener behind content pads.
///
/// Paths are normalized resource paths (`/project/dir/file`).
pub trait ResourceHost: Send + Sync {
    fn resolve(&self, path: &str) -> Result<ResourceKind, HostError>;

    fn read_document(&self, path: &str) -> Result<String, HostError>;

    /// Replaces the whole document. Implementations must not leave a
    /// partially written document behind on failure.
    fn write_document(&self, path: &str, text: &str) -> Result<(), HostError>;
}

/// An open host document bound to a content pad.
#[derive(Debug, Clone)]
pub struct HostDocument {
    path: String,
    buffer: TextBuffer,
}

impl HostDocument {
    pub fn open(host: &dyn ResourceHost, path: &str) -> Result<Self, HostError> {
        match host.resolve(path)? {
            ResourceKind::File => {}
            ResourceKind::Folder => return Err(HostError::NotAFile(path.to_string())),
        }
        let text = host.read_document(path)?;
        Ok(Self { path: path.to_string(), buffer: TextBuffer::new(text) })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        self.buffer.as_str()
    }

    pub fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    /// Applies the edits to a staged copy, persists it, then swaps it in.
    /// On error the document is unchanged both here and in the host.
    pub fn apply(&mut self, host: &dyn ResourceHost, edits: &[TextEdit]) -> Result<(), HostError> {
        let mut staged = self.buffer.clone();
        apply_edits(edits, &mut staged)?;
        host.write_document(&self.path, staged.as_str())?;
        self.buffer = staged;
        Ok(())
    }
}
