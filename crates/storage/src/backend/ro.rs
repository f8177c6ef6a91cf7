//! Read-only storage backend.
//!
//! Wraps another backend and prevents write operations from executing, while
//! still indicating success on return. Used for dry-run syncs, where the
//! booklist is reconciled and reported but never written back to the reader.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, StorageBackend, error::Result};

/// Read-only storage backend.
///
/// Silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(volume = self.inner.name(), path = %path.display(), bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }
}
