//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::StorageBackend;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Stands in for a
/// mounted reader volume in tests of the reconciler and sync session.
///
/// # Examples
///
/// ```
/// use pbsync_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("Books/a.epub", b"PK..."),
/// ]);
/// assert!(backend.exists(Path::new("Books/a.epub")).await?);
///
/// backend.write(Path::new("metadata.pbsync.json"), b"{}").await?;
/// assert!(backend.exists(Path::new("metadata.pbsync.json")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
        }
    }

    /// Change the name of the mock backend.
    ///
    /// # Example
    ///
    /// ```
    /// use pbsync_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::default().with_name("card");
    /// ```
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Remove a file, simulating the user deleting it behind the reader's back.
    pub async fn remove(&self, path: impl AsRef<Path>) -> bool {
        match validate_path(path.as_ref()) {
            Ok(validated) => self.storage.write().await.remove(&validated).is_some(),
            Err(_) => false,
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let validated = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&validated))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let validated = validate_path(path)?;
        let storage = self.storage.read().await;
        match storage.get(&validated) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let validated = validate_path(path)?;
        self.storage.write().await.insert(validated, data.to_vec());
        Ok(())
    }
}
