use exn::ResultExt;
use pbsync_catalog::{CatalogRow, StorageId};
use pbsync_storage::BackendHandle;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::path::{device_path, normalize};

/// One storage volume of the reader, as mounted on the host.
///
/// Device paths of books on this volume start with the volume's storage root
/// label (nothing for main memory with the default `/` root, `card/` for the
/// storage card). The backend is rooted at the volume's mount point, so the
/// label is stripped before touching the filesystem.
#[derive(Clone)]
pub struct Volume {
    storage: StorageId,
    storage_root: String,
    /// Storage root as a device path prefix, e.g. `card`; empty for `/`.
    label: String,
    /// Labels of other volumes nested under this one's root.
    excluded: Vec<String>,
    backend: BackendHandle,
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("storage", &self.storage)
            .field("storage_root", &self.storage_root)
            .field("excluded", &self.excluded)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Volume {
    pub fn new(storage: StorageId, storage_root: impl Into<String>, backend: BackendHandle) -> Self {
        let storage_root = storage_root.into();
        let label = normalize(&storage_root).unwrap_or_default();
        Self { storage, storage_root, label, excluded: Vec::new(), backend }
    }

    /// Disown device paths under another volume's storage root.
    ///
    /// Main memory's default root `/` would otherwise claim `card/...` paths.
    pub fn excluding(mut self, storage_root: &str) -> Self {
        if let Some(label) = normalize(storage_root)
            && label != self.label
            && label.starts_with(&self.label)
        {
            self.excluded.push(label);
        }
        self
    }

    pub fn storage(&self) -> StorageId {
        self.storage
    }

    pub fn storage_root(&self) -> &str {
        &self.storage_root
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Device path of a catalog row on this volume.
    pub fn device_path(&self, row: &CatalogRow) -> Result<String> {
        device_path(&row.folder_name, &row.file_name, &self.storage_root)
    }

    /// Path of a book relative to the volume's mount point.
    ///
    /// `None` if the device path doesn't belong to this volume.
    pub fn local_path(&self, device_path: &str) -> Option<PathBuf> {
        let normalized = normalize(device_path)?;
        let foreign = self.excluded.iter().any(|label| {
            normalized.strip_prefix(label.as_str()).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        });
        if foreign {
            return None;
        }
        if self.label.is_empty() {
            return Some(PathBuf::from(normalized));
        }
        let rest = normalized.strip_prefix(&self.label)?.strip_prefix('/')?;
        Some(PathBuf::from(rest))
    }

    /// Whether a device path lies on this volume.
    pub fn contains(&self, device_path: &str) -> bool {
        self.local_path(device_path).is_some()
    }

    /// Whether the book's file is present.
    pub async fn exists(&self, device_path: &str) -> Result<bool> {
        let Some(local) = self.local_path(device_path) else {
            exn::bail!(ErrorKind::RowNormalization(format!("{device_path} is not on the {} volume", self.storage)));
        };
        self.exists_local(&local).await
    }

    async fn exists_local(&self, local: &Path) -> Result<bool> {
        self.backend.exists(local).await.or_raise(|| ErrorKind::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbsync_storage::backend::MockBackend;
    use std::sync::Arc;

    fn card() -> Volume {
        let backend = MockBackend::with_files([("Books/a.epub", b"PK")]).with_name("card");
        Volume::new(StorageId::Card, "/card", Arc::new(backend))
    }

    #[test]
    fn test_local_path() {
        let volume = card();
        assert_eq!(volume.local_path("card/Books/a.epub"), Some(PathBuf::from("Books/a.epub")));
        assert_eq!(volume.local_path("card//Books\\a.epub"), Some(PathBuf::from("Books/a.epub")));
        assert_eq!(volume.local_path("Books/a.epub"), None);
        assert_eq!(volume.local_path("cardigan/a.epub"), None);
        assert_eq!(volume.local_path("card"), None);

        let main = Volume::new(StorageId::Main, "/", Arc::new(MockBackend::default()));
        assert_eq!(main.local_path("Books/a.epub"), Some(PathBuf::from("Books/a.epub")));
        assert!(!main.contains("../a.epub"));
        assert!(main.contains("card/Books/a.epub"));
    }

    #[test]
    fn test_excluded_storage_root() {
        let main = Volume::new(StorageId::Main, "/", Arc::new(MockBackend::default())).excluding("/card");
        assert!(!main.contains("card/Books/a.epub"));
        assert!(!main.contains("card"));
        assert!(main.contains("cardigan/a.epub"));
        assert!(main.contains("Books/a.epub"));

        let card = card().excluding("/").excluding("/card");
        assert_eq!(card.local_path("card/Books/a.epub"), Some(PathBuf::from("Books/a.epub")));
    }

    #[tokio::test]
    async fn test_excluded_path_is_not_checked() {
        let main = Volume::new(StorageId::Main, "/", Arc::new(MockBackend::default())).excluding("/card");
        let err = main.exists("card/Books/a.epub").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RowNormalization(_)));
    }

    #[tokio::test]
    async fn test_exists() {
        let volume = card();
        assert!(volume.exists("card/Books/a.epub").await.unwrap());
        assert!(!volume.exists("card/Books/b.epub").await.unwrap());
        let err = volume.exists("Books/a.epub").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RowNormalization(_)));
    }
}
