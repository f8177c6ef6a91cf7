//! Local filesystem storage backend.
//!
//! A mounted reader volume is just a directory on the host. Files are
//! accessed using `tokio::fs` for async I/O.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, path::validate as validate_path};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// All paths are relative to the mount point of the volume.
///
/// # Examples
///
/// ```no_run
/// use pbsync_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("PocketBook Reader Main Memory", "/media/user/PB626")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Mount point of the volume
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// Unlike a library directory, a volume mount point is never created on
    /// demand: if it isn't there, the reader isn't plugged in.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute, and [`VolumeUnavailable`](ErrorKind::VolumeUnavailable) if
    /// it isn't an existing directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if !root.is_dir() {
            exn::bail!(ErrorKind::VolumeUnavailable(root));
        }
        Ok(Self { name: name.into(), root })
    }

    /// Mount point of the volume on the host.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a volume-relative path.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("main", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("main", "relative/path").is_err());
        assert!(LocalBackend::new("main", "./relative").is_err());
    }

    #[test]
    fn test_new_requires_existing_mount() {
        let temp_dir = tempfile::tempdir().unwrap();
        let unplugged = temp_dir.path().join("not-mounted");
        let err = LocalBackend::new("card", &unplugged).err().unwrap();
        assert!(matches!(&*err, ErrorKind::VolumeUnavailable(_)));
        // Mount point creation is never attempted.
        assert!(!unplugged.exists());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("Books/a.epub");
        assert_eq!(backend.absolute_path(Path::new("Books/a.epub")).unwrap(), expected);
        assert_eq!(backend.absolute_path(Path::new("Books\\a.epub")).unwrap(), expected);
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        let data = br#"{"books":[]}"#;
        backend.write(Path::new("metadata.pbsync.json"), data).await.unwrap();
        let read_data = backend.read(Path::new("metadata.pbsync.json")).await.unwrap();
        assert_eq!(read_data, data);
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        backend.write(Path::new("system/cover_cache/1.jpg"), b"data").await.unwrap();
        assert!(backend.exists(Path::new("system/cover_cache/1.jpg")).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        assert!(!backend.exists(Path::new("Books/missing.epub")).await.unwrap());
        backend.write(Path::new("Books/present.epub"), b"PK").await.unwrap();
        assert!(backend.exists(Path::new("Books/present.epub")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        let err = backend.read(Path::new("fwinfo.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("main", temp_dir.path()).unwrap();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.read(Path::new("etc/../../passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.exists(Path::new("../../file")).await.is_err());
    }
}
