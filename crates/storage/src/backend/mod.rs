//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface over a single storage volume of the reader (main memory or the
//! storage card).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for a reader's storage volume.
///
/// All operations are asynchronous. USB mass-storage mounts are slow, and
/// the catalog reader next door is async anyway.
///
/// # Path Handling
/// All paths are relative to the volume root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pbsync_storage::{backend::StorageBackend, error::Result};
///
/// async fn cache_size(backend: &dyn StorageBackend) -> Result<usize> {
///     let path = Path::new("metadata.pbsync.json");
///     if backend.exists(path).await? {
///         Ok(backend.read(path).await?.len())
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the volume, e.g. the volume label. Used for logging only.
    fn name(&self) -> &str;

    /// Check if a file exists.
    ///
    /// This is the check used during reconciliation to detect books whose
    /// file vanished since the catalog was last written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use pbsync_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// if backend.exists(Path::new("Books/a.epub")).await? {
    ///     println!("Still there!");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents.
    ///
    /// Creates a new file or overwrites an existing file with the provided
    /// data. Implementations create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}
