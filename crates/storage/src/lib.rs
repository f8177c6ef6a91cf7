//! Access to the storage volumes of a mounted reader.
//!
//! Everything the sync needs from a volume is small: does a book file still
//! exist, and read/write the booklist cache that lives at the volume root.
//! [`StorageBackend`] covers exactly that, with a local filesystem backend for
//! real mounts, a read-only decorator for dry runs and (behind the `mock`
//! feature) an in-memory backend for tests.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
