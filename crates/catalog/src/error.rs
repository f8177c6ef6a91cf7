//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog could not be opened (missing file, not a database, locked
    /// by the reader's own software).
    #[display("catalog unavailable: {}", _0.display())]
    Unavailable(#[error(not(source))] PathBuf),
    /// The catalog is missing columns that neither query shape can live
    /// without.
    #[display("catalog schema mismatch")]
    SchemaMismatch,
    #[display("catalog query failed")]
    Query,
    /// A value read from the catalog is unusable.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// The reader keeps the catalog locked for a short while after being
    /// mounted while it finishes indexing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
