//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog could not be opened. Fatal for the volume.
    #[display("device catalog unavailable")]
    CatalogUnavailable,
    /// The catalog opened but could not be read with either query shape.
    #[display("device catalog could not be read")]
    Catalog,
    /// A catalog row cannot be turned into a book record. The row is skipped.
    #[display("invalid catalog row: {_0}")]
    RowNormalization(#[error(not(source))] String),
    /// Probing or reading a volume failed.
    #[display("device storage error")]
    Storage,
    /// The booklist cache could not be written back.
    #[display("could not persist booklist")]
    Persistence,
    /// The profile describes a reader without an on-device catalog.
    #[display("{_0} has no on-device catalog")]
    NoCatalog(#[error(not(source))] &'static str),
    /// The pass was cancelled before it finished; nothing was persisted.
    #[display("reconciliation cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CatalogUnavailable | Self::Storage | Self::Cancelled)
    }
}
