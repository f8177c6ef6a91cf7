//! CLI Error Types

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unknown reader model")]
    Profile,
    /// A configured mount point is not usable.
    #[display("reader volume unavailable")]
    Volume,
    #[display("sync failed")]
    Sync,
    #[display("invalid argument: {_0}")]
    Argument(#[error(not(source))] String),
}
