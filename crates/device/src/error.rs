//! Device Error Types

use derive_more::{Display, Error};

/// A device error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No known profile carries this name.
    #[display("unknown device profile: {_0}")]
    UnknownProfile(#[error(not(source))] String),
    /// No known profile matches the USB identifiers.
    #[display("unsupported device: {_0}")]
    Unsupported(#[error(not(source))] String),
    #[display("could not access device storage")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
