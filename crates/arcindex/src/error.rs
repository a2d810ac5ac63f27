//! Error types for arcindex

use std::fmt;

/// Result type alias for arcindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for index operations
///
/// Lookups never fail: a missing key is reported as `None` or `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller supplied an argument the structure cannot accept
    InvalidArgument(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
