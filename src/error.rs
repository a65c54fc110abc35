//! Crate-level error definitions.

use thiserror::Error;

/// Errors raised while constructing latency monitoring components.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A rolling window was asked to hold zero samples.
    #[error("window capacity must be positive")]
    InvalidWindow,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
