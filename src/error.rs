//! Error types for saavy_sf.
//!
//! Only loading and configuration can fail. Everything that happens on the
//! audio thread is recovered locally (preset fallback, silent voices while a
//! sample is pending, voice stealing).

use thiserror::Error;

/// Result type alias for saavy_sf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in saavy_sf.
#[derive(Debug, Error)]
pub enum Error {
    /// The bank's chunk records are inconsistent. The bank is rejected as a whole.
    #[error("malformed bank: {0}")]
    MalformedBank(String),

    /// A record points past the end of the pool it indexes into.
    #[error("{kind} index {index} out of range (pool holds {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The control queue is full; the message was not delivered.
    #[error("control queue is full")]
    QueueFull,
}
