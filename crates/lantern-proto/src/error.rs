//! Error types for line framing and parsing.

use thiserror::Error;

/// Convenience alias for results carrying a [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O failure on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The line was empty or contained only whitespace.
    #[error("empty message")]
    EmptyMessage,

    /// A prefix was present but no command followed it.
    #[error("message has no command")]
    MissingCommand,

    /// The peer sent more than `limit` bytes without a line terminator.
    #[error("line too long: {actual} bytes exceeds limit of {limit}")]
    MessageTooLong {
        /// Bytes buffered so far.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },
}
