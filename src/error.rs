//! Error types for ogg-demux

use thiserror::Error;

/// Result type alias for ogg-demux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ogg-demux
#[derive(Error, Debug)]
pub enum Error {
    /// End of stream reached (expected termination, not a failure)
    #[error("End of stream")]
    EndOfStream,

    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed bitstream data
    #[error("Malformed stream: {0}")]
    Malformed(String),

    /// Unsupported stream or feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Operation invalid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Create a malformed-stream error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::Malformed(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an IO error for a read that came up short
    pub fn short_read(expected: usize, got: usize) -> Self {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short read: expected {} bytes, got {}", expected, got),
        ))
    }
}
