//! Error types for container reading and writing.

use thiserror::Error;
use yuvdelta_codec::CodecError;

/// Errors raised by [`Writer`](crate::Writer) and [`Reader`](crate::Reader).
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The frame codec failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Opening, seeking, reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents do not match the expected layout.
    #[error("malformed container: {0}")]
    Format(String),

    /// The frame cursor has reached the stored frame count.
    #[error("end of stream")]
    EndOfStream,

    /// Invalid parameter passed to API.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// API call made in wrong sequence.
    #[error("invalid API call sequence: {0}")]
    InvalidCall(String),

    /// Growing a frame buffer failed.
    #[error("out of memory growing buffer to {0} bytes")]
    OutOfMemory(usize),
}

impl ContainerError {
    /// Create a Format error with a message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Whether this is the recoverable end-of-stream signal.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Result alias used throughout the container.
pub type Result<T> = std::result::Result<T, ContainerError>;
