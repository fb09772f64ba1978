//! Error types for frame encoding/decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame dimensions are zero or not multiples of 8.
    #[error("invalid frame dimensions: {width}x{height} (must be non-zero multiples of 8)")]
    InvalidDimensions { width: u32, height: u32 },

    /// Invalid parameter passed to API.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// API call made in wrong sequence.
    #[error("invalid API call sequence: {0}")]
    InvalidCall(String),

    /// A required buffer is missing or has the wrong length.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// The per-channel compressor or decompressor failed.
    #[error("channel compression failed: {0}")]
    Compress(String),

    /// Frame conversion error.
    #[error("frame conversion error: {0}")]
    Conversion(String),

    /// I/O error while writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Create an InvalidParam error with a message.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }

    /// Create an InvalidCall error with a message.
    pub fn invalid_call(msg: impl Into<String>) -> Self {
        Self::InvalidCall(msg.into())
    }

    /// Create a Compress error with a message.
    pub fn compress(msg: impl Into<String>) -> Self {
        Self::Compress(msg.into())
    }

    /// Fail with [`CodecError::BufferSize`] unless `actual == expected`.
    pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::BufferSize { expected, actual })
        }
    }
}
