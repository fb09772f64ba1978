//! Core traits for the per-channel compression boundary.
//!
//! The encoder and decoder never compress pixels themselves. Each of the
//! three planes is handed to a single-channel 8-bit codec through these
//! traits, and one context per channel is kept alive for the whole session.

use crate::{Channel, CodecError};

/// Compresses one 8-bit grayscale plane.
///
/// Implementors may keep internal state between calls; the encoder owns one
/// compressor per channel and reuses it for every frame.
pub trait PlaneCompressor: Send {
    /// Compress `plane` (`width * height` bytes, no padding) at `quality`
    /// (1..=100) into `out`, replacing its previous contents.
    ///
    /// `out` is reused across frames, so implementors should write into it
    /// rather than allocate a fresh buffer.
    fn compress(
        &mut self,
        plane: &[u8],
        width: u32,
        height: u32,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError>;
}

/// Decompresses bytes produced by a matching [`PlaneCompressor`].
pub trait PlaneDecompressor: Send {
    /// Decompress `data` into `out`, which is exactly `width * height` bytes.
    fn decompress(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> Result<(), CodecError>;
}

/// Factory for the persistent per-channel codec contexts.
///
/// Contexts are acquired once when an encoder or decoder is created and
/// released when it is dropped.
pub trait ChannelBackend {
    /// Compression context type.
    type Compressor: PlaneCompressor;
    /// Decompression context type.
    type Decompressor: PlaneDecompressor;

    /// Create the compression context for `channel`.
    fn compressor(&self, channel: Channel) -> Result<Self::Compressor, CodecError>;

    /// Create the decompression context for `channel`.
    fn decompressor(&self, channel: Channel) -> Result<Self::Decompressor, CodecError>;
}

/// Build one context per channel, in storage order.
pub(crate) fn per_channel<T>(
    mut make: impl FnMut(Channel) -> Result<T, CodecError>,
) -> Result<[T; 3], CodecError> {
    let [y, u, v] = Channel::ALL;
    Ok([make(y)?, make(u)?, make(v)?])
}
