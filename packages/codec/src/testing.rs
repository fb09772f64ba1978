//! Deterministic channel backends for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream test suites that need bit-exact expectations.

use std::sync::{Arc, Mutex};

use crate::traits::{ChannelBackend, PlaneCompressor, PlaneDecompressor};
use crate::{Channel, CodecError};

/// Lossy but deterministic: sets the two low bits of every sample.
///
/// The compressed form is the quantized plane itself. Samples already of the
/// form `4n + 3` (including the flat delta value 127) pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizingBackend;

impl QuantizingBackend {
    /// The value a sample decodes to.
    #[must_use]
    pub fn quantize(sample: u8) -> u8 {
        sample | 0x3
    }
}

impl ChannelBackend for QuantizingBackend {
    type Compressor = QuantizingCodec;
    type Decompressor = QuantizingCodec;

    fn compressor(&self, _channel: Channel) -> Result<QuantizingCodec, CodecError> {
        Ok(QuantizingCodec { seen: None })
    }

    fn decompressor(&self, _channel: Channel) -> Result<QuantizingCodec, CodecError> {
        Ok(QuantizingCodec { seen: None })
    }
}

/// [`QuantizingBackend`] that also records the quality of every compress call.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    seen: Arc<Mutex<Vec<u8>>>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new(seen: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { seen }
    }
}

impl ChannelBackend for RecordingBackend {
    type Compressor = QuantizingCodec;
    type Decompressor = QuantizingCodec;

    fn compressor(&self, _channel: Channel) -> Result<QuantizingCodec, CodecError> {
        Ok(QuantizingCodec {
            seen: Some(Arc::clone(&self.seen)),
        })
    }

    fn decompressor(&self, _channel: Channel) -> Result<QuantizingCodec, CodecError> {
        Ok(QuantizingCodec { seen: None })
    }
}

#[derive(Debug)]
pub struct QuantizingCodec {
    seen: Option<Arc<Mutex<Vec<u8>>>>,
}

impl PlaneCompressor for QuantizingCodec {
    fn compress(
        &mut self,
        plane: &[u8],
        width: u32,
        height: u32,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        CodecError::check_len(width as usize * height as usize, plane.len())?;
        if let Some(seen) = &self.seen {
            if let Ok(mut seen) = seen.lock() {
                seen.push(quality);
            }
        }
        out.clear();
        out.extend(plane.iter().map(|&v| QuantizingBackend::quantize(v)));
        Ok(())
    }
}

impl PlaneDecompressor for QuantizingCodec {
    fn decompress(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> Result<(), CodecError> {
        CodecError::check_len(width as usize * height as usize, out.len())?;
        if data.len() != out.len() {
            return Err(CodecError::compress(format!(
                "quantized plane is {} bytes, expected {}",
                data.len(),
                out.len()
            )));
        }
        out.copy_from_slice(data);
        Ok(())
    }
}

/// Every compress and decompress call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingBackend;

impl ChannelBackend for FailingBackend {
    type Compressor = FailingCodec;
    type Decompressor = FailingCodec;

    fn compressor(&self, _channel: Channel) -> Result<FailingCodec, CodecError> {
        Ok(FailingCodec)
    }

    fn decompressor(&self, _channel: Channel) -> Result<FailingCodec, CodecError> {
        Ok(FailingCodec)
    }
}

#[derive(Debug)]
pub struct FailingCodec;

impl PlaneCompressor for FailingCodec {
    fn compress(
        &mut self,
        _plane: &[u8],
        _width: u32,
        _height: u32,
        _quality: u8,
        _out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        Err(CodecError::compress("compression disabled"))
    }
}

impl PlaneDecompressor for FailingCodec {
    fn decompress(
        &mut self,
        _data: &[u8],
        _width: u32,
        _height: u32,
        _out: &mut [u8],
    ) -> Result<(), CodecError> {
        Err(CodecError::compress("decompression disabled"))
    }
}
