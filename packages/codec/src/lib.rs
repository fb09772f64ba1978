//! Key-frame/delta-frame codec for planar YUV 4:2:0 video.
//!
//! Frames are split into their Y, U and V planes and each plane is handed to
//! a single-channel 8-bit compressor (grayscale JPEG by default). Every
//! `iframe_step`-th frame is a key frame coded as is; the frames in between
//! are coded as a biased byte-wise difference against the previously
//! reconstructed frame.
//!
//! # Quick Start (Encoding)
//!
//! ```ignore
//! use yuvdelta_codec::{Channel, Encoder, EncoderConfig};
//!
//! let config = EncoderConfig::new(640, 480)
//!     .iframe_step(10)
//!     .quality(85);
//! let mut encoder = Encoder::new(config)?;
//!
//! // `frame` is one planar I420 frame; it is clobbered by the encoder.
//! encoder.encode_frame(&mut frame)?;
//! for channel in Channel::ALL {
//!     sink.write_all(encoder.compressed(channel))?;
//! }
//! ```
//!
//! # Quick Start (Decoding)
//!
//! ```ignore
//! use yuvdelta_codec::{Decoder, DecoderConfig};
//!
//! let mut decoder = Decoder::new(DecoderConfig::new(640, 480).iframe_step(10))?;
//! decoder.decode_frame([&y, &u, &v], &mut out)?;
//! ```
//!
//! # Architecture
//!
//! [`Encoder`] and [`Decoder`] are generic over a [`ChannelBackend`], which
//! produces one persistent [`PlaneCompressor`]/[`PlaneDecompressor`] per
//! channel. The delta transform itself lives in [`transform`].
//!
//! # Feature Flags
//!
//! - `testing` - Export deterministic test backends from [`testing`]

mod decoder;
mod encoder;
mod error;
mod frame;
mod jpeg;
mod traits;
mod types;

pub mod transform;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::CodecError;
pub use frame::{expected_frame_size, i420_to_bgra, i420_to_rgb, YuvFrame};
pub use jpeg::{write_jpeg_from_yuv, JpegBackend, JpegCompressor, JpegDecompressor};
pub use traits::{ChannelBackend, PlaneCompressor, PlaneDecompressor};
pub use types::{
    Channel, CodecFlags, DecoderConfig, EncoderConfig, FrameLayout, CHANNEL_COUNT,
    DEFAULT_IFRAME_STEP, DEFAULT_QUALITY,
};
