//! Key-frame/delta-frame encoder.
//!
//! Per frame the encoder is driven through a fixed sequence:
//!
//! ```text
//! begin_frame(frame)
//!   begin_sub_frame(frame, Y|U|V)   -> compressed bytes for the channel
//!   end_sub_frame(frame, Y|U|V)     -> local decompression
//! end_frame(frame)                  -> reference updated, counter advanced
//! ```
//!
//! The reference buffer always holds the frame a decoder will reconstruct,
//! never the lossless input, so compression error does not accumulate along a
//! run of delta frames.

use tracing::{debug, trace};

use crate::jpeg::JpegBackend;
use crate::traits::{per_channel, ChannelBackend, PlaneCompressor, PlaneDecompressor};
use crate::transform::{copy_to_reference, decode_delta, encode_delta};
use crate::{Channel, CodecError, CodecFlags, EncoderConfig, FrameLayout, CHANNEL_COUNT};

/// Planar YUV 4:2:0 encoder with one persistent codec context per channel.
pub struct Encoder<B: ChannelBackend = JpegBackend> {
    layout: FrameLayout,
    flags: CodecFlags,
    frame_index: u64,
    iframe_step: u64,
    quality: u8,
    intra_frame_quality: u8,
    compressors: [B::Compressor; CHANNEL_COUNT],
    decompressors: [B::Decompressor; CHANNEL_COUNT],
    reference: Vec<u8>,
    compressed: [Vec<u8>; CHANNEL_COUNT],
}

impl Encoder<JpegBackend> {
    /// Create an encoder using the default JPEG channel backend.
    pub fn new(config: EncoderConfig) -> Result<Self, CodecError> {
        Self::with_backend(config, &JpegBackend)
    }
}

impl<B: ChannelBackend> Encoder<B> {
    /// Create an encoder using `backend` for the per-channel contexts.
    ///
    /// Fails with [`CodecError::InvalidDimensions`] unless width and height
    /// are multiples of 8.
    pub fn with_backend(config: EncoderConfig, backend: &B) -> Result<Self, CodecError> {
        let layout = FrameLayout::new(config.width, config.height)?;
        check_iframe_step(config.iframe_step)?;
        check_quality(config.quality)?;
        check_quality(config.intra_frame_quality)?;

        let compressors = per_channel(|channel| backend.compressor(channel))?;
        let decompressors = per_channel(|channel| backend.decompressor(channel))?;

        debug!(
            "Encoder created: {}x{}, iframe step {}, quality {}/{}",
            layout.width(),
            layout.height(),
            config.iframe_step,
            config.quality,
            config.intra_frame_quality
        );

        Ok(Self {
            layout,
            flags: config.flags,
            frame_index: 0,
            iframe_step: config.iframe_step,
            quality: config.quality,
            intra_frame_quality: config.intra_frame_quality,
            compressors,
            decompressors,
            reference: vec![0u8; layout.frame_len()],
            compressed: Default::default(),
        })
    }

    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    #[must_use]
    pub fn flags(&self) -> CodecFlags {
        self.flags
    }

    /// Index of the frame currently being (or next to be) encoded.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[must_use]
    pub fn iframe_step(&self) -> u64 {
        self.iframe_step
    }

    /// Change the key-frame interval. Only allowed before the first frame.
    pub fn set_iframe_step(&mut self, step: u64) -> Result<(), CodecError> {
        check_iframe_step(step)?;
        if self.frame_index != 0 {
            return Err(CodecError::invalid_call(
                "key-frame interval must be set before the first frame",
            ));
        }
        self.iframe_step = step;
        Ok(())
    }

    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    #[must_use]
    pub fn intra_frame_quality(&self) -> u8 {
        self.intra_frame_quality
    }

    /// Whether the current frame index falls on a key-frame boundary.
    #[must_use]
    pub fn is_key_frame(&self) -> bool {
        self.frame_index % self.iframe_step == 0
    }

    /// Quality applied to the current frame.
    ///
    /// Key frames use `quality` and delta frames `intra_frame_quality`. The
    /// mapping is part of the stream's observable output and is kept as is.
    #[must_use]
    pub fn current_quality(&self) -> u8 {
        if self.is_key_frame() {
            self.quality
        } else {
            self.intra_frame_quality
        }
    }

    /// The reconstructed previous frame.
    #[must_use]
    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    /// Compressed bytes last produced for `channel`.
    #[must_use]
    pub fn compressed(&self, channel: Channel) -> &[u8] {
        &self.compressed[channel.index()]
    }

    /// Start a frame.
    ///
    /// On a delta frame `frame` is overwritten in place with its delta
    /// against the reference; on a key frame it is copied into the reference
    /// unchanged.
    pub fn begin_frame(&mut self, frame: &mut [u8]) -> Result<(), CodecError> {
        CodecError::check_len(self.layout.frame_len(), frame.len())?;

        if self.is_key_frame() {
            copy_to_reference(frame, &mut self.reference)
        } else {
            encode_delta(&self.reference, frame, &self.layout)
        }
    }

    /// Compress one channel of the frame passed to [`Self::begin_frame`].
    pub fn begin_sub_frame(&mut self, frame: &[u8], channel: Channel) -> Result<&[u8], CodecError> {
        CodecError::check_len(self.layout.frame_len(), frame.len())?;

        let quality = self.current_quality();
        let (width, height) = self.layout.plane_dimensions(channel);
        let plane = &frame[self.layout.plane_range(channel)];
        let out = &mut self.compressed[channel.index()];

        self.compressors[channel.index()].compress(plane, width, height, quality, out)?;

        trace!(
            "frame {} {:?}: {} bytes at quality {}",
            self.frame_index,
            channel,
            out.len(),
            quality
        );
        Ok(out.as_slice())
    }

    /// Decompress the channel just produced by [`Self::begin_sub_frame`].
    ///
    /// Delta frames are decompressed back into `frame`; key frames straight
    /// into the reference.
    pub fn end_sub_frame(&mut self, frame: &mut [u8], channel: Channel) -> Result<(), CodecError> {
        CodecError::check_len(self.layout.frame_len(), frame.len())?;

        let data = &self.compressed[channel.index()];
        if data.is_empty() {
            return Err(CodecError::invalid_call(format!(
                "end_sub_frame({:?}) without a compressed channel",
                channel
            )));
        }

        let (width, height) = self.layout.plane_dimensions(channel);
        let range = self.layout.plane_range(channel);
        let destination = if self.is_key_frame() {
            &mut self.reference[range]
        } else {
            &mut frame[range]
        };

        self.decompressors[channel.index()].decompress(data, width, height, destination)
    }

    /// Finish the frame and advance the frame counter.
    ///
    /// For delta frames the decompressed delta in `frame` is folded into the
    /// reference; `frame` then holds the reconstructed image as well.
    pub fn end_frame(&mut self, frame: &mut [u8]) -> Result<(), CodecError> {
        CodecError::check_len(self.layout.frame_len(), frame.len())?;

        if !self.is_key_frame() {
            decode_delta(frame, &mut self.reference, &self.layout)?;
        }

        self.frame_index += 1;
        Ok(())
    }

    /// Run the whole per-frame sequence.
    ///
    /// Afterwards [`Self::compressed`] returns the three channel buffers of
    /// this frame. `frame` is clobbered.
    pub fn encode_frame(&mut self, frame: &mut [u8]) -> Result<(), CodecError> {
        self.begin_frame(frame)?;
        for channel in Channel::ALL {
            self.begin_sub_frame(frame, channel)?;
        }
        for channel in Channel::ALL {
            self.end_sub_frame(frame, channel)?;
        }
        self.end_frame(frame)
    }
}

pub(crate) fn check_iframe_step(step: u64) -> Result<(), CodecError> {
    if step == 0 {
        return Err(CodecError::invalid_param("key-frame interval must be at least 1"));
    }
    Ok(())
}

fn check_quality(quality: u8) -> Result<(), CodecError> {
    if !(1..=100).contains(&quality) {
        return Err(CodecError::invalid_param(format!(
            "quality must be within 1..=100, got {}",
            quality
        )));
    }
    Ok(())
}
