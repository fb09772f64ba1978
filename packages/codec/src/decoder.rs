//! Key-frame/delta-frame decoder.

use tracing::debug;

use crate::encoder::check_iframe_step;
use crate::jpeg::JpegBackend;
use crate::traits::{per_channel, ChannelBackend, PlaneDecompressor};
use crate::transform::{copy_to_reference, decode_delta};
use crate::{Channel, CodecError, CodecFlags, DecoderConfig, FrameLayout, CHANNEL_COUNT};

/// Mirror of [`Encoder`](crate::Encoder): the reference it keeps is
/// bit-identical to the encoder's after every frame.
pub struct Decoder<B: ChannelBackend = JpegBackend> {
    layout: FrameLayout,
    flags: CodecFlags,
    frame_index: u64,
    iframe_step: u64,
    decompressors: [B::Decompressor; CHANNEL_COUNT],
    reference: Vec<u8>,
}

impl Decoder<JpegBackend> {
    /// Create a decoder using the default JPEG channel backend.
    pub fn new(config: DecoderConfig) -> Result<Self, CodecError> {
        Self::with_backend(config, &JpegBackend)
    }
}

impl<B: ChannelBackend> Decoder<B> {
    pub fn with_backend(config: DecoderConfig, backend: &B) -> Result<Self, CodecError> {
        let layout = FrameLayout::new(config.width, config.height)?;
        check_iframe_step(config.iframe_step)?;
        let decompressors = per_channel(|channel| backend.decompressor(channel))?;

        debug!(
            "Decoder created: {}x{}, iframe step {}",
            layout.width(),
            layout.height(),
            config.iframe_step
        );

        Ok(Self {
            layout,
            flags: config.flags,
            frame_index: 0,
            iframe_step: config.iframe_step,
            decompressors,
            reference: vec![0u8; layout.frame_len()],
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

    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Position the decoder. Callers seeking within a stream must land on a
    /// key frame, otherwise the next delta is applied to a stale reference.
    pub fn set_frame_index(&mut self, index: u64) {
        self.frame_index = index;
    }

    #[must_use]
    pub fn iframe_step(&self) -> u64 {
        self.iframe_step
    }

    pub fn set_iframe_step(&mut self, step: u64) -> Result<(), CodecError> {
        check_iframe_step(step)?;
        self.iframe_step = step;
        Ok(())
    }

    #[must_use]
    pub fn is_key_frame(&self) -> bool {
        self.frame_index % self.iframe_step == 0
    }

    /// The last reconstructed frame.
    #[must_use]
    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    /// Decompress one channel's bytes into its plane of `out`.
    pub fn decode_sub_frame(
        &mut self,
        channel: Channel,
        data: &[u8],
        out: &mut [u8],
    ) -> Result<(), CodecError> {
        CodecError::check_len(self.layout.frame_len(), out.len())?;

        let (width, height) = self.layout.plane_dimensions(channel);
        let plane = &mut out[self.layout.plane_range(channel)];
        self.decompressors[channel.index()].decompress(data, width, height, plane)
    }

    /// Finish the frame once all three channels are decoded into `out`.
    ///
    /// Key frames are copied into the reference; delta frames are
    /// reconstructed against it, leaving the image in both buffers. The frame
    /// counter advances either way.
    pub fn finalize_frame(&mut self, out: &mut [u8]) -> Result<(), CodecError> {
        CodecError::check_len(self.layout.frame_len(), out.len())?;

        if self.is_key_frame() {
            copy_to_reference(out, &mut self.reference)?;
        } else {
            decode_delta(out, &mut self.reference, &self.layout)?;
        }

        self.frame_index += 1;
        Ok(())
    }

    /// Decode a whole frame from its three channel buffers (Y, U, V).
    pub fn decode_frame(
        &mut self,
        channels: [&[u8]; CHANNEL_COUNT],
        out: &mut [u8],
    ) -> Result<(), CodecError> {
        for (channel, data) in Channel::ALL.into_iter().zip(channels) {
            self.decode_sub_frame(channel, data, out)?;
        }
        self.finalize_frame(out)
    }
}
