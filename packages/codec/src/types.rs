//! Core types for planar YUV 4:2:0 encoding/decoding.

use std::ops::Range;

use crate::CodecError;

/// Number of independently compressed planes per frame.
pub const CHANNEL_COUNT: usize = 3;

/// Default compression quality for both quality parameters.
pub const DEFAULT_QUALITY: u8 = 75;

/// Default key-frame interval (every frame is a key frame).
pub const DEFAULT_IFRAME_STEP: u64 = 1;

/// One plane of a planar YUV 4:2:0 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Luma, full resolution.
    Y,
    /// Blue-difference chroma, half resolution in both dimensions.
    U,
    /// Red-difference chroma, half resolution in both dimensions.
    V,
}

impl Channel {
    /// All channels in storage order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::Y, Channel::U, Channel::V];

    /// Position of this channel in storage order (0..3).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Y => 0,
            Self::U => 1,
            Self::V => 2,
        }
    }

    /// Returns true for the two half-resolution chroma planes.
    #[must_use]
    pub fn is_chroma(self) -> bool {
        !matches!(self, Self::Y)
    }
}

/// Geometry of a planar YUV 4:2:0 frame: Y plane, then U plane, then V plane,
/// each contiguous with no row padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    width: u32,
    height: u32,
}

impl FrameLayout {
    /// Create a layout, failing unless both dimensions are non-zero multiples of 8.
    pub fn new(width: u32, height: u32) -> Result<Self, CodecError> {
        if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
            return Err(CodecError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the luma plane in bytes.
    #[must_use]
    pub fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one chroma plane in bytes.
    #[must_use]
    pub fn chroma_len(&self) -> usize {
        self.luma_len() / 4
    }

    /// Size of a whole planar frame in bytes.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.luma_len() + 2 * self.chroma_len()
    }

    /// Dimensions (width, height) of a channel's plane.
    #[must_use]
    pub fn plane_dimensions(&self, channel: Channel) -> (u32, u32) {
        if channel.is_chroma() {
            (self.width / 2, self.height / 2)
        } else {
            (self.width, self.height)
        }
    }

    /// Byte range of a channel's plane within a planar frame.
    #[must_use]
    pub fn plane_range(&self, channel: Channel) -> Range<usize> {
        let luma = self.luma_len();
        let chroma = self.chroma_len();
        match channel {
            Channel::Y => 0..luma,
            Channel::U => luma..luma + chroma,
            Channel::V => luma + chroma..luma + 2 * chroma,
        }
    }
}

/// Codec flags stored in the container pre-header.
///
/// The low four bits name the encoder mode; the remaining bits are carried
/// through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CodecFlags(pub u64);

impl CodecFlags {
    /// Encoder mode held in the low four bits.
    #[must_use]
    pub fn encoder_mode(&self) -> u8 {
        (self.0 & 0xF) as u8
    }

    #[must_use]
    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CodecFlags {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

/// Configuration for creating an [`Encoder`](crate::Encoder).
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Frame width in pixels (multiple of 8).
    pub width: u32,
    /// Frame height in pixels (multiple of 8).
    pub height: u32,
    /// Codec flags recorded alongside the stream.
    pub flags: CodecFlags,
    /// Quality used on key-frame boundaries.
    pub quality: u8,
    /// Quality used on delta frames.
    pub intra_frame_quality: u8,
    /// Key-frame interval. Must be at least 1.
    pub iframe_step: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            flags: CodecFlags::default(),
            quality: DEFAULT_QUALITY,
            intra_frame_quality: DEFAULT_QUALITY,
            iframe_step: DEFAULT_IFRAME_STEP,
        }
    }
}

impl EncoderConfig {
    /// Create a new encoder configuration with the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the codec flags.
    #[must_use]
    pub fn flags(mut self, flags: impl Into<CodecFlags>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Set the quality used on key-frame boundaries.
    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set the quality used on delta frames.
    #[must_use]
    pub fn intra_frame_quality(mut self, quality: u8) -> Self {
        self.intra_frame_quality = quality;
        self
    }

    /// Set the key-frame interval.
    #[must_use]
    pub fn iframe_step(mut self, step: u64) -> Self {
        self.iframe_step = step;
        self
    }
}

/// Configuration for creating a [`Decoder`](crate::Decoder).
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Frame width in pixels (multiple of 8).
    pub width: u32,
    /// Frame height in pixels (multiple of 8).
    pub height: u32,
    /// Codec flags the stream was written with.
    pub flags: CodecFlags,
    /// Key-frame interval. Must be at least 1.
    pub iframe_step: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            flags: CodecFlags::default(),
            iframe_step: DEFAULT_IFRAME_STEP,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the codec flags.
    #[must_use]
    pub fn flags(mut self, flags: impl Into<CodecFlags>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Set the key-frame interval.
    #[must_use]
    pub fn iframe_step(mut self, step: u64) -> Self {
        self.iframe_step = step;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_rejects_non_multiples_of_8() {
        for (w, h) in [(0, 8), (8, 0), (12, 16), (16, 12), (7, 7), (1920, 1082)] {
            assert!(
                matches!(
                    FrameLayout::new(w, h),
                    Err(CodecError::InvalidDimensions { .. })
                ),
                "{}x{} should be rejected",
                w,
                h
            );
        }
        assert!(FrameLayout::new(8, 8).is_ok());
        assert!(FrameLayout::new(1920, 1080).is_ok());
    }

    #[test]
    fn test_plane_ranges() {
        let layout = FrameLayout::new(16, 8).unwrap();
        assert_eq!(layout.luma_len(), 128);
        assert_eq!(layout.chroma_len(), 32);
        assert_eq!(layout.frame_len(), 192);
        assert_eq!(layout.plane_range(Channel::Y), 0..128);
        assert_eq!(layout.plane_range(Channel::U), 128..160);
        assert_eq!(layout.plane_range(Channel::V), 160..192);
        assert_eq!(layout.plane_dimensions(Channel::V), (8, 4));
    }

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::new(64, 32).iframe_step(5).flags(1u64);
        assert_eq!(config.quality, DEFAULT_QUALITY);
        assert_eq!(config.intra_frame_quality, DEFAULT_QUALITY);
        assert_eq!(config.iframe_step, 5);
        assert_eq!(config.flags.encoder_mode(), 1);
    }
}
