//! Baseline JPEG channel backend.
//!
//! Each plane is coded as an independent single-component (grayscale) JPEG
//! using the `image` crate's encoder and decoder.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, ExtendedColorType, ImageDecoder, ImageEncoder};

use crate::frame::i420_to_rgb;
use crate::traits::{ChannelBackend, PlaneCompressor, PlaneDecompressor};
use crate::{Channel, CodecError, FrameLayout};

/// Quality used for still snapshots.
const SNAPSHOT_QUALITY: u8 = 75;

/// Default backend: one grayscale JPEG per plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegBackend;

impl ChannelBackend for JpegBackend {
    type Compressor = JpegCompressor;
    type Decompressor = JpegDecompressor;

    fn compressor(&self, channel: Channel) -> Result<JpegCompressor, CodecError> {
        Ok(JpegCompressor { channel })
    }

    fn decompressor(&self, channel: Channel) -> Result<JpegDecompressor, CodecError> {
        Ok(JpegDecompressor { channel })
    }
}

/// Grayscale JPEG compression context for one channel.
#[derive(Debug)]
pub struct JpegCompressor {
    channel: Channel,
}

impl PlaneCompressor for JpegCompressor {
    fn compress(
        &mut self,
        plane: &[u8],
        width: u32,
        height: u32,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        CodecError::check_len(width as usize * height as usize, plane.len())?;

        out.clear();
        JpegEncoder::new_with_quality(&mut *out, quality)
            .write_image(plane, width, height, ExtendedColorType::L8)
            .map_err(|e| {
                CodecError::compress(format!("{:?} plane JPEG encode failed: {}", self.channel, e))
            })
    }
}

/// Grayscale JPEG decompression context for one channel.
#[derive(Debug)]
pub struct JpegDecompressor {
    channel: Channel,
}

impl PlaneDecompressor for JpegDecompressor {
    fn decompress(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> Result<(), CodecError> {
        CodecError::check_len(width as usize * height as usize, out.len())?;

        let channel = self.channel;
        let decoder = JpegDecoder::new(Cursor::new(data)).map_err(|e| {
            CodecError::compress(format!("{:?} plane JPEG header invalid: {}", channel, e))
        })?;

        let (w, h) = decoder.dimensions();
        if (w, h) != (width, height) {
            return Err(CodecError::compress(format!(
                "{:?} plane is {}x{}, expected {}x{}",
                channel, w, h, width, height
            )));
        }
        if decoder.color_type() != ColorType::L8 {
            return Err(CodecError::compress(format!(
                "{:?} plane is {:?}, expected single-channel 8-bit",
                channel,
                decoder.color_type()
            )));
        }

        decoder.read_image(out).map_err(|e| {
            CodecError::compress(format!("{:?} plane JPEG decode failed: {}", channel, e))
        })
    }
}

/// Write a planar YUV 4:2:0 frame to `path` as a colour JPEG.
///
/// The partially written file is removed if encoding or writing fails.
pub fn write_jpeg_from_yuv(
    path: impl AsRef<Path>,
    yuv: &[u8],
    width: u32,
    height: u32,
) -> Result<(), CodecError> {
    let path = path.as_ref();
    let layout = FrameLayout::new(width, height)?;
    CodecError::check_len(layout.frame_len(), yuv.len())?;

    let mut rgb = vec![0u8; layout.luma_len() * 3];
    i420_to_rgb(yuv, width, height, &mut rgb)?;

    let result = write_rgb_jpeg(path, &rgb, width, height);
    if result.is_err() {
        let _ = std::fs::remove_file(path);
    }
    result
}

fn write_rgb_jpeg(path: &Path, rgb: &[u8], width: u32, height: u32) -> Result<(), CodecError> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, SNAPSHOT_QUALITY)
        .write_image(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| CodecError::compress(format!("snapshot JPEG encode failed: {}", e)))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 4 + y * 2) % 256) as u8))
            .collect()
    }

    #[test]
    fn test_flat_plane_round_trip() {
        let backend = JpegBackend;
        let mut compressor = backend.compressor(Channel::Y).unwrap();
        let mut decompressor = backend.decompressor(Channel::Y).unwrap();

        let plane = vec![90u8; 16 * 16];
        let mut compressed = Vec::new();
        compressor
            .compress(&plane, 16, 16, 75, &mut compressed)
            .unwrap();
        assert!(!compressed.is_empty());
        assert_eq!(&compressed[..2], &[0xFF, 0xD8]);

        let mut decoded = vec![0u8; 16 * 16];
        decompressor
            .decompress(&compressed, 16, 16, &mut decoded)
            .unwrap();
        assert!(decoded.iter().all(|&v| v.abs_diff(90) <= 1));
    }

    #[test]
    fn test_output_buffer_is_reused() {
        let mut compressor = JpegBackend.compressor(Channel::U).unwrap();
        let mut out = Vec::new();

        compressor
            .compress(&gradient(32, 32), 32, 32, 90, &mut out)
            .unwrap();
        let first_len = out.len();
        compressor
            .compress(&gradient(32, 32), 32, 32, 90, &mut out)
            .unwrap();
        assert_eq!(out.len(), first_len);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut compressor = JpegBackend.compressor(Channel::Y).unwrap();
        let mut decompressor = JpegBackend.decompressor(Channel::Y).unwrap();
        let mut out = Vec::new();
        compressor
            .compress(&gradient(16, 16), 16, 16, 75, &mut out)
            .unwrap();

        let mut decoded = vec![0u8; 8 * 32];
        let err = decompressor.decompress(&out, 8, 32, &mut decoded).unwrap_err();
        assert!(matches!(err, CodecError::Compress(_)));
    }

    #[test]
    fn test_garbage_input() {
        let mut decompressor = JpegBackend.decompressor(Channel::V).unwrap();
        let mut decoded = vec![0u8; 64];
        let err = decompressor
            .decompress(&[1, 2, 3, 4], 8, 8, &mut decoded)
            .unwrap_err();
        assert!(matches!(err, CodecError::Compress(_)));
    }

    #[test]
    fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        let layout = FrameLayout::new(16, 16).unwrap();
        let yuv = vec![128u8; layout.frame_len()];

        write_jpeg_from_yuv(&path, &yuv, 16, 16).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_write_snapshot_rejects_short_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        let err = write_jpeg_from_yuv(&path, &[0u8; 10], 16, 16).unwrap_err();
        assert!(matches!(err, CodecError::BufferSize { .. }));
        assert!(!path.exists());
    }
}
