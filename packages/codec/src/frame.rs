//! Planar frame type and colour conversions.

use crate::{Channel, CodecError, FrameLayout};

/// An owned planar YUV 4:2:0 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvFrame {
    layout: FrameLayout,
    data: Vec<u8>,
}

impl YuvFrame {
    /// Wrap planar data, checking it is exactly one frame long.
    pub fn from_vec(layout: FrameLayout, data: Vec<u8>) -> Result<Self, CodecError> {
        CodecError::check_len(layout.frame_len(), data.len())?;
        Ok(Self { layout, data })
    }

    /// A frame with every sample of each plane set to one value.
    #[must_use]
    pub fn solid(layout: FrameLayout, y: u8, u: u8, v: u8) -> Self {
        let mut data = vec![0u8; layout.frame_len()];
        data[layout.plane_range(Channel::Y)].fill(y);
        data[layout.plane_range(Channel::U)].fill(u);
        data[layout.plane_range(Channel::V)].fill(v);
        Self { layout, data }
    }

    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// The whole planar buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the whole planar buffer, as the encoder requires.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    pub fn plane(&self, channel: Channel) -> &[u8] {
        &self.data[self.layout.plane_range(channel)]
    }

    pub fn plane_mut(&mut self, channel: Channel) -> &mut [u8] {
        let range = self.layout.plane_range(channel);
        &mut self.data[range]
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Size in bytes of one planar YUV 4:2:0 frame.
#[must_use]
pub fn expected_frame_size(width: u32, height: u32) -> usize {
    let pixels = width as usize * height as usize;
    pixels + pixels / 2
}

// ============================================================================
// Color conversion functions
// ============================================================================

/// Convert planar YUV 4:2:0 to packed BGRA (alpha 255).
///
/// Uses full-range BT.601 (JFIF) coefficients; each chroma sample covers a
/// 2x2 block of luma samples.
pub fn i420_to_bgra(yuv: &[u8], width: u32, height: u32, bgra: &mut [u8]) -> Result<(), CodecError> {
    convert_i420(yuv, width, height, bgra, 4, |px, r, g, b| {
        px[0] = b;
        px[1] = g;
        px[2] = r;
        px[3] = 255;
    })
}

/// Convert planar YUV 4:2:0 to packed RGB.
pub fn i420_to_rgb(yuv: &[u8], width: u32, height: u32, rgb: &mut [u8]) -> Result<(), CodecError> {
    convert_i420(yuv, width, height, rgb, 3, |px, r, g, b| {
        px[0] = r;
        px[1] = g;
        px[2] = b;
    })
}

fn convert_i420(
    yuv: &[u8],
    width: u32,
    height: u32,
    out: &mut [u8],
    bytes_per_pixel: usize,
    store: impl Fn(&mut [u8], u8, u8, u8),
) -> Result<(), CodecError> {
    let w = width as usize;
    let h = height as usize;
    if w < 2 || h < 2 || w % 2 != 0 || h % 2 != 0 {
        return Err(CodecError::Conversion(format!(
            "I420 needs even non-zero dimensions, got {}x{}",
            width, height
        )));
    }
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let expected = y_size + uv_size * 2;
    if yuv.len() != expected {
        return Err(CodecError::Conversion(format!(
            "I420 data size mismatch: expected {}, got {}",
            expected,
            yuv.len()
        )));
    }
    if out.len() != y_size * bytes_per_pixel {
        return Err(CodecError::Conversion(format!(
            "packed output size mismatch: expected {}, got {}",
            y_size * bytes_per_pixel,
            out.len()
        )));
    }

    let y_plane = &yuv[..y_size];
    let u_plane = &yuv[y_size..y_size + uv_size];
    let v_plane = &yuv[y_size + uv_size..];
    let uv_stride = w / 2;

    for (row, out_row) in out.chunks_exact_mut(w * bytes_per_pixel).enumerate() {
        let uv_row = (row / 2).min(h / 2 - 1);
        for (col, px) in out_row.chunks_exact_mut(bytes_per_pixel).enumerate() {
            let uv_idx = uv_row * uv_stride + (col / 2).min(uv_stride - 1);

            let y = y_plane[row * w + col] as f32;
            let u = u_plane[uv_idx] as f32 - 128.0;
            let v = v_plane[uv_idx] as f32 - 128.0;

            let r = (y + 1.402 * v + 0.5).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344136 * u - 0.714136 * v + 0.5).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u + 0.5).clamp(0.0, 255.0) as u8;

            store(px, r, g, b);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_frame_size() {
        assert_eq!(expected_frame_size(1920, 1080), 1920 * 1080 * 3 / 2);
        assert_eq!(expected_frame_size(16, 16), 384);
    }

    #[test]
    fn test_solid_frame_planes() {
        let layout = FrameLayout::new(16, 8).unwrap();
        let frame = YuvFrame::solid(layout, 10, 20, 30);
        assert!(frame.plane(Channel::Y).iter().all(|&v| v == 10));
        assert!(frame.plane(Channel::U).iter().all(|&v| v == 20));
        assert!(frame.plane(Channel::V).iter().all(|&v| v == 30));
        assert_eq!(frame.data().len(), layout.frame_len());
    }

    #[test]
    fn test_from_vec_checks_length() {
        let layout = FrameLayout::new(8, 8).unwrap();
        assert!(YuvFrame::from_vec(layout, vec![0; 96]).is_ok());
        assert!(matches!(
            YuvFrame::from_vec(layout, vec![0; 95]),
            Err(CodecError::BufferSize { expected: 96, actual: 95 })
        ));
    }

    #[test]
    fn test_gray_to_bgra() {
        let layout = FrameLayout::new(8, 8).unwrap();
        let frame = YuvFrame::solid(layout, 128, 128, 128);
        let mut bgra = vec![0u8; 8 * 8 * 4];
        i420_to_bgra(frame.data(), 8, 8, &mut bgra).unwrap();
        for px in bgra.chunks_exact(4) {
            assert_eq!(px, &[128, 128, 128, 255]);
        }
    }

    #[test]
    fn test_red_to_rgb() {
        // Full-range BT.601 red: Y=76, U=85, V=255
        let layout = FrameLayout::new(8, 8).unwrap();
        let frame = YuvFrame::solid(layout, 76, 85, 255);
        let mut rgb = vec![0u8; 8 * 8 * 3];
        i420_to_rgb(frame.data(), 8, 8, &mut rgb).unwrap();
        assert!(rgb[0] > 240);
        assert!(rgb[1] < 10);
        assert!(rgb[2] < 10);
    }

    #[test]
    fn test_chroma_upsampling_covers_2x2_blocks() {
        let layout = FrameLayout::new(8, 8).unwrap();
        let mut frame = YuvFrame::solid(layout, 128, 128, 128);
        // Brighten the blue-difference sample of the top-left 2x2 block only
        frame.plane_mut(Channel::U)[0] = 228;
        let mut bgra = vec![0u8; 8 * 8 * 4];
        i420_to_bgra(frame.data(), 8, 8, &mut bgra).unwrap();

        let blue_at = |x: usize, y: usize| bgra[(y * 8 + x) * 4];
        assert!(blue_at(0, 0) > 200);
        assert!(blue_at(1, 1) > 200);
        assert_eq!(blue_at(2, 0), 128);
        assert_eq!(blue_at(0, 2), 128);
    }

    #[test]
    fn test_conversion_size_mismatch() {
        let mut bgra = vec![0u8; 8 * 8 * 4];
        let err = i420_to_bgra(&[0u8; 10], 8, 8, &mut bgra).unwrap_err();
        assert!(matches!(err, CodecError::Conversion(_)));

        let mut short = vec![0u8; 10];
        let err = i420_to_bgra(&[0u8; 96], 8, 8, &mut short).unwrap_err();
        assert!(matches!(err, CodecError::Conversion(_)));
    }
}
