//! Inter-frame delta transform over packed 8-bit planes.
//!
//! All arithmetic is 8-bit wrapping and runs over 16-byte lanes: SSE2 on x86
//! targets, a portable lane loop everywhere else. Both paths produce
//! identical bytes.
//!
//! The bias constants are part of the stream format. The forward transform
//! stores `(reference - current) + 127`; the inverse computes
//! `reference - (delta + 129)` for luma and `reference - (delta + 130)` for
//! chroma. Luma reconstructs exactly, chroma one below. Encoder and decoder
//! run the same inverse, so both sides stay bit-identical.

use crate::{Channel, CodecError, FrameLayout};

/// Bias added by the forward delta.
pub const FORWARD_BIAS: u8 = 127;

/// Bias used by the inverse delta on the luma plane.
pub const INVERSE_LUMA_BIAS: u8 = 129;

/// Bias used by the inverse delta on both chroma planes.
pub const INVERSE_CHROMA_BIAS: u8 = 130;

const LANE: usize = 16;

/// Replace `frame` with its delta against `reference`, plane by plane.
pub fn encode_delta(
    reference: &[u8],
    frame: &mut [u8],
    layout: &FrameLayout,
) -> Result<(), CodecError> {
    CodecError::check_len(layout.frame_len(), reference.len())?;
    CodecError::check_len(layout.frame_len(), frame.len())?;

    for channel in Channel::ALL {
        let range = layout.plane_range(channel);
        forward(&reference[range.clone()], &mut frame[range], FORWARD_BIAS);
    }
    Ok(())
}

/// Reconstruct a delta frame against `reference`, writing the result into
/// both `frame` and `reference`.
pub fn decode_delta(
    frame: &mut [u8],
    reference: &mut [u8],
    layout: &FrameLayout,
) -> Result<(), CodecError> {
    CodecError::check_len(layout.frame_len(), reference.len())?;
    CodecError::check_len(layout.frame_len(), frame.len())?;

    for channel in Channel::ALL {
        let range = layout.plane_range(channel);
        let bias = if channel.is_chroma() {
            INVERSE_CHROMA_BIAS
        } else {
            INVERSE_LUMA_BIAS
        };
        inverse(&mut frame[range.clone()], &mut reference[range], bias);
    }
    Ok(())
}

/// Copy a key frame verbatim into the reference buffer.
pub fn copy_to_reference(frame: &[u8], reference: &mut [u8]) -> Result<(), CodecError> {
    CodecError::check_len(reference.len(), frame.len())?;
    reference.copy_from_slice(frame);
    Ok(())
}

fn forward(reference: &[u8], frame: &mut [u8], bias: u8) {
    debug_assert_eq!(reference.len(), frame.len());
    let done = simd::forward(reference, frame, bias);
    forward_lanes(&reference[done..], &mut frame[done..], bias);
}

fn inverse(frame: &mut [u8], reference: &mut [u8], bias: u8) {
    debug_assert_eq!(reference.len(), frame.len());
    let done = simd::inverse(frame, reference, bias);
    inverse_lanes(&mut frame[done..], &mut reference[done..], bias);
}

fn forward_lanes(reference: &[u8], frame: &mut [u8], bias: u8) {
    for (cur, last) in frame.chunks_mut(LANE).zip(reference.chunks(LANE)) {
        for (c, &l) in cur.iter_mut().zip(last) {
            *c = l.wrapping_sub(*c).wrapping_add(bias);
        }
    }
}

fn inverse_lanes(frame: &mut [u8], reference: &mut [u8], bias: u8) {
    for (cur, last) in frame.chunks_mut(LANE).zip(reference.chunks_mut(LANE)) {
        for (c, l) in cur.iter_mut().zip(last.iter_mut()) {
            *l = l.wrapping_sub(c.wrapping_add(bias));
            *c = *l;
        }
    }
}

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
mod simd {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    use super::LANE;

    /// Process all whole 16-byte lanes; returns the number of bytes done.
    pub(super) fn forward(reference: &[u8], frame: &mut [u8], bias: u8) -> usize {
        let lanes = frame.len().min(reference.len()) / LANE;
        // SAFETY: SSE2 is enabled for this target and every access stays
        // within `lanes * LANE` bytes of both slices. Loads/stores are unaligned.
        unsafe {
            let bias = _mm_set1_epi8(bias as i8);
            for i in 0..lanes {
                let cur_ptr = frame.as_mut_ptr().add(i * LANE) as *mut __m128i;
                let last_ptr = reference.as_ptr().add(i * LANE) as *const __m128i;
                let cur = _mm_loadu_si128(cur_ptr);
                let last = _mm_loadu_si128(last_ptr);
                _mm_storeu_si128(cur_ptr, _mm_add_epi8(_mm_sub_epi8(last, cur), bias));
            }
        }
        lanes * LANE
    }

    /// Process all whole 16-byte lanes; returns the number of bytes done.
    pub(super) fn inverse(frame: &mut [u8], reference: &mut [u8], bias: u8) -> usize {
        let lanes = frame.len().min(reference.len()) / LANE;
        // SAFETY: as in `forward`.
        unsafe {
            let bias = _mm_set1_epi8(bias as i8);
            for i in 0..lanes {
                let cur_ptr = frame.as_mut_ptr().add(i * LANE) as *mut __m128i;
                let last_ptr = reference.as_mut_ptr().add(i * LANE) as *mut __m128i;
                let cur = _mm_loadu_si128(cur_ptr);
                let last = _mm_loadu_si128(last_ptr);
                let out = _mm_sub_epi8(last, _mm_add_epi8(cur, bias));
                _mm_storeu_si128(cur_ptr, out);
                _mm_storeu_si128(last_ptr, out);
            }
        }
        lanes * LANE
    }
}

#[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2")))]
mod simd {
    pub(super) fn forward(_reference: &[u8], _frame: &mut [u8], _bias: u8) -> usize {
        0
    }

    pub(super) fn inverse(_frame: &mut [u8], _reference: &mut [u8], _bias: u8) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_frame(layout: &FrameLayout, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = vec![0u8; layout.frame_len()];
        rng.fill(&mut buf[..]);
        buf
    }

    #[test]
    fn test_forward_matches_formula() {
        let layout = FrameLayout::new(32, 16).unwrap();
        let reference = random_frame(&layout, 1);
        let current = random_frame(&layout, 2);

        let mut delta = current.clone();
        encode_delta(&reference, &mut delta, &layout).unwrap();

        for i in 0..delta.len() {
            assert_eq!(
                delta[i],
                reference[i].wrapping_sub(current[i]).wrapping_add(127),
                "byte {}",
                i
            );
        }
    }

    #[test]
    fn test_simd_and_portable_paths_agree() {
        let layout = FrameLayout::new(48, 24).unwrap();
        let reference = random_frame(&layout, 3);
        let current = random_frame(&layout, 4);

        let mut fast = current.clone();
        forward(&reference, &mut fast, FORWARD_BIAS);
        let mut slow = current.clone();
        forward_lanes(&reference, &mut slow, FORWARD_BIAS);
        assert_eq!(fast, slow);

        let mut fast_ref = reference.clone();
        inverse(&mut fast, &mut fast_ref, INVERSE_CHROMA_BIAS);
        let mut slow_ref = reference.clone();
        inverse_lanes(&mut slow, &mut slow_ref, INVERSE_CHROMA_BIAS);
        assert_eq!(fast, slow);
        assert_eq!(fast_ref, slow_ref);
    }

    #[test]
    fn test_inverse_reconstructs_luma_exactly_and_chroma_one_below() {
        let layout = FrameLayout::new(64, 32).unwrap();
        let original_reference = random_frame(&layout, 5);
        let current = random_frame(&layout, 6);

        let mut frame = current.clone();
        encode_delta(&original_reference, &mut frame, &layout).unwrap();

        let mut reference = original_reference.clone();
        decode_delta(&mut frame, &mut reference, &layout).unwrap();

        // Output and reference are written together
        assert_eq!(frame, reference);

        let luma = layout.plane_range(Channel::Y);
        assert_eq!(&reference[luma.clone()], &current[luma]);

        for channel in [Channel::U, Channel::V] {
            let range = layout.plane_range(channel);
            for i in range {
                assert_eq!(reference[i], current[i].wrapping_sub(1), "byte {}", i);
            }
        }
    }

    #[test]
    fn test_unchanged_frame_has_flat_delta() {
        let layout = FrameLayout::new(16, 16).unwrap();
        let reference = random_frame(&layout, 7);
        let mut frame = reference.clone();
        encode_delta(&reference, &mut frame, &layout).unwrap();
        assert!(frame.iter().all(|&v| v == FORWARD_BIAS));
    }

    #[test]
    fn test_copy_to_reference() {
        let layout = FrameLayout::new(8, 8).unwrap();
        let frame = random_frame(&layout, 8);
        let mut reference = vec![0u8; layout.frame_len()];
        copy_to_reference(&frame, &mut reference).unwrap();
        assert_eq!(frame, reference);
    }

    #[test]
    fn test_length_mismatch() {
        let layout = FrameLayout::new(8, 8).unwrap();
        let reference = vec![0u8; layout.frame_len()];
        let mut short = vec![0u8; layout.frame_len() - 1];
        assert!(matches!(
            encode_delta(&reference, &mut short, &layout),
            Err(CodecError::BufferSize { .. })
        ));
        let mut reference = reference;
        assert!(matches!(
            copy_to_reference(&short, &mut reference),
            Err(CodecError::BufferSize { .. })
        ));
    }
}
