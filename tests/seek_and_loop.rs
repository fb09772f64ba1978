//! Cursor behaviour: seeking, end of stream, restart and header block flushes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use yuvdelta::format::{PRE_HEADER_WORDS, ROW_WORDS};
use yuvdelta::{Reader, Writer, WriterConfig};
use yuvdelta_codec::testing::QuantizingBackend;

const WIDTH: u32 = 16;
const HEIGHT: u32 = 16;
const FRAME_LEN: usize = 384;

fn frames(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut frame = vec![0u8; FRAME_LEN];
            rng.fill(&mut frame[..]);
            frame
        })
        .collect()
}

fn write(path: &Path, config: WriterConfig, frames: &[Vec<u8>]) -> PathBuf {
    let mut writer = Writer::with_backend(path, config, &QuantizingBackend).unwrap();
    for frame in frames {
        writer.add_frame(&mut frame.clone()).unwrap();
    }
    writer.finalize().unwrap()
}

fn open(path: &Path) -> Reader<QuantizingBackend> {
    Reader::open_with_backend(path, &QuantizingBackend).unwrap()
}

#[test]
fn test_seek_rounds_down_to_key_frame() {
    let dir = tempfile::tempdir().unwrap();
    let input = frames(17, 1);

    for step in [1u64, 2, 4, 7] {
        let path = dir.path().join(format!("step{}.ydv", step));
        write(&path, WriterConfig::new(WIDTH, HEIGHT).iframe_step(step), &input);
        let mut reader = open(&path);

        for k in 0..17u64 {
            reader.set_frame_index(k).unwrap();
            assert_eq!(reader.frame_index(), k - k % step, "k={} step={}", k, step);
        }
        for k in [17u64, 18, u64::MAX] {
            assert!(reader.set_frame_index(k).unwrap_err().is_end_of_stream());
        }
    }
}

#[test]
fn test_seek_then_decode_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.ydv");
    write(&path, WriterConfig::new(WIDTH, HEIGHT).iframe_step(4), &frames(10, 2));

    let mut reader = open(&path);
    let mut sequential = Vec::new();
    while reader.next_frame().is_ok() {
        sequential.push(reader.yuv420().to_vec());
    }
    assert_eq!(sequential.len(), 10);

    reader.set_frame_index(6).unwrap();
    for expected in &sequential[4..] {
        reader.next_frame().unwrap();
        assert_eq!(reader.yuv420(), &expected[..]);
    }
}

#[test]
fn test_restart_after_end_of_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.ydv");
    write(&path, WriterConfig::new(WIDTH, HEIGHT).iframe_step(3), &frames(5, 3));

    let mut reader = open(&path);
    reader.next_frame().unwrap();
    let first = reader.yuv420().to_vec();

    for _ in 1..5 {
        reader.next_frame().unwrap();
    }
    assert_eq!(reader.frame_index(), 5);
    assert!(reader.next_frame().unwrap_err().is_end_of_stream());
    // End of stream does not move the cursor
    assert!(reader.next_frame().unwrap_err().is_end_of_stream());

    reader.restart();
    assert_eq!(reader.frame_index(), 0);
    reader.next_frame().unwrap();
    assert_eq!(reader.yuv420(), &first[..]);
}

#[test]
fn test_header_block_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let input = frames(20, 4);
    let reference = write(
        &dir.path().join("reference.ydv"),
        WriterConfig::new(WIDTH, HEIGHT).iframe_step(3),
        &input,
    );
    let reference_bytes = std::fs::read(&reference).unwrap();

    // The pre-header shares the first block with the rows
    for block_words in [ROW_WORDS, 2 * ROW_WORDS, 3 * ROW_WORDS + 5, 64] {
        let rows_in_first_block = (block_words - PRE_HEADER_WORDS) / ROW_WORDS;
        for count in [rows_in_first_block, rows_in_first_block + 1, 20] {
            let path = dir
                .path()
                .join(format!("block{}_{}.ydv", block_words, count));
            let config = WriterConfig::new(WIDTH, HEIGHT)
                .iframe_step(3)
                .header_block_words(block_words);
            write(&path, config, &input[..count]);

            let mut reader = open(&path);
            assert_eq!(reader.frame_count(), count as u64);
            assert!(count == 0 || reader.record(count as u64 - 1).is_some());
            assert!(reader.record(count as u64).is_none());

            let mut decoded = 0;
            while reader.next_frame().is_ok() {
                decoded += 1;
            }
            assert_eq!(decoded, count);

            if count == 20 {
                assert_eq!(std::fs::read(&path).unwrap(), reference_bytes);
            }
        }
    }
}

#[test]
fn test_small_merge_chunks_produce_identical_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = frames(6, 5);
    let a = write(
        &dir.path().join("a.ydv"),
        WriterConfig::new(WIDTH, HEIGHT).iframe_step(2),
        &input,
    );
    let b = write(
        &dir.path().join("b.ydv"),
        WriterConfig::new(WIDTH, HEIGHT)
            .iframe_step(2)
            .merge_chunk_size(7),
        &input,
    );
    assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
}

#[test]
fn test_read_and_decode_separately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.ydv");
    write(&path, WriterConfig::new(WIDTH, HEIGHT).iframe_step(2), &frames(3, 6));

    let mut a = open(&path);
    let mut b = open(&path);
    for _ in 0..3 {
        a.next_frame().unwrap();
        b.read_next_frame().unwrap();
        assert_eq!(b.current_frame_size(), Some(FRAME_LEN as u64));
        b.decode_current_frame().unwrap();
        assert_eq!(a.yuv420(), b.yuv420());
    }
}
