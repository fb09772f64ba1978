//! Encode raw planar I420 frames into a yuvdelta container.
//!
//! Usage:
//!   yuvdelta-encode --input <raw.yuv> --output <out.ydv> --width <W> --height <H> [options]
//!
//! Options:
//!   --step <n>              Key-frame interval (default: 1)
//!   --quality <q>           Key-frame quality 1-100 (default: 75)
//!   --intra-quality <q>     Delta-frame quality 1-100 (default: 75)
//!   --flags <n>             Codec flags stored in the pre-header (default: 0)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::time::Instant;
use yuvdelta::codec::{expected_frame_size, DEFAULT_IFRAME_STEP, DEFAULT_QUALITY};
use yuvdelta::{Writer, WriterConfig};

struct Args {
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
    step: u64,
    quality: u8,
    intra_quality: u8,
    flags: u64,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut input = None;
    let mut output = None;
    let mut width = None;
    let mut height = None;
    let mut step = DEFAULT_IFRAME_STEP;
    let mut quality = DEFAULT_QUALITY;
    let mut intra_quality = DEFAULT_QUALITY;
    let mut flags = 0u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" if i + 1 < args.len() => {
                input = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--output" | "-o" if i + 1 < args.len() => {
                output = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--width" if i + 1 < args.len() => {
                width = args[i + 1].parse().ok();
                i += 2;
            }
            "--height" if i + 1 < args.len() => {
                height = args[i + 1].parse().ok();
                i += 2;
            }
            "--step" if i + 1 < args.len() => {
                step = args[i + 1].parse().unwrap_or(step);
                i += 2;
            }
            "--quality" if i + 1 < args.len() => {
                quality = args[i + 1].parse().unwrap_or(quality);
                i += 2;
            }
            "--intra-quality" if i + 1 < args.len() => {
                intra_quality = args[i + 1].parse().unwrap_or(intra_quality);
                i += 2;
            }
            "--flags" if i + 1 < args.len() => {
                flags = args[i + 1].parse().unwrap_or(flags);
                i += 2;
            }
            "--help" | "-h" => return None,
            _ => {
                i += 1;
            }
        }
    }

    Some(Args {
        input: input?,
        output: output?,
        width: width?,
        height: height?,
        step,
        quality,
        intra_quality,
        flags,
    })
}

fn print_usage() {
    println!("yuvdelta-encode - encode raw I420 frames into a yuvdelta container");
    println!();
    println!(
        "Usage: yuvdelta-encode --input <raw.yuv> --output <out.ydv> --width <W> --height <H> [options]"
    );
    println!();
    println!("Options:");
    println!("  --step <n>              Key-frame interval (default: 1)");
    println!("  --quality <q>           Key-frame quality 1-100 (default: 75)");
    println!("  --intra-quality <q>     Delta-frame quality 1-100 (default: 75)");
    println!("  --flags <n>             Codec flags stored in the pre-header (default: 0)");
    println!();
    println!("Examples:");
    println!("  yuvdelta-encode -i capture.yuv -o capture.ydv --width 640 --height 480 --step 10");
}

/// Fill `frame` from `input`. Returns false at a clean end of input.
fn read_frame(input: &mut impl Read, frame: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < frame.len() {
        match input.read(&mut frame[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if filled != 0 && filled != frame.len() {
        tracing::warn!("Ignoring {} trailing bytes (partial frame)", filled);
    }
    Ok(filled == frame.len())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yuvdelta=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let args = match parse_args() {
        Some(a) => a,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let config = WriterConfig::new(args.width, args.height)
        .flags(args.flags)
        .quality(args.quality)
        .intra_frame_quality(args.intra_quality);
    let mut writer = Writer::with_config(&args.output, config)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    writer.set_intra_frame_step(args.step)?;

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut input = BufReader::new(file);
    let mut frame = vec![0u8; expected_frame_size(args.width, args.height)];

    let start = Instant::now();
    while read_frame(&mut input, &mut frame)? {
        writer.add_frame(&mut frame)?;
    }

    let frames = writer.frame_count();
    let output = writer.finalize()?;
    let elapsed = start.elapsed();
    let size = std::fs::metadata(&output)?.len();

    println!(
        "Encoded {} frames ({}x{}, key frame every {}) into {} bytes in {:.2}s ({:.1} fps)",
        frames,
        args.width,
        args.height,
        args.step,
        size,
        elapsed.as_secs_f64(),
        frames as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Output: {}", output.display());
    Ok(())
}
