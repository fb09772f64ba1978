//! Decode a yuvdelta container as fast as possible, looping like a player.
//!
//! Usage:
//!   yuvdelta-play <file.ydv> [options]
//!
//! Options:
//!   --loops <n>             Play the stream n times (default: 1)
//!   --prefetch              Decode one frame ahead on a worker thread
//!   --bgra                  Convert every frame to packed BGRA
//!   --seek <k>              Start at the key frame at or before k
//!   --snapshot <out.jpg>    Save the first decoded frame as a JPEG

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Instant;
use yuvdelta::{DecodeAhead, OutputFormat, PrefetchConfig, Reader};

struct Args {
    file: PathBuf,
    loops: u32,
    prefetch: bool,
    bgra: bool,
    seek: Option<u64>,
    snapshot: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut file = None;
    let mut loops = 1u32;
    let mut prefetch = false;
    let mut bgra = false;
    let mut seek = None;
    let mut snapshot = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--loops" if i + 1 < args.len() => {
                loops = args[i + 1].parse().unwrap_or(loops);
                i += 2;
            }
            "--prefetch" => {
                prefetch = true;
                i += 1;
            }
            "--bgra" => {
                bgra = true;
                i += 1;
            }
            "--seek" if i + 1 < args.len() => {
                seek = args[i + 1].parse().ok();
                i += 2;
            }
            "--snapshot" if i + 1 < args.len() => {
                snapshot = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--help" | "-h" => return None,
            arg => {
                if file.is_none() && !arg.starts_with("--") {
                    file = Some(PathBuf::from(arg));
                }
                i += 1;
            }
        }
    }

    Some(Args {
        file: file?,
        loops: loops.max(1),
        prefetch,
        bgra,
        seek,
        snapshot,
    })
}

fn print_usage() {
    println!("yuvdelta-play - decode a yuvdelta container and report throughput");
    println!();
    println!("Usage: yuvdelta-play <file.ydv> [options]");
    println!();
    println!("Options:");
    println!("  --loops <n>             Play the stream n times (default: 1)");
    println!("  --prefetch              Decode one frame ahead on a worker thread");
    println!("  --bgra                  Convert every frame to packed BGRA");
    println!("  --seek <k>              Start at the key frame at or before k");
    println!("  --snapshot <out.jpg>    Save the first decoded frame as a JPEG");
}

/// Decode on the calling thread, restarting at end of stream.
fn play_direct(reader: &mut Reader, args: &Args) -> Result<u64> {
    let total = reader.frame_count() * u64::from(args.loops);
    let mut decoded = 0u64;
    let mut snapshot = args.snapshot.clone();

    while decoded < total {
        match reader.next_frame() {
            Ok(()) => {}
            Err(e) if e.is_end_of_stream() => {
                reader.restart();
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        if args.bgra {
            reader.transform_to_bgra()?;
        }
        if let Some(path) = snapshot.take() {
            reader.write_snapshot(&path)?;
            println!("Snapshot: {}", path.display());
        }
        decoded += 1;
    }
    Ok(decoded)
}

/// Decode on a worker thread and copy frames out as a display loop would.
fn play_prefetch(reader: Reader, args: &Args) -> Result<u64> {
    let total = reader.frame_count() * u64::from(args.loops);
    let format = if args.bgra {
        OutputFormat::Bgra
    } else {
        OutputFormat::Yuv420
    };
    let config = PrefetchConfig::new().format(format).looping(true);
    let mut prefetch = DecodeAhead::spawn(reader, config)?;

    let mut frame = Vec::new();
    let mut decoded = 0u64;
    while decoded < total {
        if prefetch.next_frame_into(&mut frame)?.is_none() {
            break;
        }
        decoded += 1;
    }
    prefetch.shutdown();
    Ok(decoded)
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

    let mut reader = Reader::open(&args.file)?;
    let (width, height) = reader.resolution();
    println!(
        "{}: {}x{}, {} frames, key frame every {}, flags {:#x}",
        args.file.display(),
        width,
        height,
        reader.frame_count(),
        reader.intra_frame_step(),
        reader.flags().bits()
    );
    if reader.frame_count() == 0 {
        bail!("{} contains no frames", args.file.display());
    }

    if let Some(k) = args.seek {
        reader.set_frame_index(k)?;
        println!("Seek to {} -> key frame {}", k, reader.frame_index());
    }

    let start = Instant::now();
    let decoded = if args.prefetch {
        if args.snapshot.is_some() {
            tracing::warn!("--snapshot is ignored with --prefetch");
        }
        play_prefetch(reader, &args)?
    } else {
        play_direct(&mut reader, &args)?
    };
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "Decoded {} frames in {:.2}s ({:.1} fps{})",
        decoded,
        elapsed,
        decoded as f64 / elapsed.max(1e-9),
        if args.prefetch { ", prefetch" } else { "" }
    );
    Ok(())
}
