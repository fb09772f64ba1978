//! Decode-ahead worker.
//!
//! A worker thread owns a [`Reader`] and decodes one frame ahead of the
//! consumer. The two sides share a single handshake behind one mutex and
//! condition variable:
//!
//! - `can_decode`: the worker may decode the next frame
//! - `frame_ready`: a decoded frame is waiting for the consumer
//!
//! The consumer reads the frame only while holding the lock, then grants the
//! next decode. At most one decoded frame is outstanding. Shutdown clears
//! `running`, which both sides check on every wakeup.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};
use yuvdelta_codec::ChannelBackend;

use crate::error::{ContainerError, Result};
use crate::reader::Reader;

/// Pixel format handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Planar YUV 4:2:0 as decoded.
    #[default]
    Yuv420,
    /// Packed BGRA converted on the worker.
    Bgra,
}

/// Options for [`DecodeAhead::spawn`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefetchConfig {
    pub format: OutputFormat,
    /// Restart from the first frame at end of stream instead of finishing.
    pub looping: bool,
}

impl PrefetchConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

#[derive(Default)]
struct Handshake {
    frame_ready: bool,
    can_decode: bool,
    running: bool,
    finished: bool,
    failure: Option<ContainerError>,
    frame_index: u64,
    frame: Vec<u8>,
}

type Shared = Arc<(Mutex<Handshake>, Condvar)>;

/// Background decoder feeding frames to one consumer.
pub struct DecodeAhead {
    shared: Shared,
    worker: Option<JoinHandle<()>>,
}

impl DecodeAhead {
    /// Start decoding from the reader's current position.
    pub fn spawn<B>(reader: Reader<B>, config: PrefetchConfig) -> Result<Self>
    where
        B: ChannelBackend + 'static,
        B::Decompressor: 'static,
    {
        let shared: Shared = Arc::new((
            Mutex::new(Handshake {
                can_decode: true,
                running: true,
                ..Default::default()
            }),
            Condvar::new(),
        ));

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("yuvdelta-decode".to_string())
            .spawn(move || decode_loop(reader, config, worker_shared))?;

        debug!("Decode-ahead worker started ({:?})", config.format);
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Wait for the next decoded frame and pass it to `consume`.
    ///
    /// `consume` runs with the handshake locked, so it should copy what it
    /// needs and return. Returns `Ok(None)` once the stream has ended or the
    /// worker was shut down, and the worker's error if decoding failed.
    pub fn with_frame<R>(&self, consume: impl FnOnce(u64, &[u8]) -> R) -> Result<Option<R>> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();

        loop {
            if !state.running {
                return Ok(None);
            }
            if state.frame_ready {
                break;
            }
            if let Some(e) = state.failure.take() {
                return Err(e);
            }
            if state.finished {
                return Ok(None);
            }
            cvar.wait(&mut state);
        }

        let result = consume(state.frame_index, &state.frame);
        state.frame_ready = false;
        state.can_decode = true;
        cvar.notify_all();
        Ok(Some(result))
    }

    /// Copy the next frame into `out`, resizing it to fit.
    pub fn next_frame_into(&self, out: &mut Vec<u8>) -> Result<Option<u64>> {
        self.with_frame(|index, frame| {
            out.clear();
            out.extend_from_slice(frame);
            index
        })
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            lock.lock().running = false;
            cvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Decode-ahead worker panicked");
            }
        }
    }
}

impl Drop for DecodeAhead {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_loop<B: ChannelBackend>(mut reader: Reader<B>, config: PrefetchConfig, shared: Shared) {
    let (lock, cvar) = &*shared;

    loop {
        {
            let mut state = lock.lock();
            while state.running && !state.can_decode {
                cvar.wait(&mut state);
            }
            if !state.running {
                break;
            }
            state.can_decode = false;
        }

        // Decode without holding the lock; the consumer is not reading.
        let result = decode_one(&mut reader, config);

        let mut state = lock.lock();
        match result {
            Ok(()) => {
                let frame = match config.format {
                    OutputFormat::Yuv420 => reader.yuv420(),
                    OutputFormat::Bgra => reader.bgra().unwrap_or_default(),
                };
                state.frame.clear();
                state.frame.extend_from_slice(frame);
                state.frame_index = reader.frame_index() - 1;
                state.frame_ready = true;
            }
            Err(ContainerError::EndOfStream) => {
                debug!("Decode-ahead reached end of stream");
                state.finished = true;
            }
            Err(e) => {
                warn!("Decode-ahead worker stopped: {}", e);
                state.failure = Some(e);
                state.finished = true;
            }
        }
        let finished = state.finished;
        cvar.notify_all();
        drop(state);

        if finished {
            break;
        }
    }
}

fn decode_one<B: ChannelBackend>(reader: &mut Reader<B>, config: PrefetchConfig) -> Result<()> {
    match reader.next_frame() {
        Err(e) if e.is_end_of_stream() && config.looping && reader.frame_count() > 0 => {
            reader.restart();
            reader.next_frame()?;
        }
        other => other?,
    }
    if config.format == OutputFormat::Bgra {
        reader.transform_to_bgra()?;
    }
    Ok(())
}
