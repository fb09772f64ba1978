//! Container reader.
//!
//! The pre-header and the whole header table are loaded on open; afterwards
//! only the frame cursor moves. Frames decode sequentially from a key frame,
//! so seeking rounds down to the nearest key-frame boundary.
//!
//! ```ignore
//! let mut reader = Reader::open("clip.ydv")?;
//! loop {
//!     match reader.next_frame() {
//!         Ok(()) => show(reader.yuv420()),
//!         Err(e) if e.is_end_of_stream() => reader.restart(),
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};
use yuvdelta_codec::{
    i420_to_bgra, write_jpeg_from_yuv, Channel, ChannelBackend, CodecFlags, Decoder,
    DecoderConfig, JpegBackend,
};

use crate::error::{ContainerError, Result};
use crate::format::{self, FrameRecord, PreHeader, PRE_HEADER_WORDS, ROW_WORDS, WORD_SIZE};

/// Reads frames back out of a container file.
pub struct Reader<B: ChannelBackend = JpegBackend> {
    file: File,
    path: PathBuf,
    pre_header: PreHeader,
    records: Vec<FrameRecord>,
    body_offset: u64,
    raw: Vec<u8>,
    current: Option<FrameRecord>,
    pending: bool,
    yuv: Vec<u8>,
    bgra: Option<Vec<u8>>,
    frame_index: u64,
    decoder: Decoder<B>,
}

impl Reader<JpegBackend> {
    /// Open a container decoded with the default JPEG backend.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_backend(path, &JpegBackend)
    }
}

impl<B: ChannelBackend> Reader<B> {
    /// Open a container whose channels were written by `backend`.
    pub fn open_with_backend(path: impl AsRef<Path>, backend: &B) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let mut words = [0u64; PRE_HEADER_WORDS];
        format::read_words(&mut file, &mut words)?;
        let pre_header = PreHeader::from_words(&words)?;

        // Bound the table by the file size before allocating for it
        let body_offset = (PRE_HEADER_WORDS as u64)
            .checked_add(pre_header.header_words)
            .and_then(|words| words.checked_mul(WORD_SIZE as u64))
            .filter(|&offset| offset <= file_len)
            .ok_or_else(|| {
                ContainerError::format(format!(
                    "header table of {} words does not fit in {} bytes",
                    pre_header.header_words, file_len
                ))
            })?;
        let body_len = file_len - body_offset;

        let mut table = vec![0u64; pre_header.header_words as usize];
        format::read_words(&mut io::BufReader::new(&mut file), &mut table)?;

        let mut records = Vec::with_capacity(pre_header.frame_count as usize);
        for (index, row) in table.chunks_exact(ROW_WORDS).enumerate() {
            let record = FrameRecord::from_words(row);
            record.validate(index as u64)?;
            let end = record.offset.checked_add(record.size);
            if end.map_or(true, |end| end > body_len) {
                return Err(ContainerError::format(format!(
                    "frame {} [{}, +{}) runs past the body ({} bytes)",
                    index, record.offset, record.size, body_len
                )));
            }
            records.push(record);
        }

        let decoder = Decoder::with_backend(
            DecoderConfig::new(pre_header.width, pre_header.height)
                .flags(pre_header.flags)
                .iframe_step(pre_header.iframe_step),
            backend,
        )?;
        let frame_len = decoder.layout().frame_len();

        info!(
            "Opened {}: {}x{}, {} frames, key frame every {}",
            path.display(),
            pre_header.width,
            pre_header.height,
            pre_header.frame_count,
            pre_header.iframe_step
        );

        Ok(Self {
            file,
            path,
            pre_header,
            records,
            body_offset,
            raw: Vec::new(),
            current: None,
            pending: false,
            yuv: vec![0u8; frame_len],
            bgra: None,
            frame_index: 0,
            decoder,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame (width, height).
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.pre_header.width, self.pre_header.height)
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.pre_header.frame_count
    }

    #[must_use]
    pub fn intra_frame_step(&self) -> u64 {
        self.pre_header.iframe_step
    }

    #[must_use]
    pub fn flags(&self) -> CodecFlags {
        self.pre_header.flags
    }

    /// Header table row for `index`.
    #[must_use]
    pub fn record(&self, index: u64) -> Option<&FrameRecord> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.records.get(index))
    }

    /// Compressed size of the frame last read, if any.
    #[must_use]
    pub fn current_frame_size(&self) -> Option<u64> {
        self.current.map(|record| record.size)
    }

    /// Index of the next frame to be read.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Move the cursor to the key frame at or before `index`.
    ///
    /// Fails with [`ContainerError::EndOfStream`] when `index` is past the
    /// last frame; the cursor is left untouched in that case.
    pub fn set_frame_index(&mut self, index: u64) -> Result<()> {
        if index >= self.frame_count() {
            return Err(ContainerError::EndOfStream);
        }
        let key_frame = index - index % self.pre_header.iframe_step;
        self.seek_to(key_frame);
        debug!("Seek to {} landed on key frame {}", index, key_frame);
        Ok(())
    }

    /// Rewind to the first frame without reopening the file.
    pub fn restart(&mut self) {
        self.seek_to(0);
    }

    /// Read the compressed bytes of the next frame and advance the cursor.
    pub fn read_next_frame(&mut self) -> Result<()> {
        let record = *self.record(self.frame_index).ok_or(ContainerError::EndOfStream)?;

        let size = usize::try_from(record.size)
            .map_err(|_| ContainerError::OutOfMemory(usize::MAX))?;
        if self.raw.len() < size {
            self.raw
                .try_reserve(size - self.raw.len())
                .map_err(|_| ContainerError::OutOfMemory(size))?;
            self.raw.resize(size, 0);
        }

        self.file
            .seek(SeekFrom::Start(self.body_offset + record.offset))?;
        self.file
            .read_exact(&mut self.raw[..size])
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => ContainerError::format(format!(
                    "frame {} truncated",
                    self.frame_index
                )),
                _ => ContainerError::Io(e),
            })?;

        trace!("read frame {} ({} bytes)", self.frame_index, size);
        self.current = Some(record);
        self.pending = true;
        self.frame_index += 1;
        Ok(())
    }

    /// Decode the frame last returned by [`Self::read_next_frame`].
    pub fn decode_current_frame(&mut self) -> Result<()> {
        let record = match self.current {
            Some(record) if self.pending => record,
            _ => {
                return Err(ContainerError::InvalidCall(
                    "no frame read since the last decode or seek".to_string(),
                ))
            }
        };
        self.pending = false;

        for channel in Channel::ALL {
            let span = record.channel(channel);
            // Spans were checked against the frame size on open
            let start = span.offset as usize;
            let end = start + span.size as usize;
            self.decoder
                .decode_sub_frame(channel, &self.raw[start..end], &mut self.yuv)?;
        }
        self.decoder.finalize_frame(&mut self.yuv)?;
        Ok(())
    }

    /// Read and decode the next frame.
    ///
    /// [`ContainerError::EndOfStream`] is recoverable: call
    /// [`Self::restart`] and continue.
    pub fn next_frame(&mut self) -> Result<()> {
        self.read_next_frame()?;
        self.decode_current_frame()
    }

    /// Convert the current frame to packed BGRA, allocating the buffer on
    /// first use.
    pub fn transform_to_bgra(&mut self) -> Result<&[u8]> {
        let (width, height) = self.resolution();
        let len = width as usize * height as usize * 4;
        let bgra = self.bgra.get_or_insert_with(|| vec![0u8; len]);
        i420_to_bgra(&self.yuv, width, height, bgra)?;
        Ok(bgra.as_slice())
    }

    /// The current decoded frame, planar YUV 4:2:0.
    #[must_use]
    pub fn yuv420(&self) -> &[u8] {
        &self.yuv
    }

    /// The last BGRA conversion, if one has been made.
    #[must_use]
    pub fn bgra(&self) -> Option<&[u8]> {
        self.bgra.as_deref()
    }

    /// Save the current frame as a JPEG.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let (width, height) = self.resolution();
        write_jpeg_from_yuv(path, &self.yuv, width, height)?;
        Ok(())
    }

    fn seek_to(&mut self, index: u64) {
        self.frame_index = index;
        self.decoder.set_frame_index(index);
        self.current = None;
        self.pending = false;
    }
}
