//! Container writer.
//!
//! Header words and compressed frame bytes go to two staging files next to
//! the output (`<output>.header` and `<output>.video`). Header words are
//! collected in a fixed-capacity block that is flushed whenever it fills, so
//! memory stays bounded on long captures. [`Writer::finalize`] patches the
//! pre-header and concatenates both staging files into the output.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};
use yuvdelta_codec::{
    Channel, ChannelBackend, CodecFlags, Encoder, EncoderConfig, JpegBackend, CHANNEL_COUNT,
};

use crate::error::{ContainerError, Result};
use crate::format::{
    self, FrameRecord, PreHeader, DEFAULT_HEADER_BLOCK_WORDS, DEFAULT_MERGE_CHUNK_SIZE,
    PRE_HEADER_WORDS, ROW_WORDS, WORD_FRAME_COUNT, WORD_HEADER_SIZE, WORD_IFRAME_STEP, WORD_SIZE,
};

/// Configuration for creating a [`Writer`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frame codec settings.
    pub encoder: EncoderConfig,
    /// Capacity of the in-memory header block, in words.
    pub header_block_words: usize,
    /// Copy chunk size used when merging the staging files.
    pub merge_chunk_size: usize,
}

impl WriterConfig {
    /// Create a writer configuration with the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            encoder: EncoderConfig::new(width, height),
            header_block_words: DEFAULT_HEADER_BLOCK_WORDS,
            merge_chunk_size: DEFAULT_MERGE_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn flags(mut self, flags: impl Into<CodecFlags>) -> Self {
        self.encoder = self.encoder.flags(flags);
        self
    }

    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.encoder = self.encoder.quality(quality);
        self
    }

    #[must_use]
    pub fn intra_frame_quality(mut self, quality: u8) -> Self {
        self.encoder = self.encoder.intra_frame_quality(quality);
        self
    }

    #[must_use]
    pub fn iframe_step(mut self, step: u64) -> Self {
        self.encoder = self.encoder.iframe_step(step);
        self
    }

    /// Set the header block capacity (at least one row).
    #[must_use]
    pub fn header_block_words(mut self, words: usize) -> Self {
        self.header_block_words = words;
        self
    }

    /// Set the merge chunk size in bytes.
    #[must_use]
    pub fn merge_chunk_size(mut self, bytes: usize) -> Self {
        self.merge_chunk_size = bytes;
        self
    }
}

/// Writes planar YUV 4:2:0 frames into a single seekable container file.
pub struct Writer<B: ChannelBackend = JpegBackend> {
    encoder: Encoder<B>,
    output: PathBuf,
    header_path: PathBuf,
    body_path: PathBuf,
    header_file: Option<BufWriter<File>>,
    body_file: Option<BufWriter<File>>,
    header_block: Vec<u64>,
    header_block_words: usize,
    merge_chunk_size: usize,
    body_len: u64,
    frame_count: u64,
    finalized: bool,
}

impl Writer<JpegBackend> {
    /// Create a writer with default settings.
    pub fn create(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        flags: impl Into<CodecFlags>,
    ) -> Result<Self> {
        Self::with_config(path, WriterConfig::new(width, height).flags(flags))
    }

    pub fn with_config(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        Self::with_backend(path, config, &JpegBackend)
    }
}

impl<B: ChannelBackend> Writer<B> {
    /// Create a writer whose encoder uses `backend`.
    ///
    /// No file is left behind if construction fails.
    pub fn with_backend(path: impl AsRef<Path>, config: WriterConfig, backend: &B) -> Result<Self> {
        if config.header_block_words < ROW_WORDS {
            return Err(ContainerError::InvalidParam(format!(
                "header block must hold at least {} words, got {}",
                ROW_WORDS, config.header_block_words
            )));
        }
        if config.merge_chunk_size == 0 {
            return Err(ContainerError::InvalidParam(
                "merge chunk size must be non-zero".to_string(),
            ));
        }

        let encoder = Encoder::with_backend(config.encoder.clone(), backend)?;

        let output = path.as_ref().to_path_buf();
        let header_path = staging_path(&output, ".header");
        let body_path = staging_path(&output, ".video");

        let body_file = File::create(&body_path)?;
        let header_file = match File::create(&header_path) {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&body_path);
                return Err(e.into());
            }
        };

        let layout = encoder.layout();
        let mut writer = Self {
            encoder,
            output,
            header_path,
            body_path,
            header_file: Some(BufWriter::new(header_file)),
            body_file: Some(BufWriter::new(body_file)),
            header_block: Vec::with_capacity(config.header_block_words),
            header_block_words: config.header_block_words,
            merge_chunk_size: config.merge_chunk_size,
            body_len: 0,
            frame_count: 0,
            finalized: false,
        };

        let pre_header = PreHeader::placeholder(
            layout.width(),
            layout.height(),
            writer.encoder.iframe_step(),
            writer.encoder.flags(),
        );
        writer.push_words(&pre_header.to_words())?;

        debug!(
            "Writer created: {} ({}x{}, flags {:#x})",
            writer.output.display(),
            layout.width(),
            layout.height(),
            writer.encoder.flags().bits()
        );
        Ok(writer)
    }

    /// Set the key-frame interval. Must happen before the first frame.
    pub fn set_intra_frame_step(&mut self, step: u64) -> Result<()> {
        if step == 0 {
            return Err(ContainerError::InvalidParam(
                "key-frame interval must be at least 1".to_string(),
            ));
        }
        if self.frame_count > 0 {
            return Err(ContainerError::InvalidCall(format!(
                "key-frame interval changed after {} frames",
                self.frame_count
            )));
        }
        self.encoder.set_iframe_step(step)?;
        Ok(())
    }

    /// Encode one planar frame and append it.
    ///
    /// `frame` is used as scratch space and holds garbage afterwards. A
    /// failure aborts the frame without counting it; I/O failures leave the
    /// session unusable.
    pub fn add_frame(&mut self, frame: &mut [u8]) -> Result<()> {
        let encoder = &mut self.encoder;
        encoder.begin_frame(frame)?;
        for channel in Channel::ALL {
            encoder.begin_sub_frame(frame, channel)?;
        }
        for channel in Channel::ALL {
            encoder.end_sub_frame(frame, channel)?;
        }
        encoder.end_frame(frame)?;

        let mut sizes = [0u64; CHANNEL_COUNT];
        let body = self.body_file.as_mut().ok_or_else(finalized_error)?;
        for channel in Channel::ALL {
            let data = self.encoder.compressed(channel);
            body.write_all(data)?;
            sizes[channel.index()] = data.len() as u64;
        }

        let record = FrameRecord::contiguous(self.body_len, sizes);
        self.push_words(&record.to_words())?;
        self.body_len += record.size;

        trace!(
            "frame {}: {} bytes at body offset {}",
            self.frame_count,
            record.size,
            record.offset
        );
        self.frame_count += 1;
        Ok(())
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn intra_frame_step(&self) -> u64 {
        self.encoder.iframe_step()
    }

    /// Path of the final output file.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Write the container and remove the staging files.
    ///
    /// If the merge fails the partially written output is left in place.
    pub fn finalize(mut self) -> Result<PathBuf> {
        self.flush_header_block()?;

        let header_words = self.frame_count * ROW_WORDS as u64;
        let mut header_file = take_file(&mut self.header_file)?;
        let body_file = take_file(&mut self.body_file)?;
        drop(body_file);

        // The placeholder went to the staging file with the first block
        patch_word(&mut header_file, WORD_HEADER_SIZE, header_words)?;
        patch_word(&mut header_file, WORD_FRAME_COUNT, self.frame_count)?;
        patch_word(&mut header_file, WORD_IFRAME_STEP, self.encoder.iframe_step())?;
        header_file.sync_all()?;
        drop(header_file);

        let mut output = BufWriter::new(File::create(&self.output)?);
        let header_bytes = self.append_file(&mut output, &self.header_path)?;
        let body_bytes = self.append_file(&mut output, &self.body_path)?;
        output.flush()?;
        drop(output);

        debug_assert_eq!(
            header_bytes,
            ((PRE_HEADER_WORDS as u64) + header_words) * WORD_SIZE as u64
        );

        fs::remove_file(&self.header_path)?;
        fs::remove_file(&self.body_path)?;
        self.finalized = true;

        info!(
            "Wrote {}: {} frames, {} header bytes, {} body bytes",
            self.output.display(),
            self.frame_count,
            header_bytes,
            body_bytes
        );
        Ok(std::mem::take(&mut self.output))
    }

    fn push_words(&mut self, words: &[u64]) -> Result<()> {
        if self.header_block.len() + words.len() > self.header_block_words {
            self.flush_header_block()?;
        }
        self.header_block.extend_from_slice(words);
        Ok(())
    }

    fn flush_header_block(&mut self) -> Result<()> {
        if self.header_block.is_empty() {
            return Ok(());
        }
        let file = self.header_file.as_mut().ok_or_else(finalized_error)?;
        format::write_words(file, &self.header_block)?;
        debug!("Flushed header block of {} words", self.header_block.len());
        self.header_block.clear();
        Ok(())
    }

    fn append_file<W: Write>(&self, output: &mut W, path: &Path) -> Result<u64> {
        let mut input = File::open(path)?;
        let len = input.metadata()?.len();
        let chunk = self.merge_chunk_size.min(len.max(1) as usize);
        let mut buf = vec![0u8; chunk];

        let mut copied = 0u64;
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
            copied += n as u64;
        }

        if copied != len {
            return Err(ContainerError::format(format!(
                "{} changed size while merging ({} of {} bytes)",
                path.display(),
                copied,
                len
            )));
        }
        debug!("Merged {} bytes from {}", copied, path.display());
        Ok(copied)
    }
}

impl<B: ChannelBackend> Drop for Writer<B> {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(
                "Writer for {} dropped without finalize after {} frames; staging files left at {} and {}",
                self.output.display(),
                self.frame_count,
                self.header_path.display(),
                self.body_path.display()
            );
        }
    }
}

fn staging_path(output: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn patch_word(file: &mut File, index: usize, value: u64) -> Result<()> {
    file.seek(SeekFrom::Start((index * WORD_SIZE) as u64))?;
    format::write_words(file, &[value])?;
    Ok(())
}

fn take_file(slot: &mut Option<BufWriter<File>>) -> Result<File> {
    let writer = slot.take().ok_or_else(finalized_error)?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn finalized_error() -> ContainerError {
    ContainerError::InvalidCall("writer already finalized".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yuvdelta_codec::testing::QuantizingBackend;

    fn frame(len: usize, value: u8) -> Vec<u8> {
        vec![value; len]
    }

    #[test]
    fn test_staging_paths() {
        let path = Path::new("/tmp/clip.ydv");
        assert_eq!(
            staging_path(path, ".header"),
            PathBuf::from("/tmp/clip.ydv.header")
        );
        assert_eq!(
            staging_path(path, ".video"),
            PathBuf::from("/tmp/clip.ydv.video")
        );
    }

    #[test]
    fn test_bad_dimensions_create_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ydv");
        let err = Writer::create(&path, 12, 16, 0u64).err().unwrap();
        assert!(matches!(err, ContainerError::Codec(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staging_files_exist_until_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.ydv");
        let mut writer =
            Writer::with_backend(&path, WriterConfig::new(16, 16), &QuantizingBackend).unwrap();
        assert!(staging_path(&path, ".header").exists());
        assert!(staging_path(&path, ".video").exists());

        writer.add_frame(&mut frame(384, 7)).unwrap();
        let out = writer.finalize().unwrap();

        assert_eq!(out, path);
        assert!(path.exists());
        assert!(!staging_path(&path, ".header").exists());
        assert!(!staging_path(&path, ".video").exists());
    }

    #[test]
    fn test_set_intra_frame_step_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.ydv");
        let mut writer =
            Writer::with_backend(&path, WriterConfig::new(16, 16), &QuantizingBackend).unwrap();

        assert!(matches!(
            writer.set_intra_frame_step(0),
            Err(ContainerError::InvalidParam(_))
        ));
        writer.set_intra_frame_step(5).unwrap();
        writer.add_frame(&mut frame(384, 1)).unwrap();
        assert!(matches!(
            writer.set_intra_frame_step(2),
            Err(ContainerError::InvalidCall(_))
        ));
        assert_eq!(writer.intra_frame_step(), 5);
        writer.finalize().unwrap();
    }

    #[test]
    fn test_pre_header_is_patched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.ydv");
        let config = WriterConfig::new(16, 8).flags(0x21u64);
        let mut writer = Writer::with_backend(&path, config, &QuantizingBackend).unwrap();
        writer.set_intra_frame_step(3).unwrap();
        for i in 0..4 {
            writer.add_frame(&mut frame(192, i * 10)).unwrap();
        }
        writer.finalize().unwrap();

        let bytes = fs::read(&path).unwrap();
        let mut words = [0u64; PRE_HEADER_WORDS];
        format::read_words(&mut &bytes[..], &mut words).unwrap();
        assert_eq!(words, [32, 4, 16, 8, 3, 0x21, 0, 0]);

        // Quantized planes are stored uncompressed: 128 + 32 + 32 bytes per frame
        let header_len = (PRE_HEADER_WORDS + 32) * WORD_SIZE;
        assert_eq!(bytes.len(), header_len + 4 * 192);
    }

    #[test]
    fn test_rejects_tiny_header_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.ydv");
        let config = WriterConfig::new(16, 16).header_block_words(ROW_WORDS - 1);
        let err = Writer::with_backend(&path, config, &QuantizingBackend)
            .err()
            .unwrap();
        assert!(matches!(err, ContainerError::InvalidParam(_)));
        assert!(!staging_path(&path, ".video").exists());
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.ydv");
        let mut writer =
            Writer::with_backend(&path, WriterConfig::new(16, 16), &QuantizingBackend).unwrap();
        let err = writer.add_frame(&mut frame(100, 0)).unwrap_err();
        assert!(matches!(err, ContainerError::Codec(_)));
        assert_eq!(writer.frame_count(), 0);
        writer.finalize().unwrap();
    }
}
