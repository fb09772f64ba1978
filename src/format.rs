//! On-disk layout.
//!
//! ```text
//! [pre-header: 8 words]
//!   0 header table size in words (pre-header excluded)
//!   1 frame count
//!   2 width
//!   3 height
//!   4 key-frame interval
//!   5 codec flags
//!   6 reserved
//!   7 reserved
//! [header table: 8 words per frame]
//!   body offset, frame size, (offset, size) for Y, U and V
//! [body: compressed channel bytes, frame after frame]
//! ```
//!
//! Words are little-endian `u64`. Frame offsets are relative to the start of
//! the body, channel offsets relative to the start of their frame.

use std::io::{self, Read, Write};

use yuvdelta_codec::{Channel, CodecFlags, CHANNEL_COUNT};

use crate::error::{ContainerError, Result};

/// Size of one on-disk word in bytes.
pub const WORD_SIZE: usize = 8;

/// Words in the pre-header.
pub const PRE_HEADER_WORDS: usize = 8;

/// Words in one header table row.
pub const ROW_WORDS: usize = 2 + 2 * CHANNEL_COUNT;

/// Default capacity of the writer's in-memory header block, in words.
pub const DEFAULT_HEADER_BLOCK_WORDS: usize = 1024;

/// Default chunk size used when merging the staging files.
pub const DEFAULT_MERGE_CHUNK_SIZE: usize = 64 * 1024 * 1024;

// Pre-header words patched at finalize
pub(crate) const WORD_HEADER_SIZE: usize = 0;
pub(crate) const WORD_FRAME_COUNT: usize = 1;
pub(crate) const WORD_IFRAME_STEP: usize = 4;

/// Format-wide metadata at the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreHeader {
    /// Size of the header table in words.
    pub header_words: u64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub iframe_step: u64,
    pub flags: CodecFlags,
}

impl PreHeader {
    /// Placeholder written at creation; counts are patched at finalize.
    #[must_use]
    pub fn placeholder(width: u32, height: u32, iframe_step: u64, flags: CodecFlags) -> Self {
        Self {
            header_words: 0,
            frame_count: 0,
            width,
            height,
            iframe_step,
            flags,
        }
    }

    #[must_use]
    pub fn to_words(&self) -> [u64; PRE_HEADER_WORDS] {
        [
            self.header_words,
            self.frame_count,
            u64::from(self.width),
            u64::from(self.height),
            self.iframe_step,
            self.flags.bits(),
            0,
            0,
        ]
    }

    /// Parse and sanity-check the pre-header words.
    pub fn from_words(words: &[u64; PRE_HEADER_WORDS]) -> Result<Self> {
        let dimension = |word: u64, name: &str| {
            u32::try_from(word)
                .map_err(|_| ContainerError::format(format!("{} {} out of range", name, word)))
        };
        let header = Self {
            header_words: words[0],
            frame_count: words[1],
            width: dimension(words[2], "width")?,
            height: dimension(words[3], "height")?,
            iframe_step: words[4],
            flags: CodecFlags(words[5]),
        };

        if header.iframe_step == 0 {
            return Err(ContainerError::format("key-frame interval is zero"));
        }

        let expected = header.frame_count.checked_mul(ROW_WORDS as u64);
        if expected != Some(header.header_words) {
            return Err(ContainerError::format(format!(
                "header table holds {} words but {} frames need {}",
                header.header_words,
                header.frame_count,
                header.frame_count.saturating_mul(ROW_WORDS as u64)
            )));
        }
        Ok(header)
    }
}

/// Location of one channel's bytes within its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSpan {
    pub offset: u64,
    pub size: u64,
}

/// One header table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRecord {
    /// Offset of the frame from the start of the body.
    pub offset: u64,
    /// Total compressed size of the frame.
    pub size: u64,
    pub channels: [ChannelSpan; CHANNEL_COUNT],
}

impl FrameRecord {
    /// Build a row for a frame whose channels are stored back to back.
    #[must_use]
    pub fn contiguous(offset: u64, sizes: [u64; CHANNEL_COUNT]) -> Self {
        let mut channels = [ChannelSpan::default(); CHANNEL_COUNT];
        let mut cursor = 0;
        for (span, size) in channels.iter_mut().zip(sizes) {
            *span = ChannelSpan {
                offset: cursor,
                size,
            };
            cursor += size;
        }
        Self {
            offset,
            size: cursor,
            channels,
        }
    }

    #[must_use]
    pub fn channel(&self, channel: Channel) -> ChannelSpan {
        self.channels[channel.index()]
    }

    #[must_use]
    pub fn to_words(&self) -> [u64; ROW_WORDS] {
        let mut words = [0u64; ROW_WORDS];
        words[0] = self.offset;
        words[1] = self.size;
        for (i, span) in self.channels.iter().enumerate() {
            words[2 + 2 * i] = span.offset;
            words[3 + 2 * i] = span.size;
        }
        words
    }

    #[must_use]
    pub fn from_words(words: &[u64]) -> Self {
        let mut channels = [ChannelSpan::default(); CHANNEL_COUNT];
        for (i, span) in channels.iter_mut().enumerate() {
            *span = ChannelSpan {
                offset: words[2 + 2 * i],
                size: words[3 + 2 * i],
            };
        }
        Self {
            offset: words[0],
            size: words[1],
            channels,
        }
    }

    /// Check every channel lies inside the frame.
    pub fn validate(&self, index: u64) -> Result<()> {
        for (channel, span) in Channel::ALL.iter().zip(&self.channels) {
            let end = span.offset.checked_add(span.size);
            if end.map_or(true, |end| end > self.size) {
                return Err(ContainerError::format(format!(
                    "frame {} {:?} channel [{}, +{}) exceeds frame size {}",
                    index, channel, span.offset, span.size, self.size
                )));
            }
        }
        Ok(())
    }
}

pub fn write_words<W: Write>(writer: &mut W, words: &[u64]) -> io::Result<()> {
    for word in words {
        writer.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

/// Read exactly `out.len()` words. A short read is a format error.
pub fn read_words<R: Read>(reader: &mut R, out: &mut [u64]) -> Result<()> {
    let total = out.len();
    let mut buf = [0u8; WORD_SIZE];
    for (i, word) in out.iter_mut().enumerate() {
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ContainerError::format(format!("file ends after {} of {} words", i, total))
            }
            _ => ContainerError::Io(e),
        })?;
        *word = u64::from_le_bytes(buf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pre_header_words() {
        let mut header = PreHeader::placeholder(640, 480, 10, CodecFlags(3));
        header.frame_count = 2;
        header.header_words = 16;
        let words = header.to_words();
        assert_eq!(words, [16, 2, 640, 480, 10, 3, 0, 0]);
        assert_eq!(PreHeader::from_words(&words).unwrap(), header);
    }

    #[test]
    fn test_pre_header_rejects_inconsistent_table_size() {
        let words = [15, 2, 640, 480, 1, 0, 0, 0];
        assert!(matches!(
            PreHeader::from_words(&words),
            Err(ContainerError::Format(_))
        ));
        let words = [0, 0, 640, 480, 0, 0, 0, 0];
        assert!(matches!(
            PreHeader::from_words(&words),
            Err(ContainerError::Format(_))
        ));
        let words = [0, 0, u64::MAX, 480, 1, 0, 0, 0];
        assert!(matches!(
            PreHeader::from_words(&words),
            Err(ContainerError::Format(_))
        ));
    }

    #[test]
    fn test_contiguous_record() {
        let record = FrameRecord::contiguous(1000, [300, 40, 50]);
        assert_eq!(record.to_words(), [1000, 390, 0, 300, 300, 40, 340, 50]);
        assert_eq!(FrameRecord::from_words(&record.to_words()), record);
        assert_eq!(record.channel(Channel::V).offset, 340);
        record.validate(0).unwrap();
    }

    #[test]
    fn test_record_validation() {
        let mut record = FrameRecord::contiguous(0, [10, 10, 10]);
        record.channels[2].size = 11;
        assert!(matches!(record.validate(4), Err(ContainerError::Format(_))));

        record.channels[2] = ChannelSpan {
            offset: u64::MAX,
            size: 2,
        };
        assert!(matches!(record.validate(4), Err(ContainerError::Format(_))));
    }

    #[test]
    fn test_short_read_is_format_error() {
        let mut bytes = Vec::new();
        write_words(&mut bytes, &[1, 2, 3]).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());

        let mut words = [0u64; 3];
        read_words(&mut Cursor::new(&bytes), &mut words).unwrap();
        assert_eq!(words, [1, 2, 3]);

        let mut words = [0u64; 4];
        assert!(matches!(
            read_words(&mut Cursor::new(&bytes), &mut words),
            Err(ContainerError::Format(_))
        ));
    }
}
