//! yuvdelta - seekable container for key-frame/delta-frame YUV 4:2:0 video.
//!
//! A container file holds a fixed pre-header, a table with one row per frame
//! and the compressed channel bytes of every frame. Frames are produced and
//! consumed by the [`yuvdelta_codec`] encoder and decoder.
//!
//! # Writing
//!
//! ```ignore
//! use yuvdelta::Writer;
//!
//! let mut writer = Writer::create("clip.ydv", 640, 480, 0u64)?;
//! writer.set_intra_frame_step(10)?;
//! for mut frame in frames {
//!     writer.add_frame(&mut frame)?;
//! }
//! writer.finalize()?;
//! ```
//!
//! # Reading
//!
//! ```ignore
//! use yuvdelta::Reader;
//!
//! let mut reader = Reader::open("clip.ydv")?;
//! reader.set_frame_index(25)?; // lands on key frame 20
//! while reader.next_frame().is_ok() {
//!     let bgra = reader.transform_to_bgra()?;
//! }
//! ```

pub mod error;
pub mod format;
pub mod prefetch;
pub mod reader;
pub mod writer;

pub use error::{ContainerError, Result};
pub use format::{ChannelSpan, FrameRecord, PreHeader};
pub use prefetch::{DecodeAhead, OutputFormat, PrefetchConfig};
pub use reader::Reader;
pub use writer::{Writer, WriterConfig};

pub use yuvdelta_codec as codec;
