//! MXF (Material eXchange Format) Container
//!
//! This crate reads and writes MXF files at the level of KLV triplets,
//! partitions, header metadata and frame-wrapped essence, and writes the
//! archive flavour used for tape transfers: OP1a files whose content
//! packages carry the VITC and LTC read off tape in a system item.
//!
//! # Features
//!
//! - KLV (Key-Length-Value) triplet handling with BER lengths
//! - SMPTE Universal Labels and the header metadata dictionary
//! - Header metadata reading and writing through a primer pack
//! - Partition packs, partition chains and the random index pack
//! - Constant and variable edit unit index tables
//! - Archive file writing with timecode event tracks
//! - Reading of complete and still-growing files
//!
//! # Example
//!
//! ```no_run
//! use mxfkit::{EssenceTrack, FrameListener, MxfReader, Result};
//!
//! struct Count(usize);
//!
//! impl FrameListener for Count {
//!     fn receive_frame(&mut self, _track: &EssenceTrack, data: Vec<u8>) -> Result<()> {
//!         self.0 += data.len();
//!         Ok(())
//!     }
//! }
//!
//! let file = std::io::BufReader::new(std::fs::File::open("archive.mxf")?);
//! let mut reader = MxfReader::open(file)?;
//! println!("{} frames", reader.clip_info().duration);
//!
//! let mut count = Count(0);
//! reader.read_next_frame(&mut count)?;
//! # Ok::<(), mxfkit::MxfError>(())
//! ```

mod config;
mod error;
mod essence;
mod index;
mod item;
pub mod klv;
mod metadata;
pub mod model;
mod partition;
mod primer;
mod reader;
mod system_item;
mod types;
pub mod ul;
mod writer;

pub use config::{
    PictureConfig, ReaderConfig, SoundConfig, WriterConfig, DEFAULT_AUDIO_FRAME_SIZE, DEFAULT_HEADER_RESERVE,
    DEFAULT_VIDEO_FRAME_SIZE, MAX_AUDIO_TRACKS,
};
pub use error::{MxfError, Result};
pub use essence::{EssenceElementReader, EssenceElementWriter, EssenceTrack, FrameSize};
pub use index::{DeltaEntry, FileIndex, IndexEntry, IndexState, IndexTableSegment};
pub use item::{read_array, write_array, ItemValue};
pub use klv::KlvHeader;
pub use metadata::{HeaderMetadata, MetadataSet, SetId};
pub use partition::{
    read_partition, read_partition_at, read_partition_chain, Partition, PartitionCompleteness, PartitionKind,
    PartitionStatus, RandomIndexPack, RipEntry,
};
pub use primer::PrimerPack;
pub use reader::{ClipInfo, EventInfo, FrameListener, MxfReader, StartTimecode, TrackInfo};
pub use system_item::SystemItemTimecodes;
pub use types::{convert_position, EditRate, Rational, Timestamp, TrackKind, Umid};
pub use ul::{labels, Key};
pub use writer::{ArchiveWriter, Discard, TimecodeEvent, BODY_SID, INDEX_SID, MAX_EVENTS_PER_TRACK};

pub use mxfkit_timecode::{ArchiveTimecode, TimecodeIndex, TimecodeIndexConfig};
