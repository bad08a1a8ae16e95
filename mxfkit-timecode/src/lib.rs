//! Archive timecodes and the VITC/LTC alignment index.
//!
//! Archive ingest records two independent timecodes per frame: VITC read
//! from the video and LTC read from the longitudinal track. This crate
//! provides:
//!
//! - **[`ArchiveTimecode`]**: HH:MM:SS:FF with an invalid-hour sentinel
//! - **SMPTE 12M packing**: the 8-byte form stored in the archive system item
//! - **[`TimecodeIndex`]**: a paged, run-length encoded record of every
//!   timecode observed, aware of frozen (repeated) values
//! - **[`TimecodeIndexSearcher`]**: forward-only timecode/position lookups
//! - **[`find_position_at_dual_timecode`]**: the position at which a VITC
//!   and an LTC value were recorded together
//!
//! # Quick Start
//!
//! ```rust
//! use mxfkit_timecode::{ArchiveTimecode, TimecodeIndex, TimecodeIndexSearcher};
//!
//! let mut index = TimecodeIndex::new(512).unwrap();
//! let mut tc = ArchiveTimecode::new(10, 0, 0, 0);
//! for _ in 0..100 {
//!     index.add_timecode(&tc);
//!     tc.increment(25);
//! }
//!
//! let mut searcher = TimecodeIndexSearcher::new(&index);
//! let position = searcher.find_position(&ArchiveTimecode::new(10, 0, 2, 5));
//! assert_eq!(position, Some(55));
//! ```
//!
//! # Dual Timecode Search
//!
//! ```rust
//! use mxfkit_timecode::{
//!     find_position_at_dual_timecode, ArchiveTimecode, TimecodeIndex, TimecodeIndexSearcher,
//! };
//!
//! let mut vitc_index = TimecodeIndex::new(512).unwrap();
//! let mut ltc_index = TimecodeIndex::new(512).unwrap();
//! let mut vitc = ArchiveTimecode::new(0, 0, 0, 0);
//! let mut ltc = ArchiveTimecode::new(0, 0, 0, 10);
//! for _ in 0..50 {
//!     vitc_index.add_timecode(&vitc);
//!     ltc_index.add_timecode(&ltc);
//!     vitc.increment(25);
//!     ltc.increment(25);
//! }
//!
//! let mut vitc_searcher = TimecodeIndexSearcher::new(&vitc_index);
//! let mut ltc_searcher = TimecodeIndexSearcher::new(&ltc_index);
//! let position = find_position_at_dual_timecode(
//!     &mut vitc_searcher,
//!     &ArchiveTimecode::new(0, 0, 0, 20),
//!     &mut ltc_searcher,
//!     &ArchiveTimecode::new(0, 0, 1, 5),
//! )
//! .unwrap();
//! assert_eq!(position, Some(20));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod archive;
pub mod dual;
pub mod error;
pub mod index;
pub mod searcher;
pub mod smpte;

pub use archive::{ArchiveTimecode, DEFAULT_INDEX_FPS, INVALID_HOUR};
pub use dual::find_position_at_dual_timecode;
pub use error::{Result, TimecodeIndexError};
pub use index::{TimecodeIndex, TimecodeIndexConfig, TimecodeRun};
pub use searcher::{SearchCursor, TimecodeIndexSearcher};
