//! Run-length timecode index.
//!
//! Every frame of an archive ingest contributes one timecode observation.
//! Consecutive observations are coalesced into runs:
//!
//! - a timecode one frame after the end of a non-frozen run extends it;
//! - a timecode equal to the start of a run of length one, or to the value
//!   of a frozen run, marks the run frozen and extends it;
//! - anything else starts a new run.
//!
//! Runs are stored in fixed-capacity pages so that appending never moves
//! existing runs. Positions are the 0-based index of the observation in
//! the order it was added.

use crate::archive::{ArchiveTimecode, DEFAULT_INDEX_FPS};
use crate::error::{Result, TimecodeIndexError};
use serde::{Deserialize, Serialize};

/// Default number of runs per page.
pub const DEFAULT_PAGE_CAPACITY: usize = 512;

/// Default iteration cap for [`find_position_at_dual_timecode`](crate::find_position_at_dual_timecode).
pub const DEFAULT_MAX_DUAL_ITERATIONS: usize = 1 << 20;

/// A run of timecode observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeRun {
    /// Whether every observation in the run repeats `timecode_pos`.
    pub frozen: bool,
    /// Timecode of the first observation, as a position.
    pub timecode_pos: i64,
    /// Number of observations in the run.
    pub duration: i64,
}

impl TimecodeRun {
    fn single(timecode_pos: i64) -> Self {
        Self {
            frozen: false,
            timecode_pos,
            duration: 1,
        }
    }

    /// Timecode position observed `offset` frames into the run.
    #[must_use]
    pub fn value_at(&self, offset: i64) -> i64 {
        if self.frozen {
            self.timecode_pos
        } else {
            self.timecode_pos + offset
        }
    }
}

/// Timecode index configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeIndexConfig {
    /// Runs per page.
    pub page_capacity: usize,
    /// Frames per second used to map timecodes onto positions.
    pub frames_per_second: u32,
    /// Upper bound on advance steps taken by a dual timecode search.
    pub max_dual_iterations: usize,
}

impl Default for TimecodeIndexConfig {
    fn default() -> Self {
        Self {
            page_capacity: DEFAULT_PAGE_CAPACITY,
            frames_per_second: DEFAULT_INDEX_FPS,
            max_dual_iterations: DEFAULT_MAX_DUAL_ITERATIONS,
        }
    }
}

impl TimecodeIndexConfig {
    /// Set the page capacity.
    #[must_use]
    pub fn with_page_capacity(mut self, page_capacity: usize) -> Self {
        self.page_capacity = page_capacity;
        self
    }

    /// Set the frames per second used for position conversion.
    #[must_use]
    pub fn with_frames_per_second(mut self, fps: u32) -> Self {
        self.frames_per_second = fps;
        self
    }

    /// Set the dual search iteration cap.
    #[must_use]
    pub fn with_max_dual_iterations(mut self, iterations: usize) -> Self {
        self.max_dual_iterations = iterations;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_capacity == 0 {
            return Err(TimecodeIndexError::InvalidPageCapacity {
                capacity: self.page_capacity,
            });
        }
        if self.frames_per_second == 0 || self.frames_per_second > u8::MAX as u32 + 1 {
            return Err(TimecodeIndexError::InvalidFrameRate {
                fps: self.frames_per_second,
            });
        }
        Ok(())
    }
}

/// Paged, run-length encoded index of per-frame timecodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeIndex {
    config: TimecodeIndexConfig,
    pages: Vec<Vec<TimecodeRun>>,
}

impl TimecodeIndex {
    /// Create an empty index with the given page capacity and default
    /// settings otherwise.
    pub fn new(page_capacity: usize) -> Result<Self> {
        Self::with_config(TimecodeIndexConfig::default().with_page_capacity(page_capacity))
    }

    /// Create an empty index from a configuration.
    pub fn with_config(config: TimecodeIndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pages: Vec::new(),
        })
    }

    /// The index configuration.
    #[must_use]
    pub fn config(&self) -> &TimecodeIndexConfig {
        &self.config
    }

    /// Map a timecode onto the index's position axis.
    #[must_use]
    pub fn timecode_to_position(&self, tc: &ArchiveTimecode) -> i64 {
        tc.to_position(self.config.frames_per_second)
    }

    /// Inverse of [`timecode_to_position`](Self::timecode_to_position).
    #[must_use]
    pub fn position_to_timecode(&self, position: i64) -> ArchiveTimecode {
        ArchiveTimecode::from_position(position, self.config.frames_per_second)
    }

    /// Append the timecode observed at the next position.
    pub fn add_timecode(&mut self, tc: &ArchiveTimecode) {
        let timecode_pos = self.timecode_to_position(tc);

        if let Some(last) = self.pages.last_mut().and_then(|page| page.last_mut()) {
            if last.frozen {
                if timecode_pos == last.timecode_pos {
                    last.duration += 1;
                    return;
                }
            } else if timecode_pos == last.timecode_pos + last.duration {
                last.duration += 1;
                return;
            } else if last.duration == 1 && timecode_pos == last.timecode_pos {
                last.frozen = true;
                last.duration += 1;
                return;
            }
        }

        self.push_run(TimecodeRun::single(timecode_pos));
    }

    fn push_run(&mut self, run: TimecodeRun) {
        let capacity = self.config.page_capacity;
        match self.pages.last_mut() {
            Some(page) if page.len() < capacity => page.push(run),
            _ => {
                let mut page = Vec::with_capacity(capacity);
                page.push(run);
                self.pages.push(page);
            }
        }
    }

    /// True when the index holds no real timecode: it is empty, or every
    /// observation so far repeated 00:00:00:00.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self.pages.as_slice() {
            [] => true,
            [page] => matches!(
                page.as_slice(),
                [run] if run.frozen && run.timecode_pos == 0
            ),
            _ => false,
        }
    }

    /// True when nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of observations added.
    #[must_use]
    pub fn len(&self) -> i64 {
        self.runs().map(|run| run.duration).sum()
    }

    /// Number of runs across all pages.
    #[must_use]
    pub fn num_runs(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Number of allocated pages.
    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Iterate over all runs in position order.
    pub fn runs(&self) -> impl Iterator<Item = &TimecodeRun> {
        self.pages.iter().flatten()
    }

    /// Drop all runs, keeping the configuration.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub(crate) fn run(&self, page: usize, element: usize) -> Option<TimecodeRun> {
        self.pages.get(page)?.get(element).copied()
    }

    pub(crate) fn page_len(&self, page: usize) -> usize {
        self.pages.get(page).map_or(0, Vec::len)
    }
}

impl Default for TimecodeIndex {
    fn default() -> Self {
        Self {
            config: TimecodeIndexConfig::default(),
            pages: Vec::new(),
        }
    }
}
