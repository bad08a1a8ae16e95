//! Forward-only searches over a [`TimecodeIndex`].
//!
//! A searcher walks the index in position order and never moves backwards.
//! Repeated searches therefore return the *next* match rather than the
//! nearest one, which is what lets the dual timecode search advance
//! whichever stream is behind. Every search that fails leaves the cursor
//! exactly as it was.

use crate::archive::ArchiveTimecode;
use crate::index::{TimecodeIndex, TimecodeRun};

/// Cursor state of a [`TimecodeIndexSearcher`].
///
/// This is a plain value: take a copy before a multi-step operation and
/// hand it back to [`TimecodeIndexSearcher::restore`] to roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchCursor {
    /// Page holding the current run.
    pub page: usize,
    /// Run within the page.
    pub element: usize,
    /// Offset of the cursor within the run.
    pub element_offset: i64,
    /// Absolute position of the cursor.
    pub position: i64,
    /// Set once the cursor has walked off the last page.
    pub at_end: bool,
    /// Set while the cursor's position has not been returned by a search.
    pub before_start: bool,
}

/// A forward-only cursor over a timecode index.
#[derive(Debug, Clone, Copy)]
pub struct TimecodeIndexSearcher<'a> {
    index: &'a TimecodeIndex,
    cursor: SearchCursor,
}

impl<'a> TimecodeIndexSearcher<'a> {
    /// Create a searcher positioned before position 0.
    #[must_use]
    pub fn new(index: &'a TimecodeIndex) -> Self {
        Self {
            index,
            cursor: SearchCursor {
                at_end: index.is_empty(),
                before_start: true,
                ..SearchCursor::default()
            },
        }
    }

    /// The index being searched.
    #[must_use]
    pub fn index(&self) -> &'a TimecodeIndex {
        self.index
    }

    /// Current absolute position.
    #[must_use]
    pub fn position(&self) -> i64 {
        self.cursor.position
    }

    /// Snapshot of the cursor.
    #[must_use]
    pub fn cursor(&self) -> SearchCursor {
        self.cursor
    }

    /// Put back a cursor taken with [`cursor`](Self::cursor).
    pub fn restore(&mut self, cursor: SearchCursor) {
        self.cursor = cursor;
    }

    /// True once the searcher has run past the end of the index.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.cursor.at_end
    }

    fn current(&self) -> Option<TimecodeRun> {
        self.index.run(self.cursor.page, self.cursor.element)
    }

    /// Move to the start of the following run. Returns false at the end of
    /// the index; the cursor may then be partly advanced and the caller
    /// restores it.
    fn step(&mut self, run: &TimecodeRun) -> bool {
        let page_len = self.index.page_len(self.cursor.page);
        let c = &mut self.cursor;

        if c.element + 1 < page_len {
            c.position += run.duration - c.element_offset;
            c.element_offset = 0;
            c.element += 1;
            true
        } else if page_len == self.index.config().page_capacity {
            c.position += run.duration - c.element_offset;
            c.element_offset = 0;
            c.element = 0;
            c.page += 1;
            c.at_end = c.page >= self.index.num_pages();
            !c.at_end
        } else {
            false
        }
    }

    /// Move forward to `position`.
    ///
    /// Succeeds without change when already there. Fails, leaving the
    /// cursor unchanged, for a position behind the cursor or beyond the end
    /// of the index.
    pub fn move_to(&mut self, position: i64) -> bool {
        if self.cursor.at_end {
            return false;
        }
        if position == self.cursor.position {
            return true;
        }
        if position < self.cursor.position {
            return false;
        }

        let snapshot = self.cursor;
        while let Some(run) = self.current() {
            let remaining = run.duration - self.cursor.element_offset;
            if position < self.cursor.position + remaining {
                self.cursor.element_offset += position - self.cursor.position;
                self.cursor.position = position;
                self.cursor.before_start = false;
                return true;
            }
            if !self.step(&run) {
                break;
            }
        }

        self.cursor = snapshot;
        false
    }

    /// Timecode recorded at `position`.
    ///
    /// Returns `None`, leaving the cursor unchanged, when `position` is
    /// behind the cursor or beyond the index.
    pub fn find_timecode(&mut self, position: i64) -> Option<ArchiveTimecode> {
        if !self.move_to(position) {
            return None;
        }
        let run = self.current()?;
        Some(
            self.index
                .position_to_timecode(run.value_at(self.cursor.element_offset)),
        )
    }

    /// Next position, at or after the cursor, where `tc` was recorded.
    ///
    /// Inside a non-frozen run a match must lie strictly ahead of the
    /// cursor's own timecode unless the cursor has not yet reported its
    /// position or the search has moved past the starting run. A frozen run
    /// matches only its exact value. Returns `None`, leaving the cursor
    /// unchanged, for an invalid timecode or when the index is exhausted.
    pub fn find_position(&mut self, tc: &ArchiveTimecode) -> Option<i64> {
        if !tc.is_valid() || self.cursor.at_end {
            return None;
        }

        let target = self.index.timecode_to_position(tc);
        let snapshot = self.cursor;
        let mut done_first = false;

        while let Some(run) = self.current() {
            let c = &mut self.cursor;
            if run.frozen {
                if target == run.timecode_pos {
                    if done_first || c.before_start {
                        c.before_start = false;
                        return Some(c.position);
                    }
                    if c.element_offset + 1 < run.duration {
                        c.element_offset += 1;
                        c.position += 1;
                        return Some(c.position);
                    }
                }
            } else {
                let current = run.timecode_pos + c.element_offset;
                if (done_first || c.before_start || target > current)
                    && target >= current
                    && target < run.timecode_pos + run.duration
                {
                    c.position += target - current;
                    c.element_offset = target - run.timecode_pos;
                    c.before_start = false;
                    return Some(c.position);
                }
            }

            if !self.step(&run) {
                break;
            }
            done_first = true;
        }

        self.cursor = snapshot;
        None
    }

    /// Jump `offset` positions ahead within the current run when that run
    /// is frozen at `tc` and still covers the target position.
    pub fn find_frozen_timecode_at_offset(&mut self, tc: &ArchiveTimecode, offset: i64) -> bool {
        if self.cursor.at_end || offset <= 0 || !tc.is_valid() {
            return false;
        }
        let Some(run) = self.current() else {
            return false;
        };
        if !run.frozen || run.timecode_pos != self.index.timecode_to_position(tc) {
            return false;
        }
        if self.cursor.element_offset + offset >= run.duration {
            return false;
        }

        self.cursor.element_offset += offset;
        self.cursor.position += offset;
        self.cursor.before_start = false;
        true
    }

    /// Force the cursor to the start of the next run.
    ///
    /// The new position is not considered reported, so a following
    /// [`find_position`](Self::find_position) may match at it. Returns
    /// false, leaving the cursor unchanged, when there is no next run.
    pub fn move_to_next_element(&mut self) -> bool {
        if self.cursor.at_end {
            return false;
        }
        let Some(run) = self.current() else {
            return false;
        };

        let snapshot = self.cursor;
        if self.step(&run) {
            self.cursor.before_start = true;
            true
        } else {
            self.cursor = snapshot;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tc(position: i64) -> ArchiveTimecode {
        ArchiveTimecode::from_position(position, 25)
    }

    fn index_of(page_capacity: usize, positions: &[i64]) -> TimecodeIndex {
        let mut index = TimecodeIndex::new(page_capacity).unwrap();
        for &p in positions {
            index.add_timecode(&tc(p));
        }
        index
    }

    #[test]
    fn test_empty_index() {
        let index = TimecodeIndex::new(8).unwrap();
        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert!(searcher.is_at_end());
        assert_eq!(searcher.find_timecode(0), None);
        assert_eq!(searcher.find_position(&tc(0)), None);
        assert!(!searcher.move_to_next_element());
    }

    #[test]
    fn test_find_timecode_across_pages() {
        let positions: Vec<i64> = (0..20).map(|p| p * 3).collect();
        let index = index_of(4, &positions);
        assert_eq!(index.num_pages(), 5);

        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert_eq!(searcher.find_timecode(0), Some(tc(0)));
        assert_eq!(searcher.find_timecode(9), Some(tc(27)));
        assert_eq!(searcher.find_timecode(19), Some(tc(57)));
        assert_eq!(searcher.find_timecode(20), None);
        assert_eq!(searcher.position(), 19);
    }

    #[test]
    fn test_find_timecode_is_forward_only() {
        let index = index_of(512, &(100..110).collect::<Vec<_>>());
        let mut searcher = TimecodeIndexSearcher::new(&index);

        assert_eq!(searcher.find_timecode(6), Some(tc(106)));
        let before = searcher.cursor();
        assert_eq!(searcher.find_timecode(5), None);
        assert_eq!(searcher.cursor(), before);
        assert_eq!(searcher.find_timecode(6), Some(tc(106)));
    }

    #[test]
    fn test_find_timecode_in_frozen_run() {
        let index = index_of(512, &[0, 1, 7, 7, 7, 8]);
        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert_eq!(searcher.find_timecode(3), Some(tc(7)));
        assert_eq!(searcher.find_timecode(4), Some(tc(7)));
        assert_eq!(searcher.find_timecode(5), Some(tc(8)));
    }

    #[test]
    fn test_find_position_returns_next_occurrence() {
        // the same timecode appears at positions 2 and 6
        let index = index_of(512, &[0, 1, 2, 3, 0, 1, 2, 3]);
        let mut searcher = TimecodeIndexSearcher::new(&index);

        assert_eq!(searcher.find_position(&tc(2)), Some(2));
        assert_eq!(searcher.find_position(&tc(2)), Some(6));
        let before = searcher.cursor();
        assert_eq!(searcher.find_position(&tc(2)), None);
        assert_eq!(searcher.cursor(), before);
    }

    #[test]
    fn test_find_position_rejects_invalid_timecode() {
        let index = index_of(512, &[0, 1, 2]);
        let mut searcher = TimecodeIndexSearcher::new(&index);
        let before = searcher.cursor();
        assert_eq!(searcher.find_position(&ArchiveTimecode::invalid()), None);
        assert_eq!(searcher.cursor(), before);
    }

    #[test]
    fn test_find_position_frozen_run() {
        let index = index_of(512, &[10, 20, 20, 20, 21]);
        let mut searcher = TimecodeIndexSearcher::new(&index);

        assert_eq!(searcher.find_position(&tc(20)), Some(1));
        assert_eq!(searcher.find_position(&tc(20)), Some(2));
        assert_eq!(searcher.find_position(&tc(20)), Some(3));
        assert_eq!(searcher.find_position(&tc(20)), None);
        assert_eq!(searcher.find_position(&tc(21)), Some(4));
    }

    #[test]
    fn test_find_position_after_find_timecode() {
        let index = index_of(512, &(0..10).collect::<Vec<_>>());
        let mut searcher = TimecodeIndexSearcher::new(&index);
        let found = searcher.find_timecode(5).unwrap();

        // the cursor already sits on timecode 5 so the next 5 is not found
        assert_eq!(searcher.find_position(&found), None);

        let mut fresh = TimecodeIndexSearcher::new(&index);
        assert_eq!(fresh.find_position(&found), Some(5));
    }

    #[test]
    fn test_frozen_timecode_at_offset() {
        let index = index_of(512, &[0, 4, 4, 4, 4, 5]);
        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert_eq!(searcher.find_position(&tc(4)), Some(1));

        assert!(!searcher.find_frozen_timecode_at_offset(&tc(5), 2));
        assert!(!searcher.find_frozen_timecode_at_offset(&tc(4), 4));
        assert!(searcher.find_frozen_timecode_at_offset(&tc(4), 3));
        assert_eq!(searcher.position(), 4);
    }

    #[test]
    fn test_move_to_next_element() {
        let index = index_of(2, &[0, 1, 2, 10, 11, 30]);
        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert_eq!(searcher.find_timecode(1), Some(tc(1)));

        assert!(searcher.move_to_next_element());
        assert_eq!(searcher.position(), 3);
        assert!(searcher.move_to_next_element());
        assert_eq!(searcher.position(), 5);
        // a forced advance leaves the new position unreported
        assert_eq!(searcher.find_position(&tc(30)), Some(5));

        let before = searcher.cursor();
        assert!(!searcher.move_to_next_element());
        assert_eq!(searcher.cursor(), before);
    }

    #[test]
    fn test_move_past_end_restores() {
        let index = index_of(2, &[0, 5, 9, 12]);
        let mut searcher = TimecodeIndexSearcher::new(&index);
        assert!(searcher.move_to(2));
        let before = searcher.cursor();
        assert!(!searcher.move_to(4));
        assert_eq!(searcher.cursor(), before);
        assert!(searcher.move_to(3));
    }
}
