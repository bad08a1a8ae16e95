//! Position lookup from a VITC/LTC timecode pair.

use crate::archive::ArchiveTimecode;
use crate::error::{Result, TimecodeIndexError};
use crate::searcher::TimecodeIndexSearcher;
use tracing::{debug, warn};

/// Find the next position at which VITC read `vitc_tc` and LTC read
/// `ltc_tc`.
///
/// An invalid timecode on one side is ignored: the other side is searched
/// and the ignored searcher is moved to the same position. When both are
/// valid each searcher is resolved independently (VITC first) and the one
/// that is behind is advanced to its next match until both agree.
///
/// Returns `Ok(None)` when no such position exists and
/// [`TimecodeIndexError::NoConvergence`] when the iteration cap from the
/// VITC index configuration is reached. In both cases both searchers are
/// left as they were before the call.
pub fn find_position_at_dual_timecode(
    vitc: &mut TimecodeIndexSearcher<'_>,
    vitc_tc: &ArchiveTimecode,
    ltc: &mut TimecodeIndexSearcher<'_>,
    ltc_tc: &ArchiveTimecode,
) -> Result<Option<i64>> {
    let vitc_snapshot = vitc.cursor();
    let ltc_snapshot = ltc.cursor();

    let outcome = converge(vitc, vitc_tc, ltc, ltc_tc);
    if !matches!(outcome, Ok(Some(_))) {
        vitc.restore(vitc_snapshot);
        ltc.restore(ltc_snapshot);
    }
    outcome
}

fn converge(
    vitc: &mut TimecodeIndexSearcher<'_>,
    vitc_tc: &ArchiveTimecode,
    ltc: &mut TimecodeIndexSearcher<'_>,
    ltc_tc: &ArchiveTimecode,
) -> Result<Option<i64>> {
    match (vitc_tc.is_valid(), ltc_tc.is_valid()) {
        (false, false) => Ok(None),
        (true, false) => {
            let Some(position) = vitc.find_position(vitc_tc) else {
                return Ok(None);
            };
            Ok(ltc.move_to(position).then(|| vitc.position()))
        }
        (false, true) => {
            let Some(position) = ltc.find_position(ltc_tc) else {
                return Ok(None);
            };
            Ok(vitc.move_to(position).then(|| vitc.position()))
        }
        (true, true) => {
            let Some(mut vitc_pos) = vitc.find_position(vitc_tc) else {
                return Ok(None);
            };
            let Some(mut ltc_pos) = ltc.find_position(ltc_tc) else {
                return Ok(None);
            };

            let max_iterations = vitc.index().config().max_dual_iterations;
            let mut iterations = 0;
            while vitc_pos != ltc_pos {
                if iterations >= max_iterations {
                    warn!(
                        iterations,
                        vitc = %vitc_tc,
                        ltc = %ltc_tc,
                        "dual timecode search did not converge"
                    );
                    return Err(TimecodeIndexError::NoConvergence { iterations });
                }
                iterations += 1;

                let advanced = if vitc_pos < ltc_pos {
                    advance_lagging(vitc, vitc_tc, vitc_pos, ltc_pos)
                } else {
                    advance_lagging(ltc, ltc_tc, ltc_pos, vitc_pos)
                };
                let Some(position) = advanced else {
                    debug!(vitc = %vitc_tc, ltc = %ltc_tc, "no common position for timecode pair");
                    return Ok(None);
                };
                if vitc_pos < ltc_pos {
                    vitc_pos = position;
                } else {
                    ltc_pos = position;
                }
            }

            Ok(Some(vitc.position()))
        }
    }
}

/// Advance the searcher that is behind to its next match for `tc`.
fn advance_lagging(
    searcher: &mut TimecodeIndexSearcher<'_>,
    tc: &ArchiveTimecode,
    current: i64,
    leader: i64,
) -> Option<i64> {
    if searcher.find_frozen_timecode_at_offset(tc, leader - current) {
        return Some(searcher.position());
    }

    let next = searcher.find_position(tc)?;
    if next != current {
        return Some(next);
    }

    // no progress: skip the current run and search again from the next one
    if !searcher.move_to_next_element() {
        return None;
    }
    searcher.find_position(tc)
}
