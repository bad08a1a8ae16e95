//! Property-based tests for timecode conversion and index searches.

use mxfkit_timecode::{smpte, ArchiveTimecode, TimecodeIndex, TimecodeIndexSearcher};
use proptest::prelude::*;

fn timecode_strategy(fps: u32) -> impl Strategy<Value = ArchiveTimecode> {
    (0u8..24, 0u8..60, 0u8..60, 0..fps as u8)
        .prop_map(|(hour, min, sec, frame)| ArchiveTimecode::new(hour, min, sec, frame))
}

proptest! {
    #[test]
    fn prop_position_round_trip(fps in prop::sample::select(vec![24u32, 25, 30, 50, 60]),
                                seed in any::<u64>()) {
        let frame = (seed % fps as u64) as u8;
        let sec = ((seed >> 8) % 60) as u8;
        let min = ((seed >> 16) % 60) as u8;
        let hour = ((seed >> 24) % 24) as u8;
        let tc = ArchiveTimecode::new(hour, min, sec, frame);
        prop_assert_eq!(ArchiveTimecode::from_position(tc.to_position(fps), fps), tc);
    }

    #[test]
    fn prop_smpte_12m_round_trip(tc in timecode_strategy(30)) {
        prop_assert_eq!(smpte::unpack(&smpte::pack(&tc)).unwrap(), tc);
    }

    #[test]
    fn prop_linear_index_inverse(start in timecode_strategy(25),
                                 len in 1usize..300,
                                 page_capacity in 1usize..8,
                                 probe in any::<prop::sample::Index>()) {
        let mut index = TimecodeIndex::new(page_capacity).unwrap();
        let mut tc = start;
        for _ in 0..len {
            index.add_timecode(&tc);
            tc.increment(25);
        }
        let position = probe.index(len) as i64;

        let mut forward = TimecodeIndexSearcher::new(&index);
        let found = forward.find_timecode(position).unwrap();
        let mut inverse = TimecodeIndexSearcher::new(&index);
        let wraps_midnight = start.to_position(25) + len as i64 > 24 * 60 * 60 * 25;
        if !wraps_midnight {
            prop_assert_eq!(inverse.find_position(&found), Some(position));
        }
    }

    #[test]
    fn prop_broken_index_runs(positions in prop::collection::vec(0i64..50_000, 1..200)) {
        let mut index = TimecodeIndex::new(16).unwrap();
        for &p in &positions {
            index.add_timecode(&ArchiveTimecode::from_position(p, 25));
        }
        prop_assert_eq!(index.len(), positions.len() as i64);

        let mut searcher = TimecodeIndexSearcher::new(&index);
        for (position, &p) in positions.iter().enumerate() {
            let found = searcher.find_timecode(position as i64).unwrap();
            prop_assert_eq!(found.to_position(25), p);
        }
    }
}
