//! Archive files written by `ArchiveWriter` and read back by `MxfReader`.

use mxfkit::{
    ArchiveTimecode, ArchiveWriter, EssenceTrack, FrameListener, FrameSize, MxfError, MxfReader, PartitionKind,
    RandomIndexPack, ReaderConfig, Result, TimecodeEvent, TrackKind, WriterConfig,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use tracing_subscriber::EnvFilter;

const VIDEO_SIZE: u32 = 64;
const AUDIO_SIZE: u32 = 12;

#[derive(Default)]
struct Frames {
    video: Vec<Vec<u8>>,
    audio: Vec<Vec<u8>>,
}

impl FrameListener for Frames {
    fn receive_frame(&mut self, track: &EssenceTrack, data: Vec<u8>) -> Result<()> {
        match track.kind {
            TrackKind::Video => self.video.push(data),
            _ => self.audio.push(data),
        }
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(audio_tracks: u32) -> WriterConfig {
    WriterConfig::new(audio_tracks)
        .with_video_frame_size(VIDEO_SIZE)
        .with_audio_frame_size(AUDIO_SIZE)
        .with_material_name("tape 0042")
}

fn video_frame(n: usize) -> Vec<u8> {
    (0..VIDEO_SIZE as usize).map(|i| (n * 7 + i) as u8).collect()
}

/// Writes `frames` packages. LTC does not advance after frames 20..30.
fn write_archive(frames: usize, audio_tracks: u32, events: &[TimecodeEvent]) -> Vec<u8> {
    let mut writer = ArchiveWriter::prepare(Cursor::new(Vec::new()), config(audio_tracks)).unwrap();
    let mut vitc = ArchiveTimecode::new(10, 0, 0, 0);
    let mut ltc = ArchiveTimecode::new(1, 0, 0, 0);

    for n in 0..frames {
        writer.write_system_item(vitc, ltc).unwrap();
        writer.write_video_frame(&video_frame(n)).unwrap();
        for track in 0..audio_tracks {
            writer.write_audio_frame(&[track as u8; AUDIO_SIZE as usize]).unwrap();
        }
        vitc.increment(25);
        if !(20..30).contains(&n) {
            ltc.increment(25);
        }
    }

    writer.complete(events).unwrap().into_inner()
}

#[test]
fn test_complete_file_layout() {
    let mut data = Cursor::new(write_archive(50, 4, &[]));

    let rip = RandomIndexPack::read_from_end(&mut data).unwrap().unwrap();
    assert_eq!(rip.entries.len(), 2);
    assert_eq!((rip.entries[0].body_sid, rip.entries[0].byte_offset), (1, 0));
    assert_eq!(rip.entries[1].body_sid, 0);

    let reader = MxfReader::open(data).unwrap();
    let kinds: Vec<_> = reader.partitions().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PartitionKind::Header, PartitionKind::Footer]);
    assert_eq!(reader.partitions()[1].this_partition, rip.entries[1].byte_offset);
    assert!(reader.partitions()[1].is_closed_complete());
    assert!(reader.partitions()[0].is_closed_complete());
    assert!(reader.is_complete());

    let clip = reader.clip_info();
    assert_eq!(clip.name.as_deref(), Some("tape 0042"));
    assert_eq!(clip.duration, 50);
    assert_eq!(reader.duration(), 50);
    assert_eq!(clip.essence_tracks.len(), 5);
    assert!(clip.essence_tracks[1..]
        .iter()
        .all(|t| t.kind == TrackKind::Audio && t.frame_size == FrameSize::Fixed(AUDIO_SIZE)));
    assert_eq!(clip.essence_tracks[0].frame_size, FrameSize::Fixed(VIDEO_SIZE));
    assert!(clip.tracks.iter().all(|t| t.duration == 50));
}

#[test]
fn test_read_every_frame() {
    let mut reader = MxfReader::open(Cursor::new(write_archive(30, 2, &[]))).unwrap();
    let mut frames = Frames::default();

    while reader.frame_number().is_some() {
        reader.read_next_frame(&mut frames).unwrap();
    }

    assert_eq!(frames.video.len(), 30);
    assert_eq!(frames.audio.len(), 60);
    assert_eq!(frames.video[17], video_frame(17));
    assert_eq!(frames.audio[1], vec![1; AUDIO_SIZE as usize]);
    assert!(matches!(reader.read_next_frame(&mut frames), Err(MxfError::EndOfEssence)));
}

#[test]
fn test_random_access() {
    let mut reader = MxfReader::open(Cursor::new(write_archive(40, 1, &[]))).unwrap();
    let mut frames = Frames::default();

    for n in [33, 2, 25] {
        reader.position_at_frame(n).unwrap();
        reader.read_next_frame(&mut frames).unwrap();
        assert_eq!(frames.video.last().unwrap(), &video_frame(n as usize));
    }

    let timecodes = reader.system_item_timecodes().unwrap();
    assert_eq!(timecodes.vitc, ArchiveTimecode::new(10, 0, 1, 0));
    // LTC holds from frame 20 to 30
    assert_eq!(timecodes.ltc, ArchiveTimecode::new(1, 0, 0, 20));

    reader.position_at_timecode(&ArchiveTimecode::new(10, 0, 1, 10)).unwrap();
    assert_eq!(reader.frame_number(), Some(35));
    assert!(reader
        .position_at_timecode(&ArchiveTimecode::new(10, 0, 1, 25))
        .is_err());
    assert!(matches!(
        reader.position_at_timecode(&ArchiveTimecode::new(10, 0, 2, 0)),
        Err(MxfError::PositionOutOfRange { .. })
    ));
}

#[test]
fn test_timecode_indexes_from_system_items() {
    let mut reader = MxfReader::open(Cursor::new(write_archive(40, 0, &[]))).unwrap();
    reader.position_at_frame(12).unwrap();
    let (vitc, ltc) = reader.read_timecode_indexes().unwrap();

    assert_eq!(vitc.len(), 40);
    assert_eq!(vitc.num_runs(), 1);
    assert_eq!(ltc.len(), 40);
    assert!(ltc.runs().any(|run| run.frozen));
    assert_eq!(reader.frame_number(), Some(12));
}

#[test]
fn test_events_located_by_dual_timecode() {
    init_tracing();
    let events = vec![
        TimecodeEvent::new(ArchiveTimecode::new(10, 0, 0, 3), ArchiveTimecode::new(1, 0, 0, 3), "head clog"),
        // frozen LTC: VITC picks the frame
        TimecodeEvent::new(ArchiveTimecode::new(10, 0, 1, 1), ArchiveTimecode::new(1, 0, 0, 20), "ltc freeze"),
        TimecodeEvent::new(ArchiveTimecode::new(11, 0, 0, 0), ArchiveTimecode::new(2, 0, 0, 0), "not recorded"),
        TimecodeEvent::new(ArchiveTimecode::new(10, 0, 1, 15), ArchiveTimecode::new(1, 0, 1, 5), ""),
    ];
    let data = write_archive(45, 2, &events);

    let reader = MxfReader::open(Cursor::new(data.clone())).unwrap();
    let positions: Vec<_> = reader.clip_info().events.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![3, 26, 40]);
    assert_eq!(reader.clip_info().events[0].comment.as_deref(), Some("head clog"));
    assert_eq!(reader.clip_info().events[2].comment, None);

    // events only go into the footer metadata
    assert!(!reader.partitions()[0].is_closed_complete());
    let header_only =
        MxfReader::open_with_config(Cursor::new(data), ReaderConfig::default().with_prefer_footer_metadata(false))
            .unwrap();
    assert!(header_only.clip_info().events.is_empty());
    assert_eq!(header_only.clip_info().duration, 45);
}

#[test]
fn test_archive_on_disk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.mxf");

    let mut writer = ArchiveWriter::create(&path, config(4)).unwrap();
    let mut tc = ArchiveTimecode::new(0, 59, 59, 20);
    for n in 0..10 {
        writer.write_system_item(tc, tc).unwrap();
        writer.write_video_frame(&video_frame(n)).unwrap();
        for _ in 0..4 {
            writer.write_audio_frame(&[0; AUDIO_SIZE as usize]).unwrap();
        }
        tc.increment(25);
    }
    assert_eq!(writer.duration(), 10);
    writer.complete(&[]).unwrap();

    let mut reader = MxfReader::open_file(&path, ReaderConfig::default()).unwrap();
    let start = reader.clip_info().start_timecode.unwrap();
    assert_eq!(start.timecode(), ArchiveTimecode::new(0, 59, 59, 20));
    assert_eq!(reader.last_written_frame_number().unwrap(), Some(9));

    reader.position_at_timecode(&ArchiveTimecode::new(1, 0, 0, 0)).unwrap();
    let mut frames = Frames::default();
    reader.read_next_frame(&mut frames).unwrap();
    assert_eq!(frames.video, vec![video_frame(5)]);
}
