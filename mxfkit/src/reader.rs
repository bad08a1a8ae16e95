//! MXF reader.
//!
//! [`MxfReader`] opens a file through its header partition, finds the
//! footer through the random index pack, reads the header metadata and
//! builds a [`FileIndex`] over the essence. Frames are delivered to a
//! [`FrameListener`], which owns the buffers.
//!
//! Files that are still being written (no footer yet) are read up to the
//! last complete content package; see
//! [`MxfReader::last_written_frame_number`].

use crate::config::ReaderConfig;
use crate::error::{MxfError, Result};
use crate::essence::{EssenceElementReader, EssenceTrack, FrameSize};
use crate::index::{FileIndex, IndexState};
use crate::klv;
use crate::metadata::{HeaderMetadata, SetId};
use crate::model::{items, sets};
use crate::partition::{read_partition_at, read_partition_chain, Partition, PartitionKind, RandomIndexPack};
use crate::system_item::SystemItemTimecodes;
use crate::types::{Rational, TrackKind, Umid};
use crate::ul::{labels, Key};
use mxfkit_timecode::{ArchiveTimecode, TimecodeIndex};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

/// Receives the essence of each frame read.
///
/// The reader asks the listener for a buffer of the element's size, fills
/// it and hands it back through [`receive_frame`](Self::receive_frame). A
/// buffer whose element could not be read is returned through
/// [`deallocate_buffer`](Self::deallocate_buffer).
pub trait FrameListener {
    /// Whether elements of `track` are wanted; skipped otherwise.
    fn accept_frame(&mut self, _track: &EssenceTrack) -> bool {
        true
    }

    /// A buffer of at least `size` bytes.
    fn allocate_buffer(&mut self, _track: &EssenceTrack, size: usize) -> Result<Vec<u8>> {
        Ok(vec![0; size])
    }

    /// Frame data of `track`, exactly the element's size.
    fn receive_frame(&mut self, track: &EssenceTrack, data: Vec<u8>) -> Result<()>;

    /// Take back a buffer that was not filled.
    fn deallocate_buffer(&mut self, _track: &EssenceTrack, _buffer: Vec<u8>) {}
}

/// A track of the material package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: u32,
    pub name: Option<String>,
    pub kind: TrackKind,
    pub edit_rate: Rational,
    /// Duration in edit units, -1 while unknown
    pub duration: i64,
}

/// An event recorded on a descriptive metadata event track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Frame position of the event
    pub position: i64,
    pub comment: Option<String>,
}

/// Start of the material timecode track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTimecode {
    /// Frames since midnight at the rounded timecode base
    pub start: i64,
    pub rounded_base: u16,
    pub drop_frame: bool,
}

impl StartTimecode {
    /// Start as a timecode
    pub fn timecode(&self) -> ArchiveTimecode {
        let mut tc = ArchiveTimecode::from_position(self.start, self.rounded_base as u32);
        tc.drop_frame = self.drop_frame;
        tc
    }
}

/// What a file contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipInfo {
    /// Material package name
    pub name: Option<String>,
    pub material_package_uid: Umid,
    pub file_package_uid: Umid,
    /// Edit rate of the picture track, or of the first track
    pub edit_rate: Rational,
    /// Clip duration in edit units
    pub duration: i64,
    /// Material timecode track start, if there is one
    pub start_timecode: Option<StartTimecode>,
    pub tracks: Vec<TrackInfo>,
    /// Tracks of the file source package carrying essence
    pub essence_tracks: Vec<EssenceTrack>,
    pub events: Vec<EventInfo>,
    pub body_sid: u32,
    pub index_sid: u32,
}

/// MXF file reader.
pub struct MxfReader<R: Read + Seek> {
    source: R,
    config: ReaderConfig,
    partitions: Vec<Partition>,
    footer: Option<Partition>,
    metadata: HeaderMetadata,
    clip: ClipInfo,
    index: FileIndex,
    timecodes: Option<SystemItemTimecodes>,
}

impl MxfReader<BufReader<File>> {
    /// Open the file at `path`.
    pub fn open_file(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open_with_config(BufReader::new(file), config)
    }
}

impl<R: Read + Seek> MxfReader<R> {
    /// Open with the default configuration.
    pub fn open(source: R) -> Result<Self> {
        Self::open_with_config(source, ReaderConfig::default())
    }

    /// Open a file.
    ///
    /// The footer is located through the random index pack, falling back
    /// to the header partition's footer offset. Without a footer only the
    /// header partition is used.
    pub fn open_with_config(mut source: R, config: ReaderConfig) -> Result<Self> {
        let header = read_partition_at(&mut source, 0)?;
        if header.kind != PartitionKind::Header {
            return Err(MxfError::invalid_partition("file does not start with a header partition"));
        }

        let partitions = match find_footer(&mut source, &header)? {
            Some(footer_offset) => match read_partition_chain(&mut source, footer_offset) {
                Ok(chain) => chain,
                Err(e) if e.is_malformed_input() => {
                    warn!(footer_offset, error = %e, "failed to read partition chain, using header partition only");
                    vec![header.clone()]
                }
                Err(e) => return Err(e),
            },
            None => vec![header.clone()],
        };
        let footer = partitions.last().filter(|p| p.kind == PartitionKind::Footer).cloned();

        let metadata_partition = match &footer {
            Some(footer)
                if config.prefer_footer_metadata && footer.is_closed_complete() && footer.header_byte_count > 0 =>
            {
                footer
            }
            _ => &header,
        };
        if metadata_partition.header_byte_count == 0 {
            return Err(MxfError::missing_set("header metadata"));
        }
        source.seek(SeekFrom::Start(metadata_partition.pack_end()))?;
        let metadata = HeaderMetadata::read(&mut source, metadata_partition.header_byte_count)?;

        let mut clip = build_clip_info(&metadata)?;
        let index = FileIndex::create(&mut source, &partitions, clip.index_sid, clip.body_sid)?;
        if clip.duration < 0 {
            clip.duration = index.duration();
        }
        measure_frame_sizes(&mut source, &index, &mut clip.essence_tracks)?;

        debug!(
            partitions = partitions.len(),
            duration = clip.duration,
            tracks = clip.essence_tracks.len(),
            "opened MXF file"
        );

        Ok(MxfReader {
            source,
            config,
            partitions,
            footer,
            metadata,
            clip,
            index,
            timecodes: None,
        })
    }

    pub fn clip_info(&self) -> &ClipInfo {
        &self.clip
    }

    /// Header metadata in use
    pub fn metadata(&self) -> &HeaderMetadata {
        &self.metadata
    }

    /// Partitions in file order
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// True when the file has a footer partition
    pub fn is_complete(&self) -> bool {
        self.footer.is_some()
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Number of frames that can be read
    pub fn duration(&self) -> i64 {
        self.index.duration()
    }

    /// Frame the next read returns, `None` before the first read or past
    /// the end.
    pub fn frame_number(&self) -> Option<i64> {
        match self.index.state() {
            IndexState::Unpositioned => Some(0).filter(|_| self.index.duration() > 0),
            IndexState::AtFrame(frame) => Some(frame),
            IndexState::EndOfEssence => None,
        }
    }

    /// VITC and LTC of the last frame read
    pub fn system_item_timecodes(&self) -> Option<SystemItemTimecodes> {
        self.timecodes
    }

    /// Seek to `frame`.
    pub fn position_at_frame(&mut self, frame: i64) -> Result<()> {
        self.index.set_position(&mut self.source, frame)
    }

    /// Seek to the frame at timecode `tc` of the material timecode track.
    pub fn position_at_timecode(&mut self, tc: &ArchiveTimecode) -> Result<()> {
        let start = self
            .clip
            .start_timecode
            .ok_or_else(|| MxfError::missing_set("material package timecode component"))?;
        let base = start.rounded_base as u32;
        tc.validate(base)?;
        self.position_at_frame(tc.to_position(base) - start.start)
    }

    fn frame_to_read(&mut self) -> Result<i64> {
        match self.index.state() {
            IndexState::Unpositioned => {
                self.index.set_position(&mut self.source, 0)?;
                Ok(0)
            }
            IndexState::AtFrame(frame) => {
                self.index.set_position(&mut self.source, frame)?;
                Ok(frame)
            }
            IndexState::EndOfEssence => Err(MxfError::EndOfEssence),
        }
    }

    /// Move past the next frame without reading it.
    pub fn skip_next_frame(&mut self) -> Result<()> {
        self.frame_to_read()?;
        self.index.advance()
    }

    /// Read the next frame, handing each accepted essence element to
    /// `listener`.
    pub fn read_next_frame(&mut self, listener: &mut dyn FrameListener) -> Result<()> {
        let frame = self.frame_to_read()?;
        let end = self.index.frame_end(frame);
        let mut seen_system_item = false;

        loop {
            let position = self.source.stream_position()?;
            if end.map_or(false, |end| position >= end) {
                break;
            }

            let kl = match klv::read_kl(&mut self.source) {
                Ok(kl) => kl,
                Err(MxfError::Truncated { .. }) if end.is_none() => break,
                Err(e) => return Err(e),
            };

            if end.is_none() && (kl.key.is_partition_pack() || (seen_system_item && kl.key.is_system_item())) {
                break;
            }

            if kl.key.is_system_item() {
                seen_system_item = true;
                let value = klv::read_value(&mut self.source, kl.len)?;
                self.timecodes = Some(SystemItemTimecodes::decode(&value)?);
                continue;
            }

            let track = self.clip.essence_tracks.iter().find(|t| t.matches_key(&kl.key));
            let Some(track) = track.filter(|t| listener.accept_frame(t)) else {
                klv::skip(&mut self.source, kl.len)?;
                continue;
            };

            if kl.len > self.config.max_element_size {
                return Err(MxfError::unsupported(format!(
                    "essence element of {} bytes exceeds the limit of {}",
                    kl.len, self.config.max_element_size
                )));
            }

            let size = kl.len as usize;
            let mut buffer = listener.allocate_buffer(track, size)?;
            if buffer.len() < size {
                listener.deallocate_buffer(track, buffer);
                return Err(MxfError::invalid_state(format!(
                    "listener allocated fewer than {} bytes",
                    size
                )));
            }

            let mut element = EssenceElementReader::open(&mut self.source, kl.key, kl.llen, kl.len);
            match element.read_data(&mut buffer, size) {
                Ok(_) => {
                    buffer.truncate(size);
                    listener.receive_frame(track, buffer)?;
                }
                Err(e) => {
                    listener.deallocate_buffer(track, buffer);
                    return Err(e);
                }
            }
        }

        self.index.advance()
    }

    /// Highest frame completely present in the file.
    ///
    /// For a file that is still growing this reflects the file size at the
    /// time of the call.
    pub fn last_written_frame_number(&mut self) -> Result<Option<i64>> {
        self.index.refresh(&mut self.source)?;
        let hint = if self.footer.is_some() { self.clip.duration } else { -1 };
        self.index.last_written_frame_number(&mut self.source, hint)
    }

    /// Scan every system item into VITC and LTC indexes.
    ///
    /// Frames without a system item record invalid timecodes. The read
    /// position is left unchanged.
    pub fn read_timecode_indexes(&mut self) -> Result<(TimecodeIndex, TimecodeIndex)> {
        let mut vitc_index = TimecodeIndex::with_config(self.config.timecode_index)?;
        let mut ltc_index = TimecodeIndex::with_config(self.config.timecode_index)?;
        let resume = self.source.stream_position()?;

        for frame in 0..self.index.duration() {
            let offset = self
                .index
                .frame_offset(frame)
                .ok_or(MxfError::PositionOutOfRange {
                    position: frame,
                    available: self.index.duration(),
                })?;
            self.source.seek(SeekFrom::Start(offset))?;

            let kl = klv::read_kl(&mut self.source)?;
            let timecodes = if kl.key.is_system_item() {
                SystemItemTimecodes::decode(&klv::read_value(&mut self.source, kl.len)?)?
            } else {
                SystemItemTimecodes::new(ArchiveTimecode::invalid(), ArchiveTimecode::invalid())
            };
            vitc_index.add_timecode(&timecodes.vitc);
            ltc_index.add_timecode(&timecodes.ltc);
        }

        self.source.seek(SeekFrom::Start(resume))?;
        debug!(
            frames = self.index.duration(),
            vitc_runs = vitc_index.num_runs(),
            ltc_runs = ltc_index.num_runs(),
            "read timecode indexes"
        );
        Ok((vitc_index, ltc_index))
    }

    /// Give back the source
    pub fn into_inner(self) -> R {
        self.source
    }
}

fn find_footer<R: Read + Seek>(source: &mut R, header: &Partition) -> Result<Option<u64>> {
    match RandomIndexPack::read_from_end(source) {
        Ok(Some(rip)) => {
            if let Some(last) = rip.entries.last().filter(|e| e.byte_offset > 0) {
                return Ok(Some(last.byte_offset));
            }
        }
        Ok(None) => {}
        Err(e) if e.is_malformed_input() => warn!(error = %e, "ignoring unreadable random index pack"),
        Err(e) => return Err(e),
    }

    Ok(Some(header.footer_partition).filter(|&offset| offset > 0))
}

fn track_kind(data_definition: &Key) -> TrackKind {
    if labels::is_picture(data_definition) {
        TrackKind::Video
    } else if labels::is_sound(data_definition) {
        TrackKind::Audio
    } else if labels::is_timecode(data_definition) {
        TrackKind::Timecode
    } else if labels::DDEF_DESCRIPTIVE_METADATA.equals_ignoring_version(data_definition) {
        TrackKind::DescriptiveMetadata
    } else if labels::DDEF_DATA.equals_ignoring_version(data_definition) {
        TrackKind::Data
    } else {
        TrackKind::Unknown
    }
}

fn is_set(md: &HeaderMetadata, id: SetId, key: &Key) -> bool {
    md.set(id).key().equals_ignoring_version(key)
}

fn build_clip_info(md: &HeaderMetadata) -> Result<ClipInfo> {
    let material = md.material_package()?;
    let material_package_uid: Umid = md.get(material, items::PACKAGE_UID)?;

    let mut tracks = Vec::new();
    let mut start_timecode = None;
    for track in md.tracks_of(material)? {
        if !is_set(md, track, &sets::TRACK) {
            continue;
        }
        let sequence = md.get_strong_ref(track, items::SEQUENCE)?;
        let kind = track_kind(&md.data_definition(sequence)?);

        if kind == TrackKind::Timecode && start_timecode.is_none() {
            start_timecode = read_start_timecode(md, sequence)?;
        }

        tracks.push(TrackInfo {
            track_id: md.get(track, items::TRACK_ID)?,
            name: md.get_optional(track, items::TRACK_NAME)?,
            kind,
            edit_rate: md.get(track, items::EDIT_RATE)?,
            duration: md.get_optional(sequence, items::DURATION)?.unwrap_or(-1),
        });
    }

    let primary = tracks
        .iter()
        .find(|t| t.kind == TrackKind::Video)
        .or_else(|| tracks.iter().find(|t| t.kind == TrackKind::Audio))
        .ok_or_else(|| MxfError::missing_set("essence track in material package"))?;
    let edit_rate = primary.edit_rate;
    let duration = primary.duration;

    let (file_package, body_sid, index_sid) = find_file_package(md)?;
    let file_package_uid: Umid = md.get(file_package, items::PACKAGE_UID)?;
    let descriptors = file_descriptors(md, file_package)?;

    let mut essence_tracks = Vec::new();
    let mut events = Vec::new();
    for track in md.tracks_of(file_package)? {
        if is_set(md, track, &sets::EVENT_TRACK) {
            events.extend(read_events(md, track)?);
            continue;
        }
        if !is_set(md, track, &sets::TRACK) {
            continue;
        }

        let sequence = md.get_strong_ref(track, items::SEQUENCE)?;
        let kind = track_kind(&md.data_definition(sequence)?);
        if !matches!(kind, TrackKind::Video | TrackKind::Audio) {
            continue;
        }

        let track_id: u32 = md.get(track, items::TRACK_ID)?;
        let frame_rate: Rational = md.get(track, items::EDIT_RATE)?;
        let sample_rate = descriptors
            .iter()
            .find(|&&d| md.get_optional::<u32>(d, items::LINKED_TRACK_ID).ok().flatten() == Some(track_id))
            .or(descriptors.first().filter(|_| descriptors.len() == 1))
            .map(|&d| descriptor_sample_rate(md, d, kind))
            .transpose()?
            .flatten()
            .unwrap_or(frame_rate);

        essence_tracks.push(EssenceTrack {
            track_id,
            track_number: md.get(track, items::TRACK_NUMBER)?,
            kind,
            frame_size: FrameSize::Variable,
            sample_rate,
            frame_rate,
            body_sid,
            index_sid,
        });
    }
    events.sort_by_key(|e| e.position);

    Ok(ClipInfo {
        name: md.get_optional(material, items::NAME)?,
        material_package_uid,
        file_package_uid,
        edit_rate,
        duration,
        start_timecode,
        tracks,
        essence_tracks,
        events,
        body_sid,
        index_sid,
    })
}

fn read_start_timecode(md: &HeaderMetadata, sequence: SetId) -> Result<Option<StartTimecode>> {
    let component = if is_set(md, sequence, &sets::TIMECODE_COMPONENT) {
        Some(sequence)
    } else if md.have_item(sequence, items::STRUCTURAL_COMPONENTS) {
        md.get_strong_ref_array(sequence, items::STRUCTURAL_COMPONENTS)?
            .into_iter()
            .find(|&c| is_set(md, c, &sets::TIMECODE_COMPONENT))
    } else {
        None
    };

    let Some(component) = component else {
        return Ok(None);
    };
    Ok(Some(StartTimecode {
        start: md.get(component, items::START_TIMECODE)?,
        rounded_base: md.get(component, items::ROUNDED_TIMECODE_BASE)?,
        drop_frame: md.get_optional(component, items::DROP_FRAME)?.unwrap_or(false),
    }))
}

/// The file source package with its body and index SIDs, found through the
/// essence container data.
fn find_file_package(md: &HeaderMetadata) -> Result<(SetId, u32, u32)> {
    for ecd in md.essence_container_data()? {
        let uid: Umid = md.get(ecd, items::LINKED_PACKAGE_UID)?;
        let Some(package) = md.source_package_by_uid(&uid)? else {
            warn!(?uid, "essence container data links to an unknown package");
            continue;
        };
        let body_sid: u32 = md.get(ecd, items::BODY_SID)?;
        let index_sid: u32 = md.get_optional(ecd, items::INDEX_SID)?.unwrap_or(0);
        return Ok((package, body_sid, index_sid));
    }
    Err(MxfError::missing_set("essence container data for a file source package"))
}

/// The file descriptor, or the sub descriptors of a multiple descriptor
fn file_descriptors(md: &HeaderMetadata, package: SetId) -> Result<Vec<SetId>> {
    if !md.have_item(package, items::DESCRIPTOR) {
        return Ok(Vec::new());
    }
    let descriptor = md.get_strong_ref(package, items::DESCRIPTOR)?;
    if is_set(md, descriptor, &sets::MULTIPLE_DESCRIPTOR) {
        md.get_strong_ref_array(descriptor, items::SUB_DESCRIPTOR_UIDS)
    } else {
        Ok(vec![descriptor])
    }
}

fn descriptor_sample_rate(md: &HeaderMetadata, descriptor: SetId, kind: TrackKind) -> Result<Option<Rational>> {
    if kind == TrackKind::Audio {
        if let Some(rate) = md.get_optional(descriptor, items::AUDIO_SAMPLING_RATE)? {
            return Ok(Some(rate));
        }
    }
    md.get_optional(descriptor, items::SAMPLE_RATE)
}

fn read_events(md: &HeaderMetadata, track: SetId) -> Result<Vec<EventInfo>> {
    let sequence = md.get_strong_ref(track, items::SEQUENCE)?;
    if !md.have_item(sequence, items::STRUCTURAL_COMPONENTS) {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for segment in md.get_strong_ref_array(sequence, items::STRUCTURAL_COMPONENTS)? {
        if !is_set(md, segment, &sets::DM_SEGMENT) {
            continue;
        }
        events.push(EventInfo {
            position: md.get(segment, items::EVENT_START_POSITION)?,
            comment: md.get_optional(segment, items::EVENT_COMMENT)?,
        });
    }
    Ok(events)
}

/// Record the element sizes of the first content package as the tracks'
/// frame sizes when every edit unit has the same size.
fn measure_frame_sizes<R: Read + Seek>(source: &mut R, index: &FileIndex, tracks: &mut [EssenceTrack]) -> Result<()> {
    let (Some(edit_unit_byte_count), Some(start)) = (index.edit_unit_byte_count(), index.frame_offset(0)) else {
        return Ok(());
    };
    if index.duration() == 0 {
        return Ok(());
    }

    let end = start + edit_unit_byte_count;
    source.seek(SeekFrom::Start(start))?;
    while source.stream_position()? < end {
        let kl = klv::read_kl(source)?;
        if let Some(track) = tracks.iter_mut().find(|t| t.matches_key(&kl.key)) {
            track.frame_size = u32::try_from(kl.len).map_or(FrameSize::Variable, FrameSize::Fixed);
        }
        klv::skip(source, kl.len)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::writer::{ArchiveWriter, TimecodeEvent};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[derive(Default)]
    struct Collect {
        frames: Vec<(TrackKind, Vec<u8>)>,
        video_only: bool,
    }

    impl FrameListener for Collect {
        fn accept_frame(&mut self, track: &EssenceTrack) -> bool {
            !self.video_only || track.kind == TrackKind::Video
        }

        fn receive_frame(&mut self, track: &EssenceTrack, data: Vec<u8>) -> Result<()> {
            self.frames.push((track.kind, data));
            Ok(())
        }
    }

    fn archive(frames: usize, events: &[TimecodeEvent]) -> Cursor<Vec<u8>> {
        let config = WriterConfig::new(2)
            .with_video_frame_size(32)
            .with_audio_frame_size(6)
            .with_material_name("reel 7");
        let mut writer = ArchiveWriter::prepare(Cursor::new(Vec::new()), config).unwrap();
        let mut vitc = ArchiveTimecode::new(10, 0, 0, 0);
        let mut ltc = ArchiveTimecode::new(9, 59, 59, 0);
        for i in 0..frames {
            writer.write_system_item(vitc, ltc).unwrap();
            writer.write_video_frame(&[i as u8; 32]).unwrap();
            writer.write_audio_frame(&[1; 6]).unwrap();
            writer.write_audio_frame(&[2; 6]).unwrap();
            vitc.increment(25);
            ltc.increment(25);
        }
        writer.complete(events).unwrap()
    }

    #[test]
    fn test_clip_info() {
        let mut reader = MxfReader::open(archive(12, &[])).unwrap();
        let clip = reader.clip_info().clone();
        assert_eq!(clip.name.as_deref(), Some("reel 7"));
        assert_eq!(clip.duration, 12);
        assert_eq!(clip.edit_rate, Rational::fps_25());
        assert_eq!((clip.body_sid, clip.index_sid), (1, 2));
        assert_eq!(clip.tracks.len(), 4);
        assert_eq!(clip.tracks[0].kind, TrackKind::Timecode);

        let kinds: Vec<_> = clip.essence_tracks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TrackKind::Video, TrackKind::Audio, TrackKind::Audio]);
        assert_eq!(clip.essence_tracks[0].frame_size, FrameSize::Fixed(32));
        assert_eq!(clip.essence_tracks[1].frame_size, FrameSize::Fixed(6));
        assert_eq!(clip.essence_tracks[1].sample_rate, Rational::audio_48k());

        let start = clip.start_timecode.unwrap();
        assert_eq!(start.timecode(), ArchiveTimecode::new(10, 0, 0, 0));
        assert!(reader.is_complete());
        assert_eq!(reader.last_written_frame_number().unwrap(), Some(11));
    }

    #[test]
    fn test_read_frames_in_order() {
        let mut reader = MxfReader::open(archive(3, &[])).unwrap();
        let mut listener = Collect::default();
        assert_eq!(reader.frame_number(), Some(0));

        for _ in 0..3 {
            reader.read_next_frame(&mut listener).unwrap();
        }
        assert_eq!(listener.frames.len(), 9);
        assert_eq!(listener.frames[3], (TrackKind::Video, vec![1; 32]));
        assert_eq!(listener.frames[5], (TrackKind::Audio, vec![2; 6]));

        assert_eq!(reader.frame_number(), None);
        assert!(matches!(reader.read_next_frame(&mut listener), Err(MxfError::EndOfEssence)));
    }

    #[test]
    fn test_position_and_skip() {
        let mut reader = MxfReader::open(archive(10, &[])).unwrap();
        let mut listener = Collect {
            video_only: true,
            ..Default::default()
        };

        reader.position_at_frame(7).unwrap();
        reader.read_next_frame(&mut listener).unwrap();
        assert_eq!(listener.frames, vec![(TrackKind::Video, vec![7; 32])]);
        let timecodes = reader.system_item_timecodes().unwrap();
        assert_eq!(timecodes.vitc, ArchiveTimecode::new(10, 0, 0, 7));
        assert_eq!(timecodes.ltc, ArchiveTimecode::new(9, 59, 59, 7));

        reader.skip_next_frame().unwrap();
        assert_eq!(reader.frame_number(), Some(9));

        reader.position_at_timecode(&ArchiveTimecode::new(10, 0, 0, 2)).unwrap();
        assert_eq!(reader.frame_number(), Some(2));
        assert!(matches!(
            reader.position_at_frame(10),
            Err(MxfError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_events_in_footer_metadata() {
        let events = vec![
            TimecodeEvent::new(ArchiveTimecode::new(10, 0, 0, 4), ArchiveTimecode::new(9, 59, 59, 4), "dropout"),
            TimecodeEvent::new(ArchiveTimecode::new(10, 0, 0, 8), ArchiveTimecode::new(9, 59, 59, 8), ""),
        ];
        let source = archive(10, &events);

        let reader = MxfReader::open(source).unwrap();
        let clip = reader.clip_info();
        assert_eq!(
            clip.events,
            vec![
                EventInfo {
                    position: 4,
                    comment: Some("dropout".to_string())
                },
                EventInfo {
                    position: 8,
                    comment: None
                },
            ]
        );

        let source = reader.into_inner();
        let reader =
            MxfReader::open_with_config(source, ReaderConfig::default().with_prefer_footer_metadata(false)).unwrap();
        assert!(reader.clip_info().events.is_empty());
    }

    #[test]
    fn test_timecode_indexes() {
        let mut reader = MxfReader::open(archive(40, &[])).unwrap();
        let (vitc, ltc) = reader.read_timecode_indexes().unwrap();
        assert_eq!(vitc.len(), 40);
        assert_eq!(vitc.num_runs(), 1);
        assert_eq!(ltc.len(), 40);
        assert_eq!(ltc.position_to_timecode(ltc.runs().next().unwrap().timecode_pos), ArchiveTimecode::new(9, 59, 59, 0));
    }

    #[test]
    fn test_element_size_limit() {
        let mut reader =
            MxfReader::open_with_config(archive(2, &[]), ReaderConfig::default().with_max_element_size(16)).unwrap();
        let mut listener = Collect::default();
        assert!(matches!(
            reader.read_next_frame(&mut listener),
            Err(MxfError::Unsupported(_))
        ));
        assert_eq!(reader.frame_number(), Some(0));
    }
}
