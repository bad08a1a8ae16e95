//! Archive MXF writer.
//!
//! Writes an OP1a file of frame-wrapped content packages, each holding a
//! system item with the VITC and LTC read for the frame, one uncompressed
//! video frame and up to four BWF audio frames. Every content package has
//! the same size, so a single constant index table segment covers the
//! essence.
//!
//! Header metadata and index are written into a fixed reserve ahead of the
//! essence when the file is prepared and rewritten in place with the final
//! durations on [`ArchiveWriter::complete`]. A file that is never completed
//! is still readable up to its last content package.
//!
//! # Example
//!
//! ```no_run
//! use mxfkit::{ArchiveTimecode, ArchiveWriter, WriterConfig};
//!
//! let config = WriterConfig::new(1).with_video_frame_size(16).with_audio_frame_size(4);
//! let mut writer = ArchiveWriter::create("archive.mxf", config)?;
//! let mut tc = ArchiveTimecode::new(10, 0, 0, 0);
//! for _ in 0..25 {
//!     writer.write_system_item(tc, tc)?;
//!     writer.write_video_frame(&[0x80; 16])?;
//!     writer.write_audio_frame(&[0; 4])?;
//!     tc.increment(25);
//! }
//! writer.complete(&[])?;
//! # Ok::<(), mxfkit::MxfError>(())
//! ```

use crate::config::WriterConfig;
use crate::error::{MxfError, Result};
use crate::essence::EssenceElementWriter;
use crate::index::IndexTableSegment;
use crate::klv::{self, DEFAULT_LLEN, MIN_FILL_SIZE};
use crate::metadata::{HeaderMetadata, SetId};
use crate::model::{items, sets};
use crate::partition::{Partition, PartitionCompleteness, PartitionStatus, RandomIndexPack};
use crate::system_item::{SystemItemTimecodes, SYSTEM_ITEM_KLV_SIZE};
use crate::types::{Timestamp, Umid};
use crate::ul::{
    complete_essence_element_key, labels, Key, BWF_FRAME_WRAPPED_EE_TYPE, UNC_FRAME_WRAPPED_EE_TYPE,
};
use mxfkit_timecode::{find_position_at_dual_timecode, ArchiveTimecode, TimecodeIndex, TimecodeIndexSearcher};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Body SID of the essence container
pub const BODY_SID: u32 = 1;

/// Index SID of the essence index
pub const INDEX_SID: u32 = 2;

/// DM segments per event track; a batch of more references overflows the
/// 16-bit local length.
pub const MAX_EVENTS_PER_TRACK: usize = 4095;

const COMPANY_NAME: &str = "mxfkit";
const PRODUCT_NAME: &str = "mxfkit archive writer";
const PRODUCT_UID: Uuid = Uuid::from_bytes([
    0x5d, 0x2f, 0x61, 0x0c, 0x8e, 0x3a, 0x4b, 0x77, 0x9a, 0x10, 0x42, 0x6e, 0x3c, 0xd1, 0x07, 0xa4,
]);

/// A timecode event to record on the descriptive metadata track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeEvent {
    /// VITC at the event
    pub vitc: ArchiveTimecode,
    /// LTC at the event
    pub ltc: ArchiveTimecode,
    /// Recorded as the DM segment's EventComment when not empty
    pub comment: String,
}

impl TimecodeEvent {
    pub fn new(vitc: ArchiveTimecode, ltc: ArchiveTimecode, comment: impl Into<String>) -> Self {
        TimecodeEvent {
            vitc,
            ltc,
            comment: comment.into(),
        }
    }
}

/// A sink whose content can be thrown away.
pub trait Discard {
    /// Drop everything written so far.
    fn discard(&mut self) -> Result<()>;
}

impl Discard for File {
    fn discard(&mut self) -> Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl<T: Discard + ?Sized> Discard for &mut T {
    fn discard(&mut self) -> Result<()> {
        (**self).discard()
    }
}

impl Discard for Cursor<Vec<u8>> {
    fn discard(&mut self) -> Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }
}

/// Position within the current content package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageState {
    Start,
    AfterTimecode,
    AfterVideo { audio_written: u32 },
}

/// Sets updated when the file is completed
struct ArchiveMetadata {
    metadata: HeaderMetadata,
    file_package: SetId,
    timecode_component: SetId,
    duration_sets: Vec<SetId>,
    descriptor_sets: Vec<SetId>,
}

/// Writer of archive MXF files.
pub struct ArchiveWriter<W: Write + Seek> {
    sink: W,
    path: Option<PathBuf>,
    config: WriterConfig,
    header: Partition,
    archive: ArchiveMetadata,
    index_segment: IndexTableSegment,
    video_key: Key,
    audio_keys: Vec<Key>,
    vitc_index: TimecodeIndex,
    ltc_index: TimecodeIndex,
    first_vitc: Option<ArchiveTimecode>,
    state: PackageState,
    duration: i64,
    /// Set when a sink write fails; only `abort` is accepted afterwards
    failed: bool,
}

impl ArchiveWriter<File> {
    /// Create `path` and prepare it for writing.
    ///
    /// The file is removed again if preparing fails.
    pub fn create(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;
        let file = File::create(path)?;

        match Self::prepare(file, config) {
            Ok(mut writer) => {
                writer.path = Some(path.to_path_buf());
                info!(path = %path.display(), "created archive file");
                Ok(writer)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %remove_err, "failed to remove archive file");
                }
                Err(e)
            }
        }
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Write the header partition, header metadata and index reserve to
    /// `sink`, which must be positioned at its start.
    pub fn prepare(mut sink: W, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let num_audio = config.num_audio_tracks as u8;

        let video_key = complete_essence_element_key(&labels::UNC_PICTURE_ELEMENT, 1, UNC_FRAME_WRAPPED_EE_TYPE, 1);
        let audio_keys: Vec<Key> = (0..num_audio)
            .map(|i| complete_essence_element_key(&labels::BWF_SOUND_ELEMENT, num_audio, BWF_FRAME_WRAPPED_EE_TYPE, i + 1))
            .collect();

        let mut header = Partition::header();
        header.this_partition = sink.stream_position()?;
        header.index_sid = INDEX_SID;
        header.body_sid = BODY_SID;
        for ec in essence_containers(&config) {
            header.add_essence_container(ec);
        }

        let mut index_segment = IndexTableSegment::constant(
            config.edit_rate,
            config.content_package_size() as u32,
            INDEX_SID,
            BODY_SID,
        );
        index_segment.add_delta_entry(0);
        let mut delta = SYSTEM_ITEM_KLV_SIZE;
        index_segment.add_delta_entry(delta as u32);
        delta += 20 + config.video_frame_size as u64;
        for _ in 0..num_audio {
            index_segment.add_delta_entry(delta as u32);
            delta += 20 + config.audio_frame_size as u64;
        }

        let archive = build_metadata(&config, &video_key, &audio_keys)?;
        let vitc_index = TimecodeIndex::with_config(config.timecode_index)?;
        let ltc_index = TimecodeIndex::with_config(config.timecode_index)?;

        header.write(&mut sink)?;

        let mut writer = ArchiveWriter {
            sink,
            path: None,
            config,
            header,
            archive,
            index_segment,
            video_key,
            audio_keys,
            vitc_index,
            ltc_index,
            first_vitc: None,
            state: PackageState::Start,
            duration: 0,
            failed: false,
        };
        writer.write_header_region()?;
        writer.header.rewrite_at(&mut writer.sink)?;
        writer.sink.flush()?;

        debug!(
            audio_tracks = num_audio,
            content_package = writer.config.content_package_size(),
            header_byte_count = writer.header.header_byte_count,
            "prepared archive file"
        );
        Ok(writer)
    }

    /// Write header metadata, the index segment and fill up to the header
    /// reserve.
    fn write_header_region(&mut self) -> Result<()> {
        let metadata_start = self.header.pack_end();
        self.sink.seek(SeekFrom::Start(metadata_start))?;
        self.header.header_byte_count = self.archive.metadata.write(&mut self.sink)?;

        let index_start = metadata_start + self.header.header_byte_count;
        let index_end = index_start + self.index_segment.write(&mut self.sink)?;
        let reserve = self.config.header_reserve;
        if index_end > reserve || (index_end < reserve && reserve - index_end < MIN_FILL_SIZE) {
            return Err(MxfError::unsupported(format!(
                "header metadata and index end at {}, past the reserve of {} bytes",
                index_end, reserve
            )));
        }
        if index_end < reserve {
            klv::write_fill(&mut self.sink, reserve - index_end)?;
        }
        self.header.index_byte_count = reserve - index_start;
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(MxfError::invalid_state("a previous write failed, the file must be aborted"));
        }
        Ok(())
    }

    /// Run a write against the sink, marking the writer failed on error.
    fn write_to_sink<T>(&mut self, write: impl FnOnce(&mut W) -> Result<T>) -> Result<T> {
        let result = write(&mut self.sink);
        if let Err(e) = &result {
            warn!(error = %e, "archive write failed");
            self.failed = true;
        }
        result
    }

    /// Write the system item starting a content package.
    pub fn write_system_item(&mut self, vitc: ArchiveTimecode, ltc: ArchiveTimecode) -> Result<()> {
        self.check_usable()?;
        if self.state != PackageState::Start {
            return Err(MxfError::invalid_state("Timecode already written"));
        }

        self.write_to_sink(|sink| SystemItemTimecodes::new(vitc, ltc).write(sink))?;

        self.vitc_index.add_timecode(&vitc);
        self.ltc_index.add_timecode(&ltc);
        if self.first_vitc.is_none() && vitc.is_valid() {
            self.first_vitc = Some(vitc);
        }
        self.state = PackageState::AfterTimecode;
        Ok(())
    }

    /// Write the video frame of the current content package.
    pub fn write_video_frame(&mut self, data: &[u8]) -> Result<()> {
        self.check_usable()?;
        match self.state {
            PackageState::Start => {
                return Err(MxfError::invalid_state("Must first write timecode before video frame"))
            }
            PackageState::AfterVideo { .. } => return Err(MxfError::invalid_state("Video frame already written")),
            PackageState::AfterTimecode => {}
        }

        let key = self.video_key;
        self.write_element(key, self.config.video_frame_size, data)?;
        self.duration += 1;
        self.state = if self.audio_keys.is_empty() {
            PackageState::Start
        } else {
            PackageState::AfterVideo { audio_written: 0 }
        };
        Ok(())
    }

    /// Write the next audio frame of the current content package.
    pub fn write_audio_frame(&mut self, data: &[u8]) -> Result<()> {
        self.check_usable()?;
        let PackageState::AfterVideo { audio_written } = self.state else {
            return Err(MxfError::invalid_state("Must write video frame before audio frames"));
        };

        let key = self.audio_keys[audio_written as usize];
        self.write_element(key, self.config.audio_frame_size, data)?;
        let audio_written = audio_written + 1;
        self.state = if audio_written as usize >= self.audio_keys.len() {
            PackageState::Start
        } else {
            PackageState::AfterVideo { audio_written }
        };
        Ok(())
    }

    fn write_element(&mut self, key: Key, frame_size: u32, data: &[u8]) -> Result<()> {
        let declared = frame_size as u64;
        let len = data.len() as u64;
        if len > declared {
            return Err(MxfError::EssenceOverflow {
                declared,
                written: 0,
                attempted: len,
            });
        }
        if len < declared {
            return Err(MxfError::ShortWrite { declared, written: len });
        }

        self.write_to_sink(|sink| {
            let mut element = EssenceElementWriter::open(sink, key, DEFAULT_LLEN, declared)?;
            element.write_data(data)?;
            element.finalize()
        })?;
        Ok(())
    }

    /// Number of content packages written
    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// VITC recorded so far
    pub fn vitc_index(&self) -> &TimecodeIndex {
        &self.vitc_index
    }

    /// LTC recorded so far
    pub fn ltc_index(&self) -> &TimecodeIndex {
        &self.ltc_index
    }

    /// Finish the file and return the sink.
    ///
    /// Durations are filled in, the header metadata is rewritten in place
    /// and a footer partition with the final header metadata, the index and
    /// a random index pack is appended. `events` that can be located through
    /// their VITC/LTC pair are recorded on an event track of the file source
    /// package in the footer metadata; the header partition is then left
    /// closed but incomplete.
    pub fn complete(mut self, events: &[TimecodeEvent]) -> Result<W> {
        self.check_usable()?;
        if self.state != PackageState::Start {
            return Err(MxfError::invalid_state("content package is incomplete"));
        }

        self.update_durations()?;
        self.index_segment.index_duration = self.duration;
        self.write_header_region()?;

        let located = self.locate_events(events);

        let footer_offset = self.sink.seek(SeekFrom::End(0))?;
        let mut footer = Partition::footer();
        footer.completeness = PartitionCompleteness::Complete;
        footer.this_partition = footer_offset;
        footer.previous_partition = self.header.this_partition;
        footer.footer_partition = footer_offset;
        footer.index_sid = INDEX_SID;
        footer.body_offset = self.duration as u64 * self.config.content_package_size();
        footer.essence_containers = self.header.essence_containers.clone();
        footer.write(&mut self.sink)?;

        if !located.is_empty() {
            self.add_event_tracks(events, &located)?;
        }
        footer.header_byte_count = self.archive.metadata.write(&mut self.sink)?;

        self.index_segment.instance_uid = Uuid::new_v4();
        footer.index_byte_count = self.index_segment.write(&mut self.sink)?;

        let mut rip = RandomIndexPack::new();
        rip.add_entry(BODY_SID, self.header.this_partition);
        rip.add_entry(0, footer_offset);
        rip.write(&mut self.sink)?;

        self.header.status = PartitionStatus::Closed;
        self.header.completeness = if located.is_empty() {
            PartitionCompleteness::Complete
        } else {
            PartitionCompleteness::Incomplete
        };
        self.header.footer_partition = footer_offset;
        self.header.rewrite_at(&mut self.sink)?;
        footer.rewrite_at(&mut self.sink)?;
        self.sink.flush()?;

        info!(
            duration = self.duration,
            events = located.len(),
            footer_offset,
            "completed archive file"
        );
        Ok(self.sink)
    }

    /// Discard everything written, removing the file if the writer created
    /// one.
    pub fn abort(self) -> Result<()>
    where
        W: Discard,
    {
        let ArchiveWriter { mut sink, path, .. } = self;
        sink.discard()?;
        drop(sink);

        if let Some(path) = path {
            fs::remove_file(&path)?;
            info!(path = %path.display(), "aborted archive file");
        }
        Ok(())
    }

    fn update_durations(&mut self) -> Result<()> {
        let archive = &mut self.archive;
        for &set in &archive.duration_sets {
            archive.metadata.set_value(set, items::DURATION, &self.duration)?;
        }
        for &set in &archive.descriptor_sets {
            archive.metadata.set_value(set, items::CONTAINER_DURATION, &self.duration)?;
        }

        if let Some(first) = self.first_vitc {
            let start = first.to_position(self.vitc_index.config().frames_per_second);
            archive
                .metadata
                .set_value(archive.timecode_component, items::START_TIMECODE, &start)?;
        }
        Ok(())
    }

    /// Positions of the events that can be located, with their index in
    /// `events`.
    ///
    /// Nothing is located unless one of the first `max_event_checks` events
    /// is found.
    fn locate_events(&self, events: &[TimecodeEvent]) -> Vec<(i64, usize)> {
        if events.is_empty() {
            return Vec::new();
        }

        let mut vitc = TimecodeIndexSearcher::new(&self.vitc_index);
        let mut ltc = TimecodeIndexSearcher::new(&self.ltc_index);
        let checks = self.config.max_event_checks;
        let found_leading = events.iter().take(checks).any(|event| {
            matches!(
                find_position_at_dual_timecode(&mut vitc, &event.vitc, &mut ltc, &event.ltc),
                Ok(Some(_))
            )
        });
        if !found_leading {
            warn!(checks, "failed to locate any of the leading events, recording none");
            return Vec::new();
        }

        let mut vitc = TimecodeIndexSearcher::new(&self.vitc_index);
        let mut ltc = TimecodeIndexSearcher::new(&self.ltc_index);
        let mut located = Vec::new();
        for (i, event) in events.iter().enumerate() {
            match find_position_at_dual_timecode(&mut vitc, &event.vitc, &mut ltc, &event.ltc) {
                Ok(Some(position)) => located.push((position, i)),
                Ok(None) => warn!(event = i, vitc = %event.vitc, ltc = %event.ltc, "failed to locate event"),
                Err(e) => warn!(event = i, error = %e, "failed to locate event"),
            }
        }
        located
    }

    fn add_event_tracks(&mut self, events: &[TimecodeEvent], located: &[(i64, usize)]) -> Result<()> {
        let metadata = &mut self.archive.metadata;
        let file_package = self.archive.file_package;
        let mut track_id = 2 + self.audio_keys.len() as u32;

        for chunk in located.chunks(MAX_EVENTS_PER_TRACK) {
            let track = metadata.create_set(sets::EVENT_TRACK);
            metadata.add_strong_ref(file_package, items::TRACKS, track)?;
            metadata.set_value(track, items::TRACK_NAME, &self.config.event_track_name)?;
            metadata.set_value(track, items::TRACK_ID, &track_id)?;
            metadata.set_value(track, items::TRACK_NUMBER, &0u32)?;
            metadata.set_value(track, items::EVENT_EDIT_RATE, &self.config.edit_rate)?;
            metadata.set_value(track, items::EVENT_ORIGIN, &0i64)?;
            track_id += 1;

            let sequence = metadata.create_set(sets::SEQUENCE);
            metadata.set_strong_ref(track, items::SEQUENCE, sequence)?;
            metadata.set_value(sequence, items::DATA_DEFINITION, &labels::DDEF_DESCRIPTIVE_METADATA)?;
            metadata.set_array::<Uuid>(sequence, items::STRUCTURAL_COMPONENTS, &[])?;

            for &(position, event) in chunk {
                let segment = metadata.create_set(sets::DM_SEGMENT);
                metadata.add_strong_ref(sequence, items::STRUCTURAL_COMPONENTS, segment)?;
                metadata.set_value(segment, items::DATA_DEFINITION, &labels::DDEF_DESCRIPTIVE_METADATA)?;
                metadata.set_value(segment, items::EVENT_START_POSITION, &position)?;
                metadata.set_value(segment, items::DURATION, &1i64)?;
                let comment = &events[event].comment;
                if !comment.is_empty() {
                    metadata.set_value(segment, items::EVENT_COMMENT, comment)?;
                }
            }
        }
        Ok(())
    }
}

fn essence_containers(config: &WriterConfig) -> Vec<Key> {
    let mut containers = vec![labels::EC_MULTIPLE_WRAPPINGS, labels::EC_SD_UNC_625_50I_FRAME_WRAPPED];
    if config.num_audio_tracks > 0 {
        containers.push(labels::EC_BWF_FRAME_WRAPPED);
    }
    containers
}

/// Build the header metadata of a new archive file.
///
/// Preface, identification and content storage, a material package with a
/// timecode track and one track per essence track, and the file source
/// package with its descriptors. Durations start at -1.
fn build_metadata(config: &WriterConfig, video_key: &Key, audio_keys: &[Key]) -> Result<ArchiveMetadata> {
    let mut md = HeaderMetadata::new();
    let now = Timestamp::now();
    let edit_rate = config.edit_rate;
    let material_uid = Umid::generate();
    let file_uid = Umid::generate();
    let mut duration_sets = Vec::new();
    let mut descriptor_sets = Vec::new();

    let preface = md.create_set(sets::PREFACE);
    md.set_value(preface, items::LAST_MODIFIED_DATE, &now)?;
    md.set_value(preface, items::VERSION, &0x0102u16)?;
    md.set_value(preface, items::OPERATIONAL_PATTERN, &labels::OP_1A_QQ09)?;
    md.set_array(preface, items::ESSENCE_CONTAINERS, &essence_containers(config))?;
    md.set_array::<Key>(preface, items::DM_SCHEMES, &[])?;

    let ident = md.create_set(sets::IDENTIFICATION);
    md.add_strong_ref(preface, items::IDENTIFICATIONS, ident)?;
    md.set_value(ident, items::THIS_GENERATION_UID, &Uuid::new_v4())?;
    md.set_value(ident, items::COMPANY_NAME, &COMPANY_NAME.to_string())?;
    md.set_value(ident, items::PRODUCT_NAME, &PRODUCT_NAME.to_string())?;
    md.set_value(ident, items::VERSION_STRING, &env!("CARGO_PKG_VERSION").to_string())?;
    md.set_value(ident, items::PRODUCT_UID, &PRODUCT_UID)?;
    md.set_value(ident, items::MODIFICATION_DATE, &now)?;
    md.set_value(ident, items::PLATFORM, &format!("{} {}", std::env::consts::OS, std::env::consts::ARCH))?;

    let storage = md.create_set(sets::CONTENT_STORAGE);
    md.set_strong_ref(preface, items::CONTENT_STORAGE, storage)?;

    let ecd = md.create_set(sets::ESSENCE_CONTAINER_DATA);
    md.add_strong_ref(storage, items::ESSENCE_CONTAINER_DATA, ecd)?;
    md.set_value(ecd, items::LINKED_PACKAGE_UID, &file_uid)?;
    md.set_value(ecd, items::INDEX_SID, &INDEX_SID)?;
    md.set_value(ecd, items::BODY_SID, &BODY_SID)?;

    // material package
    let material = md.create_set(sets::MATERIAL_PACKAGE);
    md.add_strong_ref(storage, items::PACKAGES, material)?;
    md.set_value(material, items::PACKAGE_UID, &material_uid)?;
    md.set_value(material, items::NAME, &config.material_name)?;
    md.set_value(material, items::PACKAGE_CREATION_DATE, &now)?;
    md.set_value(material, items::PACKAGE_MODIFIED_DATE, &now)?;

    let timecode_track = add_track(&mut md, material, 1, 0, config)?;
    let sequence = add_sequence(&mut md, timecode_track, labels::DDEF_TIMECODE, &mut duration_sets)?;
    let timecode_component = md.create_set(sets::TIMECODE_COMPONENT);
    md.add_strong_ref(sequence, items::STRUCTURAL_COMPONENTS, timecode_component)?;
    md.set_value(timecode_component, items::DATA_DEFINITION, &labels::DDEF_TIMECODE)?;
    md.set_value(timecode_component, items::DURATION, &-1i64)?;
    md.set_value(timecode_component, items::ROUNDED_TIMECODE_BASE, &(config.edit_rate.rounded() as u16))?;
    md.set_value(timecode_component, items::DROP_FRAME, &false)?;
    md.set_value(timecode_component, items::START_TIMECODE, &0i64)?;
    duration_sets.push(timecode_component);

    let essence_tracks: Vec<(Key, Key)> = std::iter::once((labels::DDEF_PICTURE, *video_key))
        .chain(audio_keys.iter().map(|key| (labels::DDEF_SOUND, *key)))
        .collect();

    for (i, (ddef, _)) in essence_tracks.iter().enumerate() {
        let track = add_track(&mut md, material, i as u32 + 2, 0, config)?;
        let sequence = add_sequence(&mut md, track, *ddef, &mut duration_sets)?;
        let clip = md.create_set(sets::SOURCE_CLIP);
        md.add_strong_ref(sequence, items::STRUCTURAL_COMPONENTS, clip)?;
        md.set_value(clip, items::DATA_DEFINITION, ddef)?;
        md.set_value(clip, items::DURATION, &-1i64)?;
        md.set_value(clip, items::START_POSITION, &0i64)?;
        md.set_value(clip, items::SOURCE_PACKAGE_ID, &file_uid)?;
        md.set_value(clip, items::SOURCE_TRACK_ID, &(i as u32 + 1))?;
        duration_sets.push(clip);
    }

    // file source package
    let file_package = md.create_set(sets::SOURCE_PACKAGE);
    md.add_strong_ref(storage, items::PACKAGES, file_package)?;
    md.set_value(file_package, items::PACKAGE_UID, &file_uid)?;
    md.set_value(file_package, items::PACKAGE_CREATION_DATE, &now)?;
    md.set_value(file_package, items::PACKAGE_MODIFIED_DATE, &now)?;

    for (i, (ddef, key)) in essence_tracks.iter().enumerate() {
        let track = add_track(&mut md, file_package, i as u32 + 1, key.track_number(), config)?;
        let sequence = add_sequence(&mut md, track, *ddef, &mut duration_sets)?;
        let clip = md.create_set(sets::SOURCE_CLIP);
        md.add_strong_ref(sequence, items::STRUCTURAL_COMPONENTS, clip)?;
        md.set_value(clip, items::DATA_DEFINITION, ddef)?;
        md.set_value(clip, items::DURATION, &-1i64)?;
        md.set_value(clip, items::START_POSITION, &0i64)?;
        md.set_value(clip, items::SOURCE_PACKAGE_ID, &Umid::zero())?;
        md.set_value(clip, items::SOURCE_TRACK_ID, &0u32)?;
        duration_sets.push(clip);
    }

    let multiple = md.create_set(sets::MULTIPLE_DESCRIPTOR);
    md.set_strong_ref(file_package, items::DESCRIPTOR, multiple)?;
    md.set_value(multiple, items::SAMPLE_RATE, &edit_rate)?;
    md.set_value(multiple, items::ESSENCE_CONTAINER, &labels::EC_MULTIPLE_WRAPPINGS)?;
    md.set_array::<Uuid>(multiple, items::SUB_DESCRIPTOR_UIDS, &[])?;
    descriptor_sets.push(multiple);

    let picture = &config.picture;
    let cdci = md.create_set(sets::CDCI_DESCRIPTOR);
    md.add_strong_ref(multiple, items::SUB_DESCRIPTOR_UIDS, cdci)?;
    md.set_value(cdci, items::LINKED_TRACK_ID, &1u32)?;
    md.set_value(cdci, items::SAMPLE_RATE, &edit_rate)?;
    md.set_value(cdci, items::ESSENCE_CONTAINER, &labels::EC_SD_UNC_625_50I_FRAME_WRAPPED)?;
    md.set_value(cdci, items::FRAME_LAYOUT, &picture.frame_layout)?;
    md.set_value(cdci, items::STORED_HEIGHT, &picture.stored_height)?;
    md.set_value(cdci, items::STORED_WIDTH, &picture.stored_width)?;
    md.set_array(cdci, items::VIDEO_LINE_MAP, &picture.video_line_map)?;
    md.set_value(cdci, items::ASPECT_RATIO, &picture.aspect_ratio)?;
    md.set_value(cdci, items::COMPONENT_DEPTH, &picture.component_depth)?;
    md.set_value(cdci, items::HORIZONTAL_SUBSAMPLING, &picture.horizontal_subsampling)?;
    md.set_value(cdci, items::VERTICAL_SUBSAMPLING, &picture.vertical_subsampling)?;
    descriptor_sets.push(cdci);

    let sound = &config.sound;
    for i in 0..audio_keys.len() as u32 {
        let wave = md.create_set(sets::WAVE_DESCRIPTOR);
        md.add_strong_ref(multiple, items::SUB_DESCRIPTOR_UIDS, wave)?;
        md.set_value(wave, items::LINKED_TRACK_ID, &(i + 2))?;
        md.set_value(wave, items::SAMPLE_RATE, &edit_rate)?;
        md.set_value(wave, items::ESSENCE_CONTAINER, &labels::EC_BWF_FRAME_WRAPPED)?;
        md.set_value(wave, items::AUDIO_SAMPLING_RATE, &sound.sampling_rate)?;
        md.set_value(wave, items::LOCKED, &true)?;
        md.set_value(wave, items::CHANNEL_COUNT, &1u32)?;
        md.set_value(wave, items::QUANTIZATION_BITS, &sound.quantization_bits)?;
        md.set_value(wave, items::BLOCK_ALIGN, &sound.block_align)?;
        md.set_value(wave, items::AVG_BPS, &sound.avg_bps())?;
        descriptor_sets.push(wave);
    }

    Ok(ArchiveMetadata {
        metadata: md,
        file_package,
        timecode_component,
        duration_sets,
        descriptor_sets,
    })
}

fn add_track(
    md: &mut HeaderMetadata,
    package: SetId,
    track_id: u32,
    track_number: u32,
    config: &WriterConfig,
) -> Result<SetId> {
    let track = md.create_set(sets::TRACK);
    md.add_strong_ref(package, items::TRACKS, track)?;
    md.set_value(track, items::TRACK_ID, &track_id)?;
    md.set_value(track, items::TRACK_NUMBER, &track_number)?;
    md.set_value(track, items::EDIT_RATE, &config.edit_rate)?;
    md.set_value(track, items::ORIGIN, &0i64)?;
    Ok(track)
}

fn add_sequence(
    md: &mut HeaderMetadata,
    track: SetId,
    data_definition: Key,
    duration_sets: &mut Vec<SetId>,
) -> Result<SetId> {
    let sequence = md.create_set(sets::SEQUENCE);
    md.set_strong_ref(track, items::SEQUENCE, sequence)?;
    md.set_value(sequence, items::DATA_DEFINITION, &data_definition)?;
    md.set_value(sequence, items::DURATION, &-1i64)?;
    duration_sets.push(sequence);
    Ok(sequence)
}
