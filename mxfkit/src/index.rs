//! Index table segments and frame positioning.
//!
//! [`FileIndex`] maps frame numbers to the file offset of their content
//! package, either arithmetically (constant bytes per edit unit) or from
//! the per-frame stream offsets of the index entry arrays.

use crate::error::{MxfError, Result};
use crate::item::ItemValue;
use crate::klv::{self, ArrayHeader, LocalItems, DEFAULT_LLEN};
use crate::model::items;
use crate::partition::Partition;
use crate::types::Rational;
use crate::ul::{labels, Key};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};
use uuid::Uuid;

const DELTA_ENTRY_SIZE: u32 = 6;
const INDEX_ENTRY_BASE_SIZE: u32 = 11;

/// Delta entry: position of an element within the edit unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaEntry {
    pub pos_table_index: i8,
    pub slice: u8,
    pub element_delta: u32,
}

/// Index entry of one edit unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
    /// Offset of the edit unit in the essence stream
    pub stream_offset: u64,
}

/// Index table segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTableSegment {
    pub instance_uid: Uuid,
    pub index_edit_rate: Rational,
    pub index_start_position: i64,
    pub index_duration: i64,
    /// Bytes per edit unit, or 0 when edit units differ in size
    pub edit_unit_byte_count: u32,
    pub index_sid: u32,
    pub body_sid: u32,
    pub slice_count: u8,
    pub pos_table_count: u8,
    pub delta_entries: Vec<DeltaEntry>,
    pub index_entries: Vec<IndexEntry>,
}

impl Default for IndexTableSegment {
    fn default() -> Self {
        IndexTableSegment {
            instance_uid: Uuid::new_v4(),
            index_edit_rate: Rational::fps_25(),
            index_start_position: 0,
            index_duration: 0,
            edit_unit_byte_count: 0,
            index_sid: 0,
            body_sid: 0,
            slice_count: 0,
            pos_table_count: 0,
            delta_entries: Vec::new(),
            index_entries: Vec::new(),
        }
    }
}

impl IndexTableSegment {
    /// Segment for constant size edit units
    pub fn constant(edit_rate: Rational, edit_unit_byte_count: u32, index_sid: u32, body_sid: u32) -> Self {
        IndexTableSegment {
            index_edit_rate: edit_rate,
            edit_unit_byte_count,
            index_sid,
            body_sid,
            ..Default::default()
        }
    }

    /// True when every edit unit has the same size
    pub fn is_constant(&self) -> bool {
        self.edit_unit_byte_count > 0
    }

    /// Append a delta entry for the next element of the edit unit
    pub fn add_delta_entry(&mut self, element_delta: u32) {
        self.delta_entries.push(DeltaEntry {
            pos_table_index: 0,
            slice: 0,
            element_delta,
        });
    }

    /// Decode the value of an index table segment KLV.
    ///
    /// Index segments use fixed local tags. The array headers of the entry
    /// arrays are trusted over the 16-bit local length.
    pub fn read(value: &[u8]) -> Result<Self> {
        let array_tags = [items::DELTA_ENTRY_ARRAY.tag, items::INDEX_ENTRY_ARRAY.tag];
        let mut segment = IndexTableSegment {
            instance_uid: Uuid::nil(),
            ..Default::default()
        };

        for entry in LocalItems::new(value).with_array_tags(&array_tags) {
            let (tag, bytes) = entry?;
            match tag {
                t if t == items::INSTANCE_UID.tag => {
                    segment.instance_uid = Uuid::read_value(&items::INSTANCE_UID.key, bytes)?
                }
                t if t == items::INDEX_EDIT_RATE.tag => {
                    segment.index_edit_rate = Rational::read_value(&items::INDEX_EDIT_RATE.key, bytes)?
                }
                t if t == items::INDEX_START_POSITION.tag => {
                    segment.index_start_position = i64::read_value(&items::INDEX_START_POSITION.key, bytes)?
                }
                t if t == items::INDEX_DURATION.tag => {
                    segment.index_duration = i64::read_value(&items::INDEX_DURATION.key, bytes)?
                }
                t if t == items::EDIT_UNIT_BYTE_COUNT.tag => {
                    segment.edit_unit_byte_count = u32::read_value(&items::EDIT_UNIT_BYTE_COUNT.key, bytes)?
                }
                t if t == items::INDEX_SID.tag => {
                    segment.index_sid = u32::read_value(&items::INDEX_SID.key, bytes)?
                }
                t if t == items::BODY_SID.tag => segment.body_sid = u32::read_value(&items::BODY_SID.key, bytes)?,
                t if t == items::SLICE_COUNT.tag => {
                    segment.slice_count = u8::read_value(&items::SLICE_COUNT.key, bytes)?
                }
                t if t == items::POS_TABLE_COUNT.tag => {
                    segment.pos_table_count = u8::read_value(&items::POS_TABLE_COUNT.key, bytes)?
                }
                t if t == items::DELTA_ENTRY_ARRAY.tag => segment.delta_entries = read_delta_entries(bytes)?,
                t if t == items::INDEX_ENTRY_ARRAY.tag => segment.index_entries = read_index_entries(bytes)?,
                other => debug!(tag = other, "ignoring index table segment item"),
            }
        }

        Ok(segment)
    }

    fn value(&self) -> Result<Vec<u8>> {
        let mut value = Vec::new();
        klv::write_local_item(&mut value, items::INSTANCE_UID.tag, self.instance_uid.as_bytes())?;
        klv::write_local_item(
            &mut value,
            items::INDEX_EDIT_RATE.tag,
            &self.index_edit_rate.to_item_bytes(),
        )?;
        klv::write_local_item(
            &mut value,
            items::INDEX_START_POSITION.tag,
            &self.index_start_position.to_be_bytes(),
        )?;
        klv::write_local_item(&mut value, items::INDEX_DURATION.tag, &self.index_duration.to_be_bytes())?;
        klv::write_local_item(
            &mut value,
            items::EDIT_UNIT_BYTE_COUNT.tag,
            &self.edit_unit_byte_count.to_be_bytes(),
        )?;
        klv::write_local_item(&mut value, items::INDEX_SID.tag, &self.index_sid.to_be_bytes())?;
        klv::write_local_item(&mut value, items::BODY_SID.tag, &self.body_sid.to_be_bytes())?;
        klv::write_local_item(&mut value, items::SLICE_COUNT.tag, &[self.slice_count])?;
        klv::write_local_item(&mut value, items::POS_TABLE_COUNT.tag, &[self.pos_table_count])?;

        if !self.delta_entries.is_empty() {
            let mut array = Vec::with_capacity(8 + self.delta_entries.len() * DELTA_ENTRY_SIZE as usize);
            klv::write_array_header(
                &mut array,
                ArrayHeader::new(self.delta_entries.len() as u32, DELTA_ENTRY_SIZE),
            )?;
            for entry in &self.delta_entries {
                array.write_i8(entry.pos_table_index)?;
                array.write_u8(entry.slice)?;
                array.write_u32::<BigEndian>(entry.element_delta)?;
            }
            klv::write_local_item(&mut value, items::DELTA_ENTRY_ARRAY.tag, &array)?;
        }

        if !self.index_entries.is_empty() {
            let mut array =
                Vec::with_capacity(8 + self.index_entries.len() * INDEX_ENTRY_BASE_SIZE as usize);
            klv::write_array_header(
                &mut array,
                ArrayHeader::new(self.index_entries.len() as u32, INDEX_ENTRY_BASE_SIZE),
            )?;
            for entry in &self.index_entries {
                array.write_i8(entry.temporal_offset)?;
                array.write_i8(entry.key_frame_offset)?;
                array.write_u8(entry.flags)?;
                array.write_u64::<BigEndian>(entry.stream_offset)?;
            }
            klv::write_local_item(&mut value, items::INDEX_ENTRY_ARRAY.tag, &array)?;
        }

        Ok(value)
    }

    /// Size of the segment KLV as written by [`write`](Self::write)
    pub fn encoded_len(&self) -> Result<u64> {
        Ok(16 + DEFAULT_LLEN as u64 + self.value()?.len() as u64)
    }

    /// Write the segment KLV, returning its size
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let value = self.value()?;
        klv::write_fixed_kl(writer, &labels::INDEX_TABLE_SEGMENT, DEFAULT_LLEN, value.len() as u64)?;
        writer.write_all(&value)?;
        Ok(16 + DEFAULT_LLEN as u64 + value.len() as u64)
    }
}

fn entry_array_header(bytes: &[u8], min_element_len: u32) -> Result<(ArrayHeader, &[u8])> {
    let mut cursor = bytes;
    let header = klv::read_array_header(&mut cursor)?;
    if header.count > 0 && header.element_len < min_element_len {
        return Err(MxfError::invalid_item(
            Key::default(),
            format!("index array element of {} bytes", header.element_len),
        ));
    }
    if header.total_size() > bytes.len() as u64 {
        return Err(MxfError::Truncated {
            needed: header.total_size(),
            available: bytes.len() as u64,
        });
    }
    Ok((header, cursor))
}

fn read_delta_entries(bytes: &[u8]) -> Result<Vec<DeltaEntry>> {
    let (header, data) = entry_array_header(bytes, DELTA_ENTRY_SIZE)?;
    let mut entries = Vec::with_capacity(header.count as usize);
    for chunk in data.chunks_exact(header.element_len.max(1) as usize).take(header.count as usize) {
        let mut cursor = chunk;
        entries.push(DeltaEntry {
            pos_table_index: cursor.read_i8()?,
            slice: cursor.read_u8()?,
            element_delta: cursor.read_u32::<BigEndian>()?,
        });
    }
    Ok(entries)
}

fn read_index_entries(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let (header, data) = entry_array_header(bytes, INDEX_ENTRY_BASE_SIZE)?;
    let mut entries = Vec::with_capacity(header.count as usize);
    for chunk in data.chunks_exact(header.element_len.max(1) as usize).take(header.count as usize) {
        let mut cursor = chunk;
        entries.push(IndexEntry {
            temporal_offset: cursor.read_i8()?,
            key_frame_offset: cursor.read_i8()?,
            flags: cursor.read_u8()?,
            stream_offset: cursor.read_u64::<BigEndian>()?,
        });
    }
    Ok(entries)
}

/// Position of a [`FileIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No frame selected yet
    Unpositioned,
    /// Next read returns this frame
    AtFrame(i64),
    /// Ran past the last frame
    EndOfEssence,
}

#[derive(Debug, Clone)]
enum Layout {
    Constant { edit_unit_byte_count: u64 },
    Table { stream_offsets: Vec<u64> },
}

/// Part of the essence stream carried by one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BodyChunk {
    body_offset: u64,
    file_offset: u64,
    end: Option<u64>,
}

/// Frame index of one essence stream
#[derive(Debug, Clone)]
pub struct FileIndex {
    index_sid: u32,
    body_sid: u32,
    edit_rate: Rational,
    layout: Layout,
    chunks: Vec<BodyChunk>,
    duration: i64,
    indexed_duration: Option<i64>,
    state: IndexState,
}

impl FileIndex {
    /// Build the index of `body_sid` from the segments of `index_sid`.
    ///
    /// `partitions` must be in file order.
    pub fn create<R: Read + Seek>(
        reader: &mut R,
        partitions: &[Partition],
        index_sid: u32,
        body_sid: u32,
    ) -> Result<Self> {
        let mut segments = Vec::new();
        let mut chunks = Vec::new();

        for (i, partition) in partitions.iter().enumerate() {
            let metadata_start = partition.pack_end();
            if index_sid != 0 && partition.index_sid == index_sid && partition.index_byte_count > 0 {
                let index_start = metadata_start + partition.header_byte_count;
                segments.extend(read_index_segments(reader, index_start, partition.index_byte_count)?);
            }

            if partition.body_sid == body_sid {
                reader.seek(SeekFrom::Start(
                    metadata_start + partition.header_byte_count + partition.index_byte_count,
                ))?;
                let file_offset = skip_fill(reader)?;
                let end = partitions.get(i + 1).map(|next| next.this_partition);
                chunks.push(BodyChunk {
                    body_offset: partition.body_offset,
                    file_offset,
                    end,
                });
            }
        }

        if chunks.is_empty() {
            return Err(MxfError::missing_set(format!("partition with body SID {}", body_sid)));
        }
        let segments: Vec<_> = segments
            .into_iter()
            .filter(|s: &IndexTableSegment| s.body_sid == body_sid || s.body_sid == 0)
            .collect();
        if segments.is_empty() {
            return Err(MxfError::missing_set(format!("index table segment for index SID {}", index_sid)));
        }

        let edit_rate = segments[0].index_edit_rate;
        let mut index = if let Some(cbe) = segments.iter().find(|s| s.is_constant()) {
            let indexed = segments
                .iter()
                .filter(|s| s.is_constant())
                .map(|s| s.index_start_position + s.index_duration)
                .max()
                .filter(|&end| end > 0);
            FileIndex {
                index_sid,
                body_sid,
                edit_rate,
                layout: Layout::Constant {
                    edit_unit_byte_count: cbe.edit_unit_byte_count as u64,
                },
                chunks,
                duration: 0,
                indexed_duration: indexed,
                state: IndexState::Unpositioned,
            }
        } else {
            let stream_offsets = collect_stream_offsets(&segments);
            let duration = stream_offsets.len() as i64;
            FileIndex {
                index_sid,
                body_sid,
                edit_rate,
                layout: Layout::Table { stream_offsets },
                chunks,
                duration,
                indexed_duration: Some(duration),
                state: IndexState::Unpositioned,
            }
        };

        index.refresh(reader)?;
        debug!(
            index_sid,
            body_sid,
            duration = index.duration,
            essence_start = index.essence_start(),
            "created file index"
        );
        Ok(index)
    }

    /// Recount the frames available, for files that are still growing.
    pub fn refresh<R: Seek>(&mut self, reader: &mut R) -> Result<()> {
        if let Layout::Constant {
            edit_unit_byte_count,
        } = self.layout
        {
            let available = self.available_stream_len(reader)? / edit_unit_byte_count;
            self.duration = match self.indexed_duration {
                Some(indexed) => indexed.min(available as i64),
                None => available as i64,
            };
        }
        Ok(())
    }

    fn available_stream_len<R: Seek>(&self, reader: &mut R) -> Result<u64> {
        let resume = reader.stream_position()?;
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(resume))?;

        let mut len = 0;
        for chunk in &self.chunks {
            let end = chunk.end.map_or(size, |end| end.min(size));
            if end <= chunk.file_offset {
                break;
            }
            len = chunk.body_offset + (end - chunk.file_offset);
            if chunk.end.map_or(true, |e| e > size) {
                break;
            }
        }
        Ok(len)
    }

    fn stream_offset(&self, frame: i64) -> Option<u64> {
        match &self.layout {
            Layout::Constant {
                edit_unit_byte_count,
            } => Some(frame as u64 * edit_unit_byte_count),
            Layout::Table { stream_offsets } => stream_offsets.get(frame as usize).copied(),
        }
    }

    fn file_offset(&self, stream_offset: u64) -> Option<u64> {
        self.chunks
            .iter()
            .rev()
            .find(|chunk| chunk.body_offset <= stream_offset)
            .map(|chunk| chunk.file_offset + (stream_offset - chunk.body_offset))
    }

    /// File offset of a frame's content package
    pub fn frame_offset(&self, frame: i64) -> Option<u64> {
        if frame < 0 {
            return None;
        }
        self.stream_offset(frame).and_then(|offset| self.file_offset(offset))
    }

    /// File offset just past a frame's content package, where known
    pub fn frame_end(&self, frame: i64) -> Option<u64> {
        if frame < 0 || frame >= self.duration {
            return None;
        }
        match &self.layout {
            Layout::Constant {
                edit_unit_byte_count,
            } => self.frame_offset(frame).map(|offset| offset + edit_unit_byte_count),
            Layout::Table { .. } => {
                if frame + 1 < self.duration {
                    self.frame_offset(frame + 1)
                } else {
                    self.chunks.last().and_then(|chunk| chunk.end)
                }
            }
        }
    }

    /// Seek to the start of `frame`'s content package
    pub fn set_position<S: Seek>(&mut self, stream: &mut S, frame: i64) -> Result<()> {
        if frame < 0 || frame >= self.duration {
            return Err(MxfError::PositionOutOfRange {
                position: frame,
                available: self.duration,
            });
        }
        let offset = self.frame_offset(frame).ok_or(MxfError::PositionOutOfRange {
            position: frame,
            available: self.duration,
        })?;

        stream.seek(SeekFrom::Start(offset))?;
        self.state = IndexState::AtFrame(frame);
        Ok(())
    }

    /// Move past the current frame after it was read or skipped
    pub fn advance(&mut self) -> Result<()> {
        self.state = match self.state {
            IndexState::Unpositioned => return Err(MxfError::invalid_state("index is not positioned")),
            IndexState::EndOfEssence => return Err(MxfError::EndOfEssence),
            IndexState::AtFrame(frame) if frame + 1 < self.duration => IndexState::AtFrame(frame + 1),
            IndexState::AtFrame(_) => IndexState::EndOfEssence,
        };
        Ok(())
    }

    /// Highest frame whose content package is completely in the file.
    ///
    /// `duration_hint` (negative when unknown) caps the result; it is not
    /// trusted to be current.
    pub fn last_written_frame_number<R: Read + Seek>(
        &self,
        reader: &mut R,
        duration_hint: i64,
    ) -> Result<Option<i64>> {
        let last = match &self.layout {
            Layout::Constant {
                edit_unit_byte_count,
            } => (self.available_stream_len(reader)? / edit_unit_byte_count) as i64 - 1,
            Layout::Table { stream_offsets } => {
                let resume = reader.stream_position()?;
                let size = reader.seek(SeekFrom::End(0))?;
                reader.seek(SeekFrom::Start(resume))?;

                let mut last = -1;
                for frame in 0..stream_offsets.len() as i64 {
                    let complete = match (self.frame_end(frame), self.frame_offset(frame)) {
                        (Some(end), _) => end <= size,
                        (None, Some(start)) if start < size => {
                            let end = complete_package_end(reader, start, size);
                            reader.seek(SeekFrom::Start(resume))?;
                            end?.is_some()
                        }
                        _ => false,
                    };
                    if !complete {
                        break;
                    }
                    last = frame;
                }
                last
            }
        };

        let last = if duration_hint >= 0 {
            last.min(duration_hint - 1)
        } else {
            last
        };
        Ok((last >= 0).then_some(last))
    }

    /// Current state
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Frame the next read returns
    pub fn frame_number(&self) -> Option<i64> {
        match self.state {
            IndexState::AtFrame(frame) => Some(frame),
            _ => None,
        }
    }

    /// Number of frames available
    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Edit rate of the index
    pub fn edit_rate(&self) -> Rational {
        self.edit_rate
    }

    /// Bytes per edit unit for constant size essence
    pub fn edit_unit_byte_count(&self) -> Option<u64> {
        match self.layout {
            Layout::Constant {
                edit_unit_byte_count,
            } => Some(edit_unit_byte_count),
            Layout::Table { .. } => None,
        }
    }

    /// File offset of the first essence byte
    pub fn essence_start(&self) -> u64 {
        self.chunks.first().map_or(0, |chunk| chunk.file_offset)
    }

    pub fn index_sid(&self) -> u32 {
        self.index_sid
    }

    pub fn body_sid(&self) -> u32 {
        self.body_sid
    }
}

fn read_index_segments<R: Read + Seek>(reader: &mut R, start: u64, byte_count: u64) -> Result<Vec<IndexTableSegment>> {
    let end = start + byte_count;
    let mut segments = Vec::new();

    reader.seek(SeekFrom::Start(start))?;
    while reader.stream_position()? < end {
        let header = klv::read_kl(reader)?;
        if header.key.equals_ignoring_version(&labels::INDEX_TABLE_SEGMENT) {
            let value = klv::read_value(reader, header.len)?;
            segments.push(IndexTableSegment::read(&value)?);
        } else {
            klv::skip(reader, header.len)?;
        }
    }
    Ok(segments)
}

/// Seek past fill items, returning the offset of the next KLV.
fn skip_fill<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    loop {
        let position = reader.stream_position()?;
        match klv::read_kl(reader) {
            Ok(header) if header.key.is_fill_item() => klv::skip(reader, header.len)?,
            Ok(_) | Err(MxfError::Truncated { .. }) => {
                reader.seek(SeekFrom::Start(position))?;
                return Ok(position);
            }
            Err(e) => return Err(e),
        }
    }
}

fn collect_stream_offsets(segments: &[IndexTableSegment]) -> Vec<u64> {
    let mut ordered: Vec<_> = segments.iter().filter(|s| !s.index_entries.is_empty()).collect();
    ordered.sort_by_key(|s| s.index_start_position);

    let mut offsets = Vec::new();
    for segment in ordered {
        if segment.index_start_position != offsets.len() as i64 {
            warn!(
                expected = offsets.len(),
                found = segment.index_start_position,
                "index table segments are not contiguous"
            );
            break;
        }
        offsets.extend(segment.index_entries.iter().map(|entry| entry.stream_offset));
    }
    offsets
}

/// End of the content package starting at `start` when all of its KLVs lie
/// within `size` bytes, `None` when the last one is cut short.
fn complete_package_end<R: Read + Seek>(reader: &mut R, start: u64, size: u64) -> Result<Option<u64>> {
    reader.seek(SeekFrom::Start(start))?;
    let mut position = start;
    while position < size {
        let kl = match klv::read_kl(reader) {
            Ok(kl) => kl,
            Err(MxfError::Truncated { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if kl.key.is_partition_pack() || (position > start && kl.key.is_system_item()) {
            break;
        }
        let end = position.saturating_add(kl.total_size());
        if end > size {
            return Ok(None);
        }
        klv::skip(reader, kl.len)?;
        position = end;
    }
    Ok((position > start).then_some(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{read_partition_at, PartitionStatus};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_segment_write_read() {
        let mut segment = IndexTableSegment::constant(Rational::fps_25(), 1000, 2, 1);
        segment.index_duration = 10;
        segment.add_delta_entry(0);
        segment.add_delta_entry(48);

        let mut buffer = Vec::new();
        let size = segment.write(&mut buffer).unwrap();
        assert_eq!(size, buffer.len() as u64);
        assert_eq!(size, segment.encoded_len().unwrap());

        let mut cursor = Cursor::new(buffer);
        let header = klv::read_expected_kl(&mut cursor, &labels::INDEX_TABLE_SEGMENT).unwrap();
        let value = klv::read_value(&mut cursor, header.len).unwrap();
        assert_eq!(IndexTableSegment::read(&value).unwrap(), segment);
    }

    #[test]
    fn test_segment_trusts_array_header() {
        let mut segment = IndexTableSegment::default();
        segment.index_entries = (0..4)
            .map(|i| IndexEntry {
                stream_offset: i * 100,
                ..Default::default()
            })
            .collect();
        let mut value = segment.value().unwrap();

        // zero the local length of the index entry array
        let tag = items::INDEX_ENTRY_ARRAY.tag.to_be_bytes();
        let at = value.windows(2).rposition(|w| w == tag).unwrap();
        value[at + 2] = 0;
        value[at + 3] = 0;

        let read = IndexTableSegment::read(&value).unwrap();
        assert_eq!(read.index_entries.len(), 4);
        assert_eq!(read.index_entries[3].stream_offset, 300);
    }

    const EUBC: u64 = 100;

    fn cbe_file(frames: u64, indexed_duration: i64) -> (Cursor<Vec<u8>>, Vec<Partition>) {
        let mut cursor = Cursor::new(Vec::new());
        let mut header = Partition::header();
        header.status = PartitionStatus::Closed;
        header.index_sid = 2;
        header.body_sid = 1;
        header.write(&mut cursor).unwrap();

        let mut segment = IndexTableSegment::constant(Rational::fps_25(), EUBC as u32, 2, 1);
        segment.index_duration = indexed_duration;
        let index_start = cursor.position();
        segment.write(&mut cursor).unwrap();
        klv::write_fill(&mut cursor, 40).unwrap();
        header.index_byte_count = cursor.position() - index_start;

        for frame in 0..frames {
            klv::write_fixed_kl(&mut cursor, &labels::SYSTEM_ITEM_SS1, 4, EUBC - 20).unwrap();
            cursor.write_all(&vec![frame as u8; (EUBC - 20) as usize]).unwrap();
        }
        header.rewrite_at(&mut cursor).unwrap();

        let partitions = vec![read_partition_at(&mut cursor, 0).unwrap()];
        (cursor, partitions)
    }

    #[test]
    fn test_constant_index_positions() {
        let (mut cursor, partitions) = cbe_file(5, 5);
        let mut index = FileIndex::create(&mut cursor, &partitions, 2, 1).unwrap();
        assert_eq!(index.duration(), 5);
        assert_eq!(index.state(), IndexState::Unpositioned);
        assert_eq!(index.edit_unit_byte_count(), Some(EUBC));

        index.set_position(&mut cursor, 3).unwrap();
        assert_eq!(cursor.position(), index.essence_start() + 3 * EUBC);
        assert_eq!(index.frame_number(), Some(3));

        index.advance().unwrap();
        assert_eq!(index.state(), IndexState::AtFrame(4));
        index.advance().unwrap();
        assert_eq!(index.state(), IndexState::EndOfEssence);
        assert!(matches!(index.advance(), Err(MxfError::EndOfEssence)));

        assert!(matches!(
            index.set_position(&mut cursor, 5),
            Err(MxfError::PositionOutOfRange {
                position: 5,
                available: 5
            })
        ));
    }

    #[test]
    fn test_growing_file_duration() {
        let (mut cursor, partitions) = cbe_file(6, 0);
        let len = cursor.get_ref().len();
        cursor.get_mut().truncate(len - 30);

        let index = FileIndex::create(&mut cursor, &partitions, 2, 1).unwrap();
        assert_eq!(index.duration(), 5);
        assert_eq!(index.last_written_frame_number(&mut cursor, -1).unwrap(), Some(4));
        assert_eq!(index.last_written_frame_number(&mut cursor, 3).unwrap(), Some(2));
    }

    #[test]
    fn test_advance_requires_position() {
        let (mut cursor, partitions) = cbe_file(2, 2);
        let mut index = FileIndex::create(&mut cursor, &partitions, 2, 1).unwrap();
        assert!(matches!(index.advance(), Err(MxfError::InvalidState(_))));
    }

    #[test]
    fn test_table_index() {
        let mut segment = IndexTableSegment::default();
        segment.index_sid = 2;
        segment.body_sid = 1;
        segment.index_entries = [0u64, 30, 90]
            .iter()
            .map(|&stream_offset| IndexEntry {
                stream_offset,
                ..Default::default()
            })
            .collect();
        segment.index_duration = 3;

        let chunks = vec![BodyChunk {
            body_offset: 0,
            file_offset: 1000,
            end: Some(1150),
        }];
        let index = FileIndex {
            index_sid: 2,
            body_sid: 1,
            edit_rate: Rational::fps_25(),
            layout: Layout::Table {
                stream_offsets: collect_stream_offsets(&[segment]),
            },
            chunks,
            duration: 3,
            indexed_duration: Some(3),
            state: IndexState::Unpositioned,
        };

        assert_eq!(index.frame_offset(1), Some(1030));
        assert_eq!(index.frame_end(1), Some(1090));
        assert_eq!(index.frame_end(2), Some(1150));
        assert_eq!(index.frame_offset(3), None);

        let mut cursor = Cursor::new(vec![0u8; 1100]);
        assert_eq!(index.last_written_frame_number(&mut cursor, -1).unwrap(), Some(1));
    }

    #[test]
    fn test_table_index_partial_last_frame() {
        let mut segment = IndexTableSegment::default();
        segment.index_sid = 2;
        segment.body_sid = 1;
        segment.index_entries = [0u64, 30, 90]
            .iter()
            .map(|&stream_offset| IndexEntry {
                stream_offset,
                ..Default::default()
            })
            .collect();
        segment.index_duration = 3;

        let index = FileIndex {
            index_sid: 2,
            body_sid: 1,
            edit_rate: Rational::fps_25(),
            layout: Layout::Table {
                stream_offsets: collect_stream_offsets(&[segment]),
            },
            chunks: vec![BodyChunk {
                body_offset: 0,
                file_offset: 1000,
                end: None,
            }],
            duration: 3,
            indexed_duration: Some(3),
            state: IndexState::Unpositioned,
        };

        let mut data = vec![0u8; 1000];
        for value_len in [10u64, 40, 40] {
            klv::write_fixed_kl(&mut data, &labels::SYSTEM_ITEM_SS1, 4, value_len).unwrap();
            data.extend(std::iter::repeat(0xAA).take(value_len as usize));
        }
        assert_eq!(data.len(), 1150);

        let mut cursor = Cursor::new(data.clone());
        assert_eq!(index.last_written_frame_number(&mut cursor, -1).unwrap(), Some(2));

        data.truncate(1095);
        let mut cursor = Cursor::new(data);
        cursor.set_position(7);
        assert_eq!(index.last_written_frame_number(&mut cursor, -1).unwrap(), Some(1));
        assert_eq!(cursor.position(), 7);
    }
}
