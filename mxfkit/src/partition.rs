//! Partition packs and the random index pack.
//!
//! A file is a header partition, optional body partitions and a footer
//! partition. Each pack records the offset of the one before it, so the
//! full list can be rebuilt by walking back from the footer; the random
//! index pack at the very end points at every partition directly.

use crate::error::{MxfError, Result};
use crate::klv::{self, ArrayHeader, DEFAULT_LLEN};
use crate::ul::{is_generic_container_label, labels, Key};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

/// Size of the fixed part of a partition pack value
pub const PARTITION_FIXED_SIZE: u64 = 80;

/// Position of a partition in the file, from byte 14 of the pack key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Header,
    Body,
    Footer,
}

/// Whether the header metadata in the partition is final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Open,
    Closed,
}

/// Whether the header metadata in the partition has every required item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionCompleteness {
    Incomplete,
    Complete,
}

/// A partition pack.
///
/// Offsets are relative to the start of the header partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub kind: PartitionKind,
    pub status: PartitionStatus,
    pub completeness: PartitionCompleteness,
    pub major_version: u16,
    pub minor_version: u16,
    /// Key alignment grid
    pub kag_size: u32,
    pub this_partition: u64,
    /// 0 for the header partition
    pub previous_partition: u64,
    /// 0 while the footer position is unknown
    pub footer_partition: u64,
    /// Header metadata bytes following the partition pack
    pub header_byte_count: u64,
    /// Index table bytes following the header metadata
    pub index_byte_count: u64,
    /// Index stream in this partition, 0 for none
    pub index_sid: u32,
    /// Body offset of the first essence byte in this partition
    pub body_offset: u64,
    /// Essence stream in this partition, 0 for none
    pub body_sid: u32,
    pub operational_pattern: Key,
    /// Essence container labels of the whole file
    pub essence_containers: Vec<Key>,
    read_size: Option<u64>,
}

impl Default for Partition {
    fn default() -> Self {
        Partition {
            kind: PartitionKind::Header,
            status: PartitionStatus::Open,
            completeness: PartitionCompleteness::Incomplete,
            major_version: 1,
            minor_version: 2,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: labels::OP_1A_QQ09,
            essence_containers: Vec::new(),
            read_size: None,
        }
    }
}

impl Partition {
    /// An open, incomplete header partition
    pub fn header() -> Self {
        Partition {
            kind: PartitionKind::Header,
            ..Default::default()
        }
    }

    pub fn body() -> Self {
        Partition {
            kind: PartitionKind::Body,
            ..Default::default()
        }
    }

    /// A closed, incomplete footer partition
    pub fn footer() -> Self {
        Partition {
            kind: PartitionKind::Footer,
            status: PartitionStatus::Closed,
            ..Default::default()
        }
    }

    /// Get the partition pack key based on kind, status and completeness
    pub fn pack_key(&self) -> Key {
        use PartitionCompleteness::*;
        use PartitionKind::*;
        use PartitionStatus::*;

        match (self.kind, self.status, self.completeness) {
            (Header, Open, Incomplete) => labels::HEADER_PARTITION_OPEN_INCOMPLETE,
            (Header, Closed, Incomplete) => labels::HEADER_PARTITION_CLOSED_INCOMPLETE,
            (Header, Open, Complete) => labels::HEADER_PARTITION_OPEN_COMPLETE,
            (Header, Closed, Complete) => labels::HEADER_PARTITION_CLOSED_COMPLETE,
            (Body, Open, Incomplete) => labels::BODY_PARTITION_OPEN_INCOMPLETE,
            (Body, Closed, Incomplete) => labels::BODY_PARTITION_CLOSED_INCOMPLETE,
            (Body, Open, Complete) => labels::BODY_PARTITION_OPEN_COMPLETE,
            (Body, Closed, Complete) => labels::BODY_PARTITION_CLOSED_COMPLETE,
            (Footer, _, Incomplete) => labels::FOOTER_PARTITION_CLOSED_INCOMPLETE,
            (Footer, _, Complete) => labels::FOOTER_PARTITION_CLOSED_COMPLETE,
        }
    }

    /// True for a closed and complete partition
    pub fn is_closed_complete(&self) -> bool {
        self.status == PartitionStatus::Closed && self.completeness == PartitionCompleteness::Complete
    }

    /// True when the partition lists a Generic Container essence container
    pub fn has_generic_container_essence(&self) -> bool {
        self.essence_containers.iter().any(is_generic_container_label)
    }

    /// Parse a partition pack value; `key` is the pack key
    pub fn read(key: &Key, value: &[u8]) -> Result<Self> {
        if !key.is_partition_pack() {
            return Err(MxfError::invalid_partition(format!("{} is not a partition pack key", key)));
        }
        if (value.len() as u64) < PARTITION_FIXED_SIZE + ArrayHeader::SIZE as u64 {
            return Err(MxfError::Truncated {
                needed: PARTITION_FIXED_SIZE + ArrayHeader::SIZE as u64,
                available: value.len() as u64,
            });
        }

        let kind = match key.0[13] {
            0x02 => PartitionKind::Header,
            0x03 => PartitionKind::Body,
            _ => PartitionKind::Footer,
        };
        let (status, completeness) = match key.0[14] {
            0x01 => (PartitionStatus::Open, PartitionCompleteness::Incomplete),
            0x02 => (PartitionStatus::Closed, PartitionCompleteness::Incomplete),
            0x03 => (PartitionStatus::Open, PartitionCompleteness::Complete),
            0x04 => (PartitionStatus::Closed, PartitionCompleteness::Complete),
            other => {
                return Err(MxfError::invalid_partition(format!(
                    "unknown partition status {:02x}",
                    other
                )))
            }
        };

        let mut cursor = value;
        let major_version = cursor.read_u16::<BigEndian>()?;
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let kag_size = cursor.read_u32::<BigEndian>()?;
        let this_partition = cursor.read_u64::<BigEndian>()?;
        let previous_partition = cursor.read_u64::<BigEndian>()?;
        let footer_partition = cursor.read_u64::<BigEndian>()?;
        let header_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_sid = cursor.read_u32::<BigEndian>()?;
        let body_offset = cursor.read_u64::<BigEndian>()?;
        let body_sid = cursor.read_u32::<BigEndian>()?;
        let operational_pattern = klv::read_key(&mut cursor)?;

        let batch = klv::read_array_header(&mut cursor)?;
        let mut essence_containers = Vec::new();
        if batch.element_len == 16 {
            for _ in 0..batch.count {
                essence_containers.push(klv::read_key(&mut cursor)?);
            }
        } else if batch.count > 0 {
            debug!(element_len = batch.element_len, "ignoring essence container batch");
        }

        Ok(Partition {
            kind,
            status,
            completeness,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
            read_size: None,
        })
    }

    fn value_len(&self) -> u64 {
        PARTITION_FIXED_SIZE + ArrayHeader::SIZE as u64 + 16 * self.essence_containers.len() as u64
    }

    /// Size of the pack as written by [`write`](Self::write)
    pub fn encoded_len(&self) -> u64 {
        16 + DEFAULT_LLEN as u64 + self.value_len()
    }

    /// Size of the pack in the file: as read, or as it would be written
    pub fn pack_size(&self) -> u64 {
        self.read_size.unwrap_or_else(|| self.encoded_len())
    }

    /// File offset just after the partition pack
    pub fn pack_end(&self) -> u64 {
        self.this_partition + self.pack_size()
    }

    /// Write partition pack
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        klv::write_fixed_kl(writer, &self.pack_key(), DEFAULT_LLEN, self.value_len())?;

        writer.write_u16::<BigEndian>(self.major_version)?;
        writer.write_u16::<BigEndian>(self.minor_version)?;
        writer.write_u32::<BigEndian>(self.kag_size)?;
        writer.write_u64::<BigEndian>(self.this_partition)?;
        writer.write_u64::<BigEndian>(self.previous_partition)?;
        writer.write_u64::<BigEndian>(self.footer_partition)?;
        writer.write_u64::<BigEndian>(self.header_byte_count)?;
        writer.write_u64::<BigEndian>(self.index_byte_count)?;
        writer.write_u32::<BigEndian>(self.index_sid)?;
        writer.write_u64::<BigEndian>(self.body_offset)?;
        writer.write_u32::<BigEndian>(self.body_sid)?;
        klv::write_key(writer, &self.operational_pattern)?;

        klv::write_array_header(
            writer,
            ArrayHeader::new(self.essence_containers.len() as u32, 16),
        )?;
        for ec in &self.essence_containers {
            klv::write_key(writer, ec)?;
        }

        Ok(self.encoded_len())
    }

    /// Overwrite the pack at `this_partition` and return to the current
    /// position. The essence container count must not have changed since
    /// the pack was first written.
    pub fn rewrite_at<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let resume = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.this_partition))?;
        self.write(writer)?;
        writer.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    /// Add essence container
    pub fn add_essence_container(&mut self, ul: Key) {
        if !self.essence_containers.contains(&ul) {
            self.essence_containers.push(ul);
        }
    }
}

/// Read the partition pack at the current position.
pub fn read_partition<R: Read + Seek>(reader: &mut R) -> Result<Partition> {
    let offset = reader.stream_position()?;
    let header = klv::read_kl(reader)?;
    if !header.key.is_partition_pack() {
        return Err(MxfError::invalid_partition(format!(
            "expected partition pack at offset {}, found {}",
            offset, header.key
        )));
    }

    let value = klv::read_value(reader, header.len)?;
    let mut partition = Partition::read(&header.key, &value)?;
    if partition.this_partition != offset {
        warn!(
            offset,
            this_partition = partition.this_partition,
            "partition pack offset does not match its position"
        );
    }
    partition.read_size = Some(header.total_size());
    Ok(partition)
}

/// Read the partition pack at `offset`.
pub fn read_partition_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Partition> {
    reader.seek(SeekFrom::Start(offset))?;
    read_partition(reader)
}

/// Read the partition preceding `partition`, or `None` for the first one.
pub fn next_partition_by_prev_offset<R: Read + Seek>(
    reader: &mut R,
    partition: &Partition,
) -> Result<Option<Partition>> {
    if partition.this_partition == 0 {
        return Ok(None);
    }
    if partition.previous_partition >= partition.this_partition {
        return Err(MxfError::invalid_partition(format!(
            "previous partition offset {} is not before {}",
            partition.previous_partition, partition.this_partition
        )));
    }
    let previous = read_partition_at(reader, partition.previous_partition)?;
    if previous.this_partition != partition.previous_partition {
        return Err(MxfError::invalid_partition(format!(
            "partition at {} records its offset as {}",
            partition.previous_partition, previous.this_partition
        )));
    }
    Ok(Some(previous))
}

/// Walk back from the footer, returning every partition in file order.
pub fn read_partition_chain<R: Read + Seek>(reader: &mut R, footer_offset: u64) -> Result<Vec<Partition>> {
    let footer = read_partition_at(reader, footer_offset)?;
    if footer.kind != PartitionKind::Footer {
        return Err(MxfError::invalid_partition(format!(
            "partition at {} is not a footer",
            footer_offset
        )));
    }
    if footer.this_partition != footer_offset {
        return Err(MxfError::invalid_partition(format!(
            "footer at {} records its offset as {}",
            footer_offset, footer.this_partition
        )));
    }

    let mut chain = vec![footer];
    while let Some(previous) = next_partition_by_prev_offset(reader, &chain[chain.len() - 1])? {
        chain.push(previous);
    }
    chain.reverse();

    debug!(partitions = chain.len(), "read partition chain");
    Ok(chain)
}

/// Partition listed in the random index pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    /// Essence stream of the partition, 0 for none
    pub body_sid: u32,
    pub byte_offset: u64,
}

/// Random index pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomIndexPack {
    pub entries: Vec<RipEntry>,
}

impl RandomIndexPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, body_sid: u32, byte_offset: u64) {
        self.entries.push(RipEntry {
            body_sid,
            byte_offset,
        });
    }

    /// Read the RIP at the end of the stream, or `None` if there is none.
    pub fn read_from_end<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 16 + 1 + 4 {
            return Ok(None);
        }

        reader.seek(SeekFrom::End(-4))?;
        let overall_length = reader.read_u32::<BigEndian>()? as u64;
        if overall_length < 16 + 1 + 4 || overall_length > size {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(size - overall_length))?;
        let header = klv::read_kl(reader)?;
        if !header.key.equals_ignoring_version(&labels::RANDOM_INDEX_PACK)
            || header.total_size() != overall_length
            || header.len < 4
        {
            return Ok(None);
        }

        let count = (header.len - 4) / 12;
        let mut rip = RandomIndexPack::new();
        for _ in 0..count {
            let body_sid = reader.read_u32::<BigEndian>()?;
            let byte_offset = reader.read_u64::<BigEndian>()?;
            rip.add_entry(body_sid, byte_offset);
        }
        Ok(Some(rip))
    }

    /// Write the pack, ending with its overall length
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let value_size = self.entries.len() as u64 * 12 + 4;
        let llen = klv::write_kl(writer, &labels::RANDOM_INDEX_PACK, value_size)?;

        for entry in &self.entries {
            writer.write_u32::<BigEndian>(entry.body_sid)?;
            writer.write_u64::<BigEndian>(entry.byte_offset)?;
        }

        let overall_length = 16 + llen as u64 + value_size;
        writer.write_u32::<BigEndian>(overall_length as u32)?;
        Ok(overall_length)
    }
}
