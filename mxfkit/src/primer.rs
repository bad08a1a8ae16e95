//! Primer pack: the local tag to key registry that precedes header metadata.

use crate::error::{MxfError, Result};
use crate::klv::{self, ArrayHeader, DEFAULT_LLEN};
use crate::ul::{labels, Key};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::debug;

/// First tag handed out for items without a static tag.
pub const FIRST_DYNAMIC_TAG: u16 = 0x8000;

/// Encoded size of one primer entry (tag + key).
pub const PRIMER_ENTRY_SIZE: u32 = 18;

/// Local tag registry.
///
/// The first registration of a key wins; later registrations of the same
/// key return the tag it already has.
#[derive(Debug, Clone)]
pub struct PrimerPack {
    entries: Vec<(u16, Key)>,
    by_tag: HashMap<u16, Key>,
    by_key: HashMap<Key, u16>,
    next_dynamic: u32,
}

impl Default for PrimerPack {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimerPack {
    /// Create an empty primer
    pub fn new() -> Self {
        PrimerPack {
            entries: Vec::new(),
            by_tag: HashMap::new(),
            by_key: HashMap::new(),
            next_dynamic: FIRST_DYNAMIC_TAG as u32,
        }
    }

    /// Register `key`, preferring `tag` when it is non-zero and free.
    ///
    /// A zero tag, or one already used by another key, allocates the next
    /// dynamic tag.
    pub fn register(&mut self, key: Key, tag: u16) -> Result<u16> {
        if let Some(&existing) = self.by_key.get(&key) {
            return Ok(existing);
        }

        let tag = if tag != 0 && !self.by_tag.contains_key(&tag) {
            tag
        } else {
            self.allocate_dynamic()?
        };
        self.insert(tag, key);
        Ok(tag)
    }

    fn allocate_dynamic(&mut self) -> Result<u16> {
        while self.next_dynamic <= u16::MAX as u32 {
            let tag = self.next_dynamic as u16;
            self.next_dynamic += 1;
            if !self.by_tag.contains_key(&tag) {
                return Ok(tag);
            }
        }
        Err(MxfError::unsupported("no dynamic local tags left"))
    }

    fn insert(&mut self, tag: u16, key: Key) {
        self.entries.push((tag, key));
        self.by_tag.insert(tag, key);
        self.by_key.insert(key, tag);
        if tag >= FIRST_DYNAMIC_TAG && tag as u32 >= self.next_dynamic {
            self.next_dynamic = tag as u32 + 1;
        }
    }

    /// Key registered for `tag`
    pub fn resolve(&self, tag: u16) -> Result<Key> {
        self.by_tag
            .get(&tag)
            .copied()
            .ok_or(MxfError::UnknownTag { tag })
    }

    /// Tag registered for `key`
    pub fn resolve_tag(&self, key: &Key) -> Option<u16> {
        self.by_key.get(key).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = (u16, &Key)> {
        self.entries.iter().map(|(tag, key)| (*tag, key))
    }

    /// Size of the primer pack KLV as written by [`write`](Self::write)
    pub fn encoded_size(&self) -> u64 {
        16 + DEFAULT_LLEN as u64 + self.value_len()
    }

    fn value_len(&self) -> u64 {
        ArrayHeader::SIZE as u64 + self.entries.len() as u64 * PRIMER_ENTRY_SIZE as u64
    }

    /// Read a primer pack value of `len` bytes (key and length already read).
    pub fn read<R: Read>(reader: &mut R, len: u64) -> Result<Self> {
        let value = klv::read_value(reader, len)?;
        let mut cursor = value.as_slice();

        let header = klv::read_array_header(&mut cursor)?;
        if header.element_len != PRIMER_ENTRY_SIZE {
            return Err(MxfError::invalid_item(
                labels::PRIMER_PACK,
                format!("primer entry length {}", header.element_len),
            ));
        }
        if header.total_size() > len {
            return Err(MxfError::Truncated {
                needed: header.total_size(),
                available: len,
            });
        }

        let mut primer = PrimerPack::new();
        for _ in 0..header.count {
            let tag = cursor.read_u16::<BigEndian>()?;
            let key = klv::read_key(&mut cursor)?;
            if primer.by_tag.contains_key(&tag) || primer.by_key.contains_key(&key) {
                debug!(tag, %key, "ignoring duplicate primer entry");
                continue;
            }
            primer.insert(tag, key);
        }

        Ok(primer)
    }

    /// Write the primer pack KLV, returning its size.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        klv::write_fixed_kl(writer, &labels::PRIMER_PACK, DEFAULT_LLEN, self.value_len())?;
        klv::write_array_header(
            writer,
            ArrayHeader::new(self.entries.len() as u32, PRIMER_ENTRY_SIZE),
        )?;
        for (tag, key) in &self.entries {
            writer.write_u16::<BigEndian>(*tag)?;
            klv::write_key(writer, key)?;
        }
        Ok(self.encoded_size())
    }
}
