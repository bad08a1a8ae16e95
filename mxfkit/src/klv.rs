//! KLV (Key-Length-Value) triplet handling
//!
//! All data in MXF files is encoded as KLV triplets:
//! - Key: 16-byte Universal Label identifying the data
//! - Length: BER-encoded length of the value
//! - Value: The actual data
//!
//! Lengths remember how many bytes they occupied on the wire (`llen`,
//! including the first octet) so that fields reserved by a writer can be
//! patched in place later.

use crate::error::{MxfError, Result};
use crate::ul::Key;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

/// Largest number of length bytes following the first BER octet.
pub const MAX_BER_BYTES: u8 = 8;

/// Length field width used for everything this crate writes.
pub const DEFAULT_LLEN: u8 = 4;

/// Smallest fill item: key plus a one byte zero length.
pub const MIN_FILL_SIZE: u64 = 17;

/// Key and length of a KLV triplet, positioned at the start of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlvHeader {
    /// Key
    pub key: Key,
    /// Encoded size of the length field
    pub llen: u8,
    /// Value length
    pub len: u64,
}

impl KlvHeader {
    /// Size of key plus length field
    pub fn kl_size(&self) -> u64 {
        16 + self.llen as u64
    }

    /// Size of the whole triplet
    pub fn total_size(&self) -> u64 {
        self.kl_size() + self.len
    }
}

/// Read exactly `buf.len()` bytes, reporting how much was available on a
/// short read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(MxfError::Truncated {
                    needed: buf.len() as u64,
                    available: filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read a 16-byte key
pub fn read_key<R: Read>(reader: &mut R) -> Result<Key> {
    let mut key = [0u8; 16];
    read_full(reader, &mut key)?;
    Ok(Key(key))
}

/// Read a BER length, returning the value and the number of bytes read.
pub fn read_length<R: Read>(reader: &mut R) -> Result<(u64, u8)> {
    let mut first = [0u8; 1];
    read_full(reader, &mut first)?;
    let first = first[0];

    if first < 0x80 {
        return Ok((first as u64, 1));
    }
    if first == 0x80 {
        return Err(MxfError::malformed_length("indefinite length form"));
    }

    let num_bytes = first & 0x7F;
    if num_bytes > MAX_BER_BYTES {
        return Err(MxfError::malformed_length(format!(
            "{} length bytes declared (max {})",
            num_bytes, MAX_BER_BYTES
        )));
    }

    let mut bytes = [0u8; 8];
    read_full(reader, &mut bytes[..num_bytes as usize])?;
    let length = bytes[..num_bytes as usize]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64);

    Ok((length, 1 + num_bytes))
}

/// Read a key and length
pub fn read_kl<R: Read>(reader: &mut R) -> Result<KlvHeader> {
    let key = read_key(reader)?;
    let (len, llen) = read_length(reader)?;
    Ok(KlvHeader { key, llen, len })
}

/// Read a key and length, expecting `expected` (registry version ignored).
pub fn read_expected_kl<R: Read>(reader: &mut R, expected: &Key) -> Result<KlvHeader> {
    let header = read_kl(reader)?;
    if !header.key.equals_ignoring_version(expected) {
        return Err(MxfError::KeyMismatch {
            expected: *expected,
            found: header.key,
        });
    }
    Ok(header)
}

/// Read the next KLV header that is not a fill item.
pub fn read_next_nonfiller_kl<R: Read + Seek>(reader: &mut R) -> Result<KlvHeader> {
    loop {
        let header = read_kl(reader)?;
        if !header.key.is_fill_item() {
            return Ok(header);
        }
        skip(reader, header.len)?;
    }
}

/// Skip `len` value bytes without reading them.
pub fn skip<S: Seek>(stream: &mut S, len: u64) -> Result<()> {
    let offset = i64::try_from(len)
        .map_err(|_| MxfError::malformed_length(format!("cannot skip {} bytes", len)))?;
    stream.seek(SeekFrom::Current(offset))?;
    Ok(())
}

/// Read a value of `len` bytes.
///
/// Memory grows with the bytes actually read, so a corrupt length cannot
/// force a huge allocation up front.
pub fn read_value<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut value = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut value)?;
    if (value.len() as u64) < len {
        return Err(MxfError::Truncated {
            needed: len,
            available: value.len() as u64,
        });
    }
    Ok(value)
}

/// Write a 16-byte key
pub fn write_key<W: Write>(writer: &mut W, key: &Key) -> Result<()> {
    writer.write_all(key.as_bytes())?;
    Ok(())
}

/// Write a length in minimal BER form, returning the bytes written.
pub fn write_length<W: Write>(writer: &mut W, len: u64) -> Result<u8> {
    let encoded = encode_ber_length(len);
    writer.write_all(&encoded)?;
    Ok(encoded.len() as u8)
}

/// Write a length using exactly `llen` bytes.
pub fn write_fixed_length<W: Write>(writer: &mut W, len: u64, llen: u8) -> Result<()> {
    writer.write_all(&encode_fixed_ber_length(len, llen)?)?;
    Ok(())
}

/// Write a key and a minimal length.
pub fn write_kl<W: Write>(writer: &mut W, key: &Key, len: u64) -> Result<u8> {
    write_key(writer, key)?;
    write_length(writer, len)
}

/// Write a key and a length of exactly `llen` bytes.
pub fn write_fixed_kl<W: Write>(writer: &mut W, key: &Key, llen: u8, len: u64) -> Result<()> {
    write_key(writer, key)?;
    write_fixed_length(writer, len, llen)
}

/// Write a fill item occupying exactly `total_size` bytes.
pub fn write_fill<W: Write>(writer: &mut W, total_size: u64) -> Result<()> {
    if total_size < MIN_FILL_SIZE {
        return Err(MxfError::malformed_length(format!(
            "fill of {} bytes is smaller than a fill item",
            total_size
        )));
    }

    let llen = (total_size - 16).min(DEFAULT_LLEN as u64) as u8;
    let len = total_size - 16 - llen as u64;
    write_fixed_kl(writer, &crate::ul::labels::FILL_ITEM, llen, len)?;

    let zeros = [0u8; 4096];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(zeros.len() as u64) as usize;
        writer.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Calculate minimal BER length encoding size
pub fn ber_length_size(length: u64) -> u8 {
    if length < 0x80 {
        1
    } else {
        let significant = 8 - (length.leading_zeros() / 8) as u8;
        1 + significant
    }
}

/// Encode length as minimal BER
pub fn encode_ber_length(length: u64) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let num_bytes = ber_length_size(length) - 1;
    let mut encoded = Vec::with_capacity(1 + num_bytes as usize);
    encoded.push(0x80 | num_bytes);
    encoded.extend_from_slice(&length.to_be_bytes()[(8 - num_bytes as usize)..]);
    encoded
}

/// Encode length as BER using exactly `llen` bytes.
pub fn encode_fixed_ber_length(length: u64, llen: u8) -> Result<Vec<u8>> {
    if llen == 1 {
        if length >= 0x80 {
            return Err(MxfError::malformed_length(format!(
                "length {} does not fit the short form",
                length
            )));
        }
        return Ok(vec![length as u8]);
    }

    if !(2..=MAX_BER_BYTES + 1).contains(&llen) {
        return Err(MxfError::malformed_length(format!(
            "length field of {} bytes",
            llen
        )));
    }
    let num_bytes = llen - 1;
    if num_bytes < 8 && length >> (8 * num_bytes as u32) != 0 {
        return Err(MxfError::malformed_length(format!(
            "length {} does not fit {} bytes",
            length, num_bytes
        )));
    }

    let mut encoded = Vec::with_capacity(llen as usize);
    encoded.push(0x80 | num_bytes);
    encoded.extend_from_slice(&length.to_be_bytes()[(8 - num_bytes as usize)..]);
    Ok(encoded)
}

/// Decode BER length from bytes
pub fn decode_ber_length(data: &[u8]) -> Result<(u64, u8)> {
    let mut cursor = data;
    read_length(&mut cursor)
}

/// Array header preceding batch and array item values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    /// Number of elements
    pub count: u32,
    /// Size of each element
    pub element_len: u32,
}

impl ArrayHeader {
    /// Encoded size of an array header
    pub const SIZE: usize = 8;

    /// Create a new header
    pub fn new(count: u32, element_len: u32) -> Self {
        ArrayHeader { count, element_len }
    }

    /// Size of header plus elements
    pub fn total_size(&self) -> u64 {
        Self::SIZE as u64 + self.count as u64 * self.element_len as u64
    }
}

/// Read an array header
pub fn read_array_header<R: Read>(reader: &mut R) -> Result<ArrayHeader> {
    let mut bytes = [0u8; ArrayHeader::SIZE];
    read_full(reader, &mut bytes)?;
    let mut cursor = &bytes[..];
    Ok(ArrayHeader {
        count: cursor.read_u32::<BigEndian>()?,
        element_len: cursor.read_u32::<BigEndian>()?,
    })
}

/// Write an array header
pub fn write_array_header<W: Write>(writer: &mut W, header: ArrayHeader) -> Result<()> {
    writer.write_u32::<BigEndian>(header.count)?;
    writer.write_u32::<BigEndian>(header.element_len)?;
    Ok(())
}

/// Write a local set item (2-byte tag, 2-byte length)
pub fn write_local_item<W: Write>(writer: &mut W, tag: u16, value: &[u8]) -> Result<u64> {
    let len = u16::try_from(value.len()).map_err(|_| {
        MxfError::malformed_length(format!(
            "local item 0x{:04x} of {} bytes exceeds 16-bit length",
            tag,
            value.len()
        ))
    })?;
    writer.write_u16::<BigEndian>(tag)?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(value)?;
    Ok(4 + value.len() as u64)
}

/// Iterator over the local items (tag, value) of a set value.
///
/// Tags listed in `array_tags` carry an array header; when their 16-bit
/// length disagrees with the header (Avid writes index arrays larger than
/// 64KiB this way) the header is trusted.
pub struct LocalItems<'a> {
    data: &'a [u8],
    position: usize,
    array_tags: &'a [u16],
}

impl<'a> LocalItems<'a> {
    /// Iterate over the items of a local set value
    pub fn new(data: &'a [u8]) -> Self {
        LocalItems {
            data,
            position: 0,
            array_tags: &[],
        }
    }

    /// Trust array headers over the local length for these tags
    pub fn with_array_tags(mut self, array_tags: &'a [u16]) -> Self {
        self.array_tags = array_tags;
        self
    }

    fn next_item(&mut self) -> Result<(u16, &'a [u8])> {
        let data: &'a [u8] = self.data;
        let remaining = &data[self.position..];
        if remaining.len() < 4 {
            return Err(MxfError::Truncated {
                needed: 4,
                available: remaining.len() as u64,
            });
        }

        let tag = u16::from_be_bytes([remaining[0], remaining[1]]);
        let mut len = u16::from_be_bytes([remaining[2], remaining[3]]) as usize;
        let body = &remaining[4..];

        if self.array_tags.contains(&tag) && body.len() >= ArrayHeader::SIZE {
            let mut header_bytes = &body[..ArrayHeader::SIZE];
            let header = read_array_header(&mut header_bytes)?;
            let array_len = header.total_size();
            if array_len != len as u64 && array_len <= body.len() as u64 {
                tracing::debug!(
                    tag,
                    local_len = len,
                    array_len,
                    "using array header length for local item"
                );
                len = array_len as usize;
            }
        }

        if len > body.len() {
            return Err(MxfError::Truncated {
                needed: len as u64,
                available: body.len() as u64,
            });
        }

        self.position += 4 + len;
        Ok((tag, &body[..len]))
    }
}

impl<'a> Iterator for LocalItems<'a> {
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.data.len() {
            return None;
        }
        let item = self.next_item();
        if item.is_err() {
            self.position = self.data.len();
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ul::labels;
    use std::io::Cursor;

    #[test]
    fn test_ber_length_short() {
        let encoded = encode_ber_length(100);
        assert_eq!(encoded, vec![100]);

        let (decoded, size) = decode_ber_length(&encoded).unwrap();
        assert_eq!(decoded, 100);
        assert_eq!(size, 1);
    }

    #[test]
    fn test_ber_length_long() {
        let encoded = encode_ber_length(1000);
        assert_eq!(encoded, vec![0x82, 0x03, 0xE8]);

        let (decoded, size) = decode_ber_length(&encoded).unwrap();
        assert_eq!(decoded, 1000);
        assert_eq!(size, 3);
    }

    #[test]
    fn test_ber_length_boundaries() {
        assert_eq!(encode_ber_length(127), vec![0x7F]);
        assert_eq!(encode_ber_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_ber_length(u32::MAX as u64), vec![0x84, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(ber_length_size(1 << 56), 9);
        assert_eq!(ber_length_size(u64::MAX), 9);
    }

    #[test]
    fn test_ber_rejects_indefinite_and_oversized() {
        assert!(matches!(
            decode_ber_length(&[0x80]),
            Err(MxfError::MalformedLength { .. })
        ));
        let mut nine = vec![0x89];
        nine.extend_from_slice(&[0; 9]);
        assert!(matches!(
            decode_ber_length(&nine),
            Err(MxfError::MalformedLength { .. })
        ));
        assert!(matches!(
            decode_ber_length(&[0x82, 0x01]),
            Err(MxfError::Truncated { .. })
        ));
    }

    #[test]
    fn test_fixed_length() {
        assert_eq!(encode_fixed_ber_length(5, 4).unwrap(), vec![0x83, 0, 0, 5]);
        assert_eq!(encode_fixed_ber_length(0x12_3456, 4).unwrap(), vec![0x83, 0x12, 0x34, 0x56]);
        assert!(encode_fixed_ber_length(0x100_0000, 4).is_err());
        assert!(encode_fixed_ber_length(200, 1).is_err());
        assert!(encode_fixed_ber_length(0, 10).is_err());
        assert_eq!(encode_fixed_ber_length(u64::MAX, 9).unwrap().len(), 9);
    }

    #[test]
    fn test_read_kl_positions_at_value() {
        let key = Key([0x06, 0x0E, 0x2B, 0x34, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let mut data = Vec::new();
        write_fixed_kl(&mut data, &key, 4, 200).unwrap();
        data.extend_from_slice(&[0xAB; 200]);

        let mut cursor = Cursor::new(data);
        let header = read_kl(&mut cursor).unwrap();
        assert_eq!(header.key, key);
        assert_eq!((header.llen, header.len), (4, 200));
        assert_eq!(cursor.position(), header.kl_size());
        assert_eq!(read_value(&mut cursor, header.len).unwrap(), vec![0xAB; 200]);
        assert_eq!(cursor.position(), header.total_size());
    }

    #[test]
    fn test_read_value_truncated() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        let err = read_value(&mut cursor, 1 << 40).unwrap_err();
        assert!(matches!(err, MxfError::Truncated { available: 10, .. }));
    }

    #[test]
    fn test_read_expected_kl() {
        let mut data = Vec::new();
        write_kl(&mut data, &labels::PRIMER_PACK, 0).unwrap();
        assert!(read_expected_kl(&mut Cursor::new(&data), &labels::PRIMER_PACK).is_ok());
        assert!(matches!(
            read_expected_kl(&mut Cursor::new(&data), &labels::FILL_ITEM),
            Err(MxfError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_fill_and_skip() {
        let mut data = Vec::new();
        write_fill(&mut data, 17).unwrap();
        write_fill(&mut data, 19).unwrap();
        write_fill(&mut data, 300).unwrap();
        assert_eq!(data.len(), 17 + 19 + 300);
        write_kl(&mut data, &labels::PRIMER_PACK, 3).unwrap();
        data.extend_from_slice(&[1, 2, 3]);

        let mut cursor = Cursor::new(data);
        let header = read_next_nonfiller_kl(&mut cursor).unwrap();
        assert_eq!(header.key, labels::PRIMER_PACK);
        assert_eq!(header.len, 3);

        assert!(write_fill(&mut Vec::new(), 16).is_err());
    }

    #[test]
    fn test_local_items() {
        let mut buffer = Vec::new();
        write_local_item(&mut buffer, 0x1234, &[1, 2, 3]).unwrap();
        write_local_item(&mut buffer, 0x3c0a, &[9; 16]).unwrap();

        let items: Vec<_> = LocalItems::new(&buffer).collect::<Result<_>>().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], (0x1234, &[1u8, 2, 3][..]));
        assert_eq!(items[1].1.len(), 16);

        assert!(write_local_item(&mut Vec::new(), 1, &vec![0; 70_000]).is_err());
    }

    #[test]
    fn test_local_items_trusts_array_header() {
        // local length says 4, the array header says 3 x 8 bytes follow
        let mut buffer = vec![0x3f, 0x0a, 0x00, 0x04];
        write_array_header(&mut buffer, ArrayHeader::new(3, 8)).unwrap();
        buffer.extend_from_slice(&[7; 24]);
        write_local_item(&mut buffer, 0x3f0b, &[0; 8]).unwrap();

        let items: Vec<_> = LocalItems::new(&buffer)
            .with_array_tags(&[0x3f09, 0x3f0a])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].1.len(), 32);
        assert_eq!(items[1].0, 0x3f0b);
    }

    #[test]
    fn test_local_items_truncated() {
        let buffer = vec![0x12, 0x34, 0x00, 0x10, 1, 2];
        let mut items = LocalItems::new(&buffer);
        assert!(matches!(items.next(), Some(Err(MxfError::Truncated { .. }))));
        assert!(items.next().is_none());
    }
}
