//! Typed item values.
//!
//! Items are stored as raw bytes in a [`MetadataSet`](crate::MetadataSet);
//! [`ItemValue`] decodes and encodes them. Arrays and batches carry an
//! array header whose count must agree with the raw byte length.

use crate::error::{MxfError, Result};
use crate::klv::{self, ArrayHeader};
use crate::types::{Rational, Timestamp, Umid};
use crate::ul::Key;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

/// A value that can be stored in a metadata set item
pub trait ItemValue: Sized {
    /// Encoded size when every value has the same size
    const FIXED_LEN: Option<usize>;

    /// Decode from the raw item bytes of `item`
    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self>;

    /// Append the encoding to `out`
    fn write_value(&self, out: &mut Vec<u8>);

    /// Encode into a new buffer
    fn to_item_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::FIXED_LEN.unwrap_or(16));
        self.write_value(&mut out);
        out
    }
}

fn check_len(item: &Key, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(MxfError::invalid_item(
            *item,
            format!("expected {} bytes, found {}", expected, bytes.len()),
        ));
    }
    Ok(())
}

macro_rules! impl_int_item {
    ($ty:ty, $len:expr, $read:ident, $write:ident) => {
        impl ItemValue for $ty {
            const FIXED_LEN: Option<usize> = Some($len);

            fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
                check_len(item, bytes, $len)?;
                let mut cursor = bytes;
                Ok(cursor.$read::<BigEndian>()?)
            }

            fn write_value(&self, out: &mut Vec<u8>) {
                // writing to a Vec cannot fail
                let _ = out.$write::<BigEndian>(*self);
            }
        }
    };
}

impl_int_item!(u16, 2, read_u16, write_u16);
impl_int_item!(u32, 4, read_u32, write_u32);
impl_int_item!(u64, 8, read_u64, write_u64);
impl_int_item!(i16, 2, read_i16, write_i16);
impl_int_item!(i32, 4, read_i32, write_i32);
impl_int_item!(i64, 8, read_i64, write_i64);

impl ItemValue for u8 {
    const FIXED_LEN: Option<usize> = Some(1);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        check_len(item, bytes, 1)?;
        Ok(bytes[0])
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl ItemValue for bool {
    const FIXED_LEN: Option<usize> = Some(1);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        Ok(u8::read_value(item, bytes)? != 0)
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
}

impl ItemValue for Rational {
    const FIXED_LEN: Option<usize> = Some(8);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        check_len(item, bytes, 8)?;
        let mut cursor = bytes;
        let numerator = cursor.read_i32::<BigEndian>()?;
        let denominator = cursor.read_i32::<BigEndian>()?;
        Ok(Rational::new(numerator, denominator))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.numerator.to_be_bytes());
        out.extend_from_slice(&self.denominator.to_be_bytes());
    }
}

impl ItemValue for Key {
    const FIXED_LEN: Option<usize> = Some(16);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        check_len(item, bytes, 16)?;
        let mut key = [0u8; 16];
        key.copy_from_slice(bytes);
        Ok(Key(key))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ItemValue for Uuid {
    const FIXED_LEN: Option<usize> = Some(16);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        check_len(item, bytes, 16)?;
        Uuid::from_slice(bytes).map_err(|e| MxfError::invalid_item(*item, e.to_string()))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ItemValue for Umid {
    const FIXED_LEN: Option<usize> = Some(32);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        check_len(item, bytes, 32)?;
        let mut umid = [0u8; 32];
        umid.copy_from_slice(bytes);
        Ok(Umid(umid))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl ItemValue for Timestamp {
    const FIXED_LEN: Option<usize> = Some(8);

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; 8] = bytes
            .try_into()
            .map_err(|_| MxfError::invalid_item(*item, format!("timestamp of {} bytes", bytes.len())))?;
        Ok(Timestamp::decode(bytes))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.encode());
    }
}

/// UTF-16 big-endian string; a terminating NUL and anything after it is dropped
impl ItemValue for String {
    const FIXED_LEN: Option<usize> = None;

    fn read_value(item: &Key, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(MxfError::invalid_item(
                *item,
                format!("odd UTF-16 string length {}", bytes.len()),
            ));
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16(&units).map_err(|e| MxfError::invalid_item(*item, e.to_string()))
    }

    fn write_value(&self, out: &mut Vec<u8>) {
        for unit in self.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

/// Decode an array or batch item.
pub fn read_array<T: ItemValue>(item: &Key, bytes: &[u8]) -> Result<Vec<T>> {
    let element_len = T::FIXED_LEN
        .ok_or_else(|| MxfError::unsupported("array of variable-size values"))?;
    if bytes.len() < ArrayHeader::SIZE {
        return Err(MxfError::invalid_item(*item, "missing array header"));
    }

    let mut cursor = bytes;
    let header = klv::read_array_header(&mut cursor)?;
    if header.element_len as usize != element_len && header.count > 0 {
        return Err(MxfError::invalid_item(
            *item,
            format!(
                "array element length {}, expected {}",
                header.element_len, element_len
            ),
        ));
    }
    let expected = ArrayHeader::SIZE as u64 + header.count as u64 * element_len as u64;
    if expected != bytes.len() as u64 {
        return Err(MxfError::invalid_item(
            *item,
            format!(
                "array of {} elements needs {} bytes, found {}",
                header.count,
                expected,
                bytes.len()
            ),
        ));
    }

    cursor
        .chunks_exact(element_len)
        .map(|chunk| T::read_value(item, chunk))
        .collect()
}

/// Encode an array or batch item.
pub fn write_array<T: ItemValue>(values: &[T]) -> Result<Vec<u8>> {
    let element_len = T::FIXED_LEN
        .ok_or_else(|| MxfError::unsupported("array of variable-size values"))?;
    let mut out = Vec::with_capacity(ArrayHeader::SIZE + values.len() * element_len);
    klv::write_array_header(
        &mut out,
        ArrayHeader::new(values.len() as u32, element_len as u32),
    )?;
    for value in values {
        value.write_value(&mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::items;
    use pretty_assertions::assert_eq;

    const ITEM: Key = items::DURATION.key;

    fn round_trip<T: ItemValue + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.to_item_bytes();
        if let Some(len) = T::FIXED_LEN {
            assert_eq!(bytes.len(), len);
        }
        assert_eq!(T::read_value(&ITEM, &bytes).unwrap(), value);
    }

    #[test]
    fn test_scalar_values() {
        round_trip(0x1234u16);
        round_trip(-5i64);
        round_trip(true);
        round_trip(Rational::new(30000, 1001));
        round_trip(Uuid::new_v4());
        round_trip(Umid::generate());
        round_trip(Timestamp::new(2026, 10, 19, 8, 0, 0));
        round_trip(items::TRACKS.key);
    }

    #[test]
    fn test_wrong_length_is_invalid_item() {
        let err = u32::read_value(&ITEM, &[0, 1]).unwrap_err();
        assert!(matches!(err, MxfError::InvalidItem { .. }));
    }

    #[test]
    fn test_utf16_string() {
        let bytes = "Archive ✓".to_string().to_item_bytes();
        assert_eq!(&bytes[..4], &[0x00, b'A', 0x00, b'r']);
        assert_eq!(String::read_value(&ITEM, &bytes).unwrap(), "Archive ✓");

        let mut terminated = "ab".to_string().to_item_bytes();
        terminated.extend_from_slice(&[0, 0, 0, b'x']);
        assert_eq!(String::read_value(&ITEM, &terminated).unwrap(), "ab");

        assert!(String::read_value(&ITEM, &[0, b'a', 0]).is_err());
    }

    #[test]
    fn test_arrays() {
        let uids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let bytes = write_array(&uids).unwrap();
        assert_eq!(bytes.len(), 8 + 32);
        assert_eq!(&bytes[..8], &[0, 0, 0, 2, 0, 0, 0, 16]);
        assert_eq!(read_array::<Uuid>(&ITEM, &bytes).unwrap(), uids);

        let empty = write_array::<u32>(&[]).unwrap();
        assert!(read_array::<u32>(&ITEM, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_array_count_must_match_length() {
        let mut bytes = write_array(&[1u32, 2, 3]).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            read_array::<u32>(&ITEM, &bytes),
            Err(MxfError::InvalidItem { .. })
        ));
        assert!(write_array(&["a".to_string()]).is_err());
    }
}
