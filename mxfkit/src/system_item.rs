//! Archive system item.
//!
//! Each content package starts with a System Scheme 1 element holding a
//! single local item: a two element timecode array of packed VITC and LTC.

use crate::error::{MxfError, Result};
use crate::klv::{self, ArrayHeader, DEFAULT_LLEN};
use crate::ul::{labels, Key};
use mxfkit_timecode::smpte::{self, PACKED_TIMECODE_SIZE};
use mxfkit_timecode::ArchiveTimecode;
use std::io::Write;

/// Local tag of the timecode array
pub const TIMECODE_ARRAY_TAG: u16 = 0x0102;

/// Value size of the system item element
pub const SYSTEM_ITEM_SIZE: u64 = 4 + ArrayHeader::SIZE as u64 + 2 * PACKED_TIMECODE_SIZE as u64;

/// Size of the whole system item KLV
pub const SYSTEM_ITEM_KLV_SIZE: u64 = 16 + DEFAULT_LLEN as u64 + SYSTEM_ITEM_SIZE;

/// VITC and LTC recorded with one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemItemTimecodes {
    pub vitc: ArchiveTimecode,
    pub ltc: ArchiveTimecode,
}

impl SystemItemTimecodes {
    pub fn new(vitc: ArchiveTimecode, ltc: ArchiveTimecode) -> Self {
        SystemItemTimecodes { vitc, ltc }
    }

    /// Element value
    pub fn encode(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(SYSTEM_ITEM_SIZE as usize);
        value.extend_from_slice(&TIMECODE_ARRAY_TAG.to_be_bytes());
        value.extend_from_slice(&((SYSTEM_ITEM_SIZE - 4) as u16).to_be_bytes());
        value.extend_from_slice(&2u32.to_be_bytes());
        value.extend_from_slice(&(PACKED_TIMECODE_SIZE as u32).to_be_bytes());
        value.extend_from_slice(&smpte::pack(&self.vitc));
        value.extend_from_slice(&smpte::pack(&self.ltc));
        value
    }

    /// Write the system item KLV, returning its size
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        klv::write_fixed_kl(writer, &labels::SYSTEM_ITEM_SS1, DEFAULT_LLEN, SYSTEM_ITEM_SIZE)?;
        writer.write_all(&self.encode())?;
        Ok(SYSTEM_ITEM_KLV_SIZE)
    }

    /// Decode an element value.
    ///
    /// Items other than the timecode array are ignored. A missing LTC
    /// decodes as an invalid timecode.
    pub fn decode(value: &[u8]) -> Result<Self> {
        for entry in klv::LocalItems::new(value) {
            let (tag, bytes) = entry?;
            if tag != TIMECODE_ARRAY_TAG {
                continue;
            }

            let mut cursor = bytes;
            let header = klv::read_array_header(&mut cursor)?;
            if header.element_len as usize != PACKED_TIMECODE_SIZE
                || header.count == 0
                || cursor.len() < header.count as usize * PACKED_TIMECODE_SIZE
            {
                return Err(MxfError::invalid_item(
                    Key::default(),
                    format!(
                        "timecode array of {} x {} bytes in {} bytes",
                        header.count,
                        header.element_len,
                        bytes.len()
                    ),
                ));
            }

            let vitc = smpte::unpack(&cursor[..PACKED_TIMECODE_SIZE])?;
            let ltc = if header.count > 1 {
                smpte::unpack(&cursor[PACKED_TIMECODE_SIZE..2 * PACKED_TIMECODE_SIZE])?
            } else {
                ArchiveTimecode::invalid()
            };
            return Ok(SystemItemTimecodes { vitc, ltc });
        }

        Err(MxfError::unsupported("system item without timecode array"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_system_item_layout() {
        let timecodes = SystemItemTimecodes::new(
            ArchiveTimecode::new(10, 0, 0, 1),
            ArchiveTimecode::new(10, 0, 0, 2),
        );
        let value = timecodes.encode();
        assert_eq!(value.len(), 28);
        assert_eq!(&value[..4], &[0x01, 0x02, 0x00, 24]);
        assert_eq!(&value[4..12], &[0, 0, 0, 2, 0, 0, 0, 8]);
        assert_eq!(value[12], 0x01);
        assert_eq!(value[15], 0x10);

        let mut klv_bytes = Vec::new();
        assert_eq!(timecodes.write(&mut klv_bytes).unwrap(), 48);
        assert_eq!(klv_bytes.len(), 48);
    }

    #[test]
    fn test_decode() {
        let timecodes =
            SystemItemTimecodes::new(ArchiveTimecode::new(1, 2, 3, 4), ArchiveTimecode::invalid());
        let decoded = SystemItemTimecodes::decode(&timecodes.encode()).unwrap();
        assert_eq!(decoded, timecodes);
        assert!(!decoded.ltc.is_valid());
    }

    #[test]
    fn test_decode_rejects_bad_array() {
        let mut value = SystemItemTimecodes::new(
            ArchiveTimecode::new(0, 0, 0, 0),
            ArchiveTimecode::new(0, 0, 0, 0),
        )
        .encode();
        value[11] = 4;
        assert!(SystemItemTimecodes::decode(&value).is_err());
        assert!(SystemItemTimecodes::decode(&[]).is_err());
    }
}
