//! SMPTE 12M packed timecodes.
//!
//! The archive system item stores each timecode as the 8-byte SMPTE 12M
//! form used by the SMPTE 405M TimecodeArray property (SMPTE 331M section
//! 8.2). Only the time address is used; binary group data is zero.

use crate::archive::ArchiveTimecode;
use crate::error::{Result, TimecodeIndexError};

/// Size in bytes of one packed timecode.
pub const PACKED_TIMECODE_SIZE: usize = 8;

const DROP_FRAME_FLAG: u8 = 0x40;

/// Pack a timecode into its 8-byte SMPTE 12M form.
///
/// An invalid timecode packs to an all-ones time address so that it can be
/// told apart from any representable BCD value.
#[must_use]
pub fn pack(tc: &ArchiveTimecode) -> [u8; PACKED_TIMECODE_SIZE] {
    let mut t12m = [0u8; PACKED_TIMECODE_SIZE];
    if !tc.is_valid() {
        t12m[..4].fill(0xFF);
        return t12m;
    }

    t12m[0] = (tc.frame % 10) | (((tc.frame / 10) & 0x03) << 4);
    if tc.drop_frame {
        t12m[0] |= DROP_FRAME_FLAG;
    }
    t12m[1] = (tc.sec % 10) | (((tc.sec / 10) & 0x07) << 4);
    t12m[2] = (tc.min % 10) | (((tc.min / 10) & 0x07) << 4);
    t12m[3] = (tc.hour % 10) | (((tc.hour / 10) & 0x03) << 4);
    t12m
}

/// Unpack an 8-byte SMPTE 12M timecode.
pub fn unpack(t12m: &[u8]) -> Result<ArchiveTimecode> {
    if t12m.len() < PACKED_TIMECODE_SIZE {
        return Err(TimecodeIndexError::invalid_packed(format!(
            "expected {} bytes, got {}",
            PACKED_TIMECODE_SIZE,
            t12m.len()
        )));
    }
    if t12m[3] == 0xFF {
        return Ok(ArchiveTimecode::invalid());
    }

    let digit = |value: u8, name: &str| -> Result<u8> {
        if value > 9 {
            return Err(TimecodeIndexError::invalid_packed(format!(
                "{} units digit {:#x} is not BCD",
                name, value
            )));
        }
        Ok(value)
    };

    let frame = ((t12m[0] >> 4) & 0x03) * 10 + digit(t12m[0] & 0x0F, "frame")?;
    let sec = ((t12m[1] >> 4) & 0x07) * 10 + digit(t12m[1] & 0x0F, "sec")?;
    let min = ((t12m[2] >> 4) & 0x07) * 10 + digit(t12m[2] & 0x0F, "min")?;
    let hour = ((t12m[3] >> 4) & 0x03) * 10 + digit(t12m[3] & 0x0F, "hour")?;

    Ok(ArchiveTimecode {
        hour,
        min,
        sec,
        frame,
        drop_frame: t12m[0] & DROP_FRAME_FLAG != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pack_layout() {
        let t12m = pack(&ArchiveTimecode::new(23, 59, 58, 24));
        assert_eq!(t12m, [0x24, 0x58, 0x59, 0x23, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unpack() {
        let tc = unpack(&[0x24, 0x58, 0x59, 0x23, 0, 0, 0, 0]).unwrap();
        assert_eq!(tc, ArchiveTimecode::new(23, 59, 58, 24));
    }

    #[test]
    fn test_drop_frame_flag() {
        let mut tc = ArchiveTimecode::new(1, 0, 0, 2);
        tc.drop_frame = true;
        let t12m = pack(&tc);
        assert_eq!(t12m[0], 0x42);
        assert_eq!(unpack(&t12m).unwrap(), tc);
    }

    #[test]
    fn test_invalid_timecode() {
        let t12m = pack(&ArchiveTimecode::invalid());
        assert_eq!(&t12m[..4], &[0xFF; 4]);
        assert!(!unpack(&t12m).unwrap().is_valid());
    }

    #[test]
    fn test_unpack_rejects_bad_input() {
        assert!(unpack(&[0x24, 0x58, 0x59]).is_err());
        assert!(unpack(&[0x0A, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
