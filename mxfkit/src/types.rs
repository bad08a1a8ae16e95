//! Value types shared by header metadata, index tables and the essence
//! layer.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Edit rates and sample rates, stored as two big-endian `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }

    /// 25 fps, the archive edit rate
    pub const fn fps_25() -> Self {
        Rational::new(25, 1)
    }

    /// 48 kHz audio sampling rate
    pub const fn audio_48k() -> Self {
        Rational::new(48000, 1)
    }

    /// Both terms greater than zero
    pub fn is_positive(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Nearest whole number of units per second, 0 unless positive.
    ///
    /// 30000/1001 rounds to 30, which is the rounded timecode base of an
    /// NTSC timecode track.
    pub fn rounded(&self) -> u32 {
        if !self.is_positive() {
            return 0;
        }
        let (num, den) = (self.numerator as i64, self.denominator as i64);
        ((num + den / 2) / den) as u32
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::new(1, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Edit rate of a track or index
pub type EditRate = Rational;

/// Convert a position counted in `from` edit units into `to` edit units,
/// rounding down.
///
/// Returns `None` for zero rates or when the result overflows.
pub fn convert_position(position: i64, from: Rational, to: Rational) -> Option<i64> {
    if from.numerator == 0 || from.denominator == 0 || to.denominator == 0 {
        return None;
    }
    if from == to {
        return Some(position);
    }
    let num = position as i128 * to.numerator as i128 * from.denominator as i128;
    let den = to.denominator as i128 * from.numerator as i128;
    i64::try_from(num.div_euclid(den)).ok()
}

/// SMPTE 330M basic UMID prefix: UUID/UL material number, no instance
const UMID_LABEL: [u8; 13] = [
    0x06, 0x0A, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x01, 0x0F, 0x20, 0x13,
];

/// 32-byte basic UMID identifying a package
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Umid(pub [u8; 32]);

impl Umid {
    pub const fn zero() -> Self {
        Umid([0; 32])
    }

    /// A basic UMID whose material number is a fresh v4 UUID
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        bytes[..UMID_LABEL.len()].copy_from_slice(&UMID_LABEL);
        bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Umid(bytes)
    }
}

impl fmt::Debug for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Umid(")?;
        for (i, chunk) in self.0.chunks(4).enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            for byte in chunk {
                write!(f, "{:02x}", byte)?;
            }
        }
        f.write_str(")")
    }
}

/// UTC date and time with quarter-millisecond resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub quarter_msec: u8,
}

impl Timestamp {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Timestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
            quarter_msec: 0,
        }
    }

    /// Current UTC time
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_unix(elapsed.as_secs() as i64, elapsed.subsec_millis())
    }

    /// Timestamp for seconds since the Unix epoch
    pub fn from_unix(secs: i64, millis: u32) -> Self {
        let days = secs.div_euclid(86_400);
        let secs_of_day = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);

        Timestamp {
            year: year.clamp(0, u16::MAX as i64) as u16,
            month,
            day,
            hour: (secs_of_day / 3600) as u8,
            minute: (secs_of_day % 3600 / 60) as u8,
            second: (secs_of_day % 60) as u8,
            quarter_msec: (millis.min(999) / 4) as u8,
        }
    }

    /// Decode the 8-byte wire form
    pub fn decode(bytes: &[u8; 8]) -> Self {
        Timestamp {
            year: BigEndian::read_u16(&bytes[..2]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
            second: bytes[6],
            quarter_msec: bytes[7],
        }
    }

    /// Encode to the 8-byte wire form
    pub fn encode(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        BigEndian::write_u16(&mut bytes[..2], self.year);
        bytes[2..].copy_from_slice(&[
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.quarter_msec,
        ]);
        bytes
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.quarter_msec as u32 * 4
        )
    }
}

// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

/// What a track carries, from its data definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    Data,
    Timecode,
    /// Event tracks and other descriptive metadata
    DescriptiveMetadata,
    #[default]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rational_rounding() {
        assert_eq!(Rational::fps_25().rounded(), 25);
        assert_eq!(Rational::new(30000, 1001).rounded(), 30);
        assert_eq!(Rational::new(24000, 1001).rounded(), 24);
        assert_eq!(Rational::new(25, 0).rounded(), 0);
        assert!(!Rational::new(-25, 1).is_positive());
        assert_eq!(Rational::fps_25().to_string(), "25/1");
    }

    #[test]
    fn test_convert_position() {
        let fps = Rational::fps_25();
        let audio = Rational::audio_48k();
        assert_eq!(convert_position(25, fps, audio), Some(48000));
        assert_eq!(convert_position(1921, audio, fps), Some(1));
        assert_eq!(convert_position(7, fps, fps), Some(7));
        assert_eq!(convert_position(7, Rational::new(0, 1), fps), None);
    }

    #[test]
    fn test_umid() {
        let umid = Umid::generate();
        assert_eq!(&umid.0[..13], &UMID_LABEL);
        assert_ne!(umid, Umid::generate());
        assert_eq!(Umid::zero(), Umid::default());
        assert!(format!("{:?}", Umid::zero()).starts_with("Umid(00000000.00000000."));
    }

    #[test]
    fn test_timestamp_wire_form() {
        let ts = Timestamp::new(2024, 6, 15, 14, 30, 45);
        let bytes = ts.encode();
        assert_eq!(bytes, [0x07, 0xE8, 6, 15, 14, 30, 45, 0]);
        assert_eq!(Timestamp::decode(&bytes), ts);
    }

    #[test]
    fn test_timestamp_from_unix() {
        assert_eq!(Timestamp::from_unix(0, 0), Timestamp::new(1970, 1, 1, 0, 0, 0));

        // 2000-02-29 12:34:56.500
        let ts = Timestamp::from_unix(951_827_696, 500);
        assert_eq!((ts.year, ts.month, ts.day), (2000, 2, 29));
        assert_eq!((ts.hour, ts.minute, ts.second), (12, 34, 56));
        assert_eq!(ts.quarter_msec, 125);
        assert_eq!(ts.to_string(), "2000-02-29T12:34:56.500Z");
    }

    #[test]
    fn test_timestamp_now_is_plausible() {
        assert!(Timestamp::now().year >= 2024);
    }
}
