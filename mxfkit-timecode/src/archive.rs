//! Archive timecodes.
//!
//! An [`ArchiveTimecode`] is the HH:MM:SS:FF value carried per frame in the
//! archive system item. Unlike a general SMPTE timecode it does not carry
//! its frame rate; the rate used to order timecodes on a single integer
//! axis is supplied by the caller (the timecode index configuration).

use crate::error::{Result, TimecodeIndexError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hour value marking a timecode as invalid or unavailable.
pub const INVALID_HOUR: u8 = 0xFF;

/// Frames per second used to convert timecodes to positions unless
/// configured otherwise (PAL).
pub const DEFAULT_INDEX_FPS: u32 = 25;

/// A per-frame timecode as recorded in archive files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ArchiveTimecode {
    /// Hours (0-23), or [`INVALID_HOUR`].
    pub hour: u8,
    /// Minutes (0-59)
    pub min: u8,
    /// Seconds (0-59)
    pub sec: u8,
    /// Frames (0 to fps-1)
    pub frame: u8,
    /// Whether the source flagged the timecode as drop-frame.
    pub drop_frame: bool,
}

impl ArchiveTimecode {
    /// Create a non-drop-frame timecode without validation.
    #[must_use]
    pub const fn new(hour: u8, min: u8, sec: u8, frame: u8) -> Self {
        Self {
            hour,
            min,
            sec,
            frame,
            drop_frame: false,
        }
    }

    /// The invalid timecode (hour set to [`INVALID_HOUR`]).
    #[must_use]
    pub const fn invalid() -> Self {
        Self::new(INVALID_HOUR, 0, 0, 0)
    }

    /// Returns false when the hour holds the invalid sentinel.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.hour != INVALID_HOUR
    }

    /// Check every component against its range for the given frame rate.
    pub fn validate(&self, fps: u32) -> Result<()> {
        if fps == 0 {
            return Err(TimecodeIndexError::InvalidFrameRate { fps });
        }
        if self.hour > 23 {
            return Err(TimecodeIndexError::invalid_component("hour", self.hour as u32, 23));
        }
        if self.min > 59 {
            return Err(TimecodeIndexError::invalid_component("min", self.min as u32, 59));
        }
        if self.sec > 59 {
            return Err(TimecodeIndexError::invalid_component("sec", self.sec as u32, 59));
        }
        if self.frame as u32 >= fps {
            return Err(TimecodeIndexError::invalid_component(
                "frame",
                self.frame as u32,
                fps - 1,
            ));
        }
        Ok(())
    }

    /// Convert to an absolute frame count at `fps` frames per second.
    ///
    /// At 25 fps this is `hour*90000 + min*1500 + sec*25 + frame`. The
    /// mapping is not injective for frame values outside `0..fps`.
    #[must_use]
    pub fn to_position(&self, fps: u32) -> i64 {
        let fps = fps as i64;
        self.hour as i64 * 60 * 60 * fps
            + self.min as i64 * 60 * fps
            + self.sec as i64 * fps
            + self.frame as i64
    }

    /// Inverse of [`to_position`](Self::to_position).
    #[must_use]
    pub fn from_position(position: i64, fps: u32) -> Self {
        let fps = fps.max(1) as i64;
        let per_hour = 60 * 60 * fps;
        let per_min = 60 * fps;
        let (Ok(hour), Ok(frame)) = (
            u8::try_from(position.div_euclid(per_hour)),
            u8::try_from(position.rem_euclid(per_min) % fps),
        ) else {
            return Self::invalid();
        };
        let rem = position % per_hour;
        Self {
            hour,
            min: (rem / per_min) as u8,
            sec: ((rem % per_min) / fps) as u8,
            frame,
            drop_frame: false,
        }
    }

    /// Advance by one frame, wrapping at 24 hours.
    ///
    /// Invalid timecodes are left unchanged.
    pub fn increment(&mut self, fps: u32) {
        if !self.is_valid() {
            return;
        }
        let frame = self.frame as u32 + 1;
        if frame < fps && frame <= u8::MAX as u32 {
            self.frame = frame as u8;
            return;
        }
        self.frame = 0;
        if self.sec < 59 {
            self.sec += 1;
            return;
        }
        self.sec = 0;
        if self.min < 59 {
            self.min += 1;
            return;
        }
        self.min = 0;
        self.hour = if self.hour < 23 { self.hour + 1 } else { 0 };
    }

    /// Step back by one frame, wrapping at midnight.
    pub fn decrement(&mut self, fps: u32) {
        if self.frame > 0 {
            self.frame -= 1;
            return;
        }
        self.frame = (fps.max(1) - 1) as u8;
        if self.sec > 0 {
            self.sec -= 1;
            return;
        }
        self.sec = 59;
        if self.min > 0 {
            self.min -= 1;
            return;
        }
        self.min = 59;
        self.hour = if self.hour == 0 { 23 } else { self.hour - 1 };
    }
}

impl fmt::Display for ArchiveTimecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "--:--:--:--");
        }
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hour, self.min, self.sec, sep, self.frame
        )
    }
}

impl FromStr for ArchiveTimecode {
    type Err = TimecodeIndexError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "--:--:--:--" {
            return Ok(Self::invalid());
        }
        let drop_frame = s.contains(';');
        let parts: Vec<&str> = s.split([':', ';']).collect();
        if parts.len() != 4 {
            return Err(TimecodeIndexError::invalid_component(
                "fields",
                parts.len() as u32,
                4,
            ));
        }

        let mut values = [0u8; 4];
        for (value, (part, name)) in values
            .iter_mut()
            .zip(parts.iter().zip(["hour", "min", "sec", "frame"]))
        {
            *value = part
                .trim()
                .parse()
                .map_err(|_| TimecodeIndexError::invalid_component(name, u32::MAX, 255))?;
        }

        Ok(Self {
            hour: values[0],
            min: values[1],
            sec: values[2],
            frame: values[3],
            drop_frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_position_pal() {
        let tc = ArchiveTimecode::new(1, 2, 3, 4);
        assert_eq!(tc.to_position(25), 90000 + 2 * 1500 + 3 * 25 + 4);
        assert_eq!(ArchiveTimecode::new(3, 0, 0, 0).to_position(25), 270000);
    }

    #[test]
    fn test_from_position() {
        let tc = ArchiveTimecode::from_position(269_979, 25);
        assert_eq!(tc, ArchiveTimecode::new(2, 59, 59, 4));

        let tc = ArchiveTimecode::from_position(60 * 30 + 30, 30);
        assert_eq!(tc, ArchiveTimecode::new(0, 1, 1, 0));
    }

    #[test]
    fn test_increment_wraps() {
        let mut tc = ArchiveTimecode::new(0, 0, 59, 24);
        tc.increment(25);
        assert_eq!(tc, ArchiveTimecode::new(0, 1, 0, 0));

        let mut tc = ArchiveTimecode::new(23, 59, 59, 24);
        tc.increment(25);
        assert_eq!(tc, ArchiveTimecode::new(0, 0, 0, 0));
    }

    #[test]
    fn test_increment_out_of_range_frames() {
        let mut tc = ArchiveTimecode::invalid();
        tc.frame = 255;
        tc.increment(25);
        assert_eq!(tc.frame, 255);
        assert!(!tc.is_valid());

        let mut tc = ArchiveTimecode::new(1, 0, 0, 255);
        tc.increment(300);
        assert_eq!(tc, ArchiveTimecode::new(1, 0, 1, 0));
    }

    #[test]
    fn test_from_position_out_of_range() {
        assert_eq!(ArchiveTimecode::from_position(256 * 90_000, 25), ArchiveTimecode::invalid());
        assert_eq!(ArchiveTimecode::from_position(-1, 25), ArchiveTimecode::invalid());
        assert_eq!(ArchiveTimecode::from_position(255 * 90_000, 25).hour, 255);
    }

    #[test]
    fn test_decrement_wraps() {
        let mut tc = ArchiveTimecode::new(1, 0, 0, 0);
        tc.decrement(25);
        assert_eq!(tc, ArchiveTimecode::new(0, 59, 59, 24));

        let mut tc = ArchiveTimecode::new(0, 0, 0, 0);
        tc.decrement(30);
        assert_eq!(tc, ArchiveTimecode::new(23, 59, 59, 29));
    }

    #[test]
    fn test_validate() {
        assert!(ArchiveTimecode::new(23, 59, 59, 24).validate(25).is_ok());
        assert!(ArchiveTimecode::new(23, 59, 59, 25).validate(25).is_err());
        assert!(ArchiveTimecode::new(23, 59, 59, 29).validate(30).is_ok());
        assert!(ArchiveTimecode::invalid().validate(25).is_err());
        assert!(ArchiveTimecode::new(0, 0, 0, 0).validate(0).is_err());
    }

    #[test]
    fn test_display_and_parse() {
        let tc = ArchiveTimecode::new(10, 2, 3, 4);
        assert_eq!(tc.to_string(), "10:02:03:04");
        assert_eq!("10:02:03:04".parse::<ArchiveTimecode>().unwrap(), tc);

        let df: ArchiveTimecode = "01:00:00;02".parse().unwrap();
        assert!(df.drop_frame);
        assert_eq!(df.to_string(), "01:00:00;02");

        assert_eq!(ArchiveTimecode::invalid().to_string(), "--:--:--:--");
        assert!(!"--:--:--:--".parse::<ArchiveTimecode>().unwrap().is_valid());
        assert!("01:00:00".parse::<ArchiveTimecode>().is_err());
        assert!("01:xx:00:00".parse::<ArchiveTimecode>().is_err());
    }

    #[test]
    fn test_serialization() {
        let tc = ArchiveTimecode::new(9, 8, 7, 6);
        let json = serde_json::to_string(&tc).unwrap();
        let decoded: ArchiveTimecode = serde_json::from_str(&json).unwrap();
        assert_eq!(tc, decoded);
    }
}
