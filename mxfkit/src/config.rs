//! Writer and reader configuration.

use crate::error::{MxfError, Result};
use crate::types::Rational;
use mxfkit_timecode::TimecodeIndexConfig;
use serde::{Deserialize, Serialize};

/// Most audio tracks an archive file carries
pub const MAX_AUDIO_TRACKS: u32 = 4;

/// Offset of the first essence byte in an archive file
pub const DEFAULT_HEADER_RESERVE: u64 = 0x8000;

/// Uncompressed 4:2:2 8-bit 720x576 frame
pub const DEFAULT_VIDEO_FRAME_SIZE: u32 = 720 * 576 * 2;

/// 1920 samples of 24-bit audio
pub const DEFAULT_AUDIO_FRAME_SIZE: u32 = 1920 * 3;

/// Picture parameters recorded in the CDCI descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureConfig {
    /// Stored width in pixels
    pub stored_width: u32,
    /// Stored height; the frame height for mixed fields
    pub stored_height: u32,
    /// 0 full frame, 1 separate fields, 3 mixed fields
    pub frame_layout: u8,
    /// First active line of each field
    pub video_line_map: [i32; 2],
    /// Display aspect ratio
    pub aspect_ratio: Rational,
    /// Bits per component
    pub component_depth: u32,
    pub horizontal_subsampling: u32,
    pub vertical_subsampling: u32,
}

impl Default for PictureConfig {
    fn default() -> Self {
        Self {
            stored_width: 720,
            stored_height: 576,
            frame_layout: 3,
            video_line_map: [23, 336],
            aspect_ratio: Rational::new(4, 3),
            component_depth: 8,
            horizontal_subsampling: 2,
            vertical_subsampling: 1,
        }
    }
}

/// Sound parameters recorded in each wave descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundConfig {
    pub sampling_rate: Rational,
    /// Significant bits per sample
    pub quantization_bits: u32,
    /// Bytes per sample frame
    pub block_align: u16,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            sampling_rate: Rational::audio_48k(),
            quantization_bits: 20,
            block_align: 3,
        }
    }
}

impl SoundConfig {
    /// Average bytes per second
    pub fn avg_bps(&self) -> u32 {
        self.sampling_rate.rounded() * self.block_align as u32
    }
}

/// Archive writer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Audio tracks per content package.
    pub num_audio_tracks: u32,
    /// Bytes of every video frame.
    pub video_frame_size: u32,
    /// Bytes of every audio frame, per track.
    pub audio_frame_size: u32,
    /// Edit rate of every track.
    pub edit_rate: Rational,
    /// Picture descriptor values.
    pub picture: PictureConfig,
    /// Sound descriptor values.
    pub sound: SoundConfig,
    /// Bytes reserved before the essence for header metadata and index.
    pub header_reserve: u64,
    /// Leading events that must be located for any to be recorded.
    pub max_event_checks: usize,
    /// Configuration of the VITC and LTC indexes.
    pub timecode_index: TimecodeIndexConfig,
    /// Name of the material package.
    pub material_name: String,
    /// Name of the descriptive metadata event track.
    pub event_track_name: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            num_audio_tracks: 4,
            video_frame_size: DEFAULT_VIDEO_FRAME_SIZE,
            audio_frame_size: DEFAULT_AUDIO_FRAME_SIZE,
            edit_rate: Rational::fps_25(),
            picture: PictureConfig::default(),
            sound: SoundConfig::default(),
            header_reserve: DEFAULT_HEADER_RESERVE,
            max_event_checks: 20,
            timecode_index: TimecodeIndexConfig::default(),
            material_name: "Archive".to_string(),
            event_track_name: "Timecode Events".to_string(),
        }
    }
}

impl WriterConfig {
    /// Create a configuration for `num_audio_tracks` audio tracks.
    pub fn new(num_audio_tracks: u32) -> Self {
        Self {
            num_audio_tracks,
            ..Default::default()
        }
    }

    /// Set the video frame size.
    #[must_use]
    pub fn with_video_frame_size(mut self, size: u32) -> Self {
        self.video_frame_size = size;
        self
    }

    /// Set the audio frame size.
    #[must_use]
    pub fn with_audio_frame_size(mut self, size: u32) -> Self {
        self.audio_frame_size = size;
        self
    }

    /// Set the edit rate.
    #[must_use]
    pub fn with_edit_rate(mut self, edit_rate: Rational) -> Self {
        self.edit_rate = edit_rate;
        self
    }

    /// Set the picture descriptor values.
    #[must_use]
    pub fn with_picture(mut self, picture: PictureConfig) -> Self {
        self.picture = picture;
        self
    }

    /// Set the sound descriptor values.
    #[must_use]
    pub fn with_sound(mut self, sound: SoundConfig) -> Self {
        self.sound = sound;
        self
    }

    /// Set the header reserve.
    #[must_use]
    pub fn with_header_reserve(mut self, reserve: u64) -> Self {
        self.header_reserve = reserve;
        self
    }

    /// Set the number of leading events checked.
    #[must_use]
    pub fn with_max_event_checks(mut self, checks: usize) -> Self {
        self.max_event_checks = checks;
        self
    }

    /// Set the timecode index configuration.
    #[must_use]
    pub fn with_timecode_index(mut self, config: TimecodeIndexConfig) -> Self {
        self.timecode_index = config;
        self
    }

    /// Set the material package name.
    #[must_use]
    pub fn with_material_name(mut self, name: impl Into<String>) -> Self {
        self.material_name = name.into();
        self
    }

    /// Size of one content package.
    pub fn content_package_size(&self) -> u64 {
        crate::system_item::SYSTEM_ITEM_KLV_SIZE
            + 20
            + self.video_frame_size as u64
            + self.num_audio_tracks as u64 * (20 + self.audio_frame_size as u64)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_audio_tracks > MAX_AUDIO_TRACKS {
            return Err(MxfError::unsupported(format!(
                "{} audio tracks, at most {} are supported",
                self.num_audio_tracks, MAX_AUDIO_TRACKS
            )));
        }
        if self.video_frame_size == 0 {
            return Err(MxfError::unsupported("zero video frame size"));
        }
        if self.num_audio_tracks > 0 && self.audio_frame_size == 0 {
            return Err(MxfError::unsupported("zero audio frame size"));
        }
        if !self.edit_rate.is_positive() {
            return Err(MxfError::unsupported(format!("edit rate {}", self.edit_rate)));
        }
        if self.content_package_size() > u32::MAX as u64 {
            return Err(MxfError::unsupported("content package does not fit a 32-bit edit unit byte count"));
        }
        self.timecode_index.validate()?;
        Ok(())
    }
}

/// Reader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Use the footer's header metadata when the footer is closed and complete.
    pub prefer_footer_metadata: bool,
    /// Largest essence element handed to a listener.
    pub max_element_size: u64,
    /// Configuration of the indexes built by
    /// [`MxfReader::read_timecode_indexes`](crate::MxfReader::read_timecode_indexes).
    pub timecode_index: TimecodeIndexConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            prefer_footer_metadata: true,
            max_element_size: 64 * 1024 * 1024,
            timecode_index: TimecodeIndexConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Choose between footer and header metadata.
    #[must_use]
    pub fn with_prefer_footer_metadata(mut self, prefer: bool) -> Self {
        self.prefer_footer_metadata = prefer;
        self
    }

    /// Set the element size limit.
    #[must_use]
    pub fn with_max_element_size(mut self, size: u64) -> Self {
        self.max_element_size = size;
        self
    }

    /// Set the timecode index configuration.
    #[must_use]
    pub fn with_timecode_index(mut self, config: TimecodeIndexConfig) -> Self {
        self.timecode_index = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_content_package() {
        let config = WriterConfig::default();
        assert_eq!(config.content_package_size(), 48 + 20 + 829_440 + 4 * (20 + 5760));
        config.validate().unwrap();
        assert_eq!(config.sound.avg_bps(), 144_000);
    }

    #[test]
    fn test_validate() {
        assert!(WriterConfig::new(5).validate().is_err());
        assert!(WriterConfig::new(0).with_audio_frame_size(0).validate().is_ok());
        assert!(WriterConfig::new(1).with_audio_frame_size(0).validate().is_err());
        assert!(WriterConfig::default()
            .with_edit_rate(Rational::new(25, 0))
            .validate()
            .is_err());
        assert!(WriterConfig::default()
            .with_timecode_index(TimecodeIndexConfig::default().with_page_capacity(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_descriptor_values() {
        let picture = PictureConfig {
            stored_width: 1920,
            stored_height: 1080,
            ..Default::default()
        };
        let sound = SoundConfig {
            quantization_bits: 16,
            block_align: 2,
            ..Default::default()
        };
        let config = WriterConfig::new(1).with_picture(picture).with_sound(sound);
        assert_eq!(config.picture.stored_width, 1920);
        assert_eq!(config.picture.video_line_map, [23, 336]);
        assert_eq!(config.sound.avg_bps(), 96_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_serde() {
        let config = WriterConfig::new(2).with_material_name("tape 1");
        let json = serde_json::to_string(&config).unwrap();
        let back: WriterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let reader = ReaderConfig::default().with_prefer_footer_metadata(false);
        let json = serde_json::to_string(&reader).unwrap();
        assert_eq!(serde_json::from_str::<ReaderConfig>(&json).unwrap(), reader);
    }
}
