//! Keys and Universal Labels.
//!
//! Every KLV key, set key, item key and label in an MXF file is a 16-byte
//! identifier. SMPTE registered labels start with `06 0e 2b 34`; byte 8 is
//! the registry version and is ignored when matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte key (Universal Label or UUID-style identifier)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Key(pub [u8; 16]);

impl Key {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Key(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Check if this is a SMPTE-registered label (starts with 06 0E 2B 34)
    pub fn is_smpte(&self) -> bool {
        self.0[0..4] == labels::SMPTE_PREFIX
    }

    /// Compare the first `n` bytes.
    pub fn matches_prefix(&self, other: &Key, n: usize) -> bool {
        let n = n.min(16);
        self.0[..n] == other.0[..n]
    }

    /// Compare all bytes except the registry version (byte 8).
    pub fn equals_ignoring_version(&self, other: &Key) -> bool {
        self.0[0..7] == other.0[0..7] && self.0[8..16] == other.0[8..16]
    }

    /// Check if this is a partition pack (header, body or footer)
    pub fn is_partition_pack(&self) -> bool {
        self.matches_prefix(&labels::PARTITION_PACK_BASE, 13) && (0x02..=0x04).contains(&self.0[13])
    }

    /// Check if this is a primer pack
    pub fn is_primer_pack(&self) -> bool {
        self.equals_ignoring_version(&labels::PRIMER_PACK)
    }

    /// Check if this is a KLV fill item
    pub fn is_fill_item(&self) -> bool {
        self.0[0..7] == labels::FILL_ITEM.0[0..7] && self.0[8..13] == labels::FILL_ITEM.0[8..13]
    }

    /// Check if this is a header metadata local set (2-byte tags, 2-byte lengths)
    pub fn is_local_set(&self) -> bool {
        self.is_smpte() && self.0[4] == 0x02 && self.0[5] == 0x53
    }

    /// Check if this is a Generic Container essence element
    pub fn is_gc_essence_element(&self) -> bool {
        self.0[0..7] == labels::GC_ELEMENT_PREFIX[0..7]
            && self.0[8..12] == labels::GC_ELEMENT_PREFIX[8..12]
    }

    /// Check if this is the archive system item element
    pub fn is_system_item(&self) -> bool {
        self.equals_ignoring_version(&labels::SYSTEM_ITEM_SS1)
    }

    /// Track number encoded in the last four bytes of an essence element key
    pub fn track_number(&self) -> u32 {
        u32::from_be_bytes([self.0[12], self.0[13], self.0[14], self.0[15]])
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl AsRef<Key> for Key {
    fn as_ref(&self) -> &Key {
        self
    }
}

impl From<[u8; 16]> for Key {
    fn from(bytes: [u8; 16]) -> Self {
        Key(bytes)
    }
}

impl From<&[u8; 16]> for Key {
    fn from(bytes: &[u8; 16]) -> Self {
        Key(*bytes)
    }
}

/// Essence element type of uncompressed frame-wrapped picture
pub const UNC_FRAME_WRAPPED_EE_TYPE: u8 = 0x02;

/// Essence element type of frame-wrapped BWF sound
pub const BWF_FRAME_WRAPPED_EE_TYPE: u8 = 0x01;

/// Complete an essence element key with the element count, type and number.
pub fn complete_essence_element_key(base: &Key, count: u8, element_type: u8, element_num: u8) -> Key {
    let mut key = *base;
    key.0[13] = count;
    key.0[14] = element_type;
    key.0[15] = element_num;
    key
}

/// Track number matching [`complete_essence_element_key`] for the same base key.
pub fn essence_element_track_number(base: &Key, count: u8, element_type: u8, element_num: u8) -> u32 {
    complete_essence_element_key(base, count, element_type, element_num).track_number()
}

/// Generic Container essence container label:
/// `06 0e 2b 34 04 01 01 <version> 0d 01 03 01 <kind> <mapping> <b15> <b16>`.
pub const fn generic_container_label(version: u8, kind: u8, mapping: u8, b15: u8, b16: u8) -> Key {
    Key([
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, version, 0x0D, 0x01, 0x03, 0x01, kind, mapping, b15,
        b16,
    ])
}

/// Check whether a label is a Generic Container essence container label.
pub fn is_generic_container_label(label: &Key) -> bool {
    label.0[0..7] == labels::GC_LABEL_PREFIX[0..7] && label.0[8..12] == labels::GC_LABEL_PREFIX[8..12]
}

/// Well-known labels and keys
pub mod labels {
    use super::{generic_container_label, Key};

    /// SMPTE Label prefix
    pub const SMPTE_PREFIX: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

    /// Generic Container essence container label prefix (byte 8 varies)
    pub const GC_LABEL_PREFIX: [u8; 12] = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01,
    ];

    /// Generic Container essence element key prefix (byte 8 varies)
    pub const GC_ELEMENT_PREFIX: [u8; 12] = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01,
    ];

    const fn partition(kind: u8, status: u8) -> Key {
        Key([
            0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, kind,
            status, 0x00,
        ])
    }

    /// Partition pack base (last 3 bytes vary)
    pub const PARTITION_PACK_BASE: Key = partition(0x00, 0x00);

    /// Header partition - open incomplete
    pub const HEADER_PARTITION_OPEN_INCOMPLETE: Key = partition(0x02, 0x01);
    /// Header partition - closed incomplete
    pub const HEADER_PARTITION_CLOSED_INCOMPLETE: Key = partition(0x02, 0x02);
    /// Header partition - open complete
    pub const HEADER_PARTITION_OPEN_COMPLETE: Key = partition(0x02, 0x03);
    /// Header partition - closed complete
    pub const HEADER_PARTITION_CLOSED_COMPLETE: Key = partition(0x02, 0x04);
    /// Body partition - open incomplete
    pub const BODY_PARTITION_OPEN_INCOMPLETE: Key = partition(0x03, 0x01);
    /// Body partition - closed incomplete
    pub const BODY_PARTITION_CLOSED_INCOMPLETE: Key = partition(0x03, 0x02);
    /// Body partition - open complete
    pub const BODY_PARTITION_OPEN_COMPLETE: Key = partition(0x03, 0x03);
    /// Body partition - closed complete
    pub const BODY_PARTITION_CLOSED_COMPLETE: Key = partition(0x03, 0x04);
    /// Footer partition - closed incomplete
    pub const FOOTER_PARTITION_CLOSED_INCOMPLETE: Key = partition(0x04, 0x02);
    /// Footer partition - closed complete
    pub const FOOTER_PARTITION_CLOSED_COMPLETE: Key = partition(0x04, 0x04);

    /// Primer pack
    pub const PRIMER_PACK: Key = partition(0x05, 0x01);

    /// Random index pack
    pub const RANDOM_INDEX_PACK: Key = partition(0x11, 0x01);

    /// Fill item
    pub const FILL_ITEM: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00,
        0x00,
    ]);

    /// Index table segment
    pub const INDEX_TABLE_SEGMENT: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01,
        0x00,
    ]);

    /// Archive system item, System Scheme 1 element carrying VITC and LTC
    pub const SYSTEM_ITEM_SS1: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x14, 0x02, 0x01,
        0x00,
    ]);

    /// Uncompressed picture element (count/type/number completed per track)
    pub const UNC_PICTURE_ELEMENT: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x15, 0x00, 0x00,
        0x00,
    ]);

    /// BWF sound element (count/type/number completed per track)
    pub const BWF_SOUND_ELEMENT: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x16, 0x00, 0x00,
        0x00,
    ]);

    // Operational patterns

    /// OP1a, internal essence, stream file, multi-track, uniform
    pub const OP_1A_QQ09: Key = Key([
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x09,
        0x00,
    ]);

    // Essence containers

    /// Multiple wrappings (interleaved picture and sound)
    pub const EC_MULTIPLE_WRAPPINGS: Key = generic_container_label(0x03, 0x02, 0x7F, 0x01, 0x00);

    /// SD uncompressed 625/50i 4:2:2 frame wrapped
    pub const EC_SD_UNC_625_50I_FRAME_WRAPPED: Key =
        generic_container_label(0x01, 0x02, 0x05, 0x01, 0x05);

    /// BWF frame wrapped
    pub const EC_BWF_FRAME_WRAPPED: Key = generic_container_label(0x01, 0x02, 0x06, 0x01, 0x00);

    // Data definitions

    const fn data_definition(b13: u8, b14: u8) -> Key {
        Key([
            0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, b13, b14, 0x00, 0x00,
            0x00,
        ])
    }

    /// Picture essence track
    pub const DDEF_PICTURE: Key = data_definition(0x02, 0x01);
    /// Sound essence track
    pub const DDEF_SOUND: Key = data_definition(0x02, 0x02);
    /// Data essence track
    pub const DDEF_DATA: Key = data_definition(0x02, 0x03);
    /// Timecode track
    pub const DDEF_TIMECODE: Key = data_definition(0x01, 0x01);
    /// Descriptive metadata track
    pub const DDEF_DESCRIPTIVE_METADATA: Key = data_definition(0x01, 0x10);

    /// Legacy (pre-registration) picture data definition written by Avid
    pub const DDEF_LEGACY_PICTURE: Key = Key([
        0x80, 0x7D, 0x00, 0x60, 0x08, 0x14, 0x3E, 0x6F, 0x6F, 0x3C, 0x8C, 0xE1, 0x6C, 0xEF, 0x11,
        0xD2,
    ]);
    /// Legacy sound data definition
    pub const DDEF_LEGACY_SOUND: Key = Key([
        0x80, 0x7D, 0x00, 0x60, 0x08, 0x14, 0x3E, 0x6F, 0x78, 0xE1, 0xEB, 0xE1, 0x6C, 0xEF, 0x11,
        0xD2,
    ]);
    /// Legacy timecode data definition
    pub const DDEF_LEGACY_TIMECODE: Key = Key([
        0x80, 0x7F, 0x00, 0x60, 0x08, 0x14, 0x3E, 0x6F, 0x7F, 0x27, 0x5E, 0x81, 0x77, 0xE5, 0x11,
        0xD2,
    ]);

    /// True for any known data definition label, registered or legacy.
    pub fn is_data_definition(key: &Key) -> bool {
        [
            DDEF_PICTURE,
            DDEF_SOUND,
            DDEF_DATA,
            DDEF_TIMECODE,
            DDEF_DESCRIPTIVE_METADATA,
        ]
        .iter()
        .any(|ddef| ddef.equals_ignoring_version(key))
            || [DDEF_LEGACY_PICTURE, DDEF_LEGACY_SOUND, DDEF_LEGACY_TIMECODE].contains(key)
    }

    /// True for picture data definitions, registered or legacy.
    pub fn is_picture(key: &Key) -> bool {
        DDEF_PICTURE.equals_ignoring_version(key) || *key == DDEF_LEGACY_PICTURE
    }

    /// True for sound data definitions, registered or legacy.
    pub fn is_sound(key: &Key) -> bool {
        DDEF_SOUND.equals_ignoring_version(key) || *key == DDEF_LEGACY_SOUND
    }

    /// True for timecode data definitions, registered or legacy.
    pub fn is_timecode(key: &Key) -> bool {
        DDEF_TIMECODE.equals_ignoring_version(key) || *key == DDEF_LEGACY_TIMECODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(
            labels::PRIMER_PACK.to_string(),
            "06.0e.2b.34.02.05.01.01.0d.01.02.01.01.05.01.00"
        );
        assert!(format!("{:?}", labels::FILL_ITEM).starts_with("Key(06.0e"));
    }

    #[test]
    fn test_partition_detection() {
        assert!(labels::HEADER_PARTITION_CLOSED_COMPLETE.is_partition_pack());
        assert!(labels::FOOTER_PARTITION_CLOSED_COMPLETE.is_partition_pack());
        assert!(!labels::PRIMER_PACK.is_partition_pack());
        assert!(!labels::RANDOM_INDEX_PACK.is_partition_pack());
        assert!(labels::BODY_PARTITION_OPEN_COMPLETE.matches_prefix(&labels::PARTITION_PACK_BASE, 13));
        assert!(!labels::BODY_PARTITION_OPEN_COMPLETE.matches_prefix(&labels::PARTITION_PACK_BASE, 16));
    }

    #[test]
    fn test_key_classification() {
        assert!(labels::PRIMER_PACK.is_primer_pack());
        assert!(labels::SYSTEM_ITEM_SS1.is_system_item());
        assert!(crate::model::sets::PREFACE.is_local_set());
        assert!(labels::SYSTEM_ITEM_SS1.is_local_set());
        assert!(!labels::FILL_ITEM.is_local_set());

        let video = complete_essence_element_key(&labels::UNC_PICTURE_ELEMENT, 1, 0x02, 1);
        assert!(video.is_gc_essence_element());
        assert!(!video.is_system_item());
    }

    #[test]
    fn test_fill_item_ignores_version() {
        let mut legacy_fill = labels::FILL_ITEM;
        legacy_fill.0[7] = 0x01;
        assert!(legacy_fill.is_fill_item());
    }

    #[test]
    fn test_essence_element_key_and_track_number() {
        let key = complete_essence_element_key(&labels::BWF_SOUND_ELEMENT, 4, BWF_FRAME_WRAPPED_EE_TYPE, 3);
        assert_eq!(&key.0[12..], &[0x16, 0x04, 0x01, 0x03]);
        assert_eq!(key.track_number(), 0x1604_0103);
        assert_eq!(
            essence_element_track_number(&labels::BWF_SOUND_ELEMENT, 4, BWF_FRAME_WRAPPED_EE_TYPE, 3),
            0x1604_0103
        );
    }

    #[test]
    fn test_generic_container_label() {
        assert!(is_generic_container_label(&labels::EC_BWF_FRAME_WRAPPED));
        assert!(is_generic_container_label(&labels::EC_MULTIPLE_WRAPPINGS));
        assert!(!is_generic_container_label(&labels::OP_1A_QQ09));
    }

    #[test]
    fn test_data_definitions() {
        assert!(labels::is_data_definition(&labels::DDEF_PICTURE));
        assert!(labels::is_data_definition(&labels::DDEF_LEGACY_SOUND));
        assert!(labels::is_picture(&labels::DDEF_LEGACY_PICTURE));
        assert!(!labels::is_sound(&labels::DDEF_PICTURE));
        assert!(!labels::is_data_definition(&labels::FILL_ITEM));
    }
}
