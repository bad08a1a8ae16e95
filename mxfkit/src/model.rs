//! Header metadata dictionary: set keys and item definitions.
//!
//! Only the sets and items used by the archive writer and the reader are
//! listed. Items outside the dictionary are still read and written, with
//! dynamically allocated local tags.

use crate::ul::Key;

/// How an item value relates to other sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Plain value
    Value,
    /// Instance UID of an owned set
    StrongRef,
    /// Batch of instance UIDs of owned sets
    StrongRefArray,
    /// Instance UID of a set owned elsewhere
    WeakRef,
}

/// A dictionary item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDef {
    /// Item name
    pub name: &'static str,
    /// Item key
    pub key: Key,
    /// Static local tag
    pub tag: u16,
    /// Reference kind
    pub kind: ItemKind,
}

impl AsRef<Key> for ItemDef {
    fn as_ref(&self) -> &Key {
        &self.key
    }
}

const fn ul(tail: &[u8]) -> Key {
    let mut bytes = [0u8; 16];
    bytes[0] = 0x06;
    bytes[1] = 0x0E;
    bytes[2] = 0x2B;
    bytes[3] = 0x34;
    let mut i = 0;
    while i < tail.len() && i < 12 {
        bytes[4 + i] = tail[i];
        i += 1;
    }
    Key(bytes)
}

const fn item(name: &'static str, tag: u16, tail: &[u8], kind: ItemKind) -> ItemDef {
    ItemDef {
        name,
        key: ul(tail),
        tag,
        kind,
    }
}

/// Set keys
pub mod sets {
    use crate::ul::Key;

    const fn set_key(byte: u8) -> Key {
        Key([
            0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01,
            byte, 0x00,
        ])
    }

    pub const PREFACE: Key = set_key(0x2F);
    pub const IDENTIFICATION: Key = set_key(0x30);
    pub const CONTENT_STORAGE: Key = set_key(0x18);
    pub const ESSENCE_CONTAINER_DATA: Key = set_key(0x23);
    pub const MATERIAL_PACKAGE: Key = set_key(0x36);
    pub const SOURCE_PACKAGE: Key = set_key(0x37);
    pub const TRACK: Key = set_key(0x3B);
    pub const EVENT_TRACK: Key = set_key(0x39);
    pub const STATIC_TRACK: Key = set_key(0x3A);
    pub const SEQUENCE: Key = set_key(0x0F);
    pub const SOURCE_CLIP: Key = set_key(0x11);
    pub const TIMECODE_COMPONENT: Key = set_key(0x14);
    pub const DM_SEGMENT: Key = set_key(0x41);
    pub const CDCI_DESCRIPTOR: Key = set_key(0x28);
    pub const WAVE_DESCRIPTOR: Key = set_key(0x48);
    pub const MULTIPLE_DESCRIPTOR: Key = set_key(0x44);
    pub const DATA_DEFINITION: Key = set_key(0x1B);

    pub(crate) const NAMED: &[(Key, &str)] = &[
        (PREFACE, "Preface"),
        (IDENTIFICATION, "Identification"),
        (CONTENT_STORAGE, "Content Storage"),
        (ESSENCE_CONTAINER_DATA, "Essence Container Data"),
        (MATERIAL_PACKAGE, "Material Package"),
        (SOURCE_PACKAGE, "Source Package"),
        (TRACK, "Track"),
        (EVENT_TRACK, "Event Track"),
        (STATIC_TRACK, "Static Track"),
        (SEQUENCE, "Sequence"),
        (SOURCE_CLIP, "Source Clip"),
        (TIMECODE_COMPONENT, "Timecode Component"),
        (DM_SEGMENT, "DM Segment"),
        (CDCI_DESCRIPTOR, "CDCI Descriptor"),
        (WAVE_DESCRIPTOR, "Wave Audio Descriptor"),
        (MULTIPLE_DESCRIPTOR, "Multiple Descriptor"),
        (DATA_DEFINITION, "Data Definition"),
    ];

    /// True for material and source packages
    pub fn is_package(key: &Key) -> bool {
        [MATERIAL_PACKAGE, SOURCE_PACKAGE]
            .iter()
            .any(|k| k.equals_ignoring_version(key))
    }

    /// True for timeline, event and static tracks
    pub fn is_track(key: &Key) -> bool {
        [TRACK, EVENT_TRACK, STATIC_TRACK]
            .iter()
            .any(|k| k.equals_ignoring_version(key))
    }
}

/// Item definitions
pub mod items {
    use super::{item, ItemDef, ItemKind::*};

    // InterchangeObject
    pub const INSTANCE_UID: ItemDef = item("InstanceUID", 0x3C0A, &[1, 1, 1, 1, 1, 1, 0x15, 2], Value);
    pub const GENERATION_UID: ItemDef =
        item("GenerationUID", 0x0102, &[1, 1, 1, 2, 5, 0x20, 7, 1, 8], Value);

    // Preface
    pub const LAST_MODIFIED_DATE: ItemDef =
        item("LastModifiedDate", 0x3B02, &[1, 1, 1, 2, 7, 2, 1, 0x10, 2, 4], Value);
    pub const VERSION: ItemDef = item("Version", 0x3B05, &[1, 1, 1, 2, 3, 1, 2, 1, 5], Value);
    pub const IDENTIFICATIONS: ItemDef =
        item("Identifications", 0x3B06, &[1, 1, 1, 2, 6, 1, 1, 4, 6, 4], StrongRefArray);
    pub const CONTENT_STORAGE: ItemDef =
        item("ContentStorage", 0x3B03, &[1, 1, 1, 2, 6, 1, 1, 4, 2, 1], StrongRef);
    pub const OPERATIONAL_PATTERN: ItemDef =
        item("OperationalPattern", 0x3B09, &[1, 1, 1, 5, 1, 2, 2, 3], Value);
    pub const ESSENCE_CONTAINERS: ItemDef =
        item("EssenceContainers", 0x3B0A, &[1, 1, 1, 5, 1, 2, 2, 0x10, 2, 1], Value);
    pub const DM_SCHEMES: ItemDef =
        item("DMSchemes", 0x3B0B, &[1, 1, 1, 5, 1, 2, 2, 0x10, 2, 2], Value);

    // Identification
    pub const THIS_GENERATION_UID: ItemDef =
        item("ThisGenerationUID", 0x3C09, &[1, 1, 1, 2, 5, 0x20, 7, 1, 1], Value);
    pub const COMPANY_NAME: ItemDef =
        item("CompanyName", 0x3C01, &[1, 1, 1, 2, 5, 0x20, 7, 1, 2, 1], Value);
    pub const PRODUCT_NAME: ItemDef =
        item("ProductName", 0x3C02, &[1, 1, 1, 2, 5, 0x20, 7, 1, 3, 1], Value);
    pub const VERSION_STRING: ItemDef =
        item("VersionString", 0x3C04, &[1, 1, 1, 2, 5, 0x20, 7, 1, 5, 1], Value);
    pub const PRODUCT_UID: ItemDef =
        item("ProductUID", 0x3C05, &[1, 1, 1, 2, 5, 0x20, 7, 1, 7], Value);
    pub const MODIFICATION_DATE: ItemDef =
        item("ModificationDate", 0x3C06, &[1, 1, 1, 2, 7, 2, 1, 0x10, 2, 3], Value);
    pub const PLATFORM: ItemDef =
        item("Platform", 0x3C08, &[1, 1, 1, 2, 5, 0x20, 7, 1, 6, 1], Value);

    // ContentStorage
    pub const PACKAGES: ItemDef =
        item("Packages", 0x1901, &[1, 1, 1, 2, 6, 1, 1, 4, 5, 1], StrongRefArray);
    pub const ESSENCE_CONTAINER_DATA: ItemDef =
        item("EssenceContainerData", 0x1902, &[1, 1, 1, 2, 6, 1, 1, 4, 5, 2], StrongRefArray);

    // EssenceContainerData, index table segment
    pub const LINKED_PACKAGE_UID: ItemDef =
        item("LinkedPackageUID", 0x2701, &[1, 1, 1, 2, 6, 1, 1, 6, 1], Value);
    pub const INDEX_SID: ItemDef = item("IndexSID", 0x3F06, &[1, 1, 1, 4, 1, 3, 4, 5], Value);
    pub const BODY_SID: ItemDef = item("BodySID", 0x3F07, &[1, 1, 1, 4, 1, 3, 4, 4], Value);

    // GenericPackage
    pub const PACKAGE_UID: ItemDef = item("PackageUID", 0x4401, &[1, 1, 1, 1, 1, 1, 0x15, 0x10], Value);
    pub const NAME: ItemDef = item("Name", 0x4402, &[1, 1, 1, 1, 1, 3, 3, 2, 1], Value);
    pub const PACKAGE_CREATION_DATE: ItemDef =
        item("PackageCreationDate", 0x4405, &[1, 1, 1, 2, 7, 2, 1, 0x10, 1, 3], Value);
    pub const PACKAGE_MODIFIED_DATE: ItemDef =
        item("PackageModifiedDate", 0x4404, &[1, 1, 1, 2, 7, 2, 1, 0x10, 2, 5], Value);
    pub const TRACKS: ItemDef = item("Tracks", 0x4403, &[1, 1, 1, 2, 6, 1, 1, 4, 6, 5], StrongRefArray);

    // SourcePackage
    pub const DESCRIPTOR: ItemDef = item("Descriptor", 0x4701, &[1, 1, 1, 2, 6, 1, 1, 4, 2, 3], StrongRef);

    // GenericTrack
    pub const TRACK_ID: ItemDef = item("TrackID", 0x4801, &[1, 1, 1, 2, 1, 7, 1, 1], Value);
    pub const TRACK_NUMBER: ItemDef = item("TrackNumber", 0x4804, &[1, 1, 1, 2, 1, 4, 1, 3], Value);
    pub const TRACK_NAME: ItemDef = item("TrackName", 0x4802, &[1, 1, 1, 2, 1, 7, 1, 2, 1], Value);
    pub const SEQUENCE: ItemDef = item("Sequence", 0x4803, &[1, 1, 1, 2, 6, 1, 1, 4, 2, 4], StrongRef);

    // Track
    pub const EDIT_RATE: ItemDef = item("EditRate", 0x4B01, &[1, 1, 1, 2, 5, 0x30, 4, 5], Value);
    pub const ORIGIN: ItemDef = item("Origin", 0x4B02, &[1, 1, 1, 2, 7, 2, 1, 3, 1, 3], Value);

    // EventTrack
    pub const EVENT_EDIT_RATE: ItemDef =
        item("EventEditRate", 0x4901, &[1, 1, 1, 2, 5, 0x30, 4, 2], Value);
    pub const EVENT_ORIGIN: ItemDef =
        item("EventOrigin", 0x4902, &[1, 1, 1, 5, 7, 2, 1, 3, 1, 0x0B], Value);

    // StructuralComponent
    pub const DATA_DEFINITION: ItemDef = item("DataDefinition", 0x0201, &[1, 1, 1, 2, 4, 7, 1], Value);
    pub const DURATION: ItemDef = item("Duration", 0x0202, &[1, 1, 1, 2, 7, 2, 2, 1, 1, 3], Value);

    // Sequence
    pub const STRUCTURAL_COMPONENTS: ItemDef =
        item("StructuralComponents", 0x1001, &[1, 1, 1, 2, 6, 1, 1, 4, 6, 9], StrongRefArray);

    // SourceClip
    pub const START_POSITION: ItemDef =
        item("StartPosition", 0x1201, &[1, 1, 1, 2, 7, 2, 1, 3, 1, 4], Value);
    pub const SOURCE_PACKAGE_ID: ItemDef =
        item("SourcePackageID", 0x1101, &[1, 1, 1, 2, 6, 1, 1, 3, 1], Value);
    pub const SOURCE_TRACK_ID: ItemDef =
        item("SourceTrackID", 0x1102, &[1, 1, 1, 2, 6, 1, 1, 3, 2], Value);

    // TimecodeComponent
    pub const START_TIMECODE: ItemDef =
        item("StartTimecode", 0x1501, &[1, 1, 1, 2, 7, 2, 1, 3, 1, 5], Value);
    pub const ROUNDED_TIMECODE_BASE: ItemDef =
        item("RoundedTimecodeBase", 0x1502, &[1, 1, 1, 2, 4, 4, 1, 1, 2, 6], Value);
    pub const DROP_FRAME: ItemDef = item("DropFrame", 0x1503, &[1, 1, 1, 1, 4, 4, 1, 1, 5], Value);

    // DMSegment
    pub const EVENT_START_POSITION: ItemDef =
        item("EventStartPosition", 0x0601, &[1, 1, 1, 2, 7, 2, 1, 3, 3, 3], Value);
    pub const EVENT_COMMENT: ItemDef =
        item("EventComment", 0x0602, &[1, 1, 1, 2, 5, 0x30, 4, 4, 1], Value);

    // FileDescriptor
    pub const LINKED_TRACK_ID: ItemDef =
        item("LinkedTrackID", 0x3006, &[1, 1, 1, 5, 6, 1, 1, 3, 5], Value);
    pub const SAMPLE_RATE: ItemDef = item("SampleRate", 0x3001, &[1, 1, 1, 1, 4, 6, 1, 1], Value);
    pub const CONTAINER_DURATION: ItemDef =
        item("ContainerDuration", 0x3002, &[1, 1, 1, 1, 4, 6, 1, 2], Value);
    pub const ESSENCE_CONTAINER: ItemDef =
        item("EssenceContainer", 0x3004, &[1, 1, 1, 2, 6, 1, 1, 4, 1, 2], Value);

    // GenericPictureEssenceDescriptor
    pub const FRAME_LAYOUT: ItemDef = item("FrameLayout", 0x320C, &[1, 1, 1, 1, 4, 1, 3, 1, 4], Value);
    pub const STORED_WIDTH: ItemDef = item("StoredWidth", 0x3203, &[1, 1, 1, 1, 4, 1, 5, 2, 2], Value);
    pub const STORED_HEIGHT: ItemDef = item("StoredHeight", 0x3202, &[1, 1, 1, 1, 4, 1, 5, 2, 1], Value);
    pub const ASPECT_RATIO: ItemDef = item("AspectRatio", 0x320E, &[1, 1, 1, 1, 4, 1, 1, 1, 1], Value);
    pub const VIDEO_LINE_MAP: ItemDef = item("VideoLineMap", 0x320D, &[1, 1, 1, 2, 4, 1, 3, 2, 5], Value);

    // CDCIEssenceDescriptor
    pub const COMPONENT_DEPTH: ItemDef =
        item("ComponentDepth", 0x3301, &[1, 1, 1, 2, 4, 1, 5, 3, 0x0A], Value);
    pub const HORIZONTAL_SUBSAMPLING: ItemDef =
        item("HorizontalSubsampling", 0x3302, &[1, 1, 1, 1, 4, 1, 5, 1, 5], Value);
    pub const VERTICAL_SUBSAMPLING: ItemDef =
        item("VerticalSubsampling", 0x3308, &[1, 1, 1, 2, 4, 1, 5, 1, 0x10], Value);

    // GenericSoundEssenceDescriptor
    pub const AUDIO_SAMPLING_RATE: ItemDef =
        item("AudioSamplingRate", 0x3D03, &[1, 1, 1, 5, 4, 2, 3, 1, 1, 1], Value);
    pub const LOCKED: ItemDef = item("Locked", 0x3D02, &[1, 1, 1, 4, 4, 2, 3, 1, 4], Value);
    pub const CHANNEL_COUNT: ItemDef = item("ChannelCount", 0x3D07, &[1, 1, 1, 5, 4, 2, 1, 1, 4], Value);
    pub const QUANTIZATION_BITS: ItemDef =
        item("QuantizationBits", 0x3D01, &[1, 1, 1, 4, 4, 2, 3, 3, 4], Value);

    // WaveAudioDescriptor
    pub const BLOCK_ALIGN: ItemDef = item("BlockAlign", 0x3D0A, &[1, 1, 1, 5, 4, 2, 3, 2, 1], Value);
    pub const AVG_BPS: ItemDef = item("AvgBps", 0x3D09, &[1, 1, 1, 5, 4, 2, 3, 3, 5], Value);

    // MultipleDescriptor
    pub const SUB_DESCRIPTOR_UIDS: ItemDef =
        item("SubDescriptorUIDs", 0x3F01, &[1, 1, 1, 4, 6, 1, 1, 4, 6, 0x0B], StrongRefArray);

    // DefinitionObject
    pub const IDENTIFICATION: ItemDef =
        item("Identification", 0x1B02, &[1, 1, 1, 2, 1, 1, 0x15, 3], Value);

    // IndexTableSegment
    pub const INDEX_EDIT_RATE: ItemDef =
        item("IndexEditRate", 0x3F0B, &[1, 1, 1, 5, 5, 0x30, 4, 6], Value);
    pub const INDEX_START_POSITION: ItemDef =
        item("IndexStartPosition", 0x3F0C, &[1, 1, 1, 5, 7, 2, 1, 3, 1, 0x0A], Value);
    pub const INDEX_DURATION: ItemDef =
        item("IndexDuration", 0x3F0D, &[1, 1, 1, 5, 7, 2, 2, 1, 1, 2], Value);
    pub const EDIT_UNIT_BYTE_COUNT: ItemDef =
        item("EditUnitByteCount", 0x3F05, &[1, 1, 1, 4, 4, 6, 2, 1], Value);
    pub const SLICE_COUNT: ItemDef = item("SliceCount", 0x3F08, &[1, 1, 1, 4, 4, 4, 4, 1, 1], Value);
    pub const POS_TABLE_COUNT: ItemDef =
        item("PosTableCount", 0x3F0E, &[1, 1, 1, 5, 4, 4, 4, 1, 7], Value);
    pub const DELTA_ENTRY_ARRAY: ItemDef =
        item("DeltaEntryArray", 0x3F09, &[1, 1, 1, 5, 4, 4, 4, 1, 6], Value);
    pub const INDEX_ENTRY_ARRAY: ItemDef =
        item("IndexEntryArray", 0x3F0A, &[1, 1, 1, 5, 4, 4, 4, 2, 5], Value);

    pub(crate) const ALL: &[ItemDef] = &[
        INSTANCE_UID,
        GENERATION_UID,
        LAST_MODIFIED_DATE,
        VERSION,
        IDENTIFICATIONS,
        CONTENT_STORAGE,
        OPERATIONAL_PATTERN,
        ESSENCE_CONTAINERS,
        DM_SCHEMES,
        THIS_GENERATION_UID,
        COMPANY_NAME,
        PRODUCT_NAME,
        VERSION_STRING,
        PRODUCT_UID,
        MODIFICATION_DATE,
        PLATFORM,
        PACKAGES,
        ESSENCE_CONTAINER_DATA,
        LINKED_PACKAGE_UID,
        INDEX_SID,
        BODY_SID,
        PACKAGE_UID,
        NAME,
        PACKAGE_CREATION_DATE,
        PACKAGE_MODIFIED_DATE,
        TRACKS,
        DESCRIPTOR,
        TRACK_ID,
        TRACK_NUMBER,
        TRACK_NAME,
        SEQUENCE,
        EDIT_RATE,
        ORIGIN,
        EVENT_EDIT_RATE,
        EVENT_ORIGIN,
        DATA_DEFINITION,
        DURATION,
        STRUCTURAL_COMPONENTS,
        START_POSITION,
        SOURCE_PACKAGE_ID,
        SOURCE_TRACK_ID,
        START_TIMECODE,
        ROUNDED_TIMECODE_BASE,
        DROP_FRAME,
        EVENT_START_POSITION,
        EVENT_COMMENT,
        LINKED_TRACK_ID,
        SAMPLE_RATE,
        CONTAINER_DURATION,
        ESSENCE_CONTAINER,
        FRAME_LAYOUT,
        STORED_WIDTH,
        STORED_HEIGHT,
        ASPECT_RATIO,
        VIDEO_LINE_MAP,
        COMPONENT_DEPTH,
        HORIZONTAL_SUBSAMPLING,
        VERTICAL_SUBSAMPLING,
        AUDIO_SAMPLING_RATE,
        LOCKED,
        CHANNEL_COUNT,
        QUANTIZATION_BITS,
        BLOCK_ALIGN,
        AVG_BPS,
        SUB_DESCRIPTOR_UIDS,
        IDENTIFICATION,
        INDEX_EDIT_RATE,
        INDEX_START_POSITION,
        INDEX_DURATION,
        EDIT_UNIT_BYTE_COUNT,
        SLICE_COUNT,
        POS_TABLE_COUNT,
        DELTA_ENTRY_ARRAY,
        INDEX_ENTRY_ARRAY,
    ];
}

/// Look up a dictionary item by key (registry version ignored)
pub fn item_def(key: &Key) -> Option<&'static ItemDef> {
    items::ALL.iter().find(|def| def.key.equals_ignoring_version(key))
}

/// Static local tag of a dictionary item
pub fn static_tag(key: &Key) -> Option<u16> {
    item_def(key).map(|def| def.tag)
}

/// Reference kind of an item; items outside the dictionary are plain values
pub fn item_kind(key: &Key) -> ItemKind {
    item_def(key).map_or(ItemKind::Value, |def| def.kind)
}

/// Name of a known set key
pub fn set_name(key: &Key) -> Option<&'static str> {
    sets::NAMED
        .iter()
        .find(|(set_key, _)| set_key.equals_ignoring_version(key))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_item_keys() {
        assert_eq!(
            items::INSTANCE_UID.key.to_string(),
            "06.0e.2b.34.01.01.01.01.01.01.15.02.00.00.00.00"
        );
        assert_eq!(
            items::INDEX_ENTRY_ARRAY.key.to_string(),
            "06.0e.2b.34.01.01.01.05.04.04.04.02.05.00.00.00"
        );
    }

    #[test]
    fn test_tags_and_keys_are_unique() {
        let tags: HashSet<u16> = items::ALL.iter().map(|def| def.tag).collect();
        assert_eq!(tags.len(), items::ALL.len());
        let keys: HashSet<Key> = items::ALL.iter().map(|def| def.key).collect();
        assert_eq!(keys.len(), items::ALL.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(static_tag(&items::TRACK_ID.key), Some(0x4801));
        assert_eq!(item_kind(&items::TRACKS.key), ItemKind::StrongRefArray);
        assert_eq!(item_kind(&items::SOURCE_PACKAGE_ID.key), ItemKind::Value);
        assert_eq!(static_tag(&sets::PREFACE), None);

        let mut other_version = items::DURATION.key;
        other_version.0[7] = 0x01;
        assert_eq!(static_tag(&other_version), Some(0x0202));
    }

    #[test]
    fn test_set_classification() {
        assert_eq!(set_name(&sets::SOURCE_CLIP), Some("Source Clip"));
        assert!(sets::is_package(&sets::SOURCE_PACKAGE));
        assert!(sets::is_track(&sets::EVENT_TRACK));
        assert!(!sets::is_track(&sets::SEQUENCE));
    }
}
