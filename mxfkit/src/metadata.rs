//! Header metadata: an arena of local sets linked by instance UID.
//!
//! Every set is owned by [`HeaderMetadata`] and addressed by a [`SetId`].
//! Strong and weak references are stored as the target's instance UID and
//! resolved through the arena, so reference cycles need no special care
//! beyond the worklist in [`HeaderMetadata::walk_strong_references`].

use crate::error::{MxfError, Result};
use crate::item::{read_array, write_array, ItemValue};
use crate::klv::{self, LocalItems, DEFAULT_LLEN};
use crate::model::{self, items, sets};
use crate::primer::PrimerPack;
use crate::types::Umid;
use crate::ul::{labels, Key};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Seek, Write};
use tracing::{debug, warn};
use uuid::Uuid;

/// Index of a set in its [`HeaderMetadata`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(usize);

impl SetId {
    /// Position in arena order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A header metadata set: key, instance UID and items in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSet {
    key: Key,
    instance_uid: Uuid,
    items: Vec<(Key, Vec<u8>)>,
}

impl MetadataSet {
    /// Set key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Instance UID
    pub fn instance_uid(&self) -> Uuid {
        self.instance_uid
    }

    /// Items in insertion order
    pub fn items(&self) -> impl Iterator<Item = (&Key, &[u8])> {
        self.items.iter().map(|(key, value)| (key, value.as_slice()))
    }

    /// Raw bytes of an item
    pub fn item(&self, key: &Key) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|(item_key, _)| item_key == key)
            .map(|(_, value)| value.as_slice())
    }

    fn put(&mut self, key: Key, value: Vec<u8>) {
        match self.items.iter_mut().find(|(item_key, _)| *item_key == key) {
            Some((_, existing)) => *existing = value,
            None => self.items.push((key, value)),
        }
    }
}

/// Header metadata graph plus the primer describing its local tags.
#[derive(Debug, Clone, Default)]
pub struct HeaderMetadata {
    sets: Vec<MetadataSet>,
    by_uid: HashMap<Uuid, SetId>,
    primer: PrimerPack,
}

impl HeaderMetadata {
    /// Create empty header metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True when there are no sets
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// The primer pack used for the last read or write
    pub fn primer(&self) -> &PrimerPack {
        &self.primer
    }

    /// Create a set with a fresh instance UID.
    pub fn create_set(&mut self, key: Key) -> SetId {
        let mut uid = Uuid::new_v4();
        while self.by_uid.contains_key(&uid) {
            uid = Uuid::new_v4();
        }
        self.insert_set(key, uid)
    }

    fn insert_set(&mut self, key: Key, instance_uid: Uuid) -> SetId {
        let id = SetId(self.sets.len());
        self.sets.push(MetadataSet {
            key,
            instance_uid,
            items: vec![(items::INSTANCE_UID.key, instance_uid.as_bytes().to_vec())],
        });
        self.by_uid.insert(instance_uid, id);
        id
    }

    /// Access a set
    pub fn set(&self, id: SetId) -> &MetadataSet {
        &self.sets[id.0]
    }

    /// All sets in arena order
    pub fn sets(&self) -> impl Iterator<Item = (SetId, &MetadataSet)> {
        self.sets.iter().enumerate().map(|(i, set)| (SetId(i), set))
    }

    /// Sets whose key matches `key` (registry version ignored)
    pub fn find_sets(&self, key: &Key) -> Vec<SetId> {
        self.sets()
            .filter(|(_, set)| set.key.equals_ignoring_version(key))
            .map(|(id, _)| id)
            .collect()
    }

    /// Set with the given instance UID
    pub fn dereference(&self, uid: &Uuid) -> Result<SetId> {
        self.by_uid
            .get(uid)
            .copied()
            .ok_or(MxfError::DanglingReference { uuid: *uid })
    }

    /// Store raw item bytes.
    ///
    /// Setting the InstanceUID item re-keys the set.
    pub fn set_item(&mut self, id: SetId, item: impl AsRef<Key>, value: Vec<u8>) -> Result<()> {
        let key = *item.as_ref();
        if key.equals_ignoring_version(&items::INSTANCE_UID.key) {
            let uid = Uuid::read_value(&key, &value)?;
            let old = self.sets[id.0].instance_uid;
            if uid != old {
                if self.by_uid.contains_key(&uid) {
                    return Err(MxfError::invalid_item(key, format!("duplicate instance UID {}", uid)));
                }
                self.by_uid.remove(&old);
                self.by_uid.insert(uid, id);
                self.sets[id.0].instance_uid = uid;
            }
        }
        self.sets[id.0].put(key, value);
        Ok(())
    }

    /// Raw item bytes
    pub fn get_item(&self, id: SetId, item: impl AsRef<Key>) -> Result<&[u8]> {
        let set = &self.sets[id.0];
        set.item(item.as_ref()).ok_or(MxfError::MissingItem {
            set: set.key,
            item: *item.as_ref(),
        })
    }

    /// True when the set has the item
    pub fn have_item(&self, id: SetId, item: impl AsRef<Key>) -> bool {
        self.sets[id.0].item(item.as_ref()).is_some()
    }

    /// Decode an item
    pub fn get<T: ItemValue>(&self, id: SetId, item: impl AsRef<Key>) -> Result<T> {
        let bytes = self.get_item(id, item.as_ref())?;
        T::read_value(item.as_ref(), bytes)
    }

    /// Decode an item that may be absent
    pub fn get_optional<T: ItemValue>(&self, id: SetId, item: impl AsRef<Key>) -> Result<Option<T>> {
        match self.sets[id.0].item(item.as_ref()) {
            Some(bytes) => T::read_value(item.as_ref(), bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and store an item
    pub fn set_value<T: ItemValue>(&mut self, id: SetId, item: impl AsRef<Key>, value: &T) -> Result<()> {
        self.set_item(id, item, value.to_item_bytes())
    }

    /// Decode an array or batch item
    pub fn get_array<T: ItemValue>(&self, id: SetId, item: impl AsRef<Key>) -> Result<Vec<T>> {
        let bytes = self.get_item(id, item.as_ref())?;
        read_array(item.as_ref(), bytes)
    }

    /// Encode and store an array or batch item
    pub fn set_array<T: ItemValue>(&mut self, id: SetId, item: impl AsRef<Key>, values: &[T]) -> Result<()> {
        let bytes = write_array(values)?;
        self.set_item(id, item, bytes)
    }

    /// Append to an array item, creating it when absent
    pub fn append_array_element<T: ItemValue>(
        &mut self,
        id: SetId,
        item: impl AsRef<Key>,
        value: T,
    ) -> Result<()> {
        let mut values: Vec<T> = if self.have_item(id, item.as_ref()) {
            self.get_array(id, item.as_ref())?
        } else {
            Vec::new()
        };
        values.push(value);
        self.set_array(id, item, &values)
    }

    /// Store a reference to `target`
    pub fn set_strong_ref(&mut self, id: SetId, item: impl AsRef<Key>, target: SetId) -> Result<()> {
        let uid = self.sets[target.0].instance_uid;
        self.set_value(id, item, &uid)
    }

    /// Append a reference to `target` to a batch
    pub fn add_strong_ref(&mut self, id: SetId, item: impl AsRef<Key>, target: SetId) -> Result<()> {
        let uid = self.sets[target.0].instance_uid;
        self.append_array_element(id, item, uid)
    }

    /// Resolve a single reference item
    pub fn get_strong_ref(&self, id: SetId, item: impl AsRef<Key>) -> Result<SetId> {
        let uid: Uuid = self.get(id, item)?;
        self.dereference(&uid)
    }

    /// Resolve a batch of references
    pub fn get_strong_ref_array(&self, id: SetId, item: impl AsRef<Key>) -> Result<Vec<SetId>> {
        self.get_array::<Uuid>(id, item)?
            .iter()
            .map(|uid| self.dereference(uid))
            .collect()
    }

    /// All sets reachable from `root` through strong references, `root`
    /// first, each set once.
    pub fn walk_strong_references(&self, root: SetId) -> Result<Vec<SetId>> {
        let mut visited = HashSet::from([root]);
        let mut order = Vec::new();
        let mut worklist = VecDeque::from([root]);

        while let Some(id) = worklist.pop_front() {
            order.push(id);
            for (key, bytes) in self.sets[id.0].items() {
                let targets = match model::item_kind(key) {
                    model::ItemKind::StrongRef => vec![Uuid::read_value(key, bytes)?],
                    model::ItemKind::StrongRefArray => read_array::<Uuid>(key, bytes)?,
                    _ => continue,
                };
                for uid in targets {
                    let target = self.dereference(&uid)?;
                    if visited.insert(target) {
                        worklist.push_back(target);
                    }
                }
            }
        }

        Ok(order)
    }

    /// DataDefinition label of a component or track sequence.
    ///
    /// Some Avid files store the instance UID of a DefinitionObject set in
    /// place of the label; that set's Identification is returned instead.
    pub fn data_definition(&self, id: SetId) -> Result<Key> {
        let stored: Key = self.get(id, items::DATA_DEFINITION)?;
        if labels::is_data_definition(&stored) {
            return Ok(stored);
        }

        let uid = Uuid::from_bytes(stored.0);
        match self.by_uid.get(&uid) {
            Some(&def) if self.sets[def.0].key.equals_ignoring_version(&sets::DATA_DEFINITION) => {
                self.get(def, items::IDENTIFICATION)
            }
            _ => Ok(stored),
        }
    }

    /// The preface set
    pub fn preface(&self) -> Result<SetId> {
        self.find_sets(&sets::PREFACE)
            .first()
            .copied()
            .ok_or_else(|| MxfError::missing_set("Preface"))
    }

    /// Packages listed by the content storage
    pub fn packages(&self) -> Result<Vec<SetId>> {
        let preface = self.preface()?;
        let storage = self.get_strong_ref(preface, items::CONTENT_STORAGE)?;
        self.get_strong_ref_array(storage, items::PACKAGES)
    }

    /// Essence container data sets listed by the content storage
    pub fn essence_container_data(&self) -> Result<Vec<SetId>> {
        let preface = self.preface()?;
        let storage = self.get_strong_ref(preface, items::CONTENT_STORAGE)?;
        if !self.have_item(storage, items::ESSENCE_CONTAINER_DATA) {
            return Ok(Vec::new());
        }
        self.get_strong_ref_array(storage, items::ESSENCE_CONTAINER_DATA)
    }

    /// The first material package
    pub fn material_package(&self) -> Result<SetId> {
        self.packages()?
            .into_iter()
            .find(|&id| self.sets[id.0].key.equals_ignoring_version(&sets::MATERIAL_PACKAGE))
            .ok_or_else(|| MxfError::missing_set("Material Package"))
    }

    /// Source package with the given package UID
    pub fn source_package_by_uid(&self, uid: &Umid) -> Result<Option<SetId>> {
        for id in self.packages()? {
            if !self.sets[id.0].key.equals_ignoring_version(&sets::SOURCE_PACKAGE) {
                continue;
            }
            if self.get::<Umid>(id, items::PACKAGE_UID)? == *uid {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Tracks of a package
    pub fn tracks_of(&self, package: SetId) -> Result<Vec<SetId>> {
        self.get_strong_ref_array(package, items::TRACKS)
    }

    /// Register the local tag of every item of every set.
    ///
    /// Dictionary items keep their static tag; everything else gets a
    /// dynamic one.
    pub fn register_primer_entries(&mut self) -> Result<()> {
        for set in &self.sets {
            for (key, _) in &set.items {
                let tag = model::static_tag(key).unwrap_or(0);
                self.primer.register(*key, tag)?;
            }
        }
        Ok(())
    }

    /// Write the primer pack followed by every set, returning the bytes written.
    pub fn write<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        self.register_primer_entries()?;
        let mut written = self.primer.write(writer)?;

        for set in &self.sets {
            let mut value = Vec::new();
            for (key, bytes) in &set.items {
                let tag = self.primer.resolve_tag(key).ok_or_else(|| {
                    MxfError::invalid_state(format!("item {} has no local tag", key))
                })?;
                klv::write_local_item(&mut value, tag, bytes)?;
            }
            klv::write_fixed_kl(writer, &set.key, DEFAULT_LLEN, value.len() as u64)?;
            writer.write_all(&value)?;
            written += 16 + DEFAULT_LLEN as u64 + value.len() as u64;
        }

        debug!(sets = self.sets.len(), bytes = written, "wrote header metadata");
        Ok(written)
    }

    /// Read the primer pack and sets from the current position.
    ///
    /// Reading stops after `header_byte_count` bytes. Fill items, and sets
    /// without an instance UID, are skipped.
    pub fn read<R: Read + Seek>(reader: &mut R, header_byte_count: u64) -> Result<Self> {
        let start = reader.stream_position()?;
        let end = start + header_byte_count;

        let primer_kl = klv::read_next_nonfiller_kl(reader)?;
        if !primer_kl.key.is_primer_pack() {
            return Err(MxfError::KeyMismatch {
                expected: labels::PRIMER_PACK,
                found: primer_kl.key,
            });
        }
        let primer = PrimerPack::read(reader, primer_kl.len)?;

        let mut metadata = HeaderMetadata {
            primer,
            ..Self::default()
        };

        while reader.stream_position()? < end {
            let header = klv::read_kl(reader)?;
            if header.key.is_fill_item() || !header.key.is_local_set() {
                debug!(key = %header.key, len = header.len, "skipping KLV in header metadata");
                klv::skip(reader, header.len)?;
                continue;
            }

            let value = klv::read_value(reader, header.len)?;
            metadata.read_set(header.key, &value)?;
        }

        debug!(sets = metadata.len(), "read header metadata");
        Ok(metadata)
    }

    fn read_set(&mut self, key: Key, value: &[u8]) -> Result<()> {
        let mut decoded = Vec::new();
        let mut instance_uid = None;

        for entry in LocalItems::new(value) {
            let (tag, bytes) = entry?;
            let item_key = self.primer.resolve(tag)?;
            if item_key.equals_ignoring_version(&items::INSTANCE_UID.key) {
                instance_uid = Some(Uuid::read_value(&item_key, bytes)?);
            }
            decoded.push((item_key, bytes.to_vec()));
        }

        let Some(instance_uid) = instance_uid else {
            debug!(%key, "skipping set without instance UID");
            return Ok(());
        };
        if self.by_uid.contains_key(&instance_uid) {
            let set = model::set_name(&key).unwrap_or("unknown set");
            warn!(set, uid = %instance_uid, "ignoring set with duplicate instance UID");
            return Ok(());
        }

        let id = SetId(self.sets.len());
        self.sets.push(MetadataSet {
            key,
            instance_uid,
            items: decoded,
        });
        self.by_uid.insert(instance_uid, id);
        Ok(())
    }
}
