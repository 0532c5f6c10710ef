//! The item contract shared by every kind in the catalog
//!
//! Items never hold a pointer back to their file. Cross-references are typed
//! [`Handle`]s into the owning [`Section`]'s arena, resolved to an index or a
//! byte offset through the [`DexFile`] passed to `size_in_bytes` and
//! `write_to`. Decoding goes through a [`ReadContext`] that turns raw indices
//! and offsets from the byte stream into handles.

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{DexReader, DexWriter};
use crate::core::kind::ItemKind;
use crate::core::section::Section;
use ahash::AHashMap;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Sentinel for an absent 32-bit index reference.
pub const NO_INDEX: u32 = 0xffff_ffff;

/// Typed reference to an item held by a section.
///
/// A handle names an arena slot, not a position. It stays valid across
/// sorting and re-placement for the lifetime of its file.
pub struct Handle<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) const fn new(id: u32) -> Self {
        Handle {
            id,
            _marker: PhantomData,
        }
    }

    /// Arena slot of the referenced item.
    pub const fn id(self) -> u32 {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle#{}", self.id)
    }
}

/// Capabilities every item kind provides to the layout engine.
pub trait Item: Clone + Eq + Hash + fmt::Debug + Sized + 'static {
    /// Type tag of this kind.
    const KIND: ItemKind;

    /// Whether the kind defines a canonical order for `sort_section`.
    const SORTABLE: bool = false;

    /// The section of `file` that owns items of this kind.
    fn section(file: &DexFile) -> &Section<Self>;

    fn section_mut(file: &mut DexFile) -> &mut Section<Self>;

    /// Serialized size given the current content.
    ///
    /// May depend on the positions of referenced index items, which are
    /// always placed before any offsetted item is sized.
    fn size_in_bytes(&self, file: &DexFile) -> u32;

    fn write_to(&self, out: &mut DexWriter, file: &DexFile);

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self>;

    /// Panics if the content has no valid encoding. Checked on intern.
    fn assert_encodable(&self) {}

    /// Canonical ordering, only consulted when `SORTABLE` is true.
    fn canonical_cmp(&self, _other: &Self, _file: &DexFile) -> Ordering {
        Ordering::Equal
    }
}

/// Resolution state threaded through a whole-file decode.
///
/// Offset references are reserved on first sight, whether the referenced
/// section has been decoded yet or not; the owning section claims the same
/// slot when it decodes the item at that offset.
pub struct ReadContext {
    preserve_signed_registers: bool,
    offset_slots: AHashMap<(ItemKind, u32), u32>,
    slot_offsets: AHashMap<ItemKind, Vec<u32>>,
    max_index: AHashMap<ItemKind, u32>,
}

impl ReadContext {
    pub fn new(preserve_signed_registers: bool) -> Self {
        ReadContext {
            preserve_signed_registers,
            offset_slots: AHashMap::new(),
            slot_offsets: AHashMap::new(),
            max_index: AHashMap::new(),
        }
    }

    pub fn preserve_signed_registers(&self) -> bool {
        self.preserve_signed_registers
    }

    /// Reference by index into an index table.
    pub fn index<T: Item>(&mut self, index: u32) -> Handle<T> {
        let max = self.max_index.entry(T::KIND).or_insert(index);
        if index > *max {
            *max = index;
        }
        Handle::new(index)
    }

    /// Reference by index where [`NO_INDEX`] means absent.
    pub fn optional_index<T: Item>(&mut self, index: u32) -> Option<Handle<T>> {
        (index != NO_INDEX).then(|| self.index(index))
    }

    /// Reference by byte offset into a data section.
    pub fn offset<T: Item>(&mut self, offset: u32) -> Handle<T> {
        Handle::new(self.slot_for(T::KIND, offset))
    }

    /// Reference by byte offset where `0` means absent.
    pub fn optional_offset<T: Item>(&mut self, offset: u32) -> Option<Handle<T>> {
        (offset != 0).then(|| self.offset(offset))
    }

    pub(crate) fn slot_for(&mut self, kind: ItemKind, offset: u32) -> u32 {
        if let Some(slot) = self.offset_slots.get(&(kind, offset)) {
            return *slot;
        }
        let offsets = self.slot_offsets.entry(kind).or_default();
        let slot = offsets.len() as u32;
        offsets.push(offset);
        self.offset_slots.insert((kind, offset), slot);
        slot
    }

    /// Number of slots handed out for `kind` so far.
    pub(crate) fn slot_count(&self, kind: ItemKind) -> usize {
        self.slot_offsets.get(&kind).map_or(0, Vec::len)
    }

    pub(crate) fn slot_offset(&self, kind: ItemKind, slot: usize) -> u32 {
        self.slot_offsets
            .get(&kind)
            .and_then(|offsets| offsets.get(slot))
            .copied()
            .unwrap_or(0)
    }

    /// Fail if any slot of `kind` was reserved beyond the `decoded` items.
    pub(crate) fn check_offsets(&self, kind: ItemKind, decoded: usize) -> Result<()> {
        if self.slot_count(kind) > decoded {
            return Err(DexError::DanglingOffset {
                kind,
                offset: self.slot_offset(kind, decoded),
            });
        }
        Ok(())
    }

    /// Fail if any index into `kind` reached past `count`.
    pub(crate) fn check_indices(&self, kind: ItemKind, count: usize) -> Result<()> {
        match self.max_index.get(&kind) {
            Some(&index) if index as usize >= count => {
                Err(DexError::DanglingIndex { kind, index, count })
            }
            _ => Ok(()),
        }
    }
}
