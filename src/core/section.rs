//! Sections: ordered, growable collections of same-kind items
//!
//! A [`Section`] keeps its items in an arena addressed by [`Handle`] and a
//! separate placement order. Sorting and dependency ordering only rewrite
//! the order, so handles held elsewhere stay valid. Placement is split into
//! [`Section::layout`], which needs read access to the whole file to size
//! items, and [`Section::apply`], which records the result.

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{align_up, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::kind::ItemKind;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Placement summary for one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStats {
    pub kind: ItemKind,
    pub count: usize,
    pub offset: Option<u32>,
    pub byte_size: u32,
}

/// Kind-erased view of a section, for lookups by type tag
pub trait SectionInfo {
    fn kind(&self) -> ItemKind;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Placed start offset, `None` while unplaced or empty.
    fn offset(&self) -> Option<u32>;

    /// Bytes spanned from the first item through the end of the last.
    fn byte_size(&self) -> u32;

    /// Assigned position of every item, in placement order.
    ///
    /// Index kinds report indices; data kinds report byte offsets.
    fn positions(&self) -> Vec<Option<u32>>;

    fn stats(&self) -> SectionStats {
        SectionStats {
            kind: self.kind(),
            count: self.len(),
            offset: self.offset(),
            byte_size: self.byte_size(),
        }
    }
}

/// Result of a placement walk, not yet recorded on the section
#[derive(Debug, Clone)]
pub struct SectionLayout {
    pub offset: Option<u32>,
    /// Position of each item, parallel to the section order.
    pub positions: Vec<u32>,
    /// First free offset after the section.
    pub next: u32,
    pub byte_size: u32,
}

#[derive(Debug, Clone)]
pub struct Section<T: Item> {
    /// Arena, addressed by handle id.
    items: Vec<T>,

    /// Placement order as arena ids.
    order: Vec<u32>,

    /// Assigned position per arena id.
    positions: Vec<Option<u32>>,

    /// Structural content -> arena id.
    interned: AHashMap<T, u32>,

    offset: Option<u32>,
    byte_size: u32,
}

impl<T: Item> Default for Section<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> Section<T> {
    pub fn new() -> Self {
        Section {
            items: Vec::new(),
            order: Vec::new(),
            positions: Vec::new(),
            interned: AHashMap::new(),
            offset: None,
            byte_size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve a handle. Panics if the handle belongs to another file.
    pub fn get(&self, handle: Handle<T>) -> &T {
        &self.items[handle.id() as usize]
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.id() as usize)
    }

    /// Handles in current placement order.
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.order.iter().map(|&id| Handle::new(id))
    }

    /// Items in current placement order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.order.iter().map(|&id| &self.items[id as usize])
    }

    /// Assigned index or offset, `None` before placement.
    pub fn position_of(&self, handle: Handle<T>) -> Option<u32> {
        self.positions.get(handle.id() as usize).copied().flatten()
    }

    /// The existing handle for content structurally equal to `item`.
    pub fn find(&self, item: &T) -> Option<Handle<T>> {
        self.interned.get(item).map(|&id| Handle::new(id))
    }

    /// Return the canonical handle for `item`'s content, adding it if new.
    pub(crate) fn intern(&mut self, item: T) -> Handle<T> {
        if let Some(&id) = self.interned.get(&item) {
            return Handle::new(id);
        }
        let id = self.items.len() as u32;
        self.interned.insert(item.clone(), id);
        self.items.push(item);
        self.order.push(id);
        self.positions.push(None);
        Handle::new(id)
    }

    /// Append without deduplication. Used for the header and map singletons.
    pub(crate) fn push(&mut self, item: T) -> Handle<T> {
        let id = self.items.len() as u32;
        self.items.push(item);
        self.order.push(id);
        self.positions.push(None);
        Handle::new(id)
    }

    /// Mutable access for singletons that are never interned.
    pub(crate) fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.id() as usize]
    }

    /// Decode exactly `count` items from the reader's cursor, in file order.
    ///
    /// Replaces any previous content. Data items claim the slot that earlier
    /// references to their offset already reserved in `ctx`.
    pub(crate) fn read_from(
        &mut self,
        count: usize,
        input: &mut DexReader<'_>,
        ctx: &mut ReadContext,
    ) -> Result<()> {
        let kind = T::KIND;
        *self = Section::new();
        let start = input.position() as u32;

        if kind.is_indexed() {
            for index in 0..count as u32 {
                let item = T::decode(input, ctx)?;
                self.items.push(item);
                self.order.push(index);
                self.positions.push(Some(index));
            }
        } else {
            let mut staged: Vec<Option<(T, u32)>> = Vec::new();
            for _ in 0..count {
                input.align(kind.alignment())?;
                let offset = input.position() as u32;
                let item = T::decode(input, ctx)?;
                let slot = ctx.slot_for(kind, offset) as usize;
                if staged.len() <= slot {
                    staged.resize_with(slot + 1, || None);
                }
                staged[slot] = Some((item, offset));
                self.order.push(slot as u32);
            }
            staged.resize_with(staged.len().max(ctx.slot_count(kind)), || None);

            for (slot, entry) in staged.into_iter().enumerate() {
                let (item, offset) = entry.ok_or_else(|| DexError::DanglingOffset {
                    kind,
                    offset: ctx.slot_offset(kind, slot),
                })?;
                self.items.push(item);
                self.positions.push(Some(offset));
            }
        }

        if count > 0 {
            let first = self.order[0] as usize;
            let base = if kind.is_indexed() {
                start
            } else {
                self.positions[first].unwrap_or(start)
            };
            self.offset = Some(base);
            self.byte_size = input.position() as u32 - base;
        }

        for (id, item) in self.items.iter().enumerate() {
            self.interned.entry(item.clone()).or_insert(id as u32);
        }
        Ok(())
    }

    /// Compute positions for every item in current order, starting at `start`.
    pub(crate) fn layout(&self, start: u32, file: &DexFile) -> SectionLayout {
        let kind = T::KIND;
        if self.order.is_empty() {
            return SectionLayout {
                offset: None,
                positions: Vec::new(),
                next: start,
                byte_size: 0,
            };
        }

        let base = align_up(start, kind.alignment());
        let mut cursor = base;
        let mut positions = Vec::with_capacity(self.order.len());
        for (index, &id) in self.order.iter().enumerate() {
            cursor = align_up(cursor, kind.alignment());
            positions.push(if kind.is_indexed() { index as u32 } else { cursor });
            cursor += self.items[id as usize].size_in_bytes(file);
        }

        SectionLayout {
            offset: Some(base),
            positions,
            next: cursor,
            byte_size: cursor - base,
        }
    }

    pub(crate) fn apply(&mut self, layout: SectionLayout) {
        self.positions.iter_mut().for_each(|p| *p = None);
        for (&id, position) in self.order.iter().zip(layout.positions) {
            self.positions[id as usize] = Some(position);
        }
        self.offset = layout.offset;
        self.byte_size = layout.byte_size;
    }

    /// Canonical order for this section, or `None` if the kind has none.
    pub(crate) fn sorted_order(&self, file: &DexFile) -> Option<Vec<u32>> {
        if !T::SORTABLE {
            return None;
        }
        let mut order = self.order.clone();
        order.sort_by(|&a, &b| {
            self.items[a as usize].canonical_cmp(&self.items[b as usize], file)
        });
        Some(order)
    }

    pub(crate) fn set_order(&mut self, order: Vec<u32>) {
        debug_assert_eq!(order.len(), self.items.len());
        self.order = order;
    }

    /// Forget all assigned positions.
    pub(crate) fn invalidate(&mut self) {
        self.positions.iter_mut().for_each(|p| *p = None);
        self.offset = None;
        self.byte_size = 0;
    }

    /// Serialize every item in order. Positions must already be assigned.
    pub(crate) fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        let kind = T::KIND;
        for &id in &self.order {
            out.align(kind.alignment());
            if !kind.is_indexed() {
                debug_assert_eq!(Some(out.position()), self.positions[id as usize]);
            }
            self.items[id as usize].write_to(out, file);
        }
    }
}

impl<T: Item> SectionInfo for Section<T> {
    fn kind(&self) -> ItemKind {
        T::KIND
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn offset(&self) -> Option<u32> {
        self.offset
    }

    fn byte_size(&self) -> u32 {
        self.byte_size
    }

    fn positions(&self) -> Vec<Option<u32>> {
        self.order
            .iter()
            .map(|&id| self.positions[id as usize])
            .collect()
    }
}
