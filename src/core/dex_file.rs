//! The container: owns every section and drives read, place and write
//!
//! ```text
//! Constructed --intern/policy--> Mutated --place--> Placed --write--> Written --finalize--> Finalized
//!      |                            ^                  |
//!      +------------place-----------|------------------+
//!                                   +---- intern (new content) / policy change
//! ```
//!
//! Decoding consults the map directory in [`READ_ORDER`], which differs from
//! the physical order of sections in the file. Placement and writing walk
//! the header, [`INDEXED_ORDER`], [`OFFSETTED_ORDER`] and finally the map.

use crate::core::class_order::dependency_order;
use crate::core::config::{DexOptions, LayoutPolicy};
use crate::core::error::{DexError, Result};
use crate::core::header::{HeaderItem, HEADER_SIZE};
use crate::core::integrity;
use crate::core::io::{align_up, read_dex, write_dex, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext, NO_INDEX};
use crate::core::items::*;
use crate::core::kind::{ItemKind, INDEXED_ORDER, OFFSETTED_ORDER, READ_ORDER};
use crate::core::map::{MapEntry, MapItem, MAP_ENTRY_SIZE};
use crate::core::section::{Section, SectionInfo, SectionStats};
use std::path::Path;
use tracing::{debug, info, warn};

/// Code offsets feed back into class data sizes; placement repeats until
/// they settle. Sizes only shrink between rounds, so hitting this bound is
/// a bug and panics.
const MAX_PLACEMENT_ROUNDS: usize = 16;

/// Arena id of the header and map singletons.
const SINGLETON: u32 = 0;

/// Bind `$t` to the item type of `$kind` and evaluate `$body`.
macro_rules! with_item_type {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            ItemKind::Header => {
                type $t = HeaderItem;
                $body
            }
            ItemKind::StringId => {
                type $t = StringIdItem;
                $body
            }
            ItemKind::TypeId => {
                type $t = TypeIdItem;
                $body
            }
            ItemKind::ProtoId => {
                type $t = ProtoIdItem;
                $body
            }
            ItemKind::FieldId => {
                type $t = FieldIdItem;
                $body
            }
            ItemKind::MethodId => {
                type $t = MethodIdItem;
                $body
            }
            ItemKind::ClassDef => {
                type $t = ClassDefItem;
                $body
            }
            ItemKind::MapList => {
                type $t = MapItem;
                $body
            }
            ItemKind::TypeList => {
                type $t = TypeListItem;
                $body
            }
            ItemKind::AnnotationSetRefList => {
                type $t = AnnotationSetRefList;
                $body
            }
            ItemKind::AnnotationSet => {
                type $t = AnnotationSetItem;
                $body
            }
            ItemKind::ClassData => {
                type $t = ClassDataItem;
                $body
            }
            ItemKind::Code => {
                type $t = CodeItem;
                $body
            }
            ItemKind::StringData => {
                type $t = StringDataItem;
                $body
            }
            ItemKind::DebugInfo => {
                type $t = DebugInfoItem;
                $body
            }
            ItemKind::Annotation => {
                type $t = AnnotationItem;
                $body
            }
            ItemKind::EncodedArray => {
                type $t = EncodedArrayItem;
                $body
            }
            ItemKind::AnnotationsDirectory => {
                type $t = AnnotationDirectoryItem;
                $body
            }
        }
    };
}

/// Where a container stands in its read/place/write lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    /// Freshly created or decoded.
    Constructed,
    /// Content or policy changed since the last placement.
    Mutated,
    Placed,
    Written,
    /// Emitted bytes carry their checksum and signature.
    Finalized,
}

impl LayoutState {
    /// Whether every item currently holds a valid position.
    pub fn is_placed(self) -> bool {
        matches!(
            self,
            LayoutState::Placed | LayoutState::Written | LayoutState::Finalized
        )
    }
}

/// An in-memory dex file
#[derive(Debug, Clone)]
pub struct DexFile {
    pub(crate) header: Section<HeaderItem>,
    pub(crate) string_ids: Section<StringIdItem>,
    pub(crate) type_ids: Section<TypeIdItem>,
    pub(crate) proto_ids: Section<ProtoIdItem>,
    pub(crate) field_ids: Section<FieldIdItem>,
    pub(crate) method_ids: Section<MethodIdItem>,
    pub(crate) class_defs: Section<ClassDefItem>,
    pub(crate) type_lists: Section<TypeListItem>,
    pub(crate) annotation_set_ref_lists: Section<AnnotationSetRefList>,
    pub(crate) annotation_sets: Section<AnnotationSetItem>,
    pub(crate) annotation_directories: Section<AnnotationDirectoryItem>,
    pub(crate) string_data: Section<StringDataItem>,
    pub(crate) annotations: Section<AnnotationItem>,
    pub(crate) encoded_arrays: Section<EncodedArrayItem>,
    pub(crate) class_data: Section<ClassDataItem>,
    pub(crate) debug_info: Section<DebugInfoItem>,
    pub(crate) code_items: Section<CodeItem>,
    pub(crate) map: Section<MapItem>,

    preserve_signed_registers: bool,
    policy: LayoutPolicy,
    state: LayoutState,
}

impl Default for DexFile {
    fn default() -> Self {
        Self::new()
    }
}

impl DexFile {
    /// Empty file holding only a header and an empty map.
    pub fn new() -> Self {
        Self::with_options(&DexOptions::default())
    }

    pub fn with_options(options: &DexOptions) -> Self {
        let mut file = DexFile {
            header: Section::new(),
            string_ids: Section::new(),
            type_ids: Section::new(),
            proto_ids: Section::new(),
            field_ids: Section::new(),
            method_ids: Section::new(),
            class_defs: Section::new(),
            type_lists: Section::new(),
            annotation_set_ref_lists: Section::new(),
            annotation_sets: Section::new(),
            annotation_directories: Section::new(),
            string_data: Section::new(),
            annotations: Section::new(),
            encoded_arrays: Section::new(),
            class_data: Section::new(),
            debug_info: Section::new(),
            code_items: Section::new(),
            map: Section::new(),
            preserve_signed_registers: options.preserve_signed_registers,
            policy: options.layout_policy(),
            state: LayoutState::Constructed,
        };
        file.header.push(HeaderItem::new());
        file.map.push(MapItem::new());
        file
    }

    /// Decode a complete file image.
    ///
    /// Fails without returning a partial container if the image is
    /// truncated, has a bad header, a directory entry outside the image, or
    /// a reference that does not resolve.
    pub fn from_bytes(bytes: &[u8], options: &DexOptions) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(DexError::BufferTooSmall { len: bytes.len() });
        }
        if options.verify_integrity {
            integrity::verify(bytes)?;
        }

        let mut file = DexFile::with_options(options);
        let mut ctx = ReadContext::new(options.preserve_signed_registers);
        let mut input = DexReader::new(bytes);

        file.header.read_from(1, &mut input, &mut ctx)?;
        let map_offset = file.header_item().map_offset;
        if map_offset == 0 {
            return Err(DexError::MissingSection(ItemKind::MapList));
        }
        Self::check_bounds(ItemKind::MapList, map_offset, 1, bytes.len())?;
        input.seek(map_offset as usize)?;
        file.map.read_from(1, &mut input, &mut ctx)?;

        let directory = file.map_item().directory()?;
        for entry in directory.values() {
            Self::check_bounds(entry.kind, entry.offset, entry.count, bytes.len())?;
        }

        for kind in READ_ORDER {
            let (offset, count) = match kind {
                ItemKind::Header => (0, 1),
                ItemKind::MapList => (map_offset, 1),
                _ => match directory.get(&kind) {
                    Some(entry) => (entry.offset, entry.count),
                    None => continue,
                },
            };
            input.seek(offset as usize)?;
            file.read_kind(kind, count as usize, &mut input, &mut ctx)?;
            debug!("Read {} {} items at {:#x}", count, kind, offset);
        }

        for kind in READ_ORDER {
            let count = file.section_for_kind(kind).len();
            ctx.check_indices(kind, count)?;
            ctx.check_offsets(kind, count)?;
        }

        info!(
            "Read dex file: {} bytes, version {}, {} classes",
            bytes.len(),
            file.header_item().version(),
            file.class_defs.len()
        );
        Ok(file)
    }

    /// Read and decode the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: &DexOptions) -> Result<Self> {
        let bytes = read_dex(path)?;
        Self::from_bytes(&bytes, options)
    }

    fn check_bounds(kind: ItemKind, offset: u32, count: u32, len: usize) -> Result<()> {
        let span = kind.entry_size().unwrap_or(0) as u64 * count as u64;
        let fits = if count == 0 {
            offset as usize <= len
        } else {
            (offset as u64) < len as u64 && offset as u64 + span <= len as u64
        };
        if fits {
            Ok(())
        } else {
            Err(DexError::SectionOutOfBounds { kind, offset, len })
        }
    }

    fn read_kind(
        &mut self,
        kind: ItemKind,
        count: usize,
        input: &mut DexReader<'_>,
        ctx: &mut ReadContext,
    ) -> Result<()> {
        with_item_type!(kind, T => T::section_mut(self).read_from(count, input, ctx))
    }

    pub fn header_item(&self) -> &HeaderItem {
        self.header.get(Handle::new(SINGLETON))
    }

    fn header_item_mut(&mut self) -> &mut HeaderItem {
        self.header.get_mut(Handle::new(SINGLETON))
    }

    pub fn map_item(&self) -> &MapItem {
        self.map.get(Handle::new(SINGLETON))
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// Kind-erased view of the section holding `kind`.
    pub fn section_for_kind(&self, kind: ItemKind) -> &dyn SectionInfo {
        with_item_type!(kind, T => T::section(self) as &dyn SectionInfo)
    }

    pub fn section<T: Item>(&self) -> &Section<T> {
        T::section(self)
    }

    /// The section that owns the item behind `handle`.
    pub fn section_for_item<T: Item>(&self, _handle: Handle<T>) -> &Section<T> {
        T::section(self)
    }

    pub fn get<T: Item>(&self, handle: Handle<T>) -> &T {
        T::section(self).get(handle)
    }

    /// Canonical handle for `item`, adding it to its section if new.
    ///
    /// Adding content to a placed file invalidates every position.
    pub fn intern<T: Item>(&mut self, item: T) -> Handle<T> {
        assert!(
            !matches!(T::KIND, ItemKind::Header | ItemKind::MapList),
            "{} is a singleton and cannot be interned",
            T::KIND
        );
        item.assert_encodable();
        let section = T::section_mut(self);
        let before = section.len();
        let handle = section.intern(item);
        let added = section.len() != before;
        if added {
            self.mark_mutated();
        }
        handle
    }

    /// Intern a string together with its string id.
    pub fn intern_string(&mut self, value: &str) -> Handle<StringIdItem> {
        let data = self.intern(StringDataItem::new(value));
        self.intern(StringIdItem { data })
    }

    /// Intern a type by descriptor, e.g. `Ljava/lang/Object;`.
    pub fn intern_type(&mut self, descriptor: &str) -> Handle<TypeIdItem> {
        let descriptor = self.intern_string(descriptor);
        self.intern(TypeIdItem { descriptor })
    }

    pub fn string(&self, handle: Handle<StringIdItem>) -> String {
        self.get(self.get(handle).data).to_string_lossy()
    }

    pub fn type_descriptor(&self, handle: Handle<TypeIdItem>) -> String {
        self.string(self.get(handle).descriptor)
    }

    /// Assigned index or offset of an item, `None` before placement.
    pub fn position_of<T: Item>(&self, handle: Handle<T>) -> Option<u32> {
        T::section(self).position_of(handle)
    }

    /// Placed index of an index-table item. Panics if unplaced.
    pub fn index_of<T: Item>(&self, handle: Handle<T>) -> u32 {
        debug_assert!(T::KIND.is_indexed());
        self.require_position(handle)
    }

    /// Placed byte offset of a data item. Panics if unplaced.
    pub fn offset_of<T: Item>(&self, handle: Handle<T>) -> u32 {
        debug_assert!(!T::KIND.is_indexed());
        self.require_position(handle)
    }

    pub fn optional_index_of<T: Item>(&self, handle: Option<Handle<T>>) -> u32 {
        handle.map_or(NO_INDEX, |h| self.index_of(h))
    }

    pub fn optional_offset_of<T: Item>(&self, handle: Option<Handle<T>>) -> u32 {
        handle.map_or(0, |h| self.offset_of(h))
    }

    fn require_position<T: Item>(&self, handle: Handle<T>) -> u32 {
        match self.position_of(handle) {
            Some(position) => position,
            None => panic!(
                "{} {:?} has no position; place() must run before writing",
                T::KIND,
                handle
            ),
        }
    }

    pub fn preserve_signed_registers(&self) -> bool {
        self.preserve_signed_registers
    }

    pub fn layout_policy(&self) -> LayoutPolicy {
        self.policy
    }

    pub fn sort_all_items(&self) -> bool {
        self.policy.sort_all_items
    }

    pub fn set_sort_all_items(&mut self, value: bool) {
        if self.policy.sort_all_items != value {
            self.policy.sort_all_items = value;
            self.mark_mutated();
        }
    }

    pub fn in_place(&self) -> bool {
        self.policy.in_place
    }

    pub fn set_in_place(&mut self, value: bool) {
        if self.policy.in_place != value {
            self.policy.in_place = value;
            self.mark_mutated();
        }
    }

    fn mark_mutated(&mut self) {
        if self.state.is_placed() {
            debug!("Content changed after placement; positions invalidated");
            for kind in READ_ORDER {
                with_item_type!(kind, T => T::section_mut(self).invalidate());
            }
        }
        self.state = LayoutState::Mutated;
    }

    fn place_section<T: Item>(&mut self, start: u32) -> u32 {
        let layout = T::section(self).layout(start, self);
        let next = layout.next;
        if let Some(offset) = layout.offset {
            debug!(
                "Placed {} {} items at {:#x} ({} bytes)",
                layout.positions.len(),
                T::KIND,
                offset,
                layout.byte_size
            );
        }
        T::section_mut(self).apply(layout);
        next
    }

    fn place_kind(&mut self, kind: ItemKind, start: u32) -> u32 {
        with_item_type!(kind, T => self.place_section::<T>(start))
    }

    fn sort_kind(&mut self, kind: ItemKind) {
        with_item_type!(kind, T => {
            if let Some(order) = T::section(self).sorted_order(self) {
                T::section_mut(self).set_order(order);
            }
        })
    }

    /// Assign a final index or offset to every item and return the file size.
    pub fn place(&mut self) -> u32 {
        let policy = self.policy;
        if policy.sort_all_items && policy.in_place {
            warn!("Both in-place and sort-all-items are set; keeping the current order");
        }

        let mut offset = self.place_section::<HeaderItem>(0);

        if policy.reorders_class_defs() {
            let order = dependency_order(self);
            self.class_defs.set_order(order);
        }
        for kind in INDEXED_ORDER {
            offset = self.place_kind(kind, offset);
        }
        let data_offset = offset;

        if policy.sorts() {
            for kind in OFFSETTED_ORDER {
                self.sort_kind(kind);
            }
        }

        let mut rounds = 0;
        let data_end = loop {
            let code_positions = self.code_items.positions();
            let mut cursor = data_offset;
            for kind in OFFSETTED_ORDER {
                cursor = self.place_kind(kind, cursor);
            }
            rounds += 1;
            if self.code_items.positions() == code_positions {
                break cursor;
            }
            assert!(
                rounds < MAX_PLACEMENT_ROUNDS,
                "code offsets did not settle after {} placement rounds",
                MAX_PLACEMENT_ROUNDS
            );
        };
        if rounds > 1 {
            debug!("Data layout settled after {} rounds", rounds);
        }

        let map_offset = align_up(data_end, ItemKind::MapList.alignment());
        let entries = self.build_map_entries(map_offset);
        self.map.get_mut(Handle::new(SINGLETON)).entries = entries;
        let file_size = self.place_section::<MapItem>(map_offset);

        let header = self.header_item_mut();
        header.data_offset = data_offset;
        header.map_offset = map_offset;
        header.file_size = file_size;
        header.data_size = file_size - data_offset;

        self.state = LayoutState::Placed;
        info!(
            "Placed dex file: {} bytes, {} map entries",
            file_size,
            self.map_item().entries.len()
        );
        file_size
    }

    fn build_map_entries(&self, map_offset: u32) -> Vec<MapEntry> {
        let mut entries: Vec<MapEntry> = READ_ORDER
            .iter()
            .filter(|kind| **kind != ItemKind::MapList)
            .map(|kind| self.section_for_kind(*kind))
            .filter(|section| !section.is_empty())
            .map(|section| MapEntry {
                kind: section.kind(),
                count: section.len() as u32,
                offset: section.offset().unwrap_or(0),
                byte_size: section.byte_size(),
            })
            .collect();

        let count = entries.len() as u32 + 1;
        entries.push(MapEntry {
            kind: ItemKind::MapList,
            count: 1,
            offset: map_offset,
            byte_size: 4 + MAP_ENTRY_SIZE * count,
        });
        entries.sort_by_key(|entry| entry.offset);
        entries
    }

    fn write_kind(&self, kind: ItemKind, out: &mut DexWriter) {
        with_item_type!(kind, T => T::section(self).write_to(out, self))
    }

    /// Serialize every section in placement order.
    ///
    /// Panics unless [`DexFile::place`] has run since the last change.
    pub fn write_to(&mut self, out: &mut DexWriter) {
        assert!(
            self.state.is_placed(),
            "DexFile::write_to called before place() (state {:?})",
            self.state
        );
        self.write_kind(ItemKind::Header, out);
        for kind in INDEXED_ORDER.iter().chain(OFFSETTED_ORDER.iter()) {
            self.write_kind(*kind, out);
        }
        out.align(ItemKind::MapList.alignment());
        self.write_kind(ItemKind::MapList, out);
        self.state = LayoutState::Written;
    }

    /// Place, write and stamp checksum and signature.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let size = self.place();
        let mut out = DexWriter::with_capacity(size as usize);
        self.write_to(&mut out);
        let mut bytes = out.into_bytes();
        integrity::finalize(&mut bytes)?;
        self.state = LayoutState::Finalized;
        info!("Finalized dex file: {} bytes", bytes.len());
        Ok(bytes)
    }

    /// [`DexFile::to_bytes`], then write the result to `path`.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_dex(path, &bytes)
    }

    /// Map directory rows. Byte sizes are only known after placement.
    pub fn map_entries(&self) -> Vec<MapEntry> {
        self.map_item().entries.clone()
    }

    /// Count, offset and size of every section, in read order.
    pub fn section_stats(&self) -> Vec<SectionStats> {
        READ_ORDER
            .iter()
            .map(|kind| self.section_for_kind(*kind).stats())
            .collect()
    }
}

/// Stamp the signature of a finished image.
pub fn calc_signature(bytes: &mut [u8]) -> Result<()> {
    integrity::calc_signature(bytes)
}

/// Stamp the checksum of a finished image. Run after [`calc_signature`].
pub fn calc_checksum(bytes: &mut [u8]) -> Result<()> {
    integrity::calc_checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_header_and_map() {
        let mut file = DexFile::new();
        let size = file.place();
        assert_eq!(size, HEADER_SIZE + 4 + 2 * MAP_ENTRY_SIZE);

        let entries = file.map_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ItemKind::Header);
        assert_eq!(entries[1].kind, ItemKind::MapList);
        assert_eq!(entries[1].offset, HEADER_SIZE);
        assert_eq!(file.header_item().data_offset, HEADER_SIZE);
        assert_eq!(file.header_item().data_size, size - HEADER_SIZE);
    }

    #[test]
    fn test_intern_after_place_invalidates() {
        let mut file = DexFile::new();
        let object = file.intern_type("Ljava/lang/Object;");
        file.place();
        assert_eq!(file.state(), LayoutState::Placed);
        assert_eq!(file.position_of(object), Some(0));

        // equal content does not disturb the layout
        assert_eq!(file.intern_type("Ljava/lang/Object;"), object);
        assert_eq!(file.state(), LayoutState::Placed);

        file.intern_type("Ljava/lang/String;");
        assert_eq!(file.state(), LayoutState::Mutated);
        assert_eq!(file.position_of(object), None);
    }

    #[test]
    #[should_panic(expected = "before place()")]
    fn test_write_before_place_panics() {
        let mut file = DexFile::new();
        file.write_to(&mut DexWriter::new());
    }

    #[test]
    #[should_panic(expected = "singleton")]
    fn test_header_cannot_be_interned() {
        DexFile::new().intern(HeaderItem::new());
    }

    #[test]
    fn test_section_lookup_by_kind() {
        let mut file = DexFile::new();
        file.intern_string("a");
        file.intern_string("b");
        assert_eq!(file.section_for_kind(ItemKind::StringId).len(), 2);
        assert_eq!(file.section_for_kind(ItemKind::StringData).len(), 2);
        assert_eq!(file.section_for_kind(ItemKind::MapList).len(), 1);
        assert!(file.section_for_kind(ItemKind::Code).is_empty());
    }

    #[test]
    fn test_class_data_code_offsets_settle() {
        let mut file = DexFile::new();
        let class = file.intern_type("LMain;");
        let void = file.intern_type("V");
        let shorty = file.intern_string("V");
        let proto = file.intern(ProtoIdItem {
            shorty,
            return_type: void,
            parameters: None,
        });
        let name = file.intern_string("run");
        let method = file.intern(MethodIdItem { class, proto, name });
        let code = file.intern(CodeItem {
            registers_size: 1,
            insns: vec![0x000e],
            ..CodeItem::default()
        });
        let data = file.intern(ClassDataItem {
            direct_methods: vec![EncodedMethod {
                method,
                access_flags: 0x9,
                code: Some(code),
            }],
            ..ClassDataItem::default()
        });
        let mut def = ClassDefItem::new(class, 0x1);
        def.class_data = Some(data);
        file.intern(def);

        let bytes = file.to_bytes().unwrap();
        assert_eq!(file.state(), LayoutState::Finalized);
        assert_eq!(bytes.len() as u32, file.header_item().file_size);

        let code_offset = file.offset_of(code);
        let data_offset = file.offset_of(data);
        let data_size = file.get(data).size_in_bytes(&file);
        assert!(data_offset + data_size <= code_offset);

        let reread = DexFile::from_bytes(&bytes, &DexOptions::default()).unwrap();
        let data = reread.class_data.iter().next().unwrap();
        let code = data.direct_methods[0].code.unwrap();
        assert_eq!(reread.position_of(code), Some(code_offset));
    }

    #[test]
    fn test_code_offsets_settle_across_uleb_boundaries() {
        // enough code to push offsets past 0x4000, where uleb128 grows
        let mut file = DexFile::new();
        let void = file.intern_type("V");
        let shorty = file.intern_string("V");
        let proto = file.intern(ProtoIdItem {
            shorty,
            return_type: void,
            parameters: None,
        });
        let name = file.intern_string("run");
        let mut codes = Vec::new();
        for i in 0..600u16 {
            let class = file.intern_type(&format!("LC{i};"));
            let method = file.intern(MethodIdItem { class, proto, name });
            let code = file.intern(CodeItem {
                registers_size: 1,
                insns: vec![0x0012, i, 0x000e],
                ..CodeItem::default()
            });
            codes.push(code);
            let data = file.intern(ClassDataItem {
                direct_methods: vec![EncodedMethod {
                    method,
                    access_flags: 0x9,
                    code: Some(code),
                }],
                ..ClassDataItem::default()
            });
            let mut def = ClassDefItem::new(class, 0x1);
            def.class_data = Some(data);
            file.intern(def);
        }

        let bytes = file.to_bytes().unwrap();
        assert!(codes.iter().any(|c| file.offset_of(*c) >= 0x4000));
        let reread = DexFile::from_bytes(&bytes, &DexOptions::new().in_place(true)).unwrap();
        assert_eq!(reread.code_items.positions(), file.code_items.positions());
    }
}
