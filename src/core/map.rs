//! Map directory: the trailing table of every non-empty section
//!
//! On read the map is decoded first and used purely as a lookup from kind to
//! (offset, count). On write it is rebuilt by placement and always comes last.

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Item, ReadContext};
use crate::core::kind::ItemKind;
use crate::core::section::Section;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// On-disk size of one directory row.
pub const MAP_ENTRY_SIZE: u32 = 12;

/// One directory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapEntry {
    pub kind: ItemKind,
    pub count: u32,
    pub offset: u32,

    /// Bytes spanned by the section. Known after placement only; not stored
    /// in the file, so entries decoded from bytes carry 0.
    #[serde(default)]
    pub byte_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MapItem {
    pub entries: Vec<MapEntry>,
}

impl MapItem {
    pub fn new() -> Self {
        MapItem {
            entries: Vec::new(),
        }
    }

    pub fn entry(&self, kind: ItemKind) -> Option<&MapEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    /// Index the entries by kind, rejecting duplicates.
    pub fn directory(&self) -> Result<AHashMap<ItemKind, MapEntry>> {
        let mut directory = AHashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            if directory.insert(entry.kind, *entry).is_some() {
                return Err(DexError::DuplicateMapEntry(entry.kind));
            }
        }
        Ok(directory)
    }
}

impl Item for MapItem {
    const KIND: ItemKind = ItemKind::MapList;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.map
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.map
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4 + MAP_ENTRY_SIZE * self.entries.len() as u32
    }

    fn write_to(&self, out: &mut DexWriter, _file: &DexFile) {
        out.write_u32(self.entries.len() as u32);
        for entry in &self.entries {
            out.write_u16(entry.kind.code());
            out.write_u16(0);
            out.write_u32(entry.count);
            out.write_u32(entry.offset);
        }
    }

    fn decode(input: &mut DexReader<'_>, _ctx: &mut ReadContext) -> Result<Self> {
        let count = input.read_u32()?;
        let remaining = input.len() - input.position();
        if count as usize > remaining / MAP_ENTRY_SIZE as usize {
            return Err(DexError::UnexpectedEof {
                offset: input.position(),
                needed: count as usize * MAP_ENTRY_SIZE as usize,
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind = ItemKind::from_u16(input.read_u16()?)?;
            let _unused = input.read_u16()?;
            let count = input.read_u32()?;
            let offset = input.read_u32()?;
            entries.push(MapEntry {
                kind,
                count,
                offset,
                byte_size: 0,
            });
        }
        Ok(MapItem { entries })
    }
}
