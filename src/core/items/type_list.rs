use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::TypeIdItem;
use crate::core::kind::ItemKind;
use crate::core::section::Section;
use std::cmp::Ordering;

/// Ordered list of types (parameter lists, implemented interfaces)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeListItem {
    pub types: Vec<Handle<TypeIdItem>>,
}

impl TypeListItem {
    pub fn new(types: Vec<Handle<TypeIdItem>>) -> Self {
        TypeListItem { types }
    }
}

impl Item for TypeListItem {
    const KIND: ItemKind = ItemKind::TypeList;
    const SORTABLE: bool = true;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.type_lists
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.type_lists
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4 + 2 * self.types.len() as u32
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(self.types.len() as u32);
        for ty in &self.types {
            out.write_u16(file.index_of(*ty) as u16);
        }
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let count = input.read_u32()?;
        let mut types = Vec::with_capacity(count.min(0x1_0000) as usize);
        for _ in 0..count {
            types.push(ctx.index(input.read_u16()? as u32));
        }
        Ok(TypeListItem { types })
    }

    /// Element-wise by type descriptor, shorter list first on a common prefix.
    fn canonical_cmp(&self, other: &Self, file: &DexFile) -> Ordering {
        let left = self.types.iter().map(|t| file.type_descriptor(*t));
        let right = other.types.iter().map(|t| file.type_descriptor(*t));
        left.cmp(right)
    }
}
