//! Fixed-width index table entries

use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{StringDataItem, TypeListItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

/// Entry of the string table, pointing at the string's data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringIdItem {
    pub data: Handle<StringDataItem>,
}

impl Item for StringIdItem {
    const KIND: ItemKind = ItemKind::StringId;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.string_ids
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.string_ids
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(file.offset_of(self.data));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(StringIdItem {
            data: ctx.offset(input.read_u32()?),
        })
    }
}

/// Entry of the type table: a type descriptor string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeIdItem {
    pub descriptor: Handle<StringIdItem>,
}

impl Item for TypeIdItem {
    const KIND: ItemKind = ItemKind::TypeId;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.type_ids
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.type_ids
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(file.index_of(self.descriptor));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(TypeIdItem {
            descriptor: ctx.index(input.read_u32()?),
        })
    }
}

/// Method prototype: shorty, return type and parameter list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtoIdItem {
    pub shorty: Handle<StringIdItem>,
    pub return_type: Handle<TypeIdItem>,
    pub parameters: Option<Handle<TypeListItem>>,
}

impl Item for ProtoIdItem {
    const KIND: ItemKind = ItemKind::ProtoId;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.proto_ids
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.proto_ids
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        12
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(file.index_of(self.shorty));
        out.write_u32(file.index_of(self.return_type));
        out.write_u32(file.optional_offset_of(self.parameters));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(ProtoIdItem {
            shorty: ctx.index(input.read_u32()?),
            return_type: ctx.index(input.read_u32()?),
            parameters: ctx.optional_offset(input.read_u32()?),
        })
    }
}

/// Field reference: defining class, field type and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldIdItem {
    pub class: Handle<TypeIdItem>,
    pub field_type: Handle<TypeIdItem>,
    pub name: Handle<StringIdItem>,
}

impl Item for FieldIdItem {
    const KIND: ItemKind = ItemKind::FieldId;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.field_ids
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.field_ids
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        8
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u16(file.index_of(self.class) as u16);
        out.write_u16(file.index_of(self.field_type) as u16);
        out.write_u32(file.index_of(self.name));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(FieldIdItem {
            class: ctx.index(input.read_u16()? as u32),
            field_type: ctx.index(input.read_u16()? as u32),
            name: ctx.index(input.read_u32()?),
        })
    }
}

/// Method reference: defining class, prototype and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdItem {
    pub class: Handle<TypeIdItem>,
    pub proto: Handle<ProtoIdItem>,
    pub name: Handle<StringIdItem>,
}

impl Item for MethodIdItem {
    const KIND: ItemKind = ItemKind::MethodId;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.method_ids
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.method_ids
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        8
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u16(file.index_of(self.class) as u16);
        out.write_u16(file.index_of(self.proto) as u16);
        out.write_u32(file.index_of(self.name));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(MethodIdItem {
            class: ctx.index(input.read_u16()? as u32),
            proto: ctx.index(input.read_u16()? as u32),
            name: ctx.index(input.read_u32()?),
        })
    }
}
