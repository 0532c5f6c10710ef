use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{uleb128_size, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{CodeItem, FieldIdItem, MethodIdItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

/// Upper bound of a code offset's encoded size, used before code is placed.
const UNPLACED_OFFSET_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedField {
    pub field: Handle<FieldIdItem>,
    pub access_flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedMethod {
    pub method: Handle<MethodIdItem>,
    pub access_flags: u32,
    pub code: Option<Handle<CodeItem>>,
}

/// Fields and methods defined by one class
///
/// Member indices are stored as differences from the previous member of the
/// same list, so each list is expected in ascending index order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClassDataItem {
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassDataItem {
    fn fields_size(fields: &[EncodedField], file: &DexFile) -> u32 {
        let mut previous = 0u32;
        fields
            .iter()
            .map(|f| {
                let index = file.index_of(f.field);
                let size = uleb128_size(index.wrapping_sub(previous)) + uleb128_size(f.access_flags);
                previous = index;
                size
            })
            .sum()
    }

    fn methods_size(methods: &[EncodedMethod], file: &DexFile) -> u32 {
        let mut previous = 0u32;
        methods
            .iter()
            .map(|m| {
                let index = file.index_of(m.method);
                let code = match m.code {
                    None => 1,
                    Some(code) => file
                        .position_of(code)
                        .map_or(UNPLACED_OFFSET_SIZE, uleb128_size),
                };
                let size =
                    uleb128_size(index.wrapping_sub(previous)) + uleb128_size(m.access_flags) + code;
                previous = index;
                size
            })
            .sum()
    }

    fn write_fields(fields: &[EncodedField], out: &mut DexWriter, file: &DexFile) {
        let mut previous = 0u32;
        for field in fields {
            let index = file.index_of(field.field);
            out.write_uleb128(index.wrapping_sub(previous));
            out.write_uleb128(field.access_flags);
            previous = index;
        }
    }

    fn write_methods(methods: &[EncodedMethod], out: &mut DexWriter, file: &DexFile) {
        let mut previous = 0u32;
        for method in methods {
            let index = file.index_of(method.method);
            out.write_uleb128(index.wrapping_sub(previous));
            out.write_uleb128(method.access_flags);
            out.write_uleb128(file.optional_offset_of(method.code));
            previous = index;
        }
    }

    fn read_fields(
        count: u32,
        input: &mut DexReader<'_>,
        ctx: &mut ReadContext,
    ) -> Result<Vec<EncodedField>> {
        let mut fields = Vec::with_capacity(count.min(1024) as usize);
        let mut index = 0u32;
        for _ in 0..count {
            index = index.wrapping_add(input.read_uleb128()?);
            fields.push(EncodedField {
                field: ctx.index(index),
                access_flags: input.read_uleb128()?,
            });
        }
        Ok(fields)
    }

    fn read_methods(
        count: u32,
        input: &mut DexReader<'_>,
        ctx: &mut ReadContext,
    ) -> Result<Vec<EncodedMethod>> {
        let mut methods = Vec::with_capacity(count.min(1024) as usize);
        let mut index = 0u32;
        for _ in 0..count {
            index = index.wrapping_add(input.read_uleb128()?);
            let access_flags = input.read_uleb128()?;
            let code = ctx.optional_offset(input.read_uleb128()?);
            methods.push(EncodedMethod {
                method: ctx.index(index),
                access_flags,
                code,
            });
        }
        Ok(methods)
    }
}

impl Item for ClassDataItem {
    const KIND: ItemKind = ItemKind::ClassData;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.class_data
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.class_data
    }

    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        uleb128_size(self.static_fields.len() as u32)
            + uleb128_size(self.instance_fields.len() as u32)
            + uleb128_size(self.direct_methods.len() as u32)
            + uleb128_size(self.virtual_methods.len() as u32)
            + Self::fields_size(&self.static_fields, file)
            + Self::fields_size(&self.instance_fields, file)
            + Self::methods_size(&self.direct_methods, file)
            + Self::methods_size(&self.virtual_methods, file)
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_uleb128(self.static_fields.len() as u32);
        out.write_uleb128(self.instance_fields.len() as u32);
        out.write_uleb128(self.direct_methods.len() as u32);
        out.write_uleb128(self.virtual_methods.len() as u32);
        Self::write_fields(&self.static_fields, out, file);
        Self::write_fields(&self.instance_fields, out, file);
        Self::write_methods(&self.direct_methods, out, file);
        Self::write_methods(&self.virtual_methods, out, file);
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let static_count = input.read_uleb128()?;
        let instance_count = input.read_uleb128()?;
        let direct_count = input.read_uleb128()?;
        let virtual_count = input.read_uleb128()?;
        Ok(ClassDataItem {
            static_fields: Self::read_fields(static_count, input, ctx)?,
            instance_fields: Self::read_fields(instance_count, input, ctx)?,
            direct_methods: Self::read_methods(direct_count, input, ctx)?,
            virtual_methods: Self::read_methods(virtual_count, input, ctx)?,
        })
    }
}
