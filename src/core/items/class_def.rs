use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{
    AnnotationDirectoryItem, ClassDataItem, EncodedArrayItem, StringIdItem, TypeIdItem,
    TypeListItem,
};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

/// Definition of one class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassDefItem {
    pub class: Handle<TypeIdItem>,
    pub access_flags: u32,
    pub superclass: Option<Handle<TypeIdItem>>,
    pub interfaces: Option<Handle<TypeListItem>>,
    pub source_file: Option<Handle<StringIdItem>>,
    pub annotations: Option<Handle<AnnotationDirectoryItem>>,
    pub class_data: Option<Handle<ClassDataItem>>,
    pub static_values: Option<Handle<EncodedArrayItem>>,
}

impl ClassDefItem {
    pub fn new(class: Handle<TypeIdItem>, access_flags: u32) -> Self {
        ClassDefItem {
            class,
            access_flags,
            superclass: None,
            interfaces: None,
            source_file: None,
            annotations: None,
            class_data: None,
            static_values: None,
        }
    }

    /// Types this class must be defined after: its superclass and interfaces.
    pub fn dependencies(&self, file: &DexFile) -> Vec<Handle<TypeIdItem>> {
        let mut deps: Vec<_> = self.superclass.into_iter().collect();
        if let Some(list) = self.interfaces {
            deps.extend(file.get(list).types.iter().copied());
        }
        deps
    }
}

impl Item for ClassDefItem {
    const KIND: ItemKind = ItemKind::ClassDef;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.class_defs
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.class_defs
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        32
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(file.index_of(self.class));
        out.write_u32(self.access_flags);
        out.write_u32(file.optional_index_of(self.superclass));
        out.write_u32(file.optional_offset_of(self.interfaces));
        out.write_u32(file.optional_index_of(self.source_file));
        out.write_u32(file.optional_offset_of(self.annotations));
        out.write_u32(file.optional_offset_of(self.class_data));
        out.write_u32(file.optional_offset_of(self.static_values));
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(ClassDefItem {
            class: ctx.index(input.read_u32()?),
            access_flags: input.read_u32()?,
            superclass: ctx.optional_index(input.read_u32()?),
            interfaces: ctx.optional_offset(input.read_u32()?),
            source_file: ctx.optional_index(input.read_u32()?),
            annotations: ctx.optional_offset(input.read_u32()?),
            class_data: ctx.optional_offset(input.read_u32()?),
            static_values: ctx.optional_offset(input.read_u32()?),
        })
    }
}
