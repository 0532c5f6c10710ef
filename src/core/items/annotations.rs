//! Annotation items and the sets, lists and directories that group them

use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{EncodedAnnotation, FieldIdItem, MethodIdItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;
use std::cmp::Ordering;

pub const VISIBILITY_BUILD: u8 = 0x00;
pub const VISIBILITY_RUNTIME: u8 = 0x01;
pub const VISIBILITY_SYSTEM: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationItem {
    pub visibility: u8,
    pub annotation: EncodedAnnotation,
}

impl Item for AnnotationItem {
    const KIND: ItemKind = ItemKind::Annotation;
    const SORTABLE: bool = true;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.annotations
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.annotations
    }

    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        1 + self.annotation.size_in_bytes(file)
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u8(self.visibility);
        self.annotation.write_to(out, file);
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(AnnotationItem {
            visibility: input.read_u8()?,
            annotation: EncodedAnnotation::decode(input, ctx)?,
        })
    }

    fn canonical_cmp(&self, other: &Self, file: &DexFile) -> Ordering {
        self.visibility.cmp(&other.visibility).then_with(|| {
            file.type_descriptor(self.annotation.annotation_type)
                .cmp(&file.type_descriptor(other.annotation.annotation_type))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnnotationSetItem {
    pub annotations: Vec<Handle<AnnotationItem>>,
}

impl Item for AnnotationSetItem {
    const KIND: ItemKind = ItemKind::AnnotationSet;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.annotation_sets
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.annotation_sets
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4 + 4 * self.annotations.len() as u32
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(self.annotations.len() as u32);
        for annotation in &self.annotations {
            out.write_u32(file.offset_of(*annotation));
        }
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let count = input.read_u32()?;
        let mut annotations = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            annotations.push(ctx.offset(input.read_u32()?));
        }
        Ok(AnnotationSetItem { annotations })
    }
}

/// Per-parameter annotation sets of one method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnnotationSetRefList {
    pub sets: Vec<Option<Handle<AnnotationSetItem>>>,
}

impl Item for AnnotationSetRefList {
    const KIND: ItemKind = ItemKind::AnnotationSetRefList;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.annotation_set_ref_lists
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.annotation_set_ref_lists
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        4 + 4 * self.sets.len() as u32
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(self.sets.len() as u32);
        for set in &self.sets {
            out.write_u32(file.optional_offset_of(*set));
        }
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let count = input.read_u32()?;
        let mut sets = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            sets.push(ctx.optional_offset(input.read_u32()?));
        }
        Ok(AnnotationSetRefList { sets })
    }
}

/// All annotations attached to one class and its members
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnnotationDirectoryItem {
    pub class_annotations: Option<Handle<AnnotationSetItem>>,
    pub fields: Vec<(Handle<FieldIdItem>, Handle<AnnotationSetItem>)>,
    pub methods: Vec<(Handle<MethodIdItem>, Handle<AnnotationSetItem>)>,
    pub parameters: Vec<(Handle<MethodIdItem>, Handle<AnnotationSetRefList>)>,
}

impl Item for AnnotationDirectoryItem {
    const KIND: ItemKind = ItemKind::AnnotationsDirectory;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.annotation_directories
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.annotation_directories
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        16 + 8 * (self.fields.len() + self.methods.len() + self.parameters.len()) as u32
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u32(file.optional_offset_of(self.class_annotations));
        out.write_u32(self.fields.len() as u32);
        out.write_u32(self.methods.len() as u32);
        out.write_u32(self.parameters.len() as u32);
        for (field, set) in &self.fields {
            out.write_u32(file.index_of(*field));
            out.write_u32(file.offset_of(*set));
        }
        for (method, set) in &self.methods {
            out.write_u32(file.index_of(*method));
            out.write_u32(file.offset_of(*set));
        }
        for (method, list) in &self.parameters {
            out.write_u32(file.index_of(*method));
            out.write_u32(file.offset_of(*list));
        }
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let class_annotations = ctx.optional_offset(input.read_u32()?);
        let field_count = input.read_u32()?;
        let method_count = input.read_u32()?;
        let parameter_count = input.read_u32()?;

        let mut fields = Vec::with_capacity(field_count.min(1024) as usize);
        for _ in 0..field_count {
            fields.push((ctx.index(input.read_u32()?), ctx.offset(input.read_u32()?)));
        }
        let mut methods = Vec::with_capacity(method_count.min(1024) as usize);
        for _ in 0..method_count {
            methods.push((ctx.index(input.read_u32()?), ctx.offset(input.read_u32()?)));
        }
        let mut parameters = Vec::with_capacity(parameter_count.min(1024) as usize);
        for _ in 0..parameter_count {
            parameters.push((ctx.index(input.read_u32()?), ctx.offset(input.read_u32()?)));
        }

        Ok(AnnotationDirectoryItem {
            class_annotations,
            fields,
            methods,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_decode_reserves_offsets() {
        let mut bytes = Vec::new();
        for word in [0u32, 1, 0, 1, 7, 0x400, 9, 0x500] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let mut ctx = ReadContext::new(true);
        let dir = AnnotationDirectoryItem::decode(&mut DexReader::new(&bytes), &mut ctx).unwrap();

        assert!(dir.class_annotations.is_none());
        assert_eq!(dir.fields.len(), 1);
        assert!(dir.methods.is_empty());
        assert_eq!(dir.parameters.len(), 1);
        assert_eq!(ctx.slot_count(ItemKind::AnnotationSet), 1);
        assert_eq!(ctx.slot_offset(ItemKind::AnnotationSetRefList, 0), 0x500);
        assert!(ctx.check_indices(ItemKind::MethodId, 9).is_err());
        assert!(ctx.check_indices(ItemKind::FieldId, 8).is_ok());
    }

    #[test]
    fn test_ref_list_keeps_empty_entries() {
        let mut bytes = Vec::new();
        for word in [2u32, 0, 0x300] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let mut ctx = ReadContext::new(true);
        let list = AnnotationSetRefList::decode(&mut DexReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(list.sets.len(), 2);
        assert!(list.sets[0].is_none());
        assert!(list.sets[1].is_some());
    }
}
