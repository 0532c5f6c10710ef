//! Item type catalog
//!
//! Every item in a dex file belongs to exactly one of these kinds. The
//! numeric value is the type code stored in the map directory.

use crate::core::error::{DexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ItemKind {
    Header = 0x0000,
    StringId = 0x0001,
    TypeId = 0x0002,
    ProtoId = 0x0003,
    FieldId = 0x0004,
    MethodId = 0x0005,
    ClassDef = 0x0006,
    MapList = 0x1000,
    TypeList = 0x1001,
    AnnotationSetRefList = 0x1002,
    AnnotationSet = 0x1003,
    ClassData = 0x2000,
    Code = 0x2001,
    StringData = 0x2002,
    DebugInfo = 0x2003,
    Annotation = 0x2004,
    EncodedArray = 0x2005,
    AnnotationsDirectory = 0x2006,
}

/// Order in which sections are decoded from an existing file.
///
/// This is not the physical order of the sections in the byte stream. Index
/// tables come first so later kinds can resolve references by index while
/// they decode.
pub const READ_ORDER: [ItemKind; 18] = [
    ItemKind::Header,
    ItemKind::StringId,
    ItemKind::TypeId,
    ItemKind::ProtoId,
    ItemKind::FieldId,
    ItemKind::MethodId,
    ItemKind::ClassDef,
    ItemKind::StringData,
    ItemKind::EncodedArray,
    ItemKind::Annotation,
    ItemKind::AnnotationSet,
    ItemKind::AnnotationSetRefList,
    ItemKind::AnnotationsDirectory,
    ItemKind::TypeList,
    ItemKind::Code,
    ItemKind::ClassData,
    ItemKind::DebugInfo,
    ItemKind::MapList,
];

/// Index tables, in placement and write order. They follow the header.
pub const INDEXED_ORDER: [ItemKind; 6] = [
    ItemKind::StringId,
    ItemKind::TypeId,
    ItemKind::ProtoId,
    ItemKind::FieldId,
    ItemKind::MethodId,
    ItemKind::ClassDef,
];

/// Data-region sections, in placement and write order. The map follows them.
pub const OFFSETTED_ORDER: [ItemKind; 10] = [
    ItemKind::TypeList,
    ItemKind::AnnotationSetRefList,
    ItemKind::AnnotationSet,
    ItemKind::AnnotationsDirectory,
    ItemKind::StringData,
    ItemKind::Annotation,
    ItemKind::EncodedArray,
    ItemKind::ClassData,
    ItemKind::DebugInfo,
    ItemKind::Code,
];

impl ItemKind {
    pub fn from_u16(value: u16) -> Result<Self> {
        let kind = match value {
            0x0000 => ItemKind::Header,
            0x0001 => ItemKind::StringId,
            0x0002 => ItemKind::TypeId,
            0x0003 => ItemKind::ProtoId,
            0x0004 => ItemKind::FieldId,
            0x0005 => ItemKind::MethodId,
            0x0006 => ItemKind::ClassDef,
            0x1000 => ItemKind::MapList,
            0x1001 => ItemKind::TypeList,
            0x1002 => ItemKind::AnnotationSetRefList,
            0x1003 => ItemKind::AnnotationSet,
            0x2000 => ItemKind::ClassData,
            0x2001 => ItemKind::Code,
            0x2002 => ItemKind::StringData,
            0x2003 => ItemKind::DebugInfo,
            0x2004 => ItemKind::Annotation,
            0x2005 => ItemKind::EncodedArray,
            0x2006 => ItemKind::AnnotationsDirectory,
            other => return Err(DexError::UnknownItemKind(other)),
        };
        Ok(kind)
    }

    pub const fn code(self) -> u16 {
        self as u16
    }

    /// True for kinds addressed by dense index rather than byte offset.
    ///
    /// The header and the map are singletons addressed as index 0.
    pub const fn is_indexed(self) -> bool {
        matches!(
            self,
            ItemKind::Header
                | ItemKind::StringId
                | ItemKind::TypeId
                | ItemKind::ProtoId
                | ItemKind::FieldId
                | ItemKind::MethodId
                | ItemKind::ClassDef
                | ItemKind::MapList
        )
    }

    /// Fixed entry width of an index table, if this kind has one.
    pub const fn entry_size(self) -> Option<u32> {
        match self {
            ItemKind::StringId | ItemKind::TypeId => Some(4),
            ItemKind::ProtoId => Some(12),
            ItemKind::FieldId | ItemKind::MethodId => Some(8),
            ItemKind::ClassDef => Some(32),
            _ => None,
        }
    }

    /// Required byte alignment of every item of this kind.
    pub const fn alignment(self) -> u32 {
        match self {
            ItemKind::StringData
            | ItemKind::DebugInfo
            | ItemKind::Annotation
            | ItemKind::EncodedArray
            | ItemKind::ClassData => 1,
            _ => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ItemKind::Header => "header_item",
            ItemKind::StringId => "string_id_item",
            ItemKind::TypeId => "type_id_item",
            ItemKind::ProtoId => "proto_id_item",
            ItemKind::FieldId => "field_id_item",
            ItemKind::MethodId => "method_id_item",
            ItemKind::ClassDef => "class_def_item",
            ItemKind::MapList => "map_list",
            ItemKind::TypeList => "type_list",
            ItemKind::AnnotationSetRefList => "annotation_set_ref_list",
            ItemKind::AnnotationSet => "annotation_set_item",
            ItemKind::ClassData => "class_data_item",
            ItemKind::Code => "code_item",
            ItemKind::StringData => "string_data_item",
            ItemKind::DebugInfo => "debug_info_item",
            ItemKind::Annotation => "annotation_item",
            ItemKind::EncodedArray => "encoded_array_item",
            ItemKind::AnnotationsDirectory => "annotations_directory_item",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
