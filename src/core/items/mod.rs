//! Catalog of item kinds

pub mod annotations;
pub mod class_data;
pub mod class_def;
pub mod code;
pub mod debug_info;
pub mod encoded_value;
pub mod ids;
pub mod string_data;
pub mod type_list;

pub use annotations::{
    AnnotationDirectoryItem, AnnotationItem, AnnotationSetItem, AnnotationSetRefList,
};
pub use class_data::{ClassDataItem, EncodedField, EncodedMethod};
pub use class_def::ClassDefItem;
pub use code::{CatchHandler, CodeItem, TryItem};
pub use debug_info::{DebugInfoItem, DebugOp, Register};
pub use encoded_value::{EncodedAnnotation, EncodedArrayItem, EncodedValue};
pub use ids::{FieldIdItem, MethodIdItem, ProtoIdItem, StringIdItem, TypeIdItem};
pub use string_data::StringDataItem;
pub use type_list::TypeListItem;
