//! Shared fixtures for the integration tests
#![allow(dead_code)]

use dexfile::annotations::VISIBILITY_RUNTIME;
use dexfile::*;

/// Two classes touching every item kind.
///
/// `Derived` is interned before its superclass `Base`, so dependency
/// ordering has something to do.
pub fn sample_file() -> DexFile {
    let mut file = DexFile::new();

    let object = file.intern_type("Ljava/lang/Object;");
    let string = file.intern_type("Ljava/lang/String;");
    let void = file.intern_type("V");
    let int = file.intern_type("I");
    let base = file.intern_type("Lcom/example/Base;");
    let derived = file.intern_type("Lcom/example/Derived;");
    let runnable = file.intern_type("Ljava/lang/Runnable;");
    let deprecated = file.intern_type("Ljava/lang/Deprecated;");
    let exception = file.intern_type("Ljava/lang/Exception;");

    let params = file.intern(TypeListItem::new(vec![int, string]));
    let shorty_v = file.intern_string("V");
    let shorty_vil = file.intern_string("VIL");
    let proto_v = file.intern(ProtoIdItem {
        shorty: shorty_v,
        return_type: void,
        parameters: None,
    });
    let proto_vil = file.intern(ProtoIdItem {
        shorty: shorty_vil,
        return_type: void,
        parameters: Some(params),
    });

    let count_name = file.intern_string("count");
    let count = file.intern(FieldIdItem {
        class: base,
        field_type: int,
        name: count_name,
    });
    let tag_name = file.intern_string("TAG");
    let tag = file.intern(FieldIdItem {
        class: base,
        field_type: string,
        name: tag_name,
    });

    let init_name = file.intern_string("<init>");
    let run_name = file.intern_string("run");
    let init = file.intern(MethodIdItem {
        class: base,
        proto: proto_v,
        name: init_name,
    });
    let run = file.intern(MethodIdItem {
        class: derived,
        proto: proto_vil,
        name: run_name,
    });

    let x_name = file.intern_string("x");
    let debug = file.intern(DebugInfoItem {
        line_start: 3,
        parameter_names: vec![Some(x_name), None],
        ops: vec![
            DebugOp::SetPrologueEnd,
            DebugOp::AdvancePc(2),
            DebugOp::StartLocal {
                register: Register::new(1),
                name: Some(x_name),
                local_type: Some(int),
            },
            DebugOp::AdvanceLine(-1),
            DebugOp::Special(0x1d),
        ],
    });

    let init_code = file.intern(CodeItem {
        registers_size: 1,
        ins_size: 1,
        outs_size: 1,
        insns: vec![0x1070, 0x0000, 0x0000, 0x000e],
        ..CodeItem::default()
    });
    let run_code = file.intern(CodeItem {
        registers_size: 3,
        ins_size: 3,
        outs_size: 0,
        debug_info: Some(debug),
        insns: vec![0x0000, 0x0000, 0x000e],
        tries: vec![TryItem {
            start_addr: 0,
            insn_count: 2,
            handler: 0,
        }],
        handlers: vec![CatchHandler {
            catches: vec![(exception, 2)],
            catch_all: None,
        }],
    });

    let hello = file.intern_string("hello");
    let static_values = file.intern(EncodedArrayItem::new(vec![EncodedValue::String(hello)]));

    let value_name = file.intern_string("value");
    let annotation = file.intern(AnnotationItem {
        visibility: VISIBILITY_RUNTIME,
        annotation: EncodedAnnotation {
            annotation_type: deprecated,
            elements: vec![(value_name, EncodedValue::Int(7))],
        },
    });
    let set = file.intern(AnnotationSetItem {
        annotations: vec![annotation],
    });
    let ref_list = file.intern(AnnotationSetRefList {
        sets: vec![Some(set), None],
    });
    let directory = file.intern(AnnotationDirectoryItem {
        class_annotations: Some(set),
        fields: vec![],
        methods: vec![(run, set)],
        parameters: vec![(run, ref_list)],
    });

    let base_data = file.intern(ClassDataItem {
        static_fields: vec![EncodedField {
            field: tag,
            access_flags: 0x19,
        }],
        instance_fields: vec![EncodedField {
            field: count,
            access_flags: 0x2,
        }],
        direct_methods: vec![EncodedMethod {
            method: init,
            access_flags: 0x10001,
            code: Some(init_code),
        }],
        virtual_methods: vec![],
    });
    let derived_data = file.intern(ClassDataItem {
        virtual_methods: vec![EncodedMethod {
            method: run,
            access_flags: 0x1,
            code: Some(run_code),
        }],
        ..ClassDataItem::default()
    });
    let interfaces = file.intern(TypeListItem::new(vec![runnable]));

    let mut derived_def = ClassDefItem::new(derived, 0x1);
    derived_def.superclass = Some(base);
    derived_def.interfaces = Some(interfaces);
    derived_def.annotations = Some(directory);
    derived_def.class_data = Some(derived_data);
    file.intern(derived_def);

    let source = file.intern_string("Base.java");
    let mut base_def = ClassDefItem::new(base, 0x1);
    base_def.superclass = Some(object);
    base_def.source_file = Some(source);
    base_def.class_data = Some(base_data);
    base_def.static_values = Some(static_values);
    file.intern(base_def);

    file
}

/// Descriptors of the defined classes, in current order.
pub fn class_names(file: &DexFile) -> Vec<String> {
    file.section::<ClassDefItem>()
        .iter()
        .map(|def| file.type_descriptor(def.class))
        .collect()
}

/// String contents in current data order.
pub fn string_data(file: &DexFile) -> Vec<String> {
    file.section::<StringDataItem>()
        .iter()
        .map(|s| s.to_string_lossy())
        .collect()
}

pub fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Byte position of the map row for `kind`.
pub fn map_entry_at(bytes: &[u8], kind: ItemKind) -> usize {
    let map_offset = read_u32(bytes, 52) as usize;
    let count = read_u32(bytes, map_offset) as usize;
    (0..count)
        .map(|i| map_offset + 4 + 12 * i)
        .find(|&at| u16::from_le_bytes([bytes[at], bytes[at + 1]]) == kind.code())
        .expect("kind present in map")
}
