//! Build, write and decode round trips

mod common;

use common::{class_names, sample_file, string_data};
use dexfile::*;
use std::collections::BTreeSet;

#[test]
fn test_empty_container() {
    let mut file = DexFile::new();
    let bytes = file.to_bytes().unwrap();
    assert_eq!(bytes.len(), 0x70 + 4 + 2 * 12);
    integrity::verify(&bytes).unwrap();

    let reread = DexFile::from_bytes(&bytes, &DexOptions::default()).unwrap();
    for stats in reread.section_stats() {
        match stats.kind {
            ItemKind::Header | ItemKind::MapList => assert_eq!(stats.count, 1),
            kind => assert_eq!(stats.count, 0, "{kind} should be empty"),
        }
    }
}

#[test]
fn test_sample_content_survives() {
    let mut file = sample_file();
    let bytes = file.to_bytes().unwrap();
    assert_eq!(bytes.len() as u32, file.header_item().file_size);
    integrity::verify(&bytes).unwrap();

    let reread = DexFile::from_bytes(&bytes, &DexOptions::default()).unwrap();

    let counts = |f: &DexFile| -> Vec<(ItemKind, usize)> {
        f.section_stats().iter().map(|s| (s.kind, s.count)).collect()
    };
    assert_eq!(counts(&file), counts(&reread));
    assert_eq!(class_names(&reread), class_names(&file));

    let strings = |f: &DexFile| string_data(f).into_iter().collect::<BTreeSet<_>>();
    assert_eq!(strings(&reread), strings(&file));

    let derived = reread
        .section::<ClassDefItem>()
        .iter()
        .find(|def| reread.type_descriptor(def.class) == "Lcom/example/Derived;")
        .unwrap();
    assert_eq!(
        reread.type_descriptor(derived.superclass.unwrap()),
        "Lcom/example/Base;"
    );
    let interfaces = reread.get(derived.interfaces.unwrap());
    assert_eq!(
        reread.type_descriptor(interfaces.types[0]),
        "Ljava/lang/Runnable;"
    );

    let data = reread.get(derived.class_data.unwrap());
    let code = reread.get(data.virtual_methods[0].code.unwrap());
    assert_eq!(code.insns, [0x0000, 0x0000, 0x000e]);
    assert_eq!(code.tries.len(), 1);
    assert_eq!(
        reread.type_descriptor(code.handlers[0].catches[0].0),
        "Ljava/lang/Exception;"
    );
    let debug = reread.get(code.debug_info.unwrap());
    assert_eq!(debug.line_start, 3);
    assert_eq!(debug.ops.len(), 5);
}

#[test]
fn test_in_place_rewrite_is_byte_identical() {
    let mut file = sample_file();
    let bytes = file.to_bytes().unwrap();
    let original_stats = file.section_stats();

    let options = DexOptions::new().in_place(true);
    let mut reread = DexFile::from_bytes(&bytes, &options).unwrap();
    let rewritten = reread.to_bytes().unwrap();

    assert_eq!(reread.section_stats(), original_stats);
    assert_eq!(rewritten, bytes);
}

#[test]
fn test_positions_match_after_in_place_read() {
    let mut file = sample_file();
    let bytes = file.to_bytes().unwrap();

    let mut reread = DexFile::from_bytes(&bytes, &DexOptions::new().in_place(true)).unwrap();
    reread.place();
    for kind in READ_ORDER {
        assert_eq!(
            reread.section_for_kind(kind).positions(),
            file.section_for_kind(kind).positions(),
            "{kind} positions moved"
        );
    }
}

#[test]
fn test_default_rewrite_of_own_output_is_stable() {
    let mut file = sample_file();
    let bytes = file.to_bytes().unwrap();

    let mut reread = DexFile::from_bytes(&bytes, &DexOptions::default()).unwrap();
    assert_eq!(reread.to_bytes().unwrap(), bytes);
}

#[test]
fn test_header_tables_point_at_sections() {
    let mut file = sample_file();
    let bytes = file.to_bytes().unwrap();

    let string_ids = file.section_for_kind(ItemKind::StringId);
    assert_eq!(
        common::read_u32(&bytes, 56),
        string_ids.len() as u32
    );
    assert_eq!(common::read_u32(&bytes, 60), 0x70);

    let class_defs = file.section_for_kind(ItemKind::ClassDef);
    assert_eq!(common::read_u32(&bytes, 96), class_defs.len() as u32);
    assert_eq!(
        Some(common::read_u32(&bytes, 100)),
        class_defs.offset()
    );
    assert_eq!(common::read_u32(&bytes, 108), file.header_item().data_offset);
}

#[test]
fn test_save_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classes.dex");

    let mut file = sample_file();
    file.save(&path).unwrap();

    let options = DexOptions::new().verify_integrity(true);
    let reread = DexFile::open(&path, &options).unwrap();
    assert_eq!(class_names(&reread), class_names(&file));
    assert_eq!(reread.header_item().version(), "035");
}
