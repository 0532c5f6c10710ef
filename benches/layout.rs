use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dexfile::*;

/// Synthetic file with `classes` classes of one method each.
fn synthetic(classes: usize) -> DexFile {
    let mut file = DexFile::new();
    let object = file.intern_type("Ljava/lang/Object;");
    let void = file.intern_type("V");
    let shorty = file.intern_string("V");
    let proto = file.intern(ProtoIdItem {
        shorty,
        return_type: void,
        parameters: None,
    });
    let name = file.intern_string("run");

    for i in 0..classes {
        let class = file.intern_type(&format!("Lbench/C{i};"));
        let method = file.intern(MethodIdItem { class, proto, name });
        let code = file.intern(CodeItem {
            registers_size: 2,
            insns: vec![0x0012, i as u16, 0x000e],
            ..CodeItem::default()
        });
        let data = file.intern(ClassDataItem {
            direct_methods: vec![EncodedMethod {
                method,
                access_flags: 0x9,
                code: Some(code),
            }],
            ..ClassDataItem::default()
        });
        let mut def = ClassDefItem::new(class, 0x1);
        def.superclass = Some(object);
        def.class_data = Some(data);
        file.intern(def);
    }
    file
}

fn bench_place_and_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_and_write");

    for classes in [100, 1000, 5000] {
        group.throughput(Throughput::Elements(classes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(classes), &classes, |b, &n| {
            let mut file = synthetic(n);
            b.iter(|| black_box(file.to_bytes().unwrap()));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for classes in [100, 1000, 5000] {
        let bytes = synthetic(classes).to_bytes().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(classes), &bytes, |b, bytes| {
            b.iter(|| black_box(DexFile::from_bytes(bytes, &DexOptions::default()).unwrap()));
        });
    }

    group.finish();
}

fn bench_canonical_sort(c: &mut Criterion) {
    let mut file = synthetic(1000);
    file.set_sort_all_items(true);
    c.bench_function("canonical_place_1000", |b| b.iter(|| black_box(file.place())));
}

criterion_group!(
    benches,
    bench_place_and_write,
    bench_decode,
    bench_canonical_sort
);
criterion_main!(benches);
