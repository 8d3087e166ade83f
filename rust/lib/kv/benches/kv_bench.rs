use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

use pathkv_kv::{Context, KeyValueList, MemoryStore, RedbStore, Store};

fn populate(store: &dyn Store, n: usize) {
    let batch = KeyValueList::from_pairs(
        (0..n).map(|i| (format!("bench/key/{:04}", i), "hello world")),
    );
    store.append(&Context::background(), &batch).unwrap();
}

fn bench_redb_append(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();
    let ctx = Context::background();

    c.bench_function("redb_append", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let batch = KeyValueList::from_pairs([(format!("bench/key/{}", i), "hello world")]);
            store.append(black_box(&ctx), black_box(&batch)).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_fetch_prefix(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();
    populate(&store, 1000);
    let ctx = Context::background();

    c.bench_function("redb_fetch_1000", |b| {
        b.iter(|| {
            let results = store.fetch(black_box(&ctx), black_box("bench/key/")).unwrap();
            assert_eq!(results.len(), 1000);
        });
    });
}

fn bench_memory_fetch_prefix(c: &mut Criterion) {
    let store = MemoryStore::new();
    populate(&store, 1000);
    let ctx = Context::background();

    c.bench_function("memory_fetch_1000", |b| {
        b.iter(|| {
            let results = store.fetch(black_box(&ctx), black_box("bench/key/")).unwrap();
            assert_eq!(results.len(), 1000);
        });
    });
}

fn bench_memory_fetch_narrow(c: &mut Criterion) {
    let store = MemoryStore::new();
    populate(&store, 1000);
    let ctx = Context::background();

    c.bench_function("memory_fetch_narrow", |b| {
        b.iter(|| {
            let results = store.fetch(black_box(&ctx), black_box("bench/key/05")).unwrap();
            assert_eq!(results.len(), 100);
        });
    });
}

criterion_group!(
    benches,
    bench_redb_append,
    bench_redb_fetch_prefix,
    bench_memory_fetch_prefix,
    bench_memory_fetch_narrow,
);
criterion_main!(benches);
