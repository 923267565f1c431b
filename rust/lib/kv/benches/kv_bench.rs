use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use openerp_kv::{KVStore, OverlayKV, RedbStore};

fn bench_redb_get(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    for i in 0..1000 {
        let key = format!("mdm:materials:PS-{:05}", i);
        store.set(&key, br#"{"code":"x"}"#).unwrap();
    }

    c.bench_function("redb_get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("mdm:materials:PS-{:05}", i % 1000);
            let _ = store.get(black_box(&key)).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_scan(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    for i in 0..1000 {
        let key = format!("mdm:materials:PS-{:05}", i);
        store.set(&key, br#"{"code":"x"}"#).unwrap();
    }

    c.bench_function("redb_scan_1000", |b| {
        b.iter(|| {
            let results = store.scan(black_box("mdm:materials:")).unwrap();
            assert_eq!(results.len(), 1000);
        });
    });
}

// One issuance step: read the counter and swap in the incremented value.
fn bench_redb_cas_increment(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();
    store.set("mdm:sequences:BENCH", b"0").unwrap();

    c.bench_function("redb_cas_increment", |b| {
        b.iter(|| {
            let current = store.get("mdm:sequences:BENCH").unwrap().unwrap();
            let n: u64 = std::str::from_utf8(&current).unwrap().parse().unwrap();
            let next = (n + 1).to_string();
            assert!(store
                .compare_and_swap(black_box("mdm:sequences:BENCH"), Some(&current), next.as_bytes())
                .unwrap());
        });
    });
}

fn bench_overlay_get_file_layer(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let db = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();
    let overlay = OverlayKV::new(db);

    for i in 0..1000 {
        let key = format!("mdm:countries:{:04}", i);
        overlay.insert_file_entry(key, b"{}".to_vec());
    }

    c.bench_function("overlay_get_file_layer", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("mdm:countries:{:04}", i % 1000);
            let _ = overlay.get(black_box(&key)).unwrap();
            i += 1;
        });
    });
}

criterion_group!(
    benches,
    bench_redb_get,
    bench_redb_scan,
    bench_redb_cas_increment,
    bench_overlay_get_file_layer,
);
criterion_main!(benches);
