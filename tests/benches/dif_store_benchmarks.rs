//! # Dif Store Benchmarks
//!
//! | Operation | Path |
//! |-----------|------|
//! | `IdentityDeriver::encode` | identity derivation |
//! | `has` | strong and eventual index lookup |
//! | `add` | derived-id conditional create |
//! | `register_key` | registry read-modify-write |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::time::Duration;

use dif_store::{
    Consistency, DifStore, DifStoreApi, Fingerprint, IdentityDeriver, StoreConfig,
};

fn random_fingerprint(rng: &mut impl Rng) -> Fingerprint {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    Fingerprint::new(bytes.to_vec())
}

// ============================================================================
// IDENTITY
// ============================================================================

fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("dif-store-identity");
    let deriver = IdentityDeriver::default();
    let mut rng = rand::thread_rng();
    let inputs: Vec<i64> = (0..1_000).map(|_| rng.gen()).collect();

    group.throughput(Throughput::Elements(inputs.len() as u64));
    group.bench_function("encode_base62", |b| {
        b.iter(|| {
            for x in &inputs {
                black_box(deriver.encode(*x));
            }
        })
    });
    group.finish();
}

// ============================================================================
// DEDUP
// ============================================================================

fn bench_has(c: &mut Criterion) {
    let mut group = c.benchmark_group("dif-store-has");
    group.measurement_time(Duration::from_secs(5));
    let mut rng = rand::thread_rng();

    for size in [100usize, 1_000, 10_000] {
        let store = DifStore::new_in_memory(StoreConfig::default()).unwrap();
        let recorded: Vec<Fingerprint> = (0..size).map(|_| random_fingerprint(&mut rng)).collect();
        for fingerprint in &recorded {
            store.add("bench", fingerprint).unwrap();
        }
        store.sync_indexes().unwrap();
        let target = &recorded[size / 2];

        for consistency in [Consistency::Strong, Consistency::Eventual] {
            group.bench_with_input(
                BenchmarkId::new(format!("has_{:?}", consistency).to_lowercase(), size),
                target,
                |b, target| {
                    b.iter(|| black_box(store.has_with("bench", target, consistency).unwrap()))
                },
            );
        }
    }
    group.finish();
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("dif-store-add");
    let mut rng = rand::thread_rng();
    let store = DifStore::new_in_memory(StoreConfig::default()).unwrap();

    group.bench_function("add_new", |b| {
        b.iter_batched(
            || random_fingerprint(&mut rng),
            |fingerprint| store.add("bench", &fingerprint).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    let repeated = Fingerprint::new(b"repeated submission".to_vec());
    store.add("bench", &repeated).unwrap();
    group.bench_function("add_existing", |b| {
        b.iter(|| store.add("bench", black_box(&repeated)).unwrap())
    });
    group.finish();
}

// ============================================================================
// REGISTRY
// ============================================================================

fn bench_register_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("dif-store-registry");
    let store = DifStore::new_in_memory(StoreConfig::default()).unwrap();
    let keys: Vec<String> = (0..100).map(|i| format!("key-{}", i)).collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    store.ensure_keys(&keys).unwrap();

    group.bench_function("register_existing", |b| {
        b.iter(|| black_box(store.register_key("key-50").unwrap()))
    });

    let mut counter = 0u64;
    group.bench_function("register_new", |b| {
        b.iter(|| {
            counter += 1;
            black_box(store.register_key(&format!("new-{}", counter)).unwrap())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_identity,
    bench_has,
    bench_add,
    bench_register_key
);

criterion_main!(benches);
