use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use key_registry::{
    registry::{apply_changes, codec, ChangeSet, KeyRegistry, NewKey, RegistryPolicy, SecretRef},
    storage::{InMemoryStore, RegistryStore},
};
use std::sync::Arc;
use tokio::runtime::Runtime;

const KEY_COUNTS: &[usize] = &[1, 10, 100];

fn policy() -> RegistryPolicy {
    RegistryPolicy::from_millis(60_000, 86_400_000).expect("valid policy")
}

/// Registry with `key_count` keys that each saw some traffic.
fn seeded_registry(key_count: usize) -> KeyRegistry {
    let mut changes = ChangeSet::new();
    for i in 0..key_count {
        let id = format!("key-{i:04}");
        changes = changes
            .add(NewKey::new(id.as_str(), SecretRef::new(format!("enc:{id}"))))
            .record_success(id.as_str(), 100 + i as u64)
            .record_failure(id.as_str());
    }
    apply_changes(None, &changes, 1_000, &policy()).expect("seeded registry")
}

fn bench_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_changes");
    for &key_count in KEY_COUNTS {
        let registry = seeded_registry(key_count);
        let changes = ChangeSet::new().record_success("key-0000", 250);

        group.bench_with_input(
            BenchmarkId::new("record_outcome", key_count),
            &registry,
            |b, registry| {
                b.iter(|| {
                    apply_changes(
                        Some(black_box(registry.clone())),
                        black_box(&changes),
                        black_box(2_000),
                        &policy(),
                    )
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("window_slide", key_count),
            &registry,
            |b, registry| {
                b.iter(|| {
                    apply_changes(
                        Some(black_box(registry.clone())),
                        black_box(&ChangeSet::new()),
                        black_box(125_000),
                        &policy(),
                    )
                })
            },
        );
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let registry = seeded_registry(100);
    let document = codec::encode(&registry).expect("encodes");

    c.bench_function("codec_encode_100", |b| {
        b.iter(|| codec::encode(black_box(&registry)))
    });
    c.bench_function("codec_decode_100", |b| {
        b.iter(|| codec::decode("bench", black_box(&document)))
    });
}

fn bench_memory_store(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let store = Arc::new(InMemoryStore::new());
    let seed = ChangeSet::new().add(NewKey::new("key-0000", SecretRef::new("enc:key-0000")));
    rt.block_on(store.apply("bench", &seed, 1_000, &policy()))
        .expect("seeded");

    let changes = ChangeSet::new().record_success("key-0000", 120);
    c.bench_function("memory_store_apply", |b| {
        b.to_async(&rt)
            .iter(|| async { store.apply("bench", &changes, 2_000, &policy()).await })
    });
}

criterion_group!(benches, bench_transition, bench_codec, bench_memory_store);
criterion_main!(benches);
