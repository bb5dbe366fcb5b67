use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use vmhost::{
    GasSchedule, MeteringContext, MockWorld, OutputContext, StorageContext, StorageEnv,
};
use vmhost_types::Address;

fn new_storage(world: Arc<MockWorld>) -> StorageContext {
    let mut storage = StorageContext::new(world, "RESERVED", "VMHOST@").unwrap();
    storage.set_address(Address::from_label("bench"));
    storage
}

fn bench_set_storage(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_set");
    let world = Arc::new(MockWorld::new());

    group.bench_function("add_1k_keys", |b| {
        b.iter_batched(
            || {
                (
                    new_storage(world.clone()),
                    OutputContext::new(),
                    MeteringContext::new(GasSchedule::default(), u64::MAX),
                )
            },
            |(mut storage, mut output, mut metering)| {
                let mut env = StorageEnv {
                    output: &mut output,
                    metering: &mut metering,
                    read_only: false,
                };
                for i in 0..1000u32 {
                    let key = format!("key{i}");
                    black_box(storage.set_storage(&mut env, key.as_bytes(), b"value").unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("rewrite_same_key", |b| {
        b.iter_batched(
            || {
                (
                    new_storage(world.clone()),
                    OutputContext::new(),
                    MeteringContext::new(GasSchedule::default(), u64::MAX),
                )
            },
            |(mut storage, mut output, mut metering)| {
                let mut env = StorageEnv {
                    output: &mut output,
                    metering: &mut metering,
                    read_only: false,
                };
                for i in 0..1000u32 {
                    let value = i.to_be_bytes();
                    black_box(storage.set_storage(&mut env, b"counter", &value).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_layered_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_lookup");
    let mut output = OutputContext::new();
    let mut metering = MeteringContext::new(GasSchedule::default(), u64::MAX);
    let mut storage = new_storage(Arc::new(MockWorld::new()));
    {
        let mut env = StorageEnv {
            output: &mut output,
            metering: &mut metering,
            read_only: false,
        };
        storage.set_storage(&mut env, b"deep", b"value").unwrap();
    }
    // eight isolated layers above the write
    for _ in 0..8 {
        output.push_state();
        output.censor_vm_output();
    }

    group.bench_function("read_through_8_layers", |b| {
        b.iter(|| black_box(storage.get_storage(&mut output, b"deep").unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_set_storage, bench_layered_lookup);
criterion_main!(benches);
