use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vmhost::{MockWorld, NativeContract, NativeInstanceBuilder, VmHost, VmHostConfig};
use vmhost_types::{Address, CodeMetadata, ContractCallInput};

fn setup() -> (VmHost, Address) {
    let world = Arc::new(MockWorld::new());
    let builder = Arc::new(NativeInstanceBuilder::new());
    let parent = Address::from_label("parent");
    let child = Address::from_label("child");

    builder.register(
        b"child".to_vec(),
        NativeContract::new().with_function("work", |host| {
            host.storage_store(b"counter", b"1")?;
            host.finish(b"child".to_vec())
        }),
    );
    builder.register(
        b"parent".to_vec(),
        NativeContract::new().with_function("run", move |host| {
            for _ in 0..10 {
                let input = ContractCallInput::new(Address::ZERO, child, "work", 50_000);
                host.execute_on_dest_context(input)?;
            }
            Ok(())
        }),
    );
    world.add_contract(parent, b"parent".to_vec(), CodeMetadata::default());
    world.add_contract(child, b"child".to_vec(), CodeMetadata::default());

    let host = VmHost::new(VmHostConfig::default(), world, builder).unwrap();
    (host, parent)
}

fn bench_dest_context(c: &mut Criterion) {
    let (mut host, parent) = setup();

    c.bench_function("dest_context_10_calls", |b| {
        b.iter(|| {
            let input = ContractCallInput::new(Address::from_label("user"), parent, "run", 10_000_000);
            black_box(host.run_contract_call(input))
        })
    });
}

criterion_group!(benches, bench_dest_context);
criterion_main!(benches);
