use common::OrderId;
use criterion::{Criterion, criterion_group, criterion_main};
use saga::{InMemorySagaStore, SagaStep, SagaStore};

fn bench_load_or_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga_store/load_or_create", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySagaStore::new();
                store.load_or_create(OrderId::new()).await.unwrap();
            });
        });
    });
}

fn bench_cas_advance(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga_store/cas_advance", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySagaStore::new();
                let (mut saga, _) = store.load_or_create(OrderId::new()).await.unwrap();
                saga.advance(SagaStep::ReservingInventory).unwrap();
                store
                    .compare_and_swap(SagaStep::NotStarted, &saga)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_forward_walk(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga_store/full_forward_walk", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySagaStore::new();
                let (mut saga, _) = store.load_or_create(OrderId::new()).await.unwrap();
                let path = [
                    SagaStep::ReservingInventory,
                    SagaStep::Reserved,
                    SagaStep::ProcessingPayment,
                    SagaStep::Paid,
                    SagaStep::Finalizing,
                    SagaStep::Done,
                ];
                for next in path {
                    let expected = saga.step();
                    saga.advance(next).unwrap();
                    store.compare_and_swap(expected, &saga).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_load_or_create,
    bench_cas_advance,
    bench_full_forward_walk
);
criterion_main!(benches);
