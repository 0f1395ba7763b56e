use common::{CompanyId, OwnerScope, UserId, VariantId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory_store::{
    CommitOptions, InMemoryInventoryStore, InventoryStore, MovementQuery, MovementType,
    StockChange, UnitOfWork,
};

fn purchase(variant: VariantId, scope: OwnerScope, qty: i64) -> UnitOfWork {
    UnitOfWork::new(UserId::new()).change(StockChange::add(
        variant,
        scope,
        qty,
        MovementType::Purchase,
    ))
}

fn bench_single_add(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("inventory_store/commit_single_add", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryInventoryStore::new();
                let scope: OwnerScope = CompanyId::new().into();
                store
                    .commit(purchase(VariantId::new(), scope, 10), CommitOptions::default())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_multi_line_reservation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryInventoryStore::new();
    let scope: OwnerScope = CompanyId::new().into();
    let variants: Vec<VariantId> = (0..20).map(|_| VariantId::new()).collect();

    rt.block_on(async {
        for &variant in &variants {
            store
                .commit(purchase(variant, scope, 1_000_000), CommitOptions::default())
                .await
                .unwrap();
        }
    });

    c.bench_function("inventory_store/reserve_release_20_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reserve = UnitOfWork::new(UserId::new())
                    .changes(variants.iter().map(|&v| StockChange::reserve(v, scope, 1)));
                store.commit(reserve, CommitOptions::default()).await.unwrap();

                let release = UnitOfWork::new(UserId::new())
                    .changes(variants.iter().map(|&v| StockChange::release(v, scope, 1)));
                store.commit(release, CommitOptions::default()).await.unwrap();
            });
        });
    });
}

fn bench_movement_history(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryInventoryStore::new();
    let scope: OwnerScope = CompanyId::new().into();
    let variant = VariantId::new();

    // Pre-populate with 1000 movements
    rt.block_on(async {
        for _ in 0..1000 {
            store
                .commit(purchase(variant, scope, 1), CommitOptions::default())
                .await
                .unwrap();
        }
    });

    c.bench_function("inventory_store/movement_history_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let movements = store
                    .query_movements(MovementQuery::for_record(variant, scope))
                    .await
                    .unwrap();
                assert_eq!(movements.len(), 1000);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_add,
    bench_multi_line_reservation,
    bench_movement_history
);
criterion_main!(benches);
