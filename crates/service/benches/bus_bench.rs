use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::commands::{CreatePermission, CreateRole};
use identity_store::InMemoryDatabase;
use service::{
    Dependencies, InMemoryBroker, InMemoryNotifier, MessageBus, NoticeRoute, command_registry,
};

fn command_bus(database: &InMemoryDatabase) -> MessageBus {
    let dependencies = Dependencies::new(
        Arc::new(database.clone()),
        Arc::new(InMemoryBroker::new()),
        Arc::new(InMemoryNotifier::new()),
    );
    MessageBus::new(
        command_registry(NoticeRoute::Local).unwrap(),
        dependencies.sessions,
        dependencies.broker,
        dependencies.notifier,
        dependencies.admin_address,
    )
}

fn bench_create_role(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("bus/create_role", |b| {
        b.iter(|| {
            rt.block_on(async {
                let database = InMemoryDatabase::new();
                let bus = command_bus(&database);
                bus.handle(CreateRole::new("admin", vec![])).await.unwrap();
            })
        });
    });
}

fn bench_commands_on_populated_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("bus/create_permission");

    for existing in [10, 100, 1000] {
        let database = InMemoryDatabase::new();
        let bus = command_bus(&database);
        rt.block_on(async {
            for i in 0..existing {
                bus.handle(CreatePermission::new(format!("perm-{i}")))
                    .await
                    .unwrap();
            }
        });

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(existing), &existing, |b, _| {
            b.iter(|| {
                next += 1;
                rt.block_on(bus.handle(CreatePermission::new(format!("bench-{next}"))))
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create_role, bench_commands_on_populated_store);
criterion_main!(benches);
