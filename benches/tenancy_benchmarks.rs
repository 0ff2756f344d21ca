//! Tenancy Benchmarks
//!
//! - **Quoting**: identifier and literal escaping
//! - **Filtering**: reducing a large catalog to tenant schemas
//! - **Scoped switch**: one `with_tenant` round trip on a mock session
//! - **Bulk migrate**: `migrate_all` across many tenants

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tenantry::*;
use tenantry_testing::{TestTenancy, numbered_migrations};
use tokio::runtime::Runtime;

fn bench_quoting(c: &mut Criterion) {
    let mut group = c.benchmark_group("quoting");

    for name in ["tenant_acme", "a\"b\"c\"d", "x'; DROP SCHEMA public; --"] {
        group.bench_with_input(BenchmarkId::new("quote_ident", name), name, |b, name| {
            b.iter(|| quote_ident(black_box(name)))
        });
        group.bench_with_input(BenchmarkId::new("quote_literal", name), name, |b, name| {
            b.iter(|| quote_literal(black_box(name)))
        });
    }

    group.finish();
}

fn bench_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_tenant_schemas");
    let config = TenancyConfig::default().with_excluded_schema("audit");

    for count in [100usize, 10_000] {
        let mut catalog: Vec<String> = (0..count).map(|i| format!("tenant_{i:05}")).collect();
        catalog.extend(
            ["information_schema", "pg_catalog", "public", "pg_temp_1", "pg_toast", "audit"]
                .map(String::from),
        );

        group.throughput(Throughput::Elements(catalog.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &catalog, |b, catalog| {
            b.iter(|| filter_tenant_schemas(black_box(catalog.clone()), &config))
        });
    }

    group.finish();
}

fn bench_scoped_switch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let tenancy = TestTenancy::builder().with_schemas(["tenant_a"]).build();

    c.bench_function("with_tenant", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut ctx = tenancy.context();
            ctx.with_tenant("tenant_a", |ctx| {
                Box::pin(async move { Ok::<_, TenancyError>(ctx.depth()) })
            })
            .await
            .unwrap()
        })
    });
}

fn bench_bulk_migrate(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("migrate_all");
    group.sample_size(20);

    for tenants in [10usize, 100] {
        group.throughput(Throughput::Elements(tenants as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tenants), &tenants, |b, &tenants| {
            b.to_async(&runtime).iter(|| async move {
                let tenancy = TestTenancy::builder()
                    .with_schemas((0..tenants).map(|i| format!("tenant_{i}")))
                    .with_migrations(numbered_migrations(5))
                    .build();
                let run = tenancy.orchestrator().migrate_all(true).await.unwrap();
                black_box(run.summary)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_quoting,
    bench_filtering,
    bench_scoped_switch,
    bench_bulk_migrate
);
criterion_main!(benches);
