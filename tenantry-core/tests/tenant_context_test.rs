//! Tenant context isolation and restoration

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tenantry_core::*;
use tenantry_testing::*;

fn tenancy() -> TestTenancy {
    TestTenancy::builder()
        .with_schemas(["tenant_base", "tenant_a", "tenant_b", "tenant_c", "acme", "globex"])
        .build()
}

#[derive(Debug)]
enum AppError {
    Tenancy(TenancyError),
    Boom(&'static str),
}

impl From<TenancyError> for AppError {
    fn from(err: TenancyError) -> Self {
        AppError::Tenancy(err)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_contexts_never_observe_each_other() {
    let tenancy = TestTenancy::builder()
        .with_schemas((0..24).map(|i| format!("tenant_{i}")))
        .build();

    let mut handles = Vec::new();
    for i in 0..24u64 {
        let conn = tenancy.connection().with_latency(Duration::from_millis(1));
        let config = Arc::clone(&tenancy.config);
        handles.push(tokio::spawn(async move {
            let mut ctx = TenantContext::new(conn, config);
            let schema = format!("tenant_{i}");

            ctx.switch_to_schema(&schema).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5 + i % 7)).await;

            assert_eq!(ctx.current_schema(), schema);
            assert_eq!(ctx.session_schema().await.unwrap(), schema);
            assert_active_schema(&ctx, &schema);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scoped_blocks_stay_isolated() {
    let tenancy = TestTenancy::builder()
        .with_schemas((0..8).map(|i| format!("tenant_{i}")))
        .build();

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let mut ctx = tenancy.context();
        handles.push(tokio::spawn(async move {
            let schema = format!("tenant_{i}");
            let expected = schema.clone();
            let seen = ctx
                .with_tenant(schema, move |ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(3 * (8 - i))).await;
                        Ok::<_, TenancyError>(ctx.session_schema().await?)
                    })
                })
                .await
                .unwrap();
            assert_eq!(seen, expected);
            assert_active_schema(&ctx, "public");
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_nested_scopes_unwind_in_order() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    ctx.with_tenant("tenant_a", |ctx| {
        Box::pin(async move {
            assert_active_schema(ctx, "tenant_a");
            ctx.with_tenant("tenant_b", |ctx| {
                Box::pin(async move {
                    assert_active_schema(ctx, "tenant_b");
                    ctx.with_tenant("tenant_c", |ctx| {
                        Box::pin(async move {
                            assert_active_schema(ctx, "tenant_c");
                            assert_eq!(ctx.depth(), 3);
                            Ok::<_, TenancyError>(())
                        })
                    })
                    .await?;
                    assert_active_schema(ctx, "tenant_b");
                    Ok::<_, TenancyError>(())
                })
            })
            .await?;
            assert_active_schema(ctx, "tenant_a");
            Ok::<_, TenancyError>(())
        })
    })
    .await
    .unwrap();

    assert_active_schema(&ctx, "tenant_base");
    assert_eq!(ctx.depth(), 0);
    assert_eq!(
        ctx.connection().search_path_history(),
        vec![
            "tenant_base",
            "tenant_a",
            "tenant_b",
            "tenant_c",
            "tenant_b",
            "tenant_a",
            "tenant_base"
        ]
    );
}

#[tokio::test]
async fn test_error_in_body_restores_then_propagates() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    let result: std::result::Result<(), AppError> = ctx
        .with_tenant("tenant_a", |ctx| {
            Box::pin(async move {
                assert_active_schema(ctx, "tenant_a");
                Err::<(), _>(AppError::Boom("body failed"))
            })
        })
        .await;

    assert!(matches!(result, Err(AppError::Boom("body failed"))));
    assert_active_schema(&ctx, "tenant_base");
}

#[tokio::test]
async fn test_error_at_inner_level_unwinds_every_level() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();

    let result: std::result::Result<(), AppError> = ctx
        .with_tenant("tenant_a", |ctx| {
            Box::pin(async move {
                assert_active_schema(ctx, "tenant_a");
                ctx.with_tenant("tenant_b", |_ctx| {
                    Box::pin(async move { Err::<(), _>(AppError::Boom("deep")) })
                })
                .await
            })
        })
        .await;

    assert!(matches!(result, Err(AppError::Boom("deep"))));
    assert_active_schema(&ctx, "public");
}

#[tokio::test]
async fn test_activation_failure_restores_then_propagates() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();
    ctx.connection_mut().fail_on(
        "SET search_path TO \"tenant_a\"",
        DriverError::new("connection reset"),
    );

    let mut ran = false;
    let result: std::result::Result<(), AppError> = ctx
        .with_tenant("tenant_a", |_ctx| {
            ran = true;
            Box::pin(async move { Ok::<_, AppError>(()) })
        })
        .await;

    assert!(!ran);
    assert!(matches!(
        result,
        Err(AppError::Tenancy(TenancyError::Connection(_)))
    ));
    assert_active_schema(&ctx, "tenant_base");
}

#[tokio::test]
async fn test_tenant_scope_restores_previous_tenant() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    let acme = Arc::new(Tenant::new("t-1", "acme").with_subdomain("acme"));
    let globex = Tenant::new("t-2", "globex").with_schema("globex");

    ctx.switch_to_tenant(Arc::clone(&acme)).await.unwrap();

    let inner = ctx
        .with_tenant(globex, |ctx| {
            Box::pin(async move {
                Ok::<_, TenancyError>(ctx.current_tenant().map(|t| t.id.clone()))
            })
        })
        .await
        .unwrap();

    assert_eq!(inner.as_deref(), Some("t-2"));
    assert_eq!(ctx.current_tenant().map(|t| t.id.as_str()), Some("t-1"));
    assert_active_schema(&ctx, "acme");
}

#[tokio::test]
async fn test_default_scope_and_blank_names() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_a").await.unwrap();

    ctx.with_tenant(SchemaRef::Default, |ctx| {
        Box::pin(async move {
            assert_active_schema(ctx, "public");
            Ok::<_, TenancyError>(())
        })
    })
    .await
    .unwrap();
    assert_active_schema(&ctx, "tenant_a");

    ctx.switch_to_schema("   ").await.unwrap();
    assert_active_schema(&ctx, "public");
}

#[tokio::test]
async fn test_timeout_mid_scope_is_healed_on_next_use() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        ctx.with_tenant("tenant_a", |ctx| {
            Box::pin(async move {
                ctx.with_tenant("tenant_b", |_ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<_, TenancyError>(())
                    })
                })
                .await
            })
        }),
    )
    .await;
    assert!(timed_out.is_err());

    // The session really is still on the inner schema until healed
    assert_eq!(ctx.current_schema(), "tenant_b");

    ctx.recover().await.unwrap();
    assert_active_schema(&ctx, "tenant_base");
    assert_eq!(ctx.depth(), 0);
}

#[tokio::test]
async fn test_inner_scope_cancelled_by_completing_body() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    let inside = ctx
        .with_tenant("tenant_a", |ctx| {
            Box::pin(async move {
                let inner = tokio::time::timeout(
                    Duration::from_millis(10),
                    ctx.with_tenant("tenant_b", |_ctx| {
                        Box::pin(async move {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            Ok::<_, TenancyError>(())
                        })
                    }),
                )
                .await;
                assert!(inner.is_err());

                // The next operation inside the body heals to the outer scope
                let schema = ctx.session_schema().await?;
                Ok::<_, TenancyError>((schema, ctx.depth()))
            })
        })
        .await
        .unwrap();
    assert_eq!(inside, ("tenant_a".to_string(), 1));

    assert_active_schema(&ctx, "tenant_base");
    assert_eq!(ctx.depth(), 0);

    assert_eq!(ctx.session_schema().await.unwrap(), "tenant_base");
    assert_eq!(ctx.current_schema(), "tenant_base");
    assert_eq!(ctx.depth(), 0);

    ctx.with_tenant("tenant_c", |_ctx| Box::pin(async move { Ok::<_, TenancyError>(()) }))
        .await
        .unwrap();
    assert_active_schema(&ctx, "tenant_base");
    assert_eq!(ctx.depth(), 0);
}

#[tokio::test]
async fn test_inner_scope_cancelled_without_further_use() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    ctx.with_tenant("tenant_a", |ctx| {
        Box::pin(async move {
            let _ = tokio::time::timeout(
                Duration::from_millis(10),
                ctx.with_tenant("tenant_b", |_ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<_, TenancyError>(())
                    })
                }),
            )
            .await;
            Ok::<_, TenancyError>(())
        })
    })
    .await
    .unwrap();

    assert_eq!(ctx.session_schema().await.unwrap(), "tenant_base");
    assert_active_schema(&ctx, "tenant_base");
    assert_eq!(ctx.depth(), 0);
}

#[tokio::test]
async fn test_cancelled_scope_healed_by_next_operation() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();

    let _ = tokio::time::timeout(
        Duration::from_millis(10),
        ctx.with_tenant("tenant_a", |_ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, TenancyError>(())
            })
        }),
    )
    .await;

    // Any operation heals first
    assert!(ctx.schema_exists("tenant_b").await.unwrap());
    assert_active_schema(&ctx, "public");
}

#[tokio::test]
async fn test_panic_in_body_is_healed() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_schema("tenant_base").await.unwrap();

    let outcome = AssertUnwindSafe(ctx.with_tenant("tenant_a", |_ctx| {
        Box::pin(async move {
            if true {
                panic!("handler bug");
            }
            Ok::<_, TenancyError>(())
        })
    }))
    .catch_unwind()
    .await;
    assert!(outcome.is_err());

    ctx.recover().await.unwrap();
    assert_active_schema(&ctx, "tenant_base");
}

#[tokio::test]
async fn test_reset_context() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    ctx.switch_to_tenant(Tenant::new("t-1", "acme").with_subdomain("acme"))
        .await
        .unwrap();

    ctx.reset_context().await.unwrap();
    assert!(ctx.current_tenant().is_none());
    assert_active_schema(&ctx, "public");
}

#[tokio::test]
async fn test_create_and_drop_tenant_schema() {
    let tenancy = tenancy();
    let mut ctx = tenancy.context();
    let tenant = Tenant::new("t-9", "initech").with_subdomain("initech");

    ctx.create_tenant_schema(tenant.clone()).await.unwrap();
    assert!(tenancy.catalog.contains("initech"));

    ctx.drop_tenant_schema(tenant, true).await.unwrap();
    assert!(!tenancy.catalog.contains("initech"));

    ctx.create_tenant_schema("raw_name").await.unwrap();
    assert!(tenancy.catalog.contains("raw_name"));
}
