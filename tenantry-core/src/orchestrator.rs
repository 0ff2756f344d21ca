//! Migration Orchestrator
//!
//! Applies migrations across tenant schemas one schema at a time. Each
//! attempt runs inside [`TenantContext::with_tenant`], so the originally
//! active schema is restored whether the engine succeeds, fails, or the run
//! is cancelled. In the default non-strict mode a failing tenant is recorded
//! and the run moves on.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut orchestrator = MigrationOrchestrator::new(context, Arc::new(engine))
//!     .with_registry(registry);
//!
//! let run = orchestrator.migrate_all(true).await?;
//! println!("{run}");
//!
//! let status = orchestrator.migration_status().await?;
//! println!("{status}");
//! ```

use crate::context::TenantContext;
use crate::error::{Result, TenancyError};
use crate::migration::{MigrationEngine, MigrationResult};
use crate::registry::TenantRegistry;
use crate::report::{MigrationRun, SchemaStatus, StatusReport};
use crate::schema::SchemaConnection;
use crate::tenant::{NewTenant, Tenant};
use std::sync::Arc;
use std::time::Instant;
use tenantry_config::TenancyConfig;
use tenantry_log::{debug, info, warn};

/// Schemas Postgres creates for itself.
pub const SYSTEM_SCHEMAS: [&str; 3] = ["information_schema", "pg_catalog", "public"];

/// Whether `name` is a system schema: one of [`SYSTEM_SCHEMAS`] or a
/// temp/toast namespace.
pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&name) || name.starts_with("pg_temp") || name.starts_with("pg_toast")
}

/// Reduce a catalog listing to tenant schemas, sorted and deduplicated.
///
/// System schemas, the configured default schema and every configured
/// exclusion are removed.
pub fn filter_tenant_schemas(
    schemas: impl IntoIterator<Item = String>,
    config: &TenancyConfig,
) -> Vec<String> {
    let mut tenants: Vec<String> = schemas
        .into_iter()
        .filter(|s| !is_system_schema(s))
        .filter(|s| *s != config.default_schema)
        .filter(|s| !config.excluded_schemas.contains(s))
        .collect();
    tenants.sort();
    tenants.dedup();
    tenants
}

/// Keep engine failures as `MigrationFailure` naming the schema.
fn engine_failure(schema: &str, err: TenancyError) -> TenancyError {
    match err {
        TenancyError::MigrationFailure { message, .. } => TenancyError::migration(schema, message),
        other => TenancyError::migration(schema, other.to_string()),
    }
}

/// The cause of an error without the variant's prefix.
fn underlying_message(err: &TenancyError) -> String {
    match err {
        TenancyError::MigrationFailure { message, .. }
        | TenancyError::DependencyViolation { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Migration orchestrator
pub struct MigrationOrchestrator<C: SchemaConnection> {
    context: TenantContext<C>,
    engine: Arc<dyn MigrationEngine<C>>,
    registry: Option<Arc<dyn TenantRegistry>>,
}

impl<C: SchemaConnection> MigrationOrchestrator<C> {
    /// Create an orchestrator driving `engine` through `context`
    pub fn new(context: TenantContext<C>, engine: Arc<dyn MigrationEngine<C>>) -> Self {
        Self {
            context,
            engine,
            registry: None,
        }
    }

    /// Attach the tenant registry used by setup and create operations
    pub fn with_registry(mut self, registry: Arc<dyn TenantRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn context(&self) -> &TenantContext<C> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TenantContext<C> {
        &mut self.context
    }

    pub fn into_context(self) -> TenantContext<C> {
        self.context
    }

    pub fn config(&self) -> &Arc<TenancyConfig> {
        self.context.config()
    }

    fn registry(&self) -> Result<Arc<dyn TenantRegistry>> {
        self.registry
            .clone()
            .ok_or_else(|| TenancyError::Configuration("no tenant registry configured".to_string()))
    }

    /// Tenant schemas currently in the catalog, in lexicographic order.
    pub async fn tenant_schemas(&mut self) -> Result<Vec<String>> {
        let schemas = self.context.list_schemas().await?;
        Ok(filter_tenant_schemas(schemas, self.context.config()))
    }

    /// Migrate every tenant schema in order.
    ///
    /// With `ignore_errors` each failure is recorded and the run continues;
    /// otherwise the first failure aborts the run and is returned.
    pub async fn migrate_all(&mut self, ignore_errors: bool) -> Result<MigrationRun> {
        let schemas = self.tenant_schemas().await?;
        info!("Migrating {} tenant schemas", schemas.len());

        let mut results = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            results.push(self.migrate_tenant(schema, !ignore_errors).await?);
        }

        let run = MigrationRun::new(results);
        info!(
            "Tenant migrations finished: {} succeeded, {} failed, {} skipped",
            run.summary.success, run.summary.error, run.summary.skipped
        );
        Ok(run)
    }

    /// Migrate one schema.
    ///
    /// A missing schema is skipped, created first when `auto_create` is set,
    /// or reported as [`TenancyError::SchemaNotFound`] with `raise_on_error`.
    /// Engine failures become an `Error` result, or are returned with
    /// `raise_on_error`. The previously active schema is restored either way.
    pub async fn migrate_tenant(
        &mut self,
        schema: &str,
        raise_on_error: bool,
    ) -> Result<MigrationResult> {
        let started = Instant::now();

        let result = match self.apply_pending(schema).await {
            Ok(Some(applied)) => {
                let result = MigrationResult::success(schema, applied, started.elapsed());
                info!(schema: schema, "{}", result.message);
                result
            }
            Ok(None) if raise_on_error => {
                return Err(TenancyError::SchemaNotFound(schema.to_string()));
            }
            Ok(None) => {
                warn!(schema: schema, "Schema does not exist, skipping");
                MigrationResult::skipped(schema)
            }
            Err(err) if raise_on_error => return Err(err),
            Err(err) => {
                warn!(schema: schema, "Migration failed: {}", err);
                MigrationResult::error(schema, underlying_message(&err), started.elapsed())
            }
        };
        Ok(result)
    }

    /// `None` when the schema is missing and may not be created.
    async fn apply_pending(&mut self, schema: &str) -> Result<Option<Vec<String>>> {
        if !self.context.schema_exists(schema).await? {
            if !self.context.config().auto_create || schema.trim().is_empty() {
                return Ok(None);
            }
            info!(schema: schema, "Creating missing schema");
            self.context.create_tenant_schema(schema).await?;
        }

        let engine = Arc::clone(&self.engine);
        let target = schema.to_string();
        let applied = self
            .context
            .with_tenant(schema, move |ctx| {
                Box::pin(async move {
                    let pending = engine
                        .pending_migrations(ctx.connection_mut())
                        .await
                        .map_err(|e| engine_failure(&target, e))?;
                    if pending.is_empty() {
                        return Ok(Vec::new());
                    }
                    debug!(schema: target, "{} pending migrations", pending.len());
                    engine
                        .migrate(ctx.connection_mut())
                        .await
                        .map_err(|e| engine_failure(&target, e))
                })
            })
            .await?;
        Ok(Some(applied))
    }

    /// Create the schema if needed, then migrate it strictly.
    pub async fn setup_tenant(&mut self, schema: &str) -> Result<MigrationResult> {
        if schema.trim().is_empty() {
            return Err(TenancyError::InvalidArgument(
                "setup_tenant requires a non-blank schema name".to_string(),
            ));
        }
        self.context.create_tenant_schema(schema).await?;
        self.migrate_tenant(schema, true).await
    }

    /// Set up the schema of every tenant in the registry.
    ///
    /// Stops at the first tenant whose schema name cannot be derived or whose
    /// setup fails.
    pub async fn setup_all_tenants(&mut self) -> Result<Vec<MigrationResult>> {
        let tenants = self.registry()?.tenants().await?;
        let mut results = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let schema = tenant.schema_name()?.to_string();
            results.push(self.setup_tenant(&schema).await?);
        }
        Ok(results)
    }

    /// Create a tenant in the registry and set up its schema.
    pub async fn create_tenant_with_schema(
        &mut self,
        new: NewTenant,
    ) -> Result<(Arc<Tenant>, MigrationResult)> {
        let tenant = self.registry()?.create(new).await?;
        let schema = tenant.schema_name()?.to_string();
        info!(schema: schema, "Created tenant {}", tenant.name);
        let result = self.setup_tenant(&schema).await?;
        Ok((tenant, result))
    }

    /// Pending and applied counts for every tenant schema.
    ///
    /// A schema whose check fails is reported as `error`; the scan goes on.
    pub async fn migration_status(&mut self) -> Result<StatusReport> {
        let schemas = self.tenant_schemas().await?;
        let mut report = StatusReport::default();

        for schema in &schemas {
            let engine = Arc::clone(&self.engine);
            let counts = self
                .context
                .with_tenant(schema, move |ctx| {
                    Box::pin(async move {
                        let pending = engine.pending_migrations(ctx.connection_mut()).await?;
                        let applied = engine.applied_versions(ctx.connection_mut()).await?;
                        Ok::<_, TenancyError>((pending.len(), applied.len()))
                    })
                })
                .await;

            let status = match counts {
                Ok((pending, applied)) => SchemaStatus::counted(schema, pending, applied),
                Err(err) => {
                    warn!(schema: schema, "Status check failed: {}", err);
                    SchemaStatus::failed(schema, underlying_message(&err))
                }
            };
            report.schemas.push(status);
        }
        Ok(report)
    }

    /// Revert the last `steps` migrations of `schema`, returning the names
    /// reverted.
    pub async fn rollback_tenant(&mut self, schema: &str, steps: usize) -> Result<Vec<String>> {
        if !self.context.schema_exists(schema).await? {
            return Err(TenancyError::SchemaNotFound(schema.to_string()));
        }

        let engine = Arc::clone(&self.engine);
        let target = schema.to_string();
        let reverted = self
            .context
            .with_tenant(schema, move |ctx| {
                Box::pin(async move {
                    engine
                        .rollback(ctx.connection_mut(), steps)
                        .await
                        .map_err(|e| engine_failure(&target, e))
                })
            })
            .await?;

        info!(schema: schema, "Rolled back {} migrations", reverted.len());
        Ok(reverted)
    }

    /// Drop a tenant schema.
    ///
    /// Refuses the default schema and system schemas. If the context is on
    /// `schema`, it is reset to the default first.
    pub async fn drop_tenant(&mut self, schema: &str, cascade: bool) -> Result<()> {
        if schema.trim().is_empty() {
            return Err(TenancyError::InvalidArgument(
                "drop_tenant requires a non-blank schema name".to_string(),
            ));
        }
        if schema == self.context.default_schema() || is_system_schema(schema) {
            return Err(TenancyError::InvalidArgument(format!(
                "refusing to drop non-tenant schema {schema}"
            )));
        }

        if self.context.current_schema() == schema {
            self.context.reset_context().await?;
        }
        self.context.drop_tenant_schema(schema, cascade).await?;
        info!(schema: schema, "Dropped tenant schema");
        Ok(())
    }
}
