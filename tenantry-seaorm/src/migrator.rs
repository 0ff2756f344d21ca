//! SeaORM migrations applied per tenant schema.
//!
//! History lives in an unqualified `tenantry_migrations` table, so it is
//! created in, and read from, whichever schema the session is on. Each
//! migration runs in its own transaction together with its history row.

use crate::{SeaOrmConnection, driver_error};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DbErr, DeriveIden, QueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::{MigrationTrait, MigratorTrait, SchemaManager};
use sea_query::{ColumnDef, Expr, Order, Query, Table};
use std::path::PathBuf;
use tenantry_core::schema::statements::CURRENT_SCHEMA;
use tenantry_core::{Migration, MigrationEngine, Result, SchemaConnection, TenancyError, quote_literal};
use tenantry_log::{debug, info};

/// Name of the per-schema history table.
pub const HISTORY_TABLE: &str = "tenantry_migrations";

#[derive(DeriveIden)]
enum TenantryMigrations {
    Table,
    Version,
    AppliedAt,
}

/// Migration engine running [`MigrationTrait`] migrations in name order.
pub struct SeaOrmMigrationEngine {
    migrations: Vec<Box<dyn MigrationTrait>>,
    paths: Vec<PathBuf>,
}

impl SeaOrmMigrationEngine {
    /// Engine over `migrations`; duplicates by name are dropped.
    pub fn new(mut migrations: Vec<Box<dyn MigrationTrait>>) -> Self {
        migrations.sort_by(|a, b| a.name().cmp(b.name()));
        migrations.dedup_by(|a, b| a.name() == b.name());
        Self {
            migrations,
            paths: Vec::new(),
        }
    }

    /// Engine over the migrations of an existing migrator.
    pub fn from_migrator<M: MigratorTrait>() -> Self {
        Self::new(M::migrations())
    }

    /// Report the directory the migrations are maintained in.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Known migration names, in apply order.
    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    fn pending<'a>(&'a self, applied: &[String]) -> Vec<&'a dyn MigrationTrait> {
        self.migrations
            .iter()
            .filter(|m| !applied.iter().any(|name| name == m.name()))
            .map(|m| m.as_ref())
            .collect()
    }

    fn find(&self, name: &str) -> Option<&dyn MigrationTrait> {
        self.migrations
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }
}

/// The last `steps` applied names, newest first.
fn rollback_plan(applied: &[String], steps: usize) -> Vec<String> {
    applied.iter().rev().take(steps).cloned().collect()
}

async fn active_schema<C>(conn: &mut SeaOrmConnection<C>) -> Result<String>
where
    C: ConnectionTrait + Send,
{
    let value = conn.query_column(CURRENT_SCHEMA).await?.into_iter().next();
    value
        .and_then(|v| v.into_text())
        .ok_or_else(|| TenancyError::SchemaNotFound("current_schema()".to_string()))
}

async fn history_exists<C: ConnectionTrait>(conn: &C) -> std::result::Result<bool, DbErr> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = {})",
        quote_literal(HISTORY_TABLE)
    );
    let row: Option<QueryResult> = conn
        .query_one(Statement::from_string(conn.get_database_backend(), sql))
        .await?;
    match row {
        Some(row) => row.try_get_by_index::<bool>(0),
        None => Ok(false),
    }
}

async fn applied_names<C: ConnectionTrait>(conn: &C) -> std::result::Result<Vec<String>, DbErr> {
    if !history_exists(conn).await? {
        return Ok(Vec::new());
    }
    let select = Query::select()
        .column(TenantryMigrations::Version)
        .from(TenantryMigrations::Table)
        .order_by(TenantryMigrations::Version, Order::Asc)
        .to_owned();
    let rows = conn.query_all(conn.get_database_backend().build(&select)).await?;
    rows.iter()
        .map(|row| row.try_get::<String>("", "version"))
        .collect()
}

async fn ensure_history<C: ConnectionTrait>(conn: &C) -> std::result::Result<(), DbErr> {
    let create = Table::create()
        .table(TenantryMigrations::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(TenantryMigrations::Version)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(TenantryMigrations::AppliedAt)
                .big_integer()
                .not_null(),
        )
        .to_owned();
    conn.execute(conn.get_database_backend().build(&create))
        .await
        .map(|_| ())
}

async fn record_applied<C: ConnectionTrait>(conn: &C, name: &str) -> std::result::Result<(), DbErr> {
    let insert = Query::insert()
        .into_table(TenantryMigrations::Table)
        .columns([TenantryMigrations::Version, TenantryMigrations::AppliedAt])
        .values([name.into(), chrono::Utc::now().timestamp().into()])
        .map_err(|e| DbErr::Custom(e.to_string()))?
        .to_owned();
    conn.execute(conn.get_database_backend().build(&insert))
        .await
        .map(|_| ())
}

async fn forget_applied<C: ConnectionTrait>(conn: &C, name: &str) -> std::result::Result<(), DbErr> {
    let delete = Query::delete()
        .from_table(TenantryMigrations::Table)
        .and_where(Expr::col(TenantryMigrations::Version).eq(name))
        .to_owned();
    conn.execute(conn.get_database_backend().build(&delete))
        .await
        .map(|_| ())
}

fn history_error(err: DbErr) -> TenancyError {
    TenancyError::Connection(driver_error(&err))
}

#[async_trait]
impl<C> MigrationEngine<SeaOrmConnection<C>> for SeaOrmMigrationEngine
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    async fn pending_migrations(&self, conn: &mut SeaOrmConnection<C>) -> Result<Vec<Migration>> {
        let applied = applied_names(conn.inner()).await.map_err(history_error)?;
        Ok(self
            .pending(&applied)
            .into_iter()
            .map(|m| Migration::new(m.name()))
            .collect())
    }

    async fn applied_versions(&self, conn: &mut SeaOrmConnection<C>) -> Result<Vec<String>> {
        applied_names(conn.inner()).await.map_err(history_error)
    }

    async fn migrate(&self, conn: &mut SeaOrmConnection<C>) -> Result<Vec<String>> {
        let schema = active_schema(conn).await?;
        let db = conn.inner();
        ensure_history(db).await.map_err(history_error)?;
        let applied = applied_names(db).await.map_err(history_error)?;

        let mut done = Vec::new();
        for migration in self.pending(&applied) {
            let name = migration.name();
            debug!(schema: schema, "Applying migration {}", name);

            let txn = db.begin().await.map_err(history_error)?;
            migration
                .up(&SchemaManager::new(&txn))
                .await
                .map_err(|e| TenancyError::migration(&schema, format!("{name}: {e}")))?;
            record_applied(&txn, name).await.map_err(history_error)?;
            txn.commit().await.map_err(history_error)?;

            done.push(name.to_string());
        }

        if !done.is_empty() {
            info!(schema: schema, "Applied {} migrations", done.len());
        }
        Ok(done)
    }

    async fn rollback(&self, conn: &mut SeaOrmConnection<C>, steps: usize) -> Result<Vec<String>> {
        let schema = active_schema(conn).await?;
        let db = conn.inner();
        let applied = applied_names(db).await.map_err(history_error)?;

        let mut reverted = Vec::new();
        for name in rollback_plan(&applied, steps) {
            let migration = self.find(&name).ok_or_else(|| {
                TenancyError::migration(&schema, format!("applied migration {name} is not known"))
            })?;
            debug!(schema: schema, "Reverting migration {}", name);

            let txn = db.begin().await.map_err(history_error)?;
            migration
                .down(&SchemaManager::new(&txn))
                .await
                .map_err(|e| TenancyError::migration(&schema, format!("{name}: {e}")))?;
            forget_applied(&txn, &name).await.map_err(history_error)?;
            txn.commit().await.map_err(history_error)?;

            reverted.push(name);
        }
        Ok(reverted)
    }

    fn migrations_paths(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }
}
