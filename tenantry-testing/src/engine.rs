// Scripted migration engine

use crate::mock::MockConnection;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tenantry_core::{Migration, MigrationEngine, Result, TenancyError};

#[derive(Debug, Default)]
struct EngineState {
    applied: HashMap<String, Vec<String>>,
    fail_migrate: HashMap<String, String>,
    fail_status: HashMap<String, String>,
    fail_rollback: HashMap<String, String>,
    calls: Vec<(String, String)>,
}

/// Migration engine with per-schema history kept in memory.
///
/// The target schema is whatever the connection's session is on when the
/// engine is called, so results show which schema was really active.
/// Applying a migration also creates an object named after it in that
/// schema.
#[derive(Debug, Default)]
pub struct MockMigrationEngine {
    migrations: Vec<String>,
    paths: Vec<PathBuf>,
    state: Mutex<EngineState>,
}

impl MockMigrationEngine {
    /// An engine knowing `migrations`, applied in name order
    pub fn new<I, S>(migrations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut migrations: Vec<String> = migrations.into_iter().map(Into::into).collect();
        migrations.sort();
        migrations.dedup();
        Self {
            migrations,
            ..Default::default()
        }
    }

    /// Report a migrations directory
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Make `migrate` fail in `schema`
    pub fn fail_migrate(&self, schema: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .fail_migrate
            .insert(schema.into(), message.into());
    }

    /// Make pending/applied lookups fail in `schema`
    pub fn fail_status(&self, schema: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .fail_status
            .insert(schema.into(), message.into());
    }

    /// Make `rollback` fail in `schema`
    pub fn fail_rollback(&self, schema: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .fail_rollback
            .insert(schema.into(), message.into());
    }

    /// Mark migrations as already applied in `schema`
    pub fn mark_applied<I, S>(&self, schema: &str, migrations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        let applied = state.applied.entry(schema.to_string()).or_default();
        applied.extend(migrations.into_iter().map(Into::into));
        applied.sort();
        applied.dedup();
    }

    /// Migrations applied in `schema`
    pub fn applied_in(&self, schema: &str) -> Vec<String> {
        self.state
            .lock()
            .applied
            .get(schema)
            .cloned()
            .unwrap_or_default()
    }

    /// `(operation, schema)` for every call, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.state.lock().calls.clone()
    }

    fn enter(&self, conn: &MockConnection, operation: &str) -> Result<String> {
        let schema = conn.active_schema().ok_or_else(|| {
            TenancyError::SchemaNotFound(conn.search_path().unwrap_or("public").to_string())
        })?;
        self.state
            .lock()
            .calls
            .push((operation.to_string(), schema.clone()));
        Ok(schema)
    }

    fn pending_in(&self, schema: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        if let Some(message) = state.fail_status.get(schema) {
            return Err(TenancyError::migration(schema, message.clone()));
        }
        let applied = state.applied.get(schema);
        Ok(self
            .migrations
            .iter()
            .filter(|m| applied.is_none_or(|a| !a.contains(m)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MigrationEngine<MockConnection> for MockMigrationEngine {
    async fn pending_migrations(&self, conn: &mut MockConnection) -> Result<Vec<Migration>> {
        let schema = self.enter(conn, "pending")?;
        Ok(self
            .pending_in(&schema)?
            .into_iter()
            .map(Migration::new)
            .collect())
    }

    async fn applied_versions(&self, conn: &mut MockConnection) -> Result<Vec<String>> {
        let schema = self.enter(conn, "applied")?;
        let state = self.state.lock();
        if let Some(message) = state.fail_status.get(&schema) {
            return Err(TenancyError::migration(&schema, message.clone()));
        }
        Ok(state.applied.get(&schema).cloned().unwrap_or_default())
    }

    async fn migrate(&self, conn: &mut MockConnection) -> Result<Vec<String>> {
        let schema = self.enter(conn, "migrate")?;
        if let Some(message) = self.state.lock().fail_migrate.get(&schema) {
            return Err(TenancyError::migration(&schema, message.clone()));
        }

        let pending = self.pending_in(&schema)?;
        for name in &pending {
            conn.catalog().add_object(&schema, name.clone());
        }
        let mut state = self.state.lock();
        let applied = state.applied.entry(schema).or_default();
        applied.extend(pending.iter().cloned());
        applied.sort();
        Ok(pending)
    }

    async fn rollback(&self, conn: &mut MockConnection, steps: usize) -> Result<Vec<String>> {
        let schema = self.enter(conn, "rollback")?;
        let mut state = self.state.lock();
        if let Some(message) = state.fail_rollback.get(&schema) {
            return Err(TenancyError::migration(&schema, message.clone()));
        }

        let applied = state.applied.entry(schema.clone()).or_default();
        let keep = applied.len().saturating_sub(steps);
        let reverted: Vec<String> = applied.drain(keep..).rev().collect();
        for name in &reverted {
            conn.catalog().remove_object(&schema, name);
        }
        Ok(reverted)
    }

    fn migrations_paths(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }
}

/// Names `m0001`, `m0002`, ... for `count` migrations
pub fn numbered_migrations(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("m{i:04}")).collect()
}

/// Every schema the engine ran `operation` against, in call order
pub fn schemas_for(engine: &MockMigrationEngine, operation: &str) -> Vec<String> {
    let calls = engine.calls();
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .filter(|(op, _)| op == operation)
        .map(|(_, schema)| schema)
        .filter(|schema| seen.insert(schema.clone()))
        .collect()
}
