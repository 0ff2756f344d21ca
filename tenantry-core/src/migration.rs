//! Migration Engine Contract
//!
//! The orchestrator never parses or versions migrations itself. It drives a
//! [`MigrationEngine`] against whichever schema is active on the context's
//! connection, and records one [`MigrationResult`] per attempt.

use crate::error::Result;
use crate::schema::SchemaConnection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A migration known to an engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Migration {
    /// Unique, sortable migration name
    pub name: String,
}

impl Migration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Migration engine
///
/// Every call operates on the schema currently active on `conn`; history is
/// tracked per schema by the engine.
#[async_trait]
pub trait MigrationEngine<C: SchemaConnection>: Send + Sync {
    /// Migrations not yet applied to the active schema, in apply order
    async fn pending_migrations(&self, conn: &mut C) -> Result<Vec<Migration>>;

    /// Names of migrations already applied to the active schema
    async fn applied_versions(&self, conn: &mut C) -> Result<Vec<String>>;

    /// Apply every pending migration, returning the names applied
    async fn migrate(&self, conn: &mut C) -> Result<Vec<String>>;

    /// Revert the last `steps` applied migrations, newest first, returning
    /// the names reverted
    async fn rollback(&self, conn: &mut C, steps: usize) -> Result<Vec<String>>;

    /// Where the engine's migration sources live, if it reads them from disk
    fn migrations_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Outcome of one tenant migration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Success,
    Error,
    Skipped,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of migrating one schema. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub schema: String,
    pub status: MigrationStatus,
    pub message: String,
    /// Underlying error text for `Error` results
    pub error: Option<String>,
    /// Names of migrations applied during the attempt
    pub applied: Vec<String>,
    pub duration: Duration,
}

impl MigrationResult {
    pub(crate) fn success(schema: &str, applied: Vec<String>, duration: Duration) -> Self {
        let message = match applied.len() {
            0 => "no pending migrations".to_string(),
            1 => "1 migration applied".to_string(),
            n => format!("{n} migrations applied"),
        };
        Self {
            schema: schema.to_string(),
            status: MigrationStatus::Success,
            message,
            error: None,
            applied,
            duration,
        }
    }

    pub(crate) fn error(schema: &str, error: String, duration: Duration) -> Self {
        Self {
            schema: schema.to_string(),
            status: MigrationStatus::Error,
            message: format!("migration failed: {error}"),
            error: Some(error),
            applied: Vec::new(),
            duration,
        }
    }

    pub(crate) fn skipped(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
            status: MigrationStatus::Skipped,
            message: "schema does not exist".to_string(),
            error: None,
            applied: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MigrationStatus::Error
    }

    pub fn is_skipped(&self) -> bool {
        self.status == MigrationStatus::Skipped
    }
}

impl fmt::Display for MigrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.schema, self.status, self.message)
    }
}
