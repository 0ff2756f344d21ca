//! # Tenantry SeaORM
//!
//! SeaORM integration for tenantry.
//!
//! Runs a [`TenantContext`](tenantry_core::TenantContext) over a SeaORM
//! session and applies `sea-orm-migration` migrations to each tenant schema
//! with its own history.
//!
//! ## Features
//!
//! - **Single-session pool**: The search path set by a context stays on the
//!   one session every statement uses
//! - **SQLSTATE passthrough**: Postgres error codes reach the executor, so a
//!   refused drop surfaces as a dependency violation
//! - **Per-schema history**: `tenantry_migrations` lives inside each tenant
//!   schema
//! - **Migrator reuse**: Any `MigratorTrait` migration list can drive the
//!   engine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenantry_core::{MigrationOrchestrator, TenancyConfig, TenantContext};
//! use tenantry_seaorm::{DatabaseConfig, SeaOrmMigrationEngine, connect};
//!
//! let tenancy = Arc::new(TenancyConfig::from_env()?);
//! let conn = connect(&DatabaseConfig::from_tenancy(&tenancy)?).await?;
//!
//! let engine = Arc::new(SeaOrmMigrationEngine::from_migrator::<migration::Migrator>());
//! let mut orchestrator = MigrationOrchestrator::new(TenantContext::new(conn, tenancy), engine);
//!
//! let run = orchestrator.migrate_all(true).await?;
//! println!("{run}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod connection;
mod error;
mod migrator;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use migrator::*;

// Re-export sea-orm crates for convenience
pub use sea_orm;
pub use sea_orm_migration;
pub use sea_query;

/// Prelude module for commonly used types.
pub mod prelude {
    pub use super::{
        DatabaseConfig, SeaOrmConnection, SeaOrmError, SeaOrmMigrationEngine, SeaOrmResult,
        connect,
    };
    pub use sea_orm_migration::{MigrationTrait, MigratorTrait};
}
