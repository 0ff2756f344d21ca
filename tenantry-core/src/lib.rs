//! Schema-per-Tenant Multitenancy
//!
//! Each tenant's data lives in its own PostgreSQL schema inside one
//! database, selected at runtime by switching the session's search path.
//!
//! # Features
//!
//! - 🛡️ **Schema Switch Executor** - Injection-safe `SET search_path` and
//!   schema lifecycle (create/drop/exists/list)
//! - 🏢 **Tenant Context** - Per-task tenant/schema state with scoped,
//!   always-restored switching
//! - 🚀 **Migration Orchestrator** - Per-tenant migrations with failure
//!   isolation, status reports and rollback
//! - 📝 **Tenant Registry** - Enumerate and create tenants
//!
//! # Quick Start
//!
//! ## 1. Create a Context
//!
//! ```rust,ignore
//! use tenantry_core::prelude::*;
//!
//! // One context per task, one connection (session) per context
//! let config = Arc::new(TenancyConfig::from_env()?);
//! let mut ctx = TenantContext::new(conn, config);
//! ```
//!
//! ## 2. Run Code as a Tenant
//!
//! ```rust,ignore
//! let tenant = Tenant::new("t-1", "acme").with_subdomain("acme");
//!
//! ctx.with_tenant(tenant, |ctx| {
//!     Box::pin(async move {
//!         // queries on ctx.connection_mut() resolve inside "acme"
//!         Ok::<_, TenancyError>(())
//!     })
//! })
//! .await?;
//! ```
//!
//! ## 3. Migrate Every Tenant
//!
//! ```rust,ignore
//! let mut orchestrator = MigrationOrchestrator::new(ctx, Arc::new(engine));
//!
//! let run = orchestrator.migrate_all(true).await?;
//! for result in run.with_status(MigrationStatus::Error) {
//!     eprintln!("{result}");
//! }
//! ```

pub mod context;
pub mod error;
pub mod migration;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod schema;
pub mod tenant;

pub use context::TenantContext;
pub use error::{DriverError, Result, SQLSTATE_DEPENDENT_OBJECTS, TenancyError};
pub use migration::{Migration, MigrationEngine, MigrationResult, MigrationStatus};
pub use orchestrator::{
    MigrationOrchestrator, SYSTEM_SCHEMAS, filter_tenant_schemas, is_system_schema,
};
pub use registry::{InMemoryTenantRegistry, TenantRegistry};
pub use report::{MigrationRun, MigrationSummary, SchemaState, SchemaStatus, StatusReport};
pub use schema::{SchemaConnection, SchemaExecutor, SqlValue, quote_ident, quote_literal};
pub use tenant::{NewTenant, SchemaRef, Tenant};

pub use tenantry_config::{DEFAULT_SCHEMA, TenancyConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::TenantContext;
    pub use crate::error::{DriverError, TenancyError};
    pub use crate::migration::{Migration, MigrationEngine, MigrationResult, MigrationStatus};
    pub use crate::orchestrator::MigrationOrchestrator;
    pub use crate::registry::{InMemoryTenantRegistry, TenantRegistry};
    pub use crate::report::{MigrationRun, SchemaState, StatusReport};
    pub use crate::schema::{SchemaConnection, SchemaExecutor, SqlValue};
    pub use crate::tenant::{NewTenant, SchemaRef, Tenant};
    pub use std::sync::Arc;
    pub use tenantry_config::TenancyConfig;
}
