//! Testing utilities for tenantry.
//!
//! In-memory stand-ins for a PostgreSQL database and a migration engine, so
//! tenant switching and migration runs can be tested without a server.
//!
//! ## Features
//!
//! - 🗄️ **MockCatalog** - Shared schemas and objects, like one database
//! - 🔌 **MockConnection** - One session with its own search path, statement
//!   log and fault injection
//! - 🎭 **MockMigrationEngine** - Per-schema migration history with failure
//!   injection
//! - 🧪 **TestTenancy** - Fixture wiring all of the above together
//! - ✅ **Assertions** - Context/session agreement and run outcomes
//!
//! ## Quick Start
//!
//! ```
//! use tenantry_testing::*;
//! use tenantry_core::MigrationStatus;
//!
//! # tokio_test::block_on(async {
//! let tenancy = TestTenancy::builder()
//!     .with_schemas(["tenant_a", "tenant_b"])
//!     .with_migrations(["m0001_users", "m0002_orders"])
//!     .build();
//!
//! tenancy.engine.fail_migrate("tenant_b", "disk full");
//!
//! let mut orchestrator = tenancy.orchestrator();
//! let run = orchestrator.migrate_all(true).await.unwrap();
//!
//! assert_run_statuses(
//!     &run,
//!     &[
//!         ("tenant_a", MigrationStatus::Success),
//!         ("tenant_b", MigrationStatus::Error),
//!     ],
//! );
//! # });
//! ```
//!
//! ## Sessions
//!
//! ```
//! use tenantry_testing::*;
//!
//! # tokio_test::block_on(async {
//! let catalog = MockCatalog::new().with_schemas(["tenant_a"]);
//! let mut ctx = tenantry_core::TenantContext::with_defaults(MockConnection::new(&catalog));
//!
//! ctx.switch_to_schema("tenant_a").await.unwrap();
//! assert_active_schema(&ctx, "tenant_a");
//! # });
//! ```

mod assertions;
mod engine;
mod fixture;
mod mock;

pub use assertions::{assert_active_schema, assert_run_statuses, assert_schema_state};
pub use engine::{MockMigrationEngine, numbered_migrations, schemas_for};
pub use fixture::{TestTenancy, TestTenancyBuilder};
pub use mock::{
    BUILTIN_SCHEMAS, BoolStyle, MockCatalog, MockConnection, unquote_ident, unquote_literal,
};
