// Tenantry - schema-per-tenant multitenancy for PostgreSQL
//
// Each tenant owns a Postgres schema. A tenant context switches its session's
// search path, scopes work to one tenant and always switches back, and the
// migration orchestrator applies migrations to every tenant schema.

// Re-export core functionality
pub use tenantry_core::*;

pub use tenantry_config;
pub use tenantry_log;

// Re-export optional crates
#[cfg(feature = "seaorm")]
pub use tenantry_seaorm;

#[cfg(feature = "testing")]
pub use tenantry_testing;

// Prelude for common imports
pub mod prelude {
    pub use tenantry_core::prelude::*;

    #[cfg(feature = "seaorm")]
    pub use tenantry_seaorm::{DatabaseConfig, SeaOrmConnection, SeaOrmMigrationEngine, connect};
}
