// Test fixture builder

use crate::engine::MockMigrationEngine;
use crate::mock::{BoolStyle, MockCatalog, MockConnection};
use std::sync::Arc;
use tenantry_core::{
    InMemoryTenantRegistry, MigrationEngine, MigrationOrchestrator, TenancyConfig, Tenant,
    TenantContext, TenantRegistry,
};

/// A mock database with a migration engine and tenant registry attached.
pub struct TestTenancy {
    pub catalog: MockCatalog,
    pub config: Arc<TenancyConfig>,
    pub engine: Arc<MockMigrationEngine>,
    pub registry: Arc<InMemoryTenantRegistry>,
    bool_style: BoolStyle,
}

impl TestTenancy {
    /// Start building a fixture
    pub fn builder() -> TestTenancyBuilder {
        TestTenancyBuilder::new()
    }

    /// Open a new session on the catalog
    pub fn connection(&self) -> MockConnection {
        MockConnection::new(&self.catalog).with_bool_style(self.bool_style)
    }

    /// A context on a fresh session
    pub fn context(&self) -> TenantContext<MockConnection> {
        TenantContext::new(self.connection(), Arc::clone(&self.config))
    }

    /// An orchestrator on a fresh session, wired to the engine and registry
    pub fn orchestrator(&self) -> MigrationOrchestrator<MockConnection> {
        let engine: Arc<dyn MigrationEngine<MockConnection>> = self.engine.clone();
        let registry: Arc<dyn TenantRegistry> = self.registry.clone();
        MigrationOrchestrator::new(self.context(), engine).with_registry(registry)
    }

    /// An orchestrator without a tenant registry
    pub fn orchestrator_without_registry(&self) -> MigrationOrchestrator<MockConnection> {
        let engine: Arc<dyn MigrationEngine<MockConnection>> = self.engine.clone();
        MigrationOrchestrator::new(self.context(), engine)
    }
}

/// Builder for [`TestTenancy`]
pub struct TestTenancyBuilder {
    schemas: Vec<String>,
    config: TenancyConfig,
    migrations: Vec<String>,
    tenants: Vec<Tenant>,
    bool_style: BoolStyle,
}

impl TestTenancyBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            config: TenancyConfig::default(),
            migrations: Vec::new(),
            tenants: Vec::new(),
            bool_style: BoolStyle::Native,
        }
    }

    /// Add schemas on top of the built-in ones
    pub fn with_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas.extend(schemas.into_iter().map(Into::into));
        self
    }

    /// Use a custom configuration
    pub fn with_config(self, config: TenancyConfig) -> Self {
        Self { config, ..self }
    }

    /// Migrations known to the engine
    pub fn with_migrations<I, S>(mut self, migrations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.migrations.extend(migrations.into_iter().map(Into::into));
        self
    }

    /// Register a tenant
    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenants.push(tenant);
        self
    }

    /// Boolean style of every session
    pub fn with_bool_style(self, bool_style: BoolStyle) -> Self {
        Self { bool_style, ..self }
    }

    /// Build the fixture
    pub fn build(self) -> TestTenancy {
        let registry = InMemoryTenantRegistry::new();
        for tenant in self.tenants {
            registry.insert(tenant);
        }
        TestTenancy {
            catalog: MockCatalog::new().with_schemas(self.schemas),
            config: Arc::new(self.config),
            engine: Arc::new(MockMigrationEngine::new(self.migrations)),
            registry: Arc::new(registry),
            bool_style: self.bool_style,
        }
    }
}

impl Default for TestTenancyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let tenancy = TestTenancy::builder()
            .with_schemas(["tenant_a"])
            .with_migrations(["m1"])
            .with_tenant(Tenant::new("1", "acme").with_subdomain("acme"))
            .build();

        assert!(tenancy.catalog.contains("tenant_a"));
        assert!(tenancy.catalog.contains("public"));
        assert_eq!(tenancy.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_share_catalog() {
        let tenancy = TestTenancy::builder().build();
        let mut first = tenancy.context();
        let mut second = tenancy.context();

        first.create_tenant_schema("tenant_new").await.unwrap();
        assert!(second.schema_exists("tenant_new").await.unwrap());
    }
}
