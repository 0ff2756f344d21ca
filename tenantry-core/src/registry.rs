//! Tenant Registry
//!
//! The orchestrator's view of the application's tenant table: enumerate
//! tenants and create new ones. Lookups, plans and lifecycle states belong
//! to the application.

use crate::error::{Result, TenancyError};
use crate::tenant::{NewTenant, Tenant};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of tenant entities.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Every tenant, in a stable order
    async fn tenants(&self) -> Result<Vec<Arc<Tenant>>>;

    /// Persist a new tenant and return it
    async fn create(&self, tenant: NewTenant) -> Result<Arc<Tenant>>;
}

/// In-memory registry keyed by tenant name
#[derive(Debug, Default)]
pub struct InMemoryTenantRegistry {
    tenants: parking_lot::RwLock<BTreeMap<String, Arc<Tenant>>>,
}

impl InMemoryTenantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an existing tenant, replacing one with the same name
    pub fn insert(&self, tenant: Tenant) -> Arc<Tenant> {
        let tenant = Arc::new(tenant);
        self.tenants
            .write()
            .insert(tenant.name.clone(), Arc::clone(&tenant));
        tenant
    }

    /// Look a tenant up by name
    pub fn get(&self, name: &str) -> Option<Arc<Tenant>> {
        self.tenants.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn tenants(&self) -> Result<Vec<Arc<Tenant>>> {
        Ok(self.tenants.read().values().cloned().collect())
    }

    async fn create(&self, new: NewTenant) -> Result<Arc<Tenant>> {
        if new.name.trim().is_empty() {
            return Err(TenancyError::InvalidArgument(
                "tenant name cannot be blank".to_string(),
            ));
        }

        let mut tenants = self.tenants.write();
        if tenants.contains_key(&new.name) {
            return Err(TenancyError::InvalidArgument(format!(
                "Tenant {} already exists",
                new.name
            )));
        }

        let mut tenant = Tenant::new(uuid::Uuid::new_v4().to_string(), new.name);
        tenant.subdomain = new.subdomain;
        tenant.schema = new.schema;
        tenant.metadata = new.metadata;

        let tenant = Arc::new(tenant);
        tenants.insert(tenant.name.clone(), Arc::clone(&tenant));
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_tenant() {
        let registry = InMemoryTenantRegistry::new();
        let tenant = registry
            .create(NewTenant::new("acme").with_subdomain("acme"))
            .await
            .unwrap();

        assert_eq!(tenant.name, "acme");
        assert!(uuid::Uuid::parse_str(&tenant.id).is_ok());
        assert_eq!(registry.get("acme").unwrap().id, tenant.id);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = InMemoryTenantRegistry::new();
        registry.create(NewTenant::new("acme")).await.unwrap();
        let err = registry.create(NewTenant::new("acme")).await.unwrap_err();
        assert!(matches!(err, TenancyError::InvalidArgument(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_tenants_sorted_by_name() {
        let registry = InMemoryTenantRegistry::new();
        registry.insert(Tenant::new("2", "zeta"));
        registry.insert(Tenant::new("1", "alpha"));
        registry.insert(Tenant::new("3", "mid"));

        let names: Vec<_> = registry
            .tenants()
            .await
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
