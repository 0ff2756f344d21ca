//! Tenants and Schema References
//!
//! A [`Tenant`] is an application entity that names a schema either
//! explicitly or through its subdomain. [`SchemaRef`] is what every context
//! and orchestrator operation accepts: a tenant, a raw schema name, or the
//! configured default.

use crate::error::{Result, TenancyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tenant information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: String,

    /// Tenant name/slug
    pub name: String,

    /// Subdomain the tenant is served from
    pub subdomain: Option<String>,

    /// Explicit schema name, takes precedence over the subdomain
    pub schema: Option<String>,

    /// Whether tenant is active
    pub active: bool,

    /// Additional metadata
    pub metadata: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantry_core::Tenant;
    ///
    /// let tenant = Tenant::new("tenant-123", "acme-corp").with_subdomain("acme");
    /// assert_eq!(tenant.schema_name().unwrap(), "acme");
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subdomain: None,
            schema: None,
            active: true,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Set subdomain
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Set schema name
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set active status
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Derive the tenant's schema name.
    ///
    /// A non-blank explicit schema wins, then a non-blank subdomain. A tenant
    /// with neither is a configuration error; nothing is guessed from the
    /// name or id.
    pub fn schema_name(&self) -> Result<&str> {
        non_blank(self.schema.as_deref())
            .or_else(|| non_blank(self.subdomain.as_deref()))
            .ok_or_else(|| {
                TenancyError::Configuration(format!(
                    "tenant '{}' has neither a schema nor a subdomain",
                    self.name
                ))
            })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Attributes for a tenant that does not exist yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTenant {
    /// Tenant name/slug, unique within a registry
    pub name: String,
    /// Subdomain
    pub subdomain: Option<String>,
    /// Explicit schema name
    pub schema: Option<String>,
    /// Initial metadata
    pub metadata: HashMap<String, String>,
}

impl NewTenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Either a tenant entity or a bare schema name.
///
/// Resolved once at the API boundary; `Default` stands for "no tenant" and
/// maps to the configured default schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRef {
    /// A tenant; its schema comes from [`Tenant::schema_name`]
    Tenant(Arc<Tenant>),
    /// A raw schema name. Blank names behave like `Default` in the context
    Schema(String),
    /// The configured default schema
    Default,
}

impl SchemaRef {
    /// The tenant carried by this reference, if any.
    pub fn tenant(&self) -> Option<&Arc<Tenant>> {
        match self {
            SchemaRef::Tenant(tenant) => Some(tenant),
            _ => None,
        }
    }

    /// Resolve to a concrete schema name, using `default_schema` for
    /// `Default` and blank raw names.
    pub fn resolve<'a>(&'a self, default_schema: &'a str) -> Result<&'a str> {
        match self {
            SchemaRef::Tenant(tenant) => tenant.schema_name(),
            SchemaRef::Schema(name) if !name.trim().is_empty() => Ok(name),
            SchemaRef::Schema(_) | SchemaRef::Default => Ok(default_schema),
        }
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Tenant(tenant) => write!(f, "tenant '{}'", tenant.name),
            SchemaRef::Schema(name) => write!(f, "schema '{}'", name),
            SchemaRef::Default => f.write_str("default schema"),
        }
    }
}

impl From<&str> for SchemaRef {
    fn from(name: &str) -> Self {
        SchemaRef::Schema(name.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(name: String) -> Self {
        SchemaRef::Schema(name)
    }
}

impl From<&String> for SchemaRef {
    fn from(name: &String) -> Self {
        SchemaRef::Schema(name.clone())
    }
}

impl From<Tenant> for SchemaRef {
    fn from(tenant: Tenant) -> Self {
        SchemaRef::Tenant(Arc::new(tenant))
    }
}

impl From<Arc<Tenant>> for SchemaRef {
    fn from(tenant: Arc<Tenant>) -> Self {
        SchemaRef::Tenant(tenant)
    }
}

impl From<&Arc<Tenant>> for SchemaRef {
    fn from(tenant: &Arc<Tenant>) -> Self {
        SchemaRef::Tenant(Arc::clone(tenant))
    }
}

impl<T: Into<SchemaRef>> From<Option<T>> for SchemaRef {
    fn from(value: Option<T>) -> Self {
        value.map_or(SchemaRef::Default, Into::into)
    }
}
