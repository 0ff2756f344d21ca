// Configuration for tenantry
//
// Read once at process start and shared immutably afterwards.

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema used when no tenant is active.
pub const DEFAULT_SCHEMA: &str = "public";

/// Tenancy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Schema activated when no tenant is selected
    pub default_schema: String,

    /// Create a tenant schema on demand when migrating a missing one
    pub auto_create: bool,

    /// Extra schemas never treated as tenant schemas
    pub excluded_schemas: Vec<String>,

    /// Connection string handed to the connection adapter
    pub database_url: Option<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            auto_create: false,
            excluded_schemas: Vec::new(),
            database_url: None,
        }
    }
}

impl TenancyConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default schema
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Enable auto-creation of missing tenant schemas
    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Exclude an additional schema from tenant enumeration
    pub fn with_excluded_schema(mut self, schema: impl Into<String>) -> Self {
        self.excluded_schemas.push(schema.into());
        self
    }

    /// Set the database URL
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Load from the process environment.
    ///
    /// Reads `TENANTRY_DEFAULT_SCHEMA`, `TENANTRY_AUTO_CREATE`,
    /// `TENANTRY_EXCLUDED_SCHEMAS` (comma separated) and `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_loader(&EnvLoader::from_process(Some(ENV_PREFIX)))
    }

    /// Load from the process environment, falling back to a `.env` file for
    /// unset variables.
    pub fn from_dotenv(path: impl AsRef<Path>) -> Result<Self> {
        let file = EnvLoader::from_dotenv_file(Some(ENV_PREFIX), path)?;
        Self::from_loader(&EnvLoader::from_process(Some(ENV_PREFIX)).or_else(file))
    }

    /// Load from an environment snapshot.
    pub fn from_loader(env: &EnvLoader) -> Result<Self> {
        let mut config = Self::default();

        if let Some(schema) = env.load_var("default_schema") {
            config.default_schema = schema;
        }
        if let Some(auto_create) = env.load_bool("auto_create")? {
            config.auto_create = auto_create;
        }
        if let Some(excluded) = env.load_list("excluded_schemas") {
            config.excluded_schemas = excluded;
        }
        config.database_url = env.load_raw("DATABASE_URL");

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let loader = ConfigLoader::auto(path.as_ref())?;
        let value = loader.load_file(path)?;
        Self::from_value(value)
    }

    /// Parse configuration text in the given format.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        let value = ConfigLoader::new(format).parse(content)?;
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Validate for TenancyConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_blank(&self.default_schema, "default_schema")?;
        ConfigValidator::no_nul(&self.default_schema, "default_schema")?;
        for schema in &self.excluded_schemas {
            ConfigValidator::not_blank(schema, "excluded_schemas")?;
        }
        if let Some(url) = &self.database_url {
            ConfigValidator::is_database_url(url, "database_url")?;
        }
        Ok(())
    }
}
