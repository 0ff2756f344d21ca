//! Tenancy Errors

/// SQLSTATE raised by Postgres when a non-cascading drop hits dependents.
pub const SQLSTATE_DEPENDENT_OBJECTS: &str = "2BP01";

/// Failure reported by a connection adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", sqlstate_suffix(.sqlstate))]
pub struct DriverError {
    /// Driver message
    pub message: String,
    /// Five-character SQLSTATE, when the driver exposes one
    pub sqlstate: Option<String>,
}

impl DriverError {
    /// Create an error without a SQLSTATE
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: None,
        }
    }

    /// Attach a SQLSTATE
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    /// Whether the database refused a drop because other objects depend on it
    pub fn is_dependency_violation(&self) -> bool {
        match &self.sqlstate {
            Some(code) => code == SQLSTATE_DEPENDENT_OBJECTS,
            None => self.message.contains("other objects depend on"),
        }
    }
}

fn sqlstate_suffix(sqlstate: &Option<String>) -> String {
    sqlstate
        .as_ref()
        .map(|code| format!(" (SQLSTATE {})", code))
        .unwrap_or_default()
}

/// Tenancy errors
#[derive(Debug, thiserror::Error)]
pub enum TenancyError {
    /// Blank schema name handed to a mutating or existence operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying connection could not be obtained or used
    #[error("Connection error: {0}")]
    Connection(#[from] DriverError),

    /// A schema required to exist does not
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// Non-cascading drop of a schema that still has dependent objects
    #[error("Cannot drop schema {schema}: {message}")]
    DependencyViolation { schema: String, message: String },

    /// The migration engine failed during apply or rollback
    #[error("Migration failed for schema {schema}: {message}")]
    MigrationFailure { schema: String, message: String },

    /// A required collaborator or attribute is missing or ambiguous
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TenancyError {
    /// Build a [`TenancyError::MigrationFailure`]
    pub fn migration(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MigrationFailure {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Connection(_) => "connection",
            Self::SchemaNotFound(_) => "schema_not_found",
            Self::DependencyViolation { .. } => "dependency_violation",
            Self::MigrationFailure { .. } => "migration_failure",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<tenantry_config::ConfigError> for TenancyError {
    fn from(err: tenantry_config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, TenancyError>;
