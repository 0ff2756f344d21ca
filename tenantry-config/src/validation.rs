// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Reject empty or whitespace-only values
    pub fn not_blank(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be blank",
                field
            )));
        }
        Ok(())
    }

    /// Reject values Postgres cannot store in an identifier
    pub fn no_nul(value: &str, field: &str) -> Result<()> {
        if value.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot contain NUL characters",
                field
            )));
        }
        Ok(())
    }

    /// Validate a database URL scheme
    pub fn is_database_url(value: &str, field: &str) -> Result<()> {
        const SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];
        if !SCHEMES.iter().any(|s| value.starts_with(s)) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a postgres:// or postgresql:// URL",
                field
            )));
        }
        Ok(())
    }
}
