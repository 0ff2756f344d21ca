//! Error types for the SeaORM adapter.

use sea_orm::{DbErr, RuntimeErr};
use tenantry_core::{DriverError, TenancyError};
use thiserror::Error;

/// Errors raised while setting up a SeaORM tenant session.
#[derive(Error, Debug)]
pub enum SeaOrmError {
    /// Database connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database error from SeaORM.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for SeaORM adapter operations.
pub type SeaOrmResult<T> = Result<T, SeaOrmError>;

impl From<SeaOrmError> for TenancyError {
    fn from(err: SeaOrmError) -> Self {
        match err {
            SeaOrmError::Config(message) => TenancyError::Configuration(message),
            SeaOrmError::Connection(message) => TenancyError::Connection(DriverError::new(message)),
            SeaOrmError::Database(err) => TenancyError::Connection(driver_error(&err)),
        }
    }
}

/// Normalize a SeaORM error, keeping the server's SQLSTATE when there is one.
pub fn driver_error(err: &DbErr) -> DriverError {
    let error = DriverError::new(err.to_string());
    match sqlstate(err) {
        Some(code) => error.with_sqlstate(code),
        None => error,
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db)) => {
            db.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_errors_have_no_sqlstate() {
        let err = driver_error(&DbErr::Custom("boom".into()));
        assert!(err.sqlstate.is_none());
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_config_error_maps_to_configuration() {
        let err: TenancyError = SeaOrmError::Config("DATABASE_URL not set".into()).into();
        assert_eq!(err.kind(), "configuration");

        let err: TenancyError = SeaOrmError::Database(DbErr::Custom("gone".into())).into();
        assert_eq!(err.kind(), "connection");
    }
}
