//! PostgreSQL Schema Switching
//!
//! [`SchemaExecutor`] is the only code path that issues schema-mutating or
//! schema-introspecting SQL. Every schema name is treated as untrusted and
//! interpolated only through [`quote_ident`] / [`quote_literal`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut executor = SchemaExecutor::new(conn);
//! executor.create_schema("tenant_acme").await?;
//! executor.switch_schema("tenant_acme").await?;
//!
//! // Unqualified table names now resolve inside tenant_acme
//! ```
//!
//! `SET search_path` is session state: it survives transaction boundaries
//! and stays in effect until changed again.

use crate::error::{DriverError, Result, TenancyError};
use async_trait::async_trait;
use tenantry_config::DEFAULT_SCHEMA;
use tenantry_log::debug;

/// A single column value as returned by a connection adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Native boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Anything the driver hands back as text
    Text(String),
}

impl SqlValue {
    /// Normalize the truthy spellings drivers use for booleans.
    ///
    /// `true`, `"t"`, `"true"`, `"y"`, `"yes"`, `"on"`, `"1"` and non-zero
    /// integers are true; everything else, including NULL, is false.
    pub fn is_truthy(&self) -> bool {
        match self {
            SqlValue::Null => false,
            SqlValue::Bool(b) => *b,
            SqlValue::Int(i) => *i != 0,
            SqlValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "t" | "true" | "y" | "yes" | "on" | "1"
            ),
        }
    }

    /// Text form of the value, `None` for NULL.
    pub fn into_text(self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Text(s) => Some(s),
        }
    }
}

/// Connection adapter trait
///
/// One implementation per driver shape. The executor never touches a driver
/// directly; it only issues SQL text through this trait and reads back the
/// first column of each returned row.
#[async_trait]
pub trait SchemaConnection: Send {
    /// Execute a statement that returns no rows
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError>;

    /// Run a query and return the first column of every row, in order
    async fn query_column(&mut self, sql: &str) -> std::result::Result<Vec<SqlValue>, DriverError>;
}

#[async_trait]
impl<C: SchemaConnection + ?Sized> SchemaConnection for Box<C> {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        (**self).execute(sql).await
    }

    async fn query_column(&mut self, sql: &str) -> std::result::Result<Vec<SqlValue>, DriverError> {
        (**self).query_column(sql).await
    }
}

/// Quote an identifier, doubling embedded double quotes.
///
/// ```
/// use tenantry_core::quote_ident;
///
/// assert_eq!(quote_ident("tenant_a"), "\"tenant_a\"");
/// assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn require_name<'a>(name: &'a str, operation: &str) -> Result<&'a str> {
    if name.trim().is_empty() {
        return Err(TenancyError::InvalidArgument(format!(
            "{operation} requires a non-blank schema name"
        )));
    }
    Ok(name)
}

/// SQL text generated for each schema operation.
pub mod statements {
    use super::{quote_ident, quote_literal};

    /// `SET search_path TO "name";`
    pub fn set_search_path(schema: &str) -> String {
        format!("SET search_path TO {};", quote_ident(schema))
    }

    /// `CREATE SCHEMA IF NOT EXISTS "name";`
    pub fn create_schema(schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema))
    }

    /// `DROP SCHEMA IF EXISTS "name" CASCADE|RESTRICT;`
    pub fn drop_schema(schema: &str, cascade: bool) -> String {
        let behavior = if cascade { "CASCADE" } else { "RESTRICT" };
        format!("DROP SCHEMA IF EXISTS {} {};", quote_ident(schema), behavior)
    }

    /// Existence probe against the namespace catalog.
    pub fn schema_exists(schema: &str) -> String {
        format!(
            "SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = {})",
            quote_literal(schema)
        )
    }

    /// Session's effective schema.
    pub const CURRENT_SCHEMA: &str = "SELECT current_schema()";

    /// Every schema in the catalog, ordered by name.
    pub const LIST_SCHEMAS: &str =
        "SELECT nspname FROM pg_catalog.pg_namespace ORDER BY nspname";
}

/// Schema switch executor
///
/// Owns exactly one connection (one database session).
pub struct SchemaExecutor<C: SchemaConnection> {
    conn: C,
}

impl<C: SchemaConnection> SchemaExecutor<C> {
    /// Wrap a connection
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Borrow the connection, e.g. to hand it to a migration engine
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Mutably borrow the connection
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Release the connection
    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Set the session search path to exactly `schema_name`.
    pub async fn switch_schema(&mut self, schema_name: &str) -> Result<()> {
        let schema = require_name(schema_name, "switch_schema")?;
        let sql = statements::set_search_path(schema);
        debug!(schema: schema, "{}", sql);
        self.conn.execute(&sql).await?;
        Ok(())
    }

    /// Set the search path back to `public`.
    pub async fn reset_schema(&mut self) -> Result<()> {
        self.switch_schema(DEFAULT_SCHEMA).await
    }

    /// Create the schema unless it already exists.
    pub async fn create_schema(&mut self, schema_name: &str) -> Result<()> {
        let schema = require_name(schema_name, "create_schema")?;
        let sql = statements::create_schema(schema);
        debug!(schema: schema, "{}", sql);
        self.conn.execute(&sql).await?;
        Ok(())
    }

    /// Drop the schema if it exists.
    ///
    /// With `cascade = false` the database refuses to drop a schema that still
    /// holds objects; that refusal surfaces as
    /// [`TenancyError::DependencyViolation`].
    pub async fn drop_schema(&mut self, schema_name: &str, cascade: bool) -> Result<()> {
        let schema = require_name(schema_name, "drop_schema")?;
        let sql = statements::drop_schema(schema, cascade);
        debug!(schema: schema, "{}", sql);
        self.conn.execute(&sql).await.map_err(|err| {
            if err.is_dependency_violation() {
                TenancyError::DependencyViolation {
                    schema: schema.to_string(),
                    message: err.message,
                }
            } else {
                TenancyError::Connection(err)
            }
        })
    }

    /// Whether the catalog contains `schema_name`. Blank names are simply absent.
    pub async fn schema_exists(&mut self, schema_name: &str) -> Result<bool> {
        if schema_name.trim().is_empty() {
            return Ok(false);
        }
        let rows = self
            .conn
            .query_column(&statements::schema_exists(schema_name))
            .await?;
        Ok(rows.first().is_some_and(SqlValue::is_truthy))
    }

    /// The schema the session currently resolves unqualified names against,
    /// as reported by the database.
    ///
    /// Postgres reports NULL when no search path entry names an existing
    /// schema; that is surfaced as [`TenancyError::SchemaNotFound`].
    pub async fn current_schema(&mut self) -> Result<String> {
        let rows = self.conn.query_column(statements::CURRENT_SCHEMA).await?;
        rows.into_iter()
            .next()
            .and_then(SqlValue::into_text)
            .ok_or_else(|| {
                TenancyError::SchemaNotFound("search_path names no existing schema".to_string())
            })
    }

    /// Every schema in the catalog, unfiltered.
    pub async fn list_schemas(&mut self) -> Result<Vec<String>> {
        let rows = self.conn.query_column(statements::LIST_SCHEMAS).await?;
        Ok(rows.into_iter().filter_map(SqlValue::into_text).collect())
    }
}
