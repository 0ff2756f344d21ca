//! SeaORM sessions as tenant connections.

use crate::{DatabaseConfig, SeaOrmError, SeaOrmResult, driver_error};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult, SqlxPostgresConnector, Statement};
use tenantry_core::{DriverError, SchemaConnection, SqlValue};
use tenantry_log::{debug, info};

/// A SeaORM connection usable by a tenant context.
///
/// Works over anything implementing [`ConnectionTrait`]: a single-session
/// [`DatabaseConnection`] from [`connect`], or an open transaction.
#[derive(Debug)]
pub struct SeaOrmConnection<C> {
    conn: C,
}

impl<C: ConnectionTrait> SeaOrmConnection<C> {
    /// Wrap an existing connection.
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// The wrapped connection.
    pub fn inner(&self) -> &C {
        &self.conn
    }

    /// Unwrap the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }

    fn statement(&self, sql: &str) -> Statement {
        Statement::from_string(self.conn.get_database_backend(), sql.to_owned())
    }
}

impl SeaOrmConnection<DatabaseConnection> {
    /// Ping the session.
    pub async fn ping(&self) -> SeaOrmResult<()> {
        debug!("Pinging database");
        self.conn
            .ping()
            .await
            .map_err(|e| SeaOrmError::Connection(e.to_string()))
    }

    /// Close the session.
    pub async fn close(self) -> SeaOrmResult<()> {
        info!("Closing database connection");
        self.conn
            .close()
            .await
            .map_err(|e| SeaOrmError::Connection(e.to_string()))
    }
}

/// Open a single-session connection for a tenant context.
pub async fn connect(config: &DatabaseConfig) -> SeaOrmResult<SeaOrmConnection<DatabaseConnection>> {
    info!("Connecting to database");
    debug!("Database URL: {}", config.redacted_url());

    let pool = config
        .pool_options()
        .connect_with(config.pg_connect_options()?)
        .await
        .map_err(|e| SeaOrmError::Connection(e.to_string()))?;
    let conn = SqlxPostgresConnector::from_sqlx_postgres_pool(pool);

    info!("Database connection established");
    Ok(SeaOrmConnection::new(conn))
}

/// First column of a row, tried as bool, then text, then integer.
fn first_column(row: &QueryResult) -> Result<SqlValue, DriverError> {
    if let Ok(value) = row.try_get_by_index::<Option<bool>>(0) {
        return Ok(value.map_or(SqlValue::Null, SqlValue::Bool));
    }
    if let Ok(value) = row.try_get_by_index::<Option<String>>(0) {
        return Ok(value.map_or(SqlValue::Null, SqlValue::Text));
    }
    if let Ok(value) = row.try_get_by_index::<Option<i64>>(0) {
        return Ok(value.map_or(SqlValue::Null, SqlValue::Int));
    }
    Err(DriverError::new(
        "first column is not a boolean, text or integer value",
    ))
}

#[async_trait]
impl<C> SchemaConnection for SeaOrmConnection<C>
where
    C: ConnectionTrait + Send,
{
    async fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.conn
            .execute_unprepared(sql)
            .await
            .map(|_| ())
            .map_err(|e| driver_error(&e))
    }

    async fn query_column(&mut self, sql: &str) -> Result<Vec<SqlValue>, DriverError> {
        let rows = self
            .conn
            .query_all(self.statement(sql))
            .await
            .map_err(|e| driver_error(&e))?;
        rows.iter().map(first_column).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;
    use tenantry_core::SchemaExecutor;

    fn row(value: Value) -> BTreeMap<String, Value> {
        BTreeMap::from([("value".to_string(), value)])
    }

    #[tokio::test]
    async fn test_exists_decodes_native_bool() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(Value::Bool(Some(true)))]])
            .into_connection();
        let mut exec = SchemaExecutor::new(SeaOrmConnection::new(db));

        assert!(exec.schema_exists("tenant_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_current_schema_decodes_text() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(Value::String(Some(Box::new(
                "tenant_a".to_string(),
            ))))]])
            .into_connection();
        let mut conn = SeaOrmConnection::new(db);

        let values = conn.query_column("SELECT current_schema()").await.unwrap();
        assert_eq!(values, vec![SqlValue::Text("tenant_a".to_string())]);
    }

    #[tokio::test]
    async fn test_switch_issues_quoted_statement() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let mut exec = SchemaExecutor::new(SeaOrmConnection::new(db));

        exec.switch_schema("a\"b").await.unwrap();

        let log = exec.into_connection().into_inner().into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(format!("{:?}", log[0]).contains(r#"SET search_path TO \"a\"\"b\";"#));
    }

    #[tokio::test]
    async fn test_query_errors_become_driver_errors() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".into())])
            .into_connection();
        let mut conn = SeaOrmConnection::new(db);

        let err = conn.query_column("SELECT 1").await.unwrap_err();
        assert!(err.message.contains("connection reset"));
    }
}
