// In-memory Postgres catalog and session mock

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tenantry_core::{DriverError, SQLSTATE_DEPENDENT_OBJECTS, SchemaConnection, SqlValue};

/// Schemas present in a fresh Postgres database.
pub const BUILTIN_SCHEMAS: [&str; 4] = ["information_schema", "pg_catalog", "pg_toast", "public"];

#[derive(Debug, Default)]
struct CatalogState {
    schemas: BTreeMap<String, BTreeSet<String>>,
}

/// Shared database catalog: schemas and the objects inside them.
///
/// Cloning shares the catalog, like several sessions on one database.
#[derive(Debug, Clone)]
pub struct MockCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MockCatalog {
    /// A catalog holding only the built-in schemas
    pub fn new() -> Self {
        Self::empty().with_schemas(BUILTIN_SCHEMAS)
    }

    /// A catalog with no schemas at all
    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(CatalogState::default())),
        }
    }

    /// Add schemas
    pub fn with_schemas<I, S>(self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for schema in schemas {
            self.create_schema(schema);
        }
        self
    }

    /// Create a schema if missing
    pub fn create_schema(&self, schema: impl Into<String>) {
        self.state.lock().schemas.entry(schema.into()).or_default();
    }

    /// Remove a schema and everything in it
    pub fn drop_schema(&self, schema: &str) {
        self.state.lock().schemas.remove(schema);
    }

    /// Whether the schema exists
    pub fn contains(&self, schema: &str) -> bool {
        self.state.lock().schemas.contains_key(schema)
    }

    /// All schema names in catalog order
    pub fn schemas(&self) -> Vec<String> {
        self.state.lock().schemas.keys().cloned().collect()
    }

    /// Put an object (a table, say) into a schema. Returns false if the
    /// schema does not exist.
    pub fn add_object(&self, schema: &str, object: impl Into<String>) -> bool {
        match self.state.lock().schemas.get_mut(schema) {
            Some(objects) => {
                objects.insert(object.into());
                true
            }
            None => false,
        }
    }

    /// Remove an object from a schema
    pub fn remove_object(&self, schema: &str, object: &str) {
        if let Some(objects) = self.state.lock().schemas.get_mut(schema) {
            objects.remove(object);
        }
    }

    /// Objects inside a schema
    pub fn objects(&self, schema: &str) -> Vec<String> {
        self.state
            .lock()
            .schemas
            .get(schema)
            .map(|objects| objects.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn drop_statement(&self, schema: &str, cascade: bool) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let Some(objects) = state.schemas.get(schema) else {
            return Ok(());
        };
        if !cascade && !objects.is_empty() {
            return Err(DriverError::new(format!(
                "cannot drop schema {schema} because other objects depend on it"
            ))
            .with_sqlstate(SQLSTATE_DEPENDENT_OBJECTS));
        }
        state.schemas.remove(schema);
        Ok(())
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// How `EXISTS(...)` results come back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolStyle {
    /// Native booleans
    #[default]
    Native,
    /// `"t"` / `"f"` text, as text-protocol drivers return them
    Text,
}

#[derive(Debug, Clone)]
struct Fault {
    pattern: String,
    error: DriverError,
    once: bool,
}

/// One session against a [`MockCatalog`].
///
/// Interprets the statements the schema executor generates. Any other
/// statement is recorded and succeeds, so migration code may run freely.
#[derive(Debug)]
pub struct MockConnection {
    catalog: MockCatalog,
    search_path: Option<String>,
    bool_style: BoolStyle,
    latency: Option<Duration>,
    faults: Vec<Fault>,
    statements: Vec<String>,
}

impl MockConnection {
    /// Open a session on `catalog`
    pub fn new(catalog: &MockCatalog) -> Self {
        Self {
            catalog: catalog.clone(),
            search_path: None,
            bool_style: BoolStyle::Native,
            latency: None,
            faults: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Return booleans in the given style
    pub fn with_bool_style(mut self, style: BoolStyle) -> Self {
        self.bool_style = style;
        self
    }

    /// Sleep before every statement, so concurrent sessions interleave
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(&mut self, pattern: impl Into<String>, error: DriverError) {
        self.faults.push(Fault {
            pattern: pattern.into(),
            error,
            once: false,
        });
    }

    /// Fail the next statement containing `pattern`
    pub fn fail_once(&mut self, pattern: impl Into<String>, error: DriverError) {
        self.faults.push(Fault {
            pattern: pattern.into(),
            error,
            once: true,
        });
    }

    /// Remove all injected faults
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// The shared catalog
    pub fn catalog(&self) -> &MockCatalog {
        &self.catalog
    }

    /// The session search path as last set, `None` if never set
    pub fn search_path(&self) -> Option<&str> {
        self.search_path.as_deref()
    }

    /// The schema unqualified names resolve against, or `None` if the search
    /// path names a schema that does not exist
    pub fn active_schema(&self) -> Option<String> {
        let schema = self.search_path.as_deref().unwrap_or("public");
        self.catalog.contains(schema).then(|| schema.to_string())
    }

    /// Every statement issued on this session, in order
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Statements that changed the search path, as the schema names set
    pub fn search_path_history(&self) -> Vec<String> {
        self.statements
            .iter()
            .filter_map(|sql| {
                sql.strip_prefix("SET search_path TO ")
                    .and_then(|rest| rest.strip_suffix(';'))
                    .and_then(unquote_ident)
            })
            .collect()
    }

    /// Forget recorded statements
    pub fn clear_statements(&mut self) {
        self.statements.clear();
    }

    async fn begin(&mut self, sql: &str) -> Result<(), DriverError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.statements.push(sql.to_string());

        let hit = self
            .faults
            .iter()
            .position(|fault| sql.contains(&fault.pattern));
        match hit {
            Some(index) if self.faults[index].once => Err(self.faults.remove(index).error),
            Some(index) => Err(self.faults[index].error.clone()),
            None => Ok(()),
        }
    }

    fn boolean(&self, value: bool) -> SqlValue {
        match self.bool_style {
            BoolStyle::Native => SqlValue::Bool(value),
            BoolStyle::Text => SqlValue::Text(if value { "t" } else { "f" }.to_string()),
        }
    }
}

/// `"a""b"` to `a"b`
pub fn unquote_ident(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    if inner.replace("\"\"", "").contains('"') {
        return None;
    }
    Some(inner.replace("\"\"", "\""))
}

/// `'a''b'` to `a'b`
pub fn unquote_literal(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.replace("''", "").contains('\'') {
        return None;
    }
    Some(inner.replace("''", "'"))
}

fn malformed(sql: &str) -> DriverError {
    DriverError::new(format!("syntax error in statement: {sql}")).with_sqlstate("42601")
}

#[async_trait]
impl SchemaConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.begin(sql).await?;

        if let Some(rest) = sql.strip_prefix("SET search_path TO ") {
            let quoted = rest.strip_suffix(';').ok_or_else(|| malformed(sql))?;
            self.search_path = Some(unquote_ident(quoted).ok_or_else(|| malformed(sql))?);
        } else if let Some(rest) = sql.strip_prefix("CREATE SCHEMA IF NOT EXISTS ") {
            let quoted = rest.strip_suffix(';').ok_or_else(|| malformed(sql))?;
            self.catalog
                .create_schema(unquote_ident(quoted).ok_or_else(|| malformed(sql))?);
        } else if let Some(rest) = sql.strip_prefix("DROP SCHEMA IF EXISTS ") {
            let rest = rest.strip_suffix(';').ok_or_else(|| malformed(sql))?;
            let (quoted, cascade) = if let Some(q) = rest.strip_suffix(" CASCADE") {
                (q, true)
            } else if let Some(q) = rest.strip_suffix(" RESTRICT") {
                (q, false)
            } else {
                (rest, false)
            };
            let schema = unquote_ident(quoted).ok_or_else(|| malformed(sql))?;
            self.catalog.drop_statement(&schema, cascade)?;
        }
        Ok(())
    }

    async fn query_column(&mut self, sql: &str) -> Result<Vec<SqlValue>, DriverError> {
        self.begin(sql).await?;

        if sql.starts_with("SELECT EXISTS(") && sql.contains("pg_namespace") {
            let literal = sql
                .split_once("nspname = ")
                .and_then(|(_, rest)| rest.strip_suffix(')'))
                .and_then(unquote_literal)
                .ok_or_else(|| malformed(sql))?;
            return Ok(vec![self.boolean(self.catalog.contains(&literal))]);
        }
        if sql == "SELECT current_schema()" {
            return Ok(vec![
                self.active_schema().map_or(SqlValue::Null, SqlValue::Text),
            ]);
        }
        if sql.starts_with("SELECT nspname FROM") && sql.contains("pg_namespace") {
            return Ok(self
                .catalog
                .schemas()
                .into_iter()
                .map(SqlValue::Text)
                .collect());
        }
        Ok(Vec::new())
    }
}
