//! Tenant Context
//!
//! A [`TenantContext`] is one execution context: it owns exactly one
//! connection (one database session) and mirrors which tenant and schema are
//! active on it. Every operation takes `&mut self`, so a context is driven by
//! one task at a time and two contexts never share a session or a slot.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut ctx = TenantContext::new(conn, Arc::new(TenancyConfig::default()));
//!
//! let count = ctx
//!     .with_tenant("tenant_acme", |ctx| {
//!         Box::pin(async move {
//!             // unqualified queries on ctx.connection_mut() hit tenant_acme
//!             Ok::<_, TenancyError>(ctx.current_schema().len())
//!         })
//!     })
//!     .await?;
//!
//! // back on the previous schema here, even if the body failed
//! ```
//!
//! Restoration after `with_tenant` is unconditional. If the body's future is
//! dropped before it completes (task cancellation, a timeout) or panics, the
//! pending restore is recorded and replayed by the next operation on the same
//! context before it does anything else.

use crate::error::{Result, TenancyError};
use crate::schema::{SchemaConnection, SchemaExecutor};
use crate::tenant::{SchemaRef, Tenant};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use tenantry_config::TenancyConfig;
use tenantry_log::{debug, error, warn};

/// State to return to when a `with_tenant` scope exits.
#[derive(Debug, Clone)]
struct RestoreFrame {
    depth: usize,
    tenant: Option<Arc<Tenant>>,
    schema: Option<String>,
}

/// Records its frame as abandoned unless disarmed.
struct RestoreGuard {
    abandoned: Arc<Mutex<Vec<RestoreFrame>>>,
    frame: Option<RestoreFrame>,
}

impl RestoreGuard {
    fn new(abandoned: Arc<Mutex<Vec<RestoreFrame>>>, frame: RestoreFrame) -> Self {
        Self {
            abandoned,
            frame: Some(frame),
        }
    }

    fn disarm(mut self) {
        self.frame = None;
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            warn!(
                "Tenant scope abandoned before restore; restoring {} on next use",
                frame.schema.as_deref().unwrap_or("default schema")
            );
            self.abandoned.lock().push(frame);
        }
    }
}

/// Per-task tenant context bound to one database session
pub struct TenantContext<C: SchemaConnection> {
    executor: SchemaExecutor<C>,
    config: Arc<TenancyConfig>,
    current_tenant: Option<Arc<Tenant>>,
    current_schema: Option<String>,
    depth: usize,
    abandoned: Arc<Mutex<Vec<RestoreFrame>>>,
}

impl<C: SchemaConnection> TenantContext<C> {
    /// Create a context over `conn`.
    ///
    /// The connection is assumed to be on the configured default schema;
    /// call [`reset_context`](Self::reset_context) to make that so.
    pub fn new(conn: C, config: Arc<TenancyConfig>) -> Self {
        Self {
            executor: SchemaExecutor::new(conn),
            config,
            current_tenant: None,
            current_schema: None,
            depth: 0,
            abandoned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a context with the default configuration
    pub fn with_defaults(conn: C) -> Self {
        Self::new(conn, Arc::new(TenancyConfig::default()))
    }

    /// Shared configuration
    pub fn config(&self) -> &Arc<TenancyConfig> {
        &self.config
    }

    /// Configured default schema
    pub fn default_schema(&self) -> &str {
        &self.config.default_schema
    }

    /// Tenant currently recorded, if any
    pub fn current_tenant(&self) -> Option<&Arc<Tenant>> {
        self.current_tenant.as_ref()
    }

    /// Schema currently active on this context's session
    pub fn current_schema(&self) -> &str {
        self.current_schema
            .as_deref()
            .unwrap_or(&self.config.default_schema)
    }

    /// Nesting depth of active `with_tenant` scopes
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record a tenant without touching the connection.
    pub fn set_current_tenant(&mut self, tenant: Option<Arc<Tenant>>) {
        self.current_tenant = tenant;
    }

    /// Record the active schema. Only called after the executor switched.
    pub(crate) fn set_current_schema(&mut self, schema: Option<String>) {
        self.current_schema = schema;
    }

    /// The connection, for queries against the active schema.
    ///
    /// Statements that change the search path directly bypass the context
    /// and break its mirror; use the switch operations instead.
    pub fn connection_mut(&mut self) -> &mut C {
        self.executor.connection_mut()
    }

    /// The connection
    pub fn connection(&self) -> &C {
        self.executor.connection()
    }

    /// Release the connection
    pub fn into_connection(self) -> C {
        self.executor.into_connection()
    }

    /// Activate `name` on the session; blank names mean the default schema.
    pub async fn switch_to_schema(&mut self, name: &str) -> Result<()> {
        self.recover().await?;
        self.activate_schema(name).await
    }

    /// Activate the schema named by `target` and record its tenant.
    ///
    /// Raw schema names and `SchemaRef::Default` clear the tenant slot.
    pub async fn switch_to_tenant(&mut self, target: impl Into<SchemaRef>) -> Result<()> {
        self.recover().await?;
        let target = target.into();
        self.activate(&target).await
    }

    /// Clear both slots and activate the default schema.
    pub async fn reset_context(&mut self) -> Result<()> {
        self.recover().await?;
        self.reset_slots().await
    }

    /// Run `body` with `target` active, then restore the previous tenant and
    /// schema whatever the outcome.
    ///
    /// Scopes nest to any depth. An activation error is returned after the
    /// previous state has been restored, as is any error from `body`.
    pub async fn with_tenant<T, E, F>(
        &mut self,
        target: impl Into<SchemaRef>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TenantContext<C>) -> BoxFuture<'c, std::result::Result<T, E>>,
        E: From<TenancyError>,
    {
        self.recover().await?;
        let target = target.into();

        let frame = RestoreFrame {
            depth: self.depth,
            tenant: self.current_tenant.clone(),
            schema: self.current_schema.clone(),
        };
        let guard = RestoreGuard::new(Arc::clone(&self.abandoned), frame.clone());
        self.depth += 1;

        let outcome = match self.activate(&target).await {
            Ok(()) => body(self).await,
            Err(err) => Err(E::from(err)),
        };

        self.depth = frame.depth;
        // Inner scopes cancelled by the body are superseded by this restore.
        self.abandoned.lock().retain(|f| f.depth < frame.depth);
        let restored = self.restore(&frame).await;
        // A failed restore stays queued for the next operation.
        if restored.is_ok() {
            guard.disarm();
        }

        match (outcome, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(E::from(err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(restore_err)) => {
                error!("Failed to restore tenant scope: {}", restore_err);
                Err(err)
            }
        }
    }

    /// Create the schema named by `target`.
    pub async fn create_tenant_schema(&mut self, target: impl Into<SchemaRef>) -> Result<()> {
        self.recover().await?;
        let target = target.into();
        let schema = target.resolve(&self.config.default_schema)?;
        self.executor.create_schema(schema).await
    }

    /// Drop the schema named by `target`.
    pub async fn drop_tenant_schema(
        &mut self,
        target: impl Into<SchemaRef>,
        cascade: bool,
    ) -> Result<()> {
        self.recover().await?;
        let target = target.into();
        let schema = target.resolve(&self.config.default_schema)?;
        self.executor.drop_schema(schema, cascade).await
    }

    /// Whether the schema exists in the catalog
    pub async fn schema_exists(&mut self, schema: &str) -> Result<bool> {
        self.recover().await?;
        self.executor.schema_exists(schema).await
    }

    /// Every schema in the catalog, unfiltered
    pub async fn list_schemas(&mut self) -> Result<Vec<String>> {
        self.recover().await?;
        self.executor.list_schemas().await
    }

    /// The active schema as reported by the database rather than the mirror.
    pub async fn session_schema(&mut self) -> Result<String> {
        self.recover().await?;
        self.executor.current_schema().await
    }

    /// Replay restores abandoned by cancelled or panicked scopes.
    ///
    /// The outermost abandoned frame wins; inner frames are superseded by it.
    /// Called at the start of every operation, so calling it directly is only
    /// needed to heal eagerly.
    pub async fn recover(&mut self) -> Result<()> {
        let frame = {
            let mut abandoned = self.abandoned.lock();
            let outermost = abandoned.iter().min_by_key(|f| f.depth).cloned();
            abandoned.clear();
            outermost
        };
        let Some(frame) = frame else {
            return Ok(());
        };

        debug!("Recovering abandoned tenant scope at depth {}", frame.depth);
        self.depth = frame.depth;
        let guard = RestoreGuard::new(Arc::clone(&self.abandoned), frame.clone());
        self.restore(&frame).await?;
        guard.disarm();
        Ok(())
    }

    async fn activate(&mut self, target: &SchemaRef) -> Result<()> {
        let schema = target.resolve(&self.config.default_schema)?.to_string();
        self.activate_schema(&schema).await?;
        self.set_current_tenant(target.tenant().cloned());
        Ok(())
    }

    async fn activate_schema(&mut self, name: &str) -> Result<()> {
        let schema = if name.trim().is_empty() {
            self.config.default_schema.clone()
        } else {
            name.to_string()
        };
        self.executor.switch_schema(&schema).await?;
        self.set_current_schema(Some(schema));
        Ok(())
    }

    async fn reset_slots(&mut self) -> Result<()> {
        let default = self.config.default_schema.clone();
        self.executor.switch_schema(&default).await?;
        self.set_current_tenant(None);
        self.set_current_schema(None);
        Ok(())
    }

    /// Return to `frame`, deriving the schema from its tenant when it has one.
    async fn restore(&mut self, frame: &RestoreFrame) -> Result<()> {
        let from_tenant = frame
            .tenant
            .as_ref()
            .and_then(|tenant| tenant.schema_name().ok())
            .map(str::to_string);

        match (from_tenant, frame.schema.as_deref()) {
            (Some(schema), _) => {
                self.executor.switch_schema(&schema).await?;
                self.set_current_schema(Some(schema));
            }
            (None, Some(schema)) => {
                self.executor.switch_schema(schema).await?;
                self.set_current_schema(Some(schema.to_string()));
            }
            (None, None) => {
                let default = self.config.default_schema.clone();
                self.executor.switch_schema(&default).await?;
                self.set_current_schema(None);
            }
        }
        self.set_current_tenant(frame.tenant.clone());
        Ok(())
    }
}
