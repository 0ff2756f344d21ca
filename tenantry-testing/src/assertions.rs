// Test assertions for contexts and migration runs

use crate::mock::MockConnection;
use tenantry_core::{MigrationRun, MigrationStatus, SchemaState, StatusReport, TenantContext};

/// Assert that the context and its session both have `expected` active
pub fn assert_active_schema(ctx: &TenantContext<MockConnection>, expected: &str) {
    assert_eq!(
        ctx.current_schema(),
        expected,
        "Expected context schema '{}', got '{}'",
        expected,
        ctx.current_schema()
    );
    let session = ctx
        .connection()
        .search_path()
        .unwrap_or(ctx.default_schema());
    assert_eq!(
        session, expected,
        "Context says '{}' but the session search path is '{}'",
        expected, session
    );
}

/// Assert the status of every result in a run, in order
pub fn assert_run_statuses(run: &MigrationRun, expected: &[(&str, MigrationStatus)]) {
    let actual: Vec<(&str, MigrationStatus)> = run
        .results
        .iter()
        .map(|r| (r.schema.as_str(), r.status))
        .collect();
    assert_eq!(actual, expected, "Migration run statuses do not match");
}

/// Assert one schema's line in a status report
pub fn assert_schema_state(report: &StatusReport, schema: &str, state: SchemaState, pending: usize) {
    let status = report
        .get(schema)
        .unwrap_or_else(|| panic!("Schema '{}' missing from status report", schema));
    assert_eq!(
        (status.state, status.pending),
        (state, pending),
        "Unexpected status for '{}'",
        schema
    );
}
