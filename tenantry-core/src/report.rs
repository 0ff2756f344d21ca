//! Migration Reports
//!
//! Structured results of bulk runs and status scans. Everything here
//! serializes with serde for machine consumption and implements `Display`
//! for operators.

use crate::migration::{MigrationResult, MigrationStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts per status for one bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

impl MigrationSummary {
    /// Tally a set of results
    pub fn from_results(results: &[MigrationResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.status {
                MigrationStatus::Success => summary.success += 1,
                MigrationStatus::Error => summary.error += 1,
                MigrationStatus::Skipped => summary.skipped += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.success + self.error + self.skipped
    }

    /// No schema failed
    pub fn is_success(&self) -> bool {
        self.error == 0
    }
}

/// Results of [`migrate_all`](crate::MigrationOrchestrator::migrate_all)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRun {
    /// One entry per tenant schema, in processing order
    pub results: Vec<MigrationResult>,
    pub summary: MigrationSummary,
}

impl MigrationRun {
    pub fn new(results: Vec<MigrationResult>) -> Self {
        let summary = MigrationSummary::from_results(&results);
        Self { results, summary }
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Results with the given status
    pub fn with_status(&self, status: MigrationStatus) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(move |r| r.status == status)
    }

    /// The result for `schema`, if it was part of the run
    pub fn result_for(&self, schema: &str) -> Option<&MigrationResult> {
        self.results.iter().find(|r| r.schema == schema)
    }
}

impl fmt::Display for MigrationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tenant migrations ({} schemas)", self.summary.total())?;
        for result in &self.results {
            let marker = match result.status {
                MigrationStatus::Success => "ok",
                MigrationStatus::Error => "FAILED",
                MigrationStatus::Skipped => "skipped",
            };
            writeln!(f, "  [{marker}] {}: {}", result.schema, result.message)?;
        }
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.summary.success, self.summary.error, self.summary.skipped
        )
    }
}

/// Migration state of one schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    UpToDate,
    Pending,
    Error,
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UpToDate => "up_to_date",
            Self::Pending => "pending",
            Self::Error => "error",
        })
    }
}

/// Status line for one tenant schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStatus {
    pub schema: String,
    pub state: SchemaState,
    /// Pending migration count
    pub pending: usize,
    /// Applied migration count
    pub applied: usize,
    /// Error text for `Error` states
    pub message: Option<String>,
}

impl SchemaStatus {
    pub(crate) fn counted(schema: &str, pending: usize, applied: usize) -> Self {
        Self {
            schema: schema.to_string(),
            state: if pending == 0 {
                SchemaState::UpToDate
            } else {
                SchemaState::Pending
            },
            pending,
            applied,
            message: None,
        }
    }

    pub(crate) fn failed(schema: &str, message: String) -> Self {
        Self {
            schema: schema.to_string(),
            state: SchemaState::Error,
            pending: 0,
            applied: 0,
            message: Some(message),
        }
    }
}

/// Results of [`migration_status`](crate::MigrationOrchestrator::migration_status)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub schemas: Vec<SchemaStatus>,
}

impl StatusReport {
    pub fn get(&self, schema: &str) -> Option<&SchemaStatus> {
        self.schemas.iter().find(|s| s.schema == schema)
    }

    /// Whether every schema is up to date
    pub fn is_up_to_date(&self) -> bool {
        self.schemas.iter().all(|s| s.state == SchemaState::UpToDate)
    }

    pub fn total_pending(&self) -> usize {
        self.schemas.iter().map(|s| s.pending).sum()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .schemas
            .iter()
            .map(|s| s.schema.len())
            .max()
            .unwrap_or(0)
            .max("SCHEMA".len());

        writeln!(
            f,
            "{:<width$}  {:<10}  {:>7}  {:>7}",
            "SCHEMA", "STATUS", "PENDING", "APPLIED"
        )?;
        for status in &self.schemas {
            write!(
                f,
                "{:<width$}  {:<10}  {:>7}  {:>7}",
                status.schema,
                status.state.to_string(),
                status.pending,
                status.applied
            )?;
            if let Some(message) = &status.message {
                write!(f, "  {message}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_run() -> MigrationRun {
        MigrationRun::new(vec![
            MigrationResult::success("a", vec!["m1".into()], Duration::ZERO),
            MigrationResult::error("b", "boom".into(), Duration::ZERO),
            MigrationResult::skipped("c"),
        ])
    }

    #[test]
    fn test_summary_counts() {
        let run = sample_run();
        assert_eq!(
            run.summary,
            MigrationSummary {
                success: 1,
                error: 1,
                skipped: 1
            }
        );
        assert!(!run.is_success());
        assert_eq!(run.with_status(MigrationStatus::Error).count(), 1);
        assert_eq!(run.result_for("c").map(|r| r.status), Some(MigrationStatus::Skipped));
    }

    #[test]
    fn test_run_display() {
        let text = sample_run().to_string();
        assert!(text.contains("[ok] a: 1 migration applied"));
        assert!(text.contains("[FAILED] b: migration failed: boom"));
        assert!(text.ends_with("1 succeeded, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_run_serializes() {
        let json = serde_json::to_value(sample_run()).unwrap();
        assert_eq!(json["summary"]["error"], 1);
        assert_eq!(json["results"][1]["status"], "error");
        assert_eq!(json["results"][1]["error"], "boom");
    }

    #[test]
    fn test_status_report() {
        let report = StatusReport {
            schemas: vec![
                SchemaStatus::counted("tenant_a", 0, 3),
                SchemaStatus::counted("tenant_b", 2, 1),
                SchemaStatus::failed("tenant_c", "permission denied".into()),
            ],
        };

        assert_eq!(report.get("tenant_a").unwrap().state, SchemaState::UpToDate);
        assert_eq!(report.get("tenant_b").unwrap().state, SchemaState::Pending);
        assert_eq!(report.total_pending(), 2);
        assert!(!report.is_up_to_date());

        let text = report.to_string();
        assert!(text.starts_with("SCHEMA"));
        assert!(text.contains("up_to_date"));
        assert!(text.contains("permission denied"));
    }
}
