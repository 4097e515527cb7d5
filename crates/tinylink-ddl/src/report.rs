//! Run reports.
//!
//! Every statement the engine applies, plans, skips or fails, and every
//! warning it raises, is recorded as a [`StepReport`] under the table it
//! belongs to.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::ReconcileOptions;

/// Reconciliation stage a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Shell creation, column additions and nullability.
    Columns,
    /// Constraint drops and additions.
    Constraints,
    /// Table-level secondary indexes.
    Indexes,
    /// Seed statements.
    Seeds,
}

impl Stage {
    /// Stages in execution order.
    pub const ALL: [Self; 4] = [Self::Columns, Self::Constraints, Self::Indexes, Self::Seeds];

    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Columns => "columns",
            Self::Constraints => "constraints",
            Self::Indexes => "indexes",
            Self::Seeds => "seeds",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The statement ran.
    Applied,
    /// The statement would have run (dry run).
    Planned,
    /// Nothing to do; the object is already present.
    Skipped,
    /// Live state differs in a way the engine does not correct.
    Warned,
    /// The statement failed.
    Failed,
}

/// One step of a table pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Stage the step ran in.
    pub stage: Stage,
    /// Column, constraint or index the step is about.
    pub subject: String,
    /// Outcome.
    pub outcome: Outcome,
    /// Statement text, for applied, planned and failed steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Reason, warning or database error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A stage that stopped before finishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortedStage {
    /// The stage.
    pub stage: Stage,
    /// The error that stopped it.
    pub message: String,
}

/// Everything that happened to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Table name.
    pub table: String,
    /// Steps in execution order.
    pub steps: Vec<StepReport>,
    /// Set when the pass was cut short; later stages did not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortedStage>,
}

impl TableReport {
    /// Creates an empty report for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            steps: Vec::new(),
            aborted: None,
        }
    }

    /// Records a step.
    pub fn record(
        &mut self,
        stage: Stage,
        subject: impl Into<String>,
        outcome: Outcome,
        sql: Option<String>,
        message: Option<String>,
    ) {
        self.steps.push(StepReport {
            stage,
            subject: subject.into(),
            outcome,
            sql,
            message,
        });
    }

    /// Marks the pass as cut short in `stage`.
    pub fn abort(&mut self, stage: Stage, message: impl Into<String>) {
        self.aborted = Some(AbortedStage {
            stage,
            message: message.into(),
        });
    }

    /// Returns the number of steps with `outcome`.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }

    /// Returns the steps with `outcome`.
    pub fn steps_with(&self, outcome: Outcome) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(move |s| s.outcome == outcome)
    }
}

/// Step counts across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Statements that ran.
    pub applied: usize,
    /// Statements that would have run.
    pub planned: usize,
    /// Objects already present.
    pub skipped: usize,
    /// Warnings raised.
    pub warned: usize,
    /// Statements that failed.
    pub failed: usize,
    /// Tables whose pass was cut short.
    pub aborted_tables: usize,
}

impl Summary {
    /// Returns true if any statement failed or any table pass was cut short.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0 || self.aborted_tables > 0
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Options the run used.
    pub options: ReconcileOptions,
    /// True once the run has gone through every table, even if steps failed.
    pub success: bool,
    /// Per-table reports in processing order.
    pub tables: Vec<TableReport>,
    /// Step counts, filled in when the run finishes.
    pub summary: Summary,
}

impl RunReport {
    /// Starts a report.
    #[must_use]
    pub fn new(options: ReconcileOptions) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            options,
            success: false,
            tables: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Appends a table report.
    pub fn push(&mut self, table: TableReport) {
        self.tables.push(table);
    }

    /// Marks the run as complete and computes the summary.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.success = true;
        self.summary = self.compute_summary();
    }

    fn compute_summary(&self) -> Summary {
        let count = |outcome: Outcome| -> usize {
            self.tables.iter().map(|t| t.count(outcome)).sum()
        };
        Summary {
            applied: count(Outcome::Applied),
            planned: count(Outcome::Planned),
            skipped: count(Outcome::Skipped),
            warned: count(Outcome::Warned),
            failed: count(Outcome::Failed),
            aborted_tables: self.tables.iter().filter(|t| t.aborted.is_some()).count(),
        }
    }

    /// Gets a table report by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Returns every step across all tables.
    pub fn steps(&self) -> impl Iterator<Item = &StepReport> {
        self.tables.iter().flat_map(|t| t.steps.iter())
    }

    /// Returns the SQL of applied or planned steps, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        self.steps()
            .filter(|s| matches!(s.outcome, Outcome::Applied | Outcome::Planned))
            .filter_map(|s| s.sql.as_deref())
            .collect()
    }

    /// Returns how long the run took.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableReport {
        let mut report = TableReport::new("users");
        report.record(
            Stage::Columns,
            "users",
            Outcome::Applied,
            Some("CREATE TABLE IF NOT EXISTS \"users\" ()".to_string()),
            None,
        );
        report.record(
            Stage::Columns,
            "email",
            Outcome::Warned,
            None,
            Some("type mismatch".to_string()),
        );
        report.record(
            Stage::Constraints,
            "users_email_unique",
            Outcome::Failed,
            Some("ALTER TABLE ...".to_string()),
            Some("duplicate key".to_string()),
        );
        report
    }

    #[test]
    fn test_unfinished_report_is_not_successful() {
        let report = RunReport::new(ReconcileOptions::default());
        assert!(!report.success);
        assert!(report.finished_at.is_none());
        assert!(report.duration().is_none());
    }

    #[test]
    fn test_summary_counts() {
        let mut report = RunReport::new(ReconcileOptions::default());
        report.push(table());
        let mut aborted = TableReport::new("links");
        aborted.abort(Stage::Constraints, "catalog unavailable");
        report.push(aborted);
        report.finish();

        assert!(report.success);
        assert_eq!(
            report.summary,
            Summary {
                applied: 1,
                planned: 0,
                skipped: 0,
                warned: 1,
                failed: 1,
                aborted_tables: 1,
            }
        );
        assert!(report.summary.has_failures());
        assert_eq!(
            report.statements(),
            vec!["CREATE TABLE IF NOT EXISTS \"users\" ()"]
        );
        assert!(report.duration().is_some());
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let mut report = RunReport::new(ReconcileOptions::default());
        report.push(table());
        report.finish();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        let steps = &json["tables"][0]["steps"];
        assert_eq!(steps[0]["outcome"], "applied");
        assert_eq!(steps[1]["stage"], "columns");
        assert!(steps[1].get("sql").is_none());
        assert_eq!(json["summary"]["failed"], 1);
        assert!(json["tables"][0].get("aborted").is_none());
    }
}
