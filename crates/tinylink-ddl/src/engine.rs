//! Reconciliation orchestrator.
//!
//! Tables are visited in processing order. Each table goes through four
//! stages (columns, constraints, indexes, seeds), each on its own session.
//! A failing statement is recorded and the stage moves on; a failing catalog
//! read ends the table's pass; a session that cannot be acquired ends the run.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::report::{Outcome, RunReport, Stage, TableReport};
use crate::schema::{Schema, TableDefinition};
use crate::source::{ConnectionSource, Session};
use crate::statement::Statement;
use crate::{columns, constraints, indexes, seed};

/// Options for a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOptions {
    /// Drop foreign-key and unique constraints before re-adding them.
    pub fix_constraints: bool,
    /// Record statements instead of executing them.
    pub dry_run: bool,
}

impl ReconcileOptions {
    /// Creates default options (non-destructive, executing).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fix_constraints: false,
            dry_run: false,
        }
    }

    /// Enables or disables fix mode.
    #[must_use]
    pub const fn fix_constraints(mut self, enabled: bool) -> Self {
        self.fix_constraints = enabled;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }
}

/// Runs statements for one stage of one table and records their outcome.
///
/// Owns the stage's session, so the session goes back to its source when
/// the runner is dropped.
pub(crate) struct StageRunner<'r, S> {
    session: S,
    report: &'r mut TableReport,
    stage: Stage,
    dry_run: bool,
}

impl<'r, S: Session> StageRunner<'r, S> {
    pub(crate) fn new(
        session: S,
        report: &'r mut TableReport,
        stage: Stage,
        dry_run: bool,
    ) -> Self {
        Self {
            session,
            report,
            stage,
            dry_run,
        }
    }

    pub(crate) fn session(&mut self) -> &mut S {
        &mut self.session
    }

    /// Executes `statement`, or records it as planned in dry-run mode.
    ///
    /// Returns whether the statement ran (or would have run). Failures are
    /// logged and recorded, never returned.
    pub(crate) async fn apply(&mut self, subject: &str, statement: Statement) -> bool {
        let sql = self.session.render(&statement);

        if self.dry_run {
            info!(table = %self.report.table, sql = %sql, "Would apply");
            self.report
                .record(self.stage, subject, Outcome::Planned, Some(sql), None);
            return true;
        }

        debug!(sql = %sql, "Executing SQL");
        match self.session.execute(&statement).await {
            Ok(_) => {
                info!(
                    table = %self.report.table,
                    subject = %subject,
                    stage = %self.stage,
                    "Applied"
                );
                self.report
                    .record(self.stage, subject, Outcome::Applied, Some(sql), None);
                true
            }
            Err(err) => {
                error!(
                    table = %self.report.table,
                    sql = %sql,
                    error = %err,
                    "Statement failed"
                );
                self.report.record(
                    self.stage,
                    subject,
                    Outcome::Failed,
                    Some(sql),
                    Some(err.to_string()),
                );
                false
            }
        }
    }

    /// Records that `subject` needs nothing.
    pub(crate) fn skip(&mut self, subject: &str, reason: &str) {
        debug!(table = %self.report.table, subject = %subject, "{reason}");
        self.report.record(
            self.stage,
            subject,
            Outcome::Skipped,
            None,
            Some(reason.to_string()),
        );
    }

    /// Records a difference the engine leaves alone.
    pub(crate) fn warn(&mut self, subject: &str, message: String) {
        warn!(table = %self.report.table, subject = %subject, "{message}");
        self.report
            .record(self.stage, subject, Outcome::Warned, None, Some(message));
    }
}

/// Converges a database towards a [`Schema`].
pub struct Engine<'a, S> {
    source: &'a S,
    schema: &'a Schema,
    options: ReconcileOptions,
}

impl<'a, S: ConnectionSource> Engine<'a, S> {
    /// Creates an engine with default options.
    #[must_use]
    pub const fn new(source: &'a S, schema: &'a Schema) -> Self {
        Self {
            source,
            schema,
            options: ReconcileOptions::new(),
        }
    }

    /// Replaces all options.
    #[must_use]
    pub const fn options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables fix mode.
    #[must_use]
    pub const fn fix_constraints(mut self, enabled: bool) -> Self {
        self.options = self.options.fix_constraints(enabled);
        self
    }

    /// Enables dry-run mode (statements are reported but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.options = self.options.dry_run(enabled);
        self
    }

    /// Reconciles every table.
    ///
    /// The report's `success` flag is set once every table has been visited,
    /// whatever happened to individual steps.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Acquire`] if a session cannot be acquired.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            tables = self.schema.len(),
            fix_constraints = self.options.fix_constraints,
            dry_run = self.options.dry_run,
            "Reconciling schema"
        );

        let mut report = RunReport::new(self.options);
        for table in self.schema.tables() {
            let mut table_report = TableReport::new(&table.name);
            self.reconcile_table(table, &mut table_report).await?;
            report.push(table_report);
        }
        report.finish();

        let summary = report.summary;
        info!(
            applied = summary.applied,
            planned = summary.planned,
            skipped = summary.skipped,
            warned = summary.warned,
            failed = summary.failed,
            aborted_tables = summary.aborted_tables,
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_table(
        &self,
        table: &TableDefinition,
        report: &mut TableReport,
    ) -> Result<()> {
        info!(table = %table.name, "Reconciling table");
        let mut pending_indexes = HashSet::new();

        for stage in Stage::ALL {
            if stage == Stage::Seeds && table.seeds.is_empty() {
                continue;
            }

            let session = self.source.acquire().await?;
            let mut run = StageRunner::new(session, report, stage, self.options.dry_run);
            let outcome = match stage {
                Stage::Columns => columns::reconcile_columns(&mut run, table).await,
                Stage::Constraints => {
                    constraints::reconcile_constraints(
                        &mut run,
                        self.schema,
                        table,
                        self.options.fix_constraints,
                        &mut pending_indexes,
                    )
                    .await
                }
                Stage::Indexes => {
                    indexes::reconcile_indexes(&mut run, table, &pending_indexes).await
                }
                Stage::Seeds => seed::run_seeds(&mut run, table).await,
            };
            drop(run);

            if let Err(err) = outcome {
                if err.is_acquire() {
                    return Err(err);
                }
                error!(table = %table.name, stage = %stage, error = %err, "Table pass aborted");
                report.abort(stage, err.to_string());
                break;
            }
        }
        Ok(())
    }
}

/// Runs a non-destructive reconciliation.
///
/// # Errors
///
/// Returns [`crate::Error::Acquire`] if a session cannot be acquired.
pub async fn reconcile<S: ConnectionSource>(source: &S, schema: &Schema) -> Result<RunReport> {
    Engine::new(source, schema).run().await
}

/// Runs a reconciliation that first drops foreign-key and unique constraints.
///
/// # Errors
///
/// Returns [`crate::Error::Acquire`] if a session cannot be acquired.
pub async fn reconcile_fixing_constraints<S: ConnectionSource>(
    source: &S,
    schema: &Schema,
) -> Result<RunReport> {
    Engine::new(source, schema).fix_constraints(true).run().await
}
