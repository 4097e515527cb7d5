//! Column reconciliation.
//!
//! Columns are only ever added or tightened to NOT NULL. Type and length
//! differences are reported and left alone.

use crate::catalog::{self, ColumnInfo};
use crate::engine::StageRunner;
use crate::error::Result;
use crate::schema::{ColumnDefinition, TableDefinition};
use crate::source::Session;
use crate::statement::Statement;

pub(crate) async fn reconcile_columns<S: Session>(
    run: &mut StageRunner<'_, S>,
    table: &TableDefinition,
) -> Result<()> {
    let live = catalog::snapshot_columns(run.session(), &table.name).await?;

    // No columns: either no table or an empty shell. The guarded create is a
    // no-op for the latter.
    if live.is_empty() {
        run.apply(
            &table.name,
            Statement::CreateShell {
                table: table.name.clone(),
            },
        )
        .await;
    }

    for column in &table.columns {
        match live.get(&column.name) {
            None => {
                run.apply(
                    &column.name,
                    Statement::AddColumn {
                        table: table.name.clone(),
                        column: column.clone(),
                    },
                )
                .await;
            }
            Some(info) => reconcile_existing(run, &table.name, column, info).await,
        }
    }

    Ok(())
}

async fn reconcile_existing<S: Session>(
    run: &mut StageRunner<'_, S>,
    table: &str,
    column: &ColumnDefinition,
    live: &ColumnInfo,
) {
    let declared = column.column_type.catalog_name();
    if !live.type_matches(declared) {
        run.warn(
            &column.name,
            format!(
                "Declared type '{declared}' differs from live type '{}'",
                live.data_type
            ),
        );
    } else if let (Some(limit), Some(live_limit)) = (column.effective_char_limit(), live.max_length)
        && i64::from(limit) != i64::from(live_limit)
    {
        run.warn(
            &column.name,
            format!("Declared length {limit} differs from live length {live_limit}"),
        );
    }

    if column.is_not_null() && live.nullable {
        run.apply(
            &column.name,
            Statement::SetNotNull {
                table: table.to_string(),
                column: column.name.clone(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::report::{Outcome, Stage, TableReport};
    use crate::schema::ColumnType;
    use crate::source::ConnectionSource;

    async fn run_columns(source: &MemorySource, table: &TableDefinition) -> TableReport {
        let mut report = TableReport::new(&table.name);
        let session = source.acquire().await.unwrap();
        let mut run = StageRunner::new(session, &mut report, Stage::Columns, false);
        reconcile_columns(&mut run, table).await.unwrap();
        drop(run);
        report
    }

    fn existing_links(source: &MemorySource) {
        source
            .apply(&Statement::CreateShell {
                table: "links".to_string(),
            })
            .unwrap();
        for column in [
            ColumnDefinition::new("short_code", ColumnType::Text),
            ColumnDefinition::new("target_url", ColumnType::Varchar).char_limit(100),
            ColumnDefinition::new("note", ColumnType::Text).not_null(),
        ] {
            source
                .apply(&Statement::AddColumn {
                    table: "links".to_string(),
                    column,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_table_gets_shell_and_columns() {
        let source = MemorySource::new();
        let table = TableDefinition::new("users")
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .column(ColumnDefinition::new("name", ColumnType::Varchar).char_limit(100));

        let report = run_columns(&source, &table).await;
        assert_eq!(report.count(Outcome::Applied), 3);
        assert_eq!(
            source.executed_sql(),
            vec![
                "CREATE TABLE IF NOT EXISTS \"users\" ()",
                "ALTER TABLE \"users\" ADD COLUMN IF NOT EXISTS \"id\" SERIAL PRIMARY KEY NOT NULL",
                "ALTER TABLE \"users\" ADD COLUMN IF NOT EXISTS \"name\" VARCHAR(100)",
            ]
        );
    }

    #[tokio::test]
    async fn test_mismatches_warn_without_altering() {
        let source = MemorySource::new();
        existing_links(&source);
        let table = TableDefinition::new("links")
            .column(ColumnDefinition::new("short_code", ColumnType::Varchar).char_limit(8))
            .column(ColumnDefinition::new("target_url", ColumnType::Varchar).char_limit(255));

        let report = run_columns(&source, &table).await;
        assert_eq!(report.count(Outcome::Warned), 2);
        assert!(source.executed().is_empty());
        assert_eq!(
            source.column("links", "short_code").unwrap().data_type,
            "text"
        );
    }

    #[tokio::test]
    async fn test_nullability_only_tightens() {
        let source = MemorySource::new();
        existing_links(&source);
        let table = TableDefinition::new("links")
            .column(ColumnDefinition::new("short_code", ColumnType::Text).not_null())
            .column(ColumnDefinition::new("note", ColumnType::Text).nullable());

        let report = run_columns(&source, &table).await;
        assert_eq!(
            source.executed_sql(),
            vec!["ALTER TABLE \"links\" ALTER COLUMN \"short_code\" SET NOT NULL"]
        );
        assert_eq!(report.count(Outcome::Applied), 1);
        assert!(!source.column("links", "short_code").unwrap().nullable);
        assert!(!source.column("links", "note").unwrap().nullable);
    }

    #[tokio::test]
    async fn test_failed_column_does_not_stop_the_rest() {
        let source = MemorySource::new();
        source.fail_statements_where(|s| {
            matches!(s, Statement::AddColumn { column, .. } if column.name == "bad")
        });
        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new("a", ColumnType::Integer))
            .column(ColumnDefinition::new("bad", ColumnType::Integer))
            .column(ColumnDefinition::new("c", ColumnType::Integer));

        let report = run_columns(&source, &table).await;
        assert_eq!(report.count(Outcome::Failed), 1);
        assert_eq!(source.column_names("t"), vec!["a", "c"]);
        let failed = report.steps_with(Outcome::Failed).next().unwrap();
        assert_eq!(failed.subject, "bad");
        assert!(failed.sql.as_deref().unwrap().contains("\"bad\""));
    }
}
