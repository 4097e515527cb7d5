//! Secondary index reconciliation.

use std::collections::HashSet;

use crate::catalog;
use crate::engine::StageRunner;
use crate::error::Result;
use crate::schema::TableDefinition;
use crate::source::Session;
use crate::statement::{IndexKey, IndexSpec, Statement, index_name, truncate_identifier};

pub(crate) const ALREADY_PRESENT: &str = "Already present";

/// Builds the index for a declared column list.
pub(crate) fn plain_index(table: &str, columns: &[String], name: Option<String>) -> IndexSpec {
    IndexSpec {
        name: name.map_or_else(|| index_name(table, columns), truncate_identifier),
        keys: columns.iter().cloned().map(IndexKey::Column).collect(),
        unique: false,
    }
}

/// Creates `index` unless its name is in `known`.
///
/// The name is added to `known` either way, so the same index is attempted
/// at most once per pass. Returns whether the statement ran (or would run).
pub(crate) async fn ensure_index<S: Session>(
    run: &mut StageRunner<'_, S>,
    known: &mut HashSet<String>,
    table: &str,
    index: IndexSpec,
) -> bool {
    if !known.insert(index.name.clone()) {
        run.skip(&index.name, ALREADY_PRESENT);
        return false;
    }
    let name = index.name.clone();
    run.apply(
        &name,
        Statement::CreateIndex {
            table: table.to_string(),
            index,
        },
    )
    .await
}

pub(crate) async fn reconcile_indexes<S: Session>(
    run: &mut StageRunner<'_, S>,
    table: &TableDefinition,
    pending: &HashSet<String>,
) -> Result<()> {
    let mut known: HashSet<String> = catalog::snapshot_indexes(run.session(), &table.name)
        .await?
        .into_iter()
        .map(|i| i.name)
        .collect();
    known.extend(pending.iter().cloned());

    for columns in &table.indexes {
        let index = plain_index(&table.name, columns, None);
        ensure_index(run, &mut known, &table.name, index).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::report::{Outcome, Stage, TableReport};
    use crate::schema::{ColumnDefinition, ColumnType};
    use crate::source::ConnectionSource;

    fn clicks() -> TableDefinition {
        TableDefinition::new("clicks")
            .column(ColumnDefinition::new("link_id", ColumnType::Integer))
            .column(ColumnDefinition::new("clicked_at", ColumnType::Timestamp))
            .index(&["link_id"])
            .index(&["link_id", "clicked_at"])
            .index(&["browser"])
    }

    async fn run_indexes(
        source: &MemorySource,
        table: &TableDefinition,
        pending: &HashSet<String>,
    ) -> TableReport {
        let mut report = TableReport::new(&table.name);
        let session = source.acquire().await.unwrap();
        let mut run = StageRunner::new(session, &mut report, Stage::Indexes, false);
        reconcile_indexes(&mut run, table, pending).await.unwrap();
        drop(run);
        report
    }

    fn prepare(source: &MemorySource, table: &TableDefinition) {
        source
            .apply(&Statement::CreateShell {
                table: table.name.clone(),
            })
            .unwrap();
        for column in &table.columns {
            source
                .apply(&Statement::AddColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_plain_index_naming() {
        let columns = vec!["link_id".to_string(), "clicked_at".to_string()];
        let index = plain_index("clicks", &columns, None);
        assert_eq!(index.name, "idx_clicks_link_id_clicked_at");
        assert!(!index.unique);

        let named = plain_index("clicks", &columns, Some("clicks_by_time".to_string()));
        assert_eq!(named.name, "clicks_by_time");
    }

    #[tokio::test]
    async fn test_indexes_created_once() {
        let source = MemorySource::new();
        let table = clicks();
        prepare(&source, &table);

        let first = run_indexes(&source, &table, &HashSet::new()).await;
        assert_eq!(first.count(Outcome::Applied), 2);
        // The index on a missing column fails on its own.
        assert_eq!(first.count(Outcome::Failed), 1);
        assert_eq!(
            source.index_names("clicks"),
            vec!["idx_clicks_link_id", "idx_clicks_link_id_clicked_at"]
        );

        source.clear_executed();
        let second = run_indexes(&source, &table, &HashSet::new()).await;
        assert_eq!(second.count(Outcome::Skipped), 2);
        assert_eq!(second.count(Outcome::Applied), 0);
        assert_eq!(source.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_names_are_skipped() {
        let source = MemorySource::new();
        let table = TableDefinition::new("clicks")
            .column(ColumnDefinition::new("link_id", ColumnType::Integer))
            .index(&["link_id"]);
        prepare(&source, &table);

        let pending: HashSet<String> = ["idx_clicks_link_id".to_string()].into();
        let report = run_indexes(&source, &table, &pending).await;
        assert_eq!(report.count(Outcome::Skipped), 1);
        assert!(source.executed().is_empty());
    }
}
