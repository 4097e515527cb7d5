#![allow(dead_code)]

use tinylink_ddl::prelude::*;
use tinylink_ddl::tinylink;

pub fn tinylink_schema() -> Schema {
    tinylink::schema().unwrap_or_else(|e| panic!("TinyLink schema is invalid: {e}"))
}

/// `users{id PK, email unique, name nullable}` with one index.
pub fn users_schema() -> Schema {
    Schema::new(vec![
        TableDefinition::new("users")
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .column(
                ColumnDefinition::new("email", ColumnType::Varchar)
                    .not_null()
                    .unique(),
            )
            .column(ColumnDefinition::new("name", ColumnType::Varchar).char_limit(100))
            .index(&["email"]),
    ])
    .unwrap_or_else(|e| panic!("Invalid schema: {e}"))
}

pub async fn run(source: &MemorySource, schema: &Schema) -> RunReport {
    reconcile(source, schema)
        .await
        .unwrap_or_else(|e| panic!("Reconcile failed: {e}"))
}

pub async fn run_fixing(source: &MemorySource, schema: &Schema) -> RunReport {
    reconcile_fixing_constraints(source, schema)
        .await
        .unwrap_or_else(|e| panic!("Reconcile failed: {e}"))
}

pub async fn plan(source: &MemorySource, schema: &Schema, fix: bool) -> RunReport {
    Engine::new(source, schema)
        .dry_run(true)
        .fix_constraints(fix)
        .run()
        .await
        .unwrap_or_else(|e| panic!("Plan failed: {e}"))
}

/// Creates `table` with `columns` directly in the catalog.
pub fn existing_table(source: &MemorySource, table: &str, columns: Vec<ColumnDefinition>) {
    source
        .apply(&Statement::CreateShell {
            table: table.to_string(),
        })
        .unwrap_or_else(|e| panic!("Failed to create {table}: {e}"));
    for column in columns {
        source
            .apply(&Statement::AddColumn {
                table: table.to_string(),
                column,
            })
            .unwrap_or_else(|e| panic!("Failed to add column to {table}: {e}"));
    }
}

pub fn assert_sessions_released(source: &MemorySource) {
    assert!(source.acquired() > 0, "No session was acquired");
    assert_eq!(
        source.acquired(),
        source.released(),
        "Sessions acquired and released differ"
    );
}

pub fn position(sql: &[String], needle: &str) -> usize {
    sql.iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("No statement contains {needle}\n{sql:#?}"))
}
