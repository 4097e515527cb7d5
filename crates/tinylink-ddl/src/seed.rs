//! Seed statements.
//!
//! Seeds run in declaration order after the table's structure is in place.
//! They must be idempotent themselves (for example `ON CONFLICT DO NOTHING`);
//! the engine runs them on every pass.

use crate::engine::StageRunner;
use crate::error::Result;
use crate::schema::TableDefinition;
use crate::source::Session;
use crate::statement::Statement;

pub(crate) async fn run_seeds<S: Session>(
    run: &mut StageRunner<'_, S>,
    table: &TableDefinition,
) -> Result<()> {
    for (i, sql) in table.seeds.iter().enumerate() {
        let subject = format!("seed #{}", i + 1);
        run.apply(&subject, Statement::Seed { sql: sql.clone() }).await;
    }
    Ok(())
}
