//! Constraint reconciliation.
//!
//! Declared constraints are named deterministically and added unless a
//! constraint of that name is already live. In fix mode every live foreign
//! key and unique constraint is dropped first so it gets recreated from the
//! declaration. Primary keys and checks are never dropped.

use std::collections::{HashMap, HashSet};

use crate::catalog::{self, ConstraintInfo};
use crate::engine::StageRunner;
use crate::error::Result;
use crate::indexes::{ALREADY_PRESENT, ensure_index, plain_index};
use crate::schema::{ConstraintDefinition, Schema, TableDefinition};
use crate::source::Session;
use crate::statement::{
    ConstraintBody, IndexKey, IndexSpec, Statement, check_name, foreign_key_name,
    unique_lower_name, unique_name,
};

const CASCADE: &str = "ON DELETE CASCADE";

/// What a declared constraint turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// A named table constraint.
    Constraint { name: String, body: ConstraintBody },
    /// An index.
    Index(IndexSpec),
}

fn resolve(schema: &Schema, table: &str, constraint: ConstraintDefinition) -> Target {
    match constraint {
        ConstraintDefinition::Reference {
            column,
            table: target_table,
            target_column,
            cascade,
        } => {
            let target_column = target_column
                .unwrap_or_else(|| schema.default_target_column(&target_table).to_string());
            Target::Constraint {
                name: foreign_key_name(table, &column),
                body: ConstraintBody::ForeignKey {
                    column,
                    target_table,
                    target_column,
                    cascade,
                },
            }
        }
        ConstraintDefinition::Unique { columns } => Target::Constraint {
            name: unique_name(table, &columns),
            body: ConstraintBody::Unique { columns },
        },
        ConstraintDefinition::Check { predicate } => Target::Constraint {
            name: check_name(table, &predicate),
            body: ConstraintBody::Check { predicate },
        },
        ConstraintDefinition::UniqueLower { columns } => Target::Index(IndexSpec {
            name: unique_lower_name(table, &columns),
            keys: columns.into_iter().map(IndexKey::Lower).collect(),
            unique: true,
        }),
        ConstraintDefinition::Index { columns, name } => {
            Target::Index(plain_index(table, &columns, name))
        }
    }
}

/// Reconciles the constraints of `table`.
///
/// Names of indexes created (or planned) here are added to `pending` so the
/// index stage does not repeat them.
pub(crate) async fn reconcile_constraints<S: Session>(
    run: &mut StageRunner<'_, S>,
    schema: &Schema,
    table: &TableDefinition,
    fix: bool,
    pending: &mut HashSet<String>,
) -> Result<()> {
    let live = catalog::snapshot_constraints(run.session(), &table.name).await?;
    let mut indexes: HashSet<String> = catalog::snapshot_indexes(run.session(), &table.name)
        .await?
        .into_iter()
        .map(|i| i.name)
        .collect();

    let droppable: Vec<String> = live
        .iter()
        .filter(|c| c.kind.is_droppable())
        .map(|c| c.name.clone())
        .collect();
    let mut present: HashMap<String, ConstraintInfo> =
        live.into_iter().map(|c| (c.name.clone(), c)).collect();

    if fix {
        for name in droppable {
            let dropped = run
                .apply(
                    &name,
                    Statement::DropConstraint {
                        table: table.name.clone(),
                        name: name.clone(),
                    },
                )
                .await;
            if dropped {
                present.remove(&name);
                indexes.remove(&name);
            }
        }
    }

    let mut claimed = HashSet::new();
    for constraint in table.effective_constraints() {
        match resolve(schema, &table.name, constraint) {
            Target::Index(index) => {
                let name = index.name.clone();
                if ensure_index(run, &mut indexes, &table.name, index).await {
                    pending.insert(name);
                }
            }
            Target::Constraint { name, body } => {
                if !claimed.insert(name.clone()) {
                    continue;
                }
                if let Some(existing) = present.get(&name) {
                    check_present(run, &name, &body, existing);
                    continue;
                }
                run.apply(
                    &name,
                    Statement::AddConstraint {
                        table: table.name.clone(),
                        name: name.clone(),
                        body,
                    },
                )
                .await;
            }
        }
    }

    Ok(())
}

fn check_present<S: Session>(
    run: &mut StageRunner<'_, S>,
    name: &str,
    body: &ConstraintBody,
    existing: &ConstraintInfo,
) {
    if let ConstraintBody::ForeignKey { cascade, .. } = body {
        let live_cascade = existing.definition.contains(CASCADE);
        if live_cascade != *cascade {
            let declared = if *cascade { "with" } else { "without" };
            run.warn(
                name,
                format!(
                    "Declared {declared} {CASCADE} but live definition is '{}'; run fix-constraints to recreate it",
                    existing.definition
                ),
            );
            return;
        }
    }
    run.skip(name, ALREADY_PRESENT);
}
