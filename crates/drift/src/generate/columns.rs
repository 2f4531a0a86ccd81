//! Columns of matched tables.
//!
//! Columns are matched by storage name. Leftovers on both sides are offered
//! as renames. A matched pair is left alone, altered in place, or dropped and
//! added again when no cast gets the data across.

use drift_schema::{Column, TypeRef};
use drift_sql::{Ident, sql_text_eq};

use crate::choice::{Abort, ObjectKind};
use crate::matching::{Decision, all_candidates, disambiguate, pair_by};
use crate::oracle::Comparison;
use crate::projection::{ColumnProjection, qualify};
use crate::script::ColumnChange;
use crate::state::{ColumnDelta, Resolution, TableDiffState};
use crate::{Error, Result};

use super::Run;

pub async fn generate(run: &mut Run<'_>) -> Result<()> {
    let mut tables = std::mem::take(&mut run.tables);
    for state in &mut tables {
        diff_table(run, state).await?;
    }
    run.tables = tables;
    Ok(())
}

async fn diff_table(run: &mut Run<'_>, state: &mut TableDiffState) -> Result<()> {
    let current = run.current_schema().to_string();
    let schema = state.schema().to_string();
    let table = state.name().to_string();

    let desired_names: Vec<String> = state.desired.columns.iter().map(|c| c.name.clone()).collect();
    let actual_names: Vec<String> = state.actual.columns.iter().map(|c| c.name.clone()).collect();
    let mut pairing = pair_by(&desired_names, &actual_names);

    let decisions = disambiguate(
        &mut *run.chooser,
        ObjectKind::Column,
        &pairing.desired_only,
        &mut pairing.actual_only,
        |d| desired_names[d].clone(),
        |a| actual_names[a].clone(),
        all_candidates,
    )?;

    let mut renames = Vec::new();
    let mut adds = Vec::new();
    for decision in decisions {
        match decision {
            Decision::Rename { desired, actual } => {
                let (from, to) = (&actual_names[actual], &desired_names[desired]);
                run.actual.rename_column(&schema, &table, from, to);
                renames.push(ColumnChange::Rename {
                    from: from.clone(),
                    to: to.clone(),
                });
                pairing.pairs.push((desired, actual));
            }
            Decision::Create(d) => adds.push(ColumnChange::Add(state.desired.columns[d].clone())),
        }
    }
    if !renames.is_empty() {
        if let Some(renamed) = run.actual.find_table(&schema, &table) {
            state.actual = renamed.clone();
        }
    }

    let mut changes = Vec::new();
    for &(d, a) in &pairing.pairs {
        let from = state.actual.columns[a].clone();
        let to = state.desired.columns[d].clone();
        if let Some(change) = compare(run, state, from, to, &current).await? {
            changes.push(change);
        }
    }

    let mut drops = Vec::new();
    for a in pairing.actual_only {
        let name = actual_names[a].clone();
        state.skipped_columns.insert(name.clone());
        drops.push(ColumnChange::Drop(name));
    }

    state.fragment.columns.extend(renames);
    state.fragment.columns.extend(changes);
    state.fragment.columns.extend(drops);
    state.fragment.columns.extend(adds);
    Ok(())
}

/// Decide what happens to a matched column. A default that differs only as
/// text is left to the oracle.
async fn compare(
    run: &mut Run<'_>,
    state: &mut TableDiffState,
    from: Column,
    to: Column,
    current: &str,
) -> Result<Option<ColumnChange>> {
    let before = ColumnProjection::of(&from, current);
    let after = ColumnProjection::of(&to, current);
    if before.type_differs(&after) {
        return retype(run, state, from, to, current).await.map(Some);
    }

    let (same_default, texts) = match (&from.default, &to.default) {
        (None, None) => (true, None),
        (Some(a), Some(b)) if sql_text_eq(a, b) => (true, None),
        (Some(a), Some(b)) => (false, Some((a.clone(), b.clone()))),
        _ => (false, None),
    };

    if let (true, Some((a, b))) = (before == after, texts) {
        let ty = run.pending.probe_type(&qualify(&to.ty, current));
        let comparison = Comparison {
            actual: vec![format!("({a})::{ty}")],
            candidates: vec![vec![format!("({b})::{ty}")]],
        };
        state.defer(
            comparison,
            Resolution::ColumnDefault {
                column: to.name.clone(),
            },
        );
        state
            .changing_columns
            .insert(to.name.clone(), ColumnDelta { from, to });
        return Ok(None);
    }

    if before == after && same_default {
        Ok(None)
    } else {
        Ok(Some(ColumnChange::Change {
            from,
            to,
            using: None,
        }))
    }
}

/// Values of the enum a type names, if it is one.
fn actual_enum<'a>(run: &'a Run<'_>, ty: &TypeRef) -> Option<&'a [String]> {
    let schema = ty.schema.as_deref()?;
    run.actual
        .find_enum(schema, &ty.name)
        .map(|e| e.values.as_slice())
}

fn desired_enum<'a>(run: &'a Run<'_>, ty: &TypeRef, current: &str) -> Option<&'a [String]> {
    let schema = ty.schema.as_deref()?;
    run.desired
        .enums
        .values()
        .find(|e| e.name == ty.name && e.schema.as_deref().unwrap_or(current) == schema)
        .map(|e| e.values.as_slice())
}

fn same_values(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|v| b.contains(v))
}

async fn retype(
    run: &mut Run<'_>,
    state: &mut TableDiffState,
    from: Column,
    to: Column,
    current: &str,
) -> Result<ColumnChange> {
    let from_ty = qualify(&from.ty, current);
    let to_ty = qualify(&to.ty, current);
    if from_ty == to_ty {
        // Only length, precision or collation changed.
        return Ok(ColumnChange::Change {
            from,
            to,
            using: None,
        });
    }

    if from_ty.array_dims == to_ty.array_dims {
        let element = to_ty.element();
        let pending = element
            .schema
            .as_deref()
            .is_some_and(|schema| run.pending.contains(schema, &element.name));
        let from_enum = actual_enum(run, &from_ty.element());
        let to_enum = desired_enum(run, &element, current);
        let through_text = pending
            || (from_enum.is_some() && to_ty.is_text_like())
            || (from_ty.is_text_like() && to_enum.is_some())
            || matches!((from_enum, to_enum), (Some(a), Some(b)) if same_values(a, b));
        if through_text {
            let dims = "[]".repeat(to_ty.array_dims as usize);
            let using = format!("{}::text{dims}::{to_ty}", Ident(&to.name));
            tracing::debug!(column = %to.name, %using, "type change through text");
            return Ok(ColumnChange::Change {
                from,
                to,
                using: Some(using),
            });
        }

        if run
            .casts
            .can_cast(from_ty.canonical_name(), to_ty.canonical_name())
            .await?
        {
            return Ok(ColumnChange::Change {
                from,
                to,
                using: None,
            });
        }
    }

    let (from_name, to_name) = (from_ty.to_string(), to_ty.to_string());
    match run
        .chooser
        .confirm_recreate(state.name(), &to.name, &from_name, &to_name)
    {
        Ok(()) => {
            tracing::debug!(table = %state.name(), column = %to.name, "recreating column");
            state.skipped_columns.insert(to.name.clone());
            Ok(ColumnChange::Recreate { from, to })
        }
        Err(Abort::Io(e)) => Err(Error::Io(e)),
        Err(Abort::Declined) => Err(Error::UnresolvableTypeChange {
            table: state.name().to_string(),
            column: to.name,
            from: from_name,
            to: to_name,
        }),
    }
}
