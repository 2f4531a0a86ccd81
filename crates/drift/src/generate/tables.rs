//! Tables.
//!
//! Tables are matched by schema and name. A table found under its name in
//! another schema is moved. Remaining new tables are offered the remaining
//! old tables that look like them as rename sources. Matched tables get a
//! [`TableDiffState`] the later stages fill in.

use drift_schema::ForeignKey;

use crate::choice::ObjectKind;
use crate::matching::{Decision, RENAME_THRESHOLD, disambiguate, pair_by, table_similarity};
use crate::script::{Op, TableChange, TableConstraint, TypeKind};
use crate::state::{ResolvedTable, TableDiffState};
use crate::Result;

use super::Run;

/// Old tables similar enough to `desired` to be offered as rename sources,
/// most similar first.
fn rank_candidates(
    desired: &ResolvedTable,
    actual_only: &[usize],
    run: &Run<'_>,
) -> Vec<usize> {
    let desired_cols: Vec<&str> = desired.columns.iter().map(|c| c.name.as_str()).collect();
    let mut scored: Vec<(usize, f64)> = actual_only
        .iter()
        .map(|&a| {
            let table = &run.actual.tables[a];
            let cols: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            (a, table_similarity(&desired.name, &desired_cols, &table.name, &cols))
        })
        .filter(|&(_, score)| score >= RENAME_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().map(|(a, _)| a).collect()
}

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    let desired: Vec<ResolvedTable> = run
        .desired
        .tables
        .iter()
        .map(|t| ResolvedTable::resolve(t, run.desired, run.config))
        .collect();

    let desired_keys: Vec<(&str, &str)> = desired
        .iter()
        .map(|t| (t.schema.as_str(), t.name.as_str()))
        .collect();
    let actual_keys: Vec<(String, String)> = run
        .actual
        .tables
        .iter()
        .map(|t| (t.schema.clone(), t.name.clone()))
        .collect();
    let actual_refs: Vec<(&str, &str)> = actual_keys
        .iter()
        .map(|(schema, name)| (schema.as_str(), name.as_str()))
        .collect();
    let mut pairing = pair_by(&desired_keys, &actual_refs);

    let mut moved = Vec::new();
    pairing.desired_only.retain(|&d| {
        let found = pairing
            .actual_only
            .iter()
            .position(|&a| actual_keys[a].1 == desired[d].name);
        match found {
            Some(i) => {
                moved.push((d, pairing.actual_only.remove(i)));
                false
            }
            None => true,
        }
    });

    let ranked: Vec<Vec<usize>> = desired
        .iter()
        .map(|t| rank_candidates(t, &pairing.actual_only, run))
        .collect();
    let decisions = disambiguate(
        &mut *run.chooser,
        ObjectKind::Table,
        &pairing.desired_only,
        &mut pairing.actual_only,
        |d| desired[d].name.clone(),
        |a| actual_keys[a].1.clone(),
        |d, remaining| {
            ranked[d]
                .iter()
                .copied()
                .filter(|a| remaining.contains(a))
                .collect()
        },
    )?;
    let renamed = decisions.iter().filter_map(|decision| match decision {
        Decision::Rename { desired, actual } => Some((*desired, *actual)),
        Decision::Create(_) => None,
    });

    for (d, a) in moved.into_iter().chain(renamed) {
        let (from_schema, from) = actual_keys[a].clone();
        let target = &desired[d];
        run.actual
            .rename_table(&from_schema, &from, &target.schema, &target.name);
        run.push(Op::RenameType {
            kind: TypeKind::Table,
            from_schema,
            from,
            to_schema: target.schema.clone(),
            to: target.name.clone(),
        });
        pairing.pairs.push((d, a));
    }

    for decision in &decisions {
        if let Decision::Create(d) = decision {
            create(run, &desired[*d]);
        }
    }

    for &(d, a) in &pairing.pairs {
        let actual = run.actual.tables[a].clone();
        let mut state = TableDiffState::new(desired[d].clone(), actual);
        if state.actual.comment != state.desired.comment {
            state.fragment.comment = Some(state.desired.comment.clone());
        }
        run.tables.push(state);
    }

    for a in pairing.actual_only {
        run.drops.tables.push(actual_keys[a].clone());
    }
    Ok(())
}

/// Create a table. Foreign keys go inside the `CREATE TABLE` when their
/// target already exists by then; the others are added once every table is
/// in place.
fn create(run: &mut Run<'_>, table: &ResolvedTable) {
    let exists = |fk: &ForeignKey| {
        let schema = fk.references_schema.as_deref().unwrap_or(&table.schema);
        let target = fk.references_table.as_str();
        (schema == table.schema && target == table.name)
            || run.actual.find_table(schema, target).is_some()
            || run
                .created
                .iter()
                .any(|t| t.schema == schema && t.name == target)
    };
    let create = table.create(&run.config.language, exists);

    let later: Vec<TableConstraint> = table
        .foreign_keys
        .iter()
        .filter(|fk| !exists(fk))
        .cloned()
        .map(TableConstraint::ForeignKey)
        .collect();
    if !later.is_empty() {
        tracing::debug!(table = %table.name, count = later.len(), "deferring foreign keys");
        let mut change = TableChange::new(&table.schema, &table.name);
        change.add_constraints = later;
        run.trailing.push(change);
    }

    run.push(Op::CreateTable(create));
    run.created.push(table.clone());
}
