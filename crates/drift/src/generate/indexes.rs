//! Indexes and exclusion constraints.
//!
//! Both go through the same routine. Items whose projections are equal and
//! whose SQL matches as text are settled right away, renamed when only the
//! name differs. Items carrying SQL that differs as text are left to the
//! oracle. Whatever is still unsettled once the oracle has answered is
//! dropped or added.

use drift_schema::Index;

use crate::matching::{Item, ItemSet};
use crate::oracle::Comparison;
use crate::projection::{IndexProjection, index_sql};
use crate::script::ItemKind;
use crate::state::{Resolution, TableDiffState};
use crate::Result;

use super::Run;

fn item(idx: &Index, exclude: bool) -> Item<IndexProjection> {
    Item::new(
        idx.name.clone().unwrap_or_default(),
        IndexProjection::of(idx, exclude),
        index_sql(idx),
    )
}

fn kind(exclude: bool) -> ItemKind {
    if exclude {
        ItemKind::Constraint
    } else {
        ItemKind::Index
    }
}

pub fn generate(run: &mut Run<'_>, exclude: bool) -> Result<()> {
    let language = run.config.language.clone();
    for state in &mut run.tables {
        let rows = if exclude {
            run.actual
                .table_excludes(state.schema(), state.name())
                .collect::<Vec<_>>()
        } else {
            run.actual
                .table_indexes(state.schema(), state.name())
                .collect::<Vec<_>>()
        };
        let found: Vec<&Index> = rows
            .into_iter()
            .map(|row| &row.index)
            .filter(|idx| !state.touches_skipped(idx.column_names().into_iter()))
            .collect();

        let desired = if exclude {
            &state.desired.excludes
        } else {
            &state.desired.indexes
        };
        let set = ItemSet {
            actual: found.iter().map(|idx| item(idx, exclude)).collect(),
            desired: desired.iter().map(|idx| item(idx, exclude)).collect(),
        };
        let names: Vec<String> = set.actual.iter().map(|i| i.name.clone()).collect();

        settle(state, set, names, exclude, &language);
    }
    Ok(())
}

fn settle(
    state: &mut TableDiffState,
    mut set: ItemSet<IndexProjection>,
    names: Vec<String>,
    exclude: bool,
    language: &str,
) {
    let relax = |p: &IndexProjection| p.relaxed(language);
    let mut matches = set.match_exact();
    matches.extend(set.match_relaxed(relax));
    for m in matches {
        if let Some((from, to)) = m.rename {
            state.rename_item(kind(exclude), from, to);
        }
    }

    let unsettled: Vec<usize> = set.unmatched_actual().collect();
    for a in unsettled {
        let candidates = set.candidates(a, relax);
        if candidates.is_empty() {
            continue;
        }
        let comparison = Comparison {
            actual: set.actual[a].sql.clone(),
            candidates: candidates.iter().map(|&d| set.desired[d].sql.clone()).collect(),
        };
        state.defer(
            comparison,
            Resolution::Index {
                exclude,
                actual: a,
                candidates,
            },
        );
    }

    if exclude {
        state.excludes = set;
        state.actual_names.excludes = names;
    } else {
        state.indexes = set;
        state.actual_names.indexes = names;
    }
}
