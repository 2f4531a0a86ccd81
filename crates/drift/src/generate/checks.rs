//! Check constraints, table- and column-level.
//!
//! Checks compare on their expression alone: as text first, then through
//! the oracle.

use drift_schema::Constraint;

use crate::matching::{Item, ItemSet};
use crate::oracle::Comparison;
use crate::projection::check_sql;
use crate::script::ItemKind;
use crate::state::Resolution;
use crate::Result;

use super::Run;

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    for state in &mut run.tables {
        let mut set: ItemSet<()> = ItemSet::default();
        for row in run.actual.table_constraints(state.schema(), state.name()) {
            if let Constraint::Check(check) = &row.constraint {
                if state.touches_skipped(check.columns.iter().map(String::as_str)) {
                    continue;
                }
                set.actual.push(Item::new(&row.name, (), check_sql(check)));
            }
        }
        for check in &state.desired.checks {
            let name = check.name.clone().unwrap_or_default();
            set.desired.push(Item::new(name, (), check_sql(check)));
        }

        for m in set.match_exact() {
            if let Some((from, to)) = m.rename {
                state.rename_item(ItemKind::Constraint, from, to);
            }
        }

        let unsettled: Vec<usize> = set.unmatched_actual().collect();
        for a in unsettled {
            let candidates = set.candidates(a, |_| ());
            if candidates.is_empty() {
                continue;
            }
            let comparison = Comparison {
                actual: set.actual[a].sql.clone(),
                candidates: candidates.iter().map(|&d| set.desired[d].sql.clone()).collect(),
            };
            state.defer(comparison, Resolution::Check { actual: a, candidates });
        }

        state.actual_names.checks = set.actual.iter().map(|i| i.name.clone()).collect();
        state.checks = set;
    }
    Ok(())
}
