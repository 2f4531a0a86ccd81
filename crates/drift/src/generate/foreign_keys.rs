//! Foreign keys of matched tables.
//!
//! Runs once every table is matched, created or renamed, so targets are
//! final. A foreign key compares on its full tuple; there is no SQL to ask
//! the oracle about.

use drift_schema::Constraint;

use crate::matching::{Item, ItemSet};
use crate::projection::ForeignKeyProjection;
use crate::script::{ItemKind, TableConstraint};
use crate::Result;

use super::Run;

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    for state in &mut run.tables {
        let schema = state.schema().to_string();
        let mut set: ItemSet<ForeignKeyProjection> = ItemSet::default();
        for row in run.actual.table_constraints(&schema, state.name()) {
            if let Constraint::ForeignKey(fk) = &row.constraint {
                if state.touches_skipped(fk.columns.iter().map(String::as_str)) {
                    continue;
                }
                let projection = ForeignKeyProjection::of(fk, &schema);
                set.actual.push(Item::new(&row.name, projection, Vec::new()));
            }
        }
        for fk in &state.desired.foreign_keys {
            let name = fk.name.clone().unwrap_or_default();
            let projection = ForeignKeyProjection::of(fk, &schema);
            set.desired.push(Item::new(name, projection, Vec::new()));
        }

        for m in set.match_exact() {
            if let Some((from, to)) = m.rename {
                state.rename_item(ItemKind::Constraint, from, to);
            }
        }
        for a in set.unmatched_actual() {
            state.fragment.drop_constraints.push(set.actual[a].name.clone());
        }
        for d in set.unmatched_desired() {
            let fk = state.desired.foreign_keys[d].clone();
            state
                .fragment
                .add_constraints
                .push(TableConstraint::ForeignKey(fk));
        }
    }
    Ok(())
}
