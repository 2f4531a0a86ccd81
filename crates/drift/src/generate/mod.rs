//! Per-kind change generators.
//!
//! Each generator compares one kind of object, pushes the ops it can settle
//! right away onto the script, and leaves drops and deferred comparisons to
//! the orchestrator.

use drift_schema::{ActualStructure, DesiredSchema};

use crate::casts::TypeCastIndex;
use crate::choice::Disambiguate;
use crate::config::RunConfig;
use crate::oracle::SemanticComparer;
use crate::script::{ChangeScript, DependentColumn, Op, TableChange};
use crate::state::{Drops, PendingTypeSet, ResolvedTable, TableDiffState};

pub mod checks;
pub mod columns;
pub mod domains;
pub mod enums;
pub mod extensions;
pub mod foreign_keys;
pub mod indexes;
pub mod primary_key;
pub mod schemas;
pub mod tables;

/// Shared state of one reconciliation run.
pub struct Run<'r> {
    pub config: &'r RunConfig,
    pub desired: &'r DesiredSchema,
    /// Working copy of the target structure; renames are applied to it as
    /// they are decided.
    pub actual: ActualStructure,
    pub script: ChangeScript,
    pub drops: Drops,
    pub pending: PendingTypeSet,
    pub chooser: &'r mut dyn Disambiguate,
    pub oracle: &'r dyn SemanticComparer,
    pub casts: TypeCastIndex<'r>,
    /// Matched tables being diffed
    pub tables: Vec<TableDiffState>,
    /// Tables created by this run, in creation order
    pub created: Vec<ResolvedTable>,
    /// Foreign keys of new tables whose targets did not exist yet
    pub trailing: Vec<TableChange>,
}

impl<'r> Run<'r> {
    pub fn push(&mut self, op: Op) {
        tracing::debug!(%op, "op");
        self.script.push(op);
    }

    pub fn current_schema(&self) -> &str {
        &self.config.schema
    }

    /// Columns of actual tables typed with `schema.name` or an array of it.
    pub fn columns_using(&self, schema: &str, name: &str) -> Vec<DependentColumn> {
        self.actual
            .tables
            .iter()
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|c| c.ty.schema.as_deref() == Some(schema) && c.ty.name == name)
                    .map(|c| DependentColumn {
                        schema: table.schema.clone(),
                        table: table.name.clone(),
                        column: c.name.clone(),
                        array_dims: c.ty.array_dims,
                        default: c.default.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing;
