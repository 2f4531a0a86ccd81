//! The composition orchestrator.
//!
//! Runs the generators in a fixed order against one working copy of the
//! target structure, flushes every deferred comparison to the oracle in one
//! go, and assembles the final script.

use drift_schema::{ActualStructure, DesiredSchema};
use futures::future::try_join_all;

use crate::casts::{CastCatalog, TypeCastIndex};
use crate::choice::Disambiguate;
use crate::config::RunConfig;
use crate::generate::{self, Run};
use crate::oracle::{ComparisonBatch, SemanticComparer};
use crate::script::{ChangeScript, Op};
use crate::state::{Drops, PendingTypeSet, TableDiffState};
use crate::{Error, Result};

/// The capabilities a run talks to.
pub struct Services<'s> {
    pub oracle: &'s dyn SemanticComparer,
    pub casts: &'s dyn CastCatalog,
    pub chooser: &'s mut dyn Disambiguate,
}

/// Compute the script that brings `targets` to `desired`.
///
/// Every target must be structurally identical; the first one is diffed.
pub async fn compose<'r>(
    desired: &'r DesiredSchema,
    targets: &[ActualStructure],
    config: &'r RunConfig,
    services: Services<'r>,
) -> Result<ChangeScript> {
    let actual = visible(same_structure(targets)?, config);
    let mut run = Run {
        config,
        desired,
        actual,
        script: ChangeScript::new(),
        drops: Drops::default(),
        pending: PendingTypeSet::default(),
        chooser: services.chooser,
        oracle: services.oracle,
        casts: TypeCastIndex::new(services.casts),
        tables: Vec::new(),
        created: Vec::new(),
        trailing: Vec::new(),
    };

    generate::schemas::generate(&mut run)?;
    generate::extensions::generate(&mut run)?;
    generate::domains::generate(&mut run).await?;
    generate::enums::generate(&mut run)?;
    generate::tables::generate(&mut run)?;
    generate::columns::generate(&mut run).await?;
    generate::primary_key::generate(&mut run)?;
    generate::indexes::generate(&mut run, false)?;
    generate::indexes::generate(&mut run, true)?;
    generate::checks::generate(&mut run)?;
    generate::foreign_keys::generate(&mut run)?;

    let language = config.language.as_str();
    let mut tables = std::mem::take(&mut run.tables);
    for state in tables.iter_mut().filter(|state| state.pending == 0) {
        for op in state.finalize(language) {
            run.push(op);
        }
    }

    flush(&run, &mut tables).await?;
    for state in &mut tables {
        for op in state.finalize(language) {
            run.push(op);
        }
    }

    for change in std::mem::take(&mut run.trailing) {
        run.push(Op::ChangeTable(change));
    }

    let Run {
        mut script,
        drops,
        actual,
        ..
    } = run;
    for op in drops.into_ops(&actual) {
        script.push(op);
    }

    let summary = script.summary();
    tracing::info!(
        ops = script.len(),
        added = summary.added,
        changed = summary.changed,
        dropped = summary.dropped,
        "composed change script"
    );
    Ok(script)
}

/// The structure shared by every target.
fn same_structure(targets: &[ActualStructure]) -> Result<&ActualStructure> {
    let (first, rest) = targets.split_first().ok_or_else(|| {
        Error::Configuration("no target database to compare against".to_string())
    })?;
    for (i, other) in rest.iter().enumerate() {
        if let Some(what) = first.divergence(other) {
            return Err(Error::StructuralDivergence {
                what,
                first: 0,
                other: i + 1,
            });
        }
    }
    Ok(first)
}

/// The rows the run may touch: system schemas and ignored objects are left out.
fn visible(actual: &ActualStructure, config: &RunConfig) -> ActualStructure {
    let mut visible = actual.clone();
    let table = |schema: &str, name: &str| !config.ignores_table(schema, name);

    visible.schemas.retain(|s| !config.ignores_schema(s));
    visible.tables.retain(|t| table(&t.schema, &t.name));
    visible.indexes.retain(|i| table(&i.schema, &i.table));
    visible.excludes.retain(|i| table(&i.schema, &i.table));
    visible.constraints.retain(|c| table(&c.schema, &c.table));
    visible.triggers.retain(|t| table(&t.schema, &t.table));
    visible.extensions.retain(|e| !config.ignores_schema(&e.schema));
    visible.enums.retain(|e| !config.ignores_enum(&e.schema, &e.name));
    visible.domains.retain(|d| !config.ignores_schema(&d.schema));
    visible.collations.retain(|c| !config.ignores_schema(&c.schema));
    visible
}

/// Ask the oracle about every deferred comparison, one probe per table, all
/// at once, and apply the answers.
async fn flush(run: &Run<'_>, tables: &mut [TableDiffState]) -> Result<()> {
    let waiting: Vec<usize> = (0..tables.len())
        .filter(|&i| !tables[i].deferred.is_empty())
        .collect();
    if waiting.is_empty() {
        return Ok(());
    }

    let batches: Vec<ComparisonBatch> = waiting
        .iter()
        .map(|&i| ComparisonBatch {
            source: tables[i].probe_source(&run.pending),
            comparisons: tables[i]
                .deferred
                .iter()
                .map(|d| d.comparison.clone())
                .collect(),
        })
        .collect();
    tracing::debug!(tables = batches.len(), "flushing deferred comparisons");

    let oracle = run.oracle;
    let answers = try_join_all(batches.iter().map(|batch| oracle.compare(batch))).await?;
    for (i, answers) in waiting.into_iter().zip(answers) {
        let state = &mut tables[i];
        let deferred = std::mem::take(&mut state.deferred);
        for (deferred, answer) in deferred.into_iter().zip(answers) {
            state.apply(deferred.resolution, answer);
        }
    }
    Ok(())
}
