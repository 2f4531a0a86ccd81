//! Schemas.

use crate::choice::ObjectKind;
use crate::matching::{Decision, all_candidates, disambiguate};
use crate::script::Op;
use crate::Result;

use super::Run;

/// Schemas the desired side needs: the current one, the declared ones, and
/// every schema a declared object lives in.
fn required(run: &Run<'_>) -> Vec<String> {
    let desired = run.desired;
    let mut required = vec![run.current_schema().to_string()];
    let declared = desired
        .schemas
        .iter()
        .map(String::as_str)
        .chain(desired.tables.iter().filter_map(|t| t.schema.as_deref()))
        .chain(desired.enums.values().filter_map(|e| e.schema.as_deref()))
        .chain(desired.domains.iter().filter_map(|d| d.schema.as_deref()))
        .chain(desired.extensions.iter().filter_map(|e| e.schema.as_deref()));
    for schema in declared {
        if !required.iter().any(|r| r == schema) {
            required.push(schema.to_string());
        }
    }
    required
}

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    let required = required(run);
    let current = run.current_schema().to_string();

    let missing: Vec<String> = required
        .iter()
        .filter(|s| !run.actual.schemas.contains(s))
        .cloned()
        .collect();
    let extra: Vec<String> = run
        .actual
        .schemas
        .iter()
        .filter(|s| {
            !required.contains(s)
                && *s != "public"
                && **s != current
                && !run.config.ignores_schema(s)
        })
        .cloned()
        .collect();

    let mut actual_only: Vec<usize> = (0..extra.len()).collect();
    let desired_only: Vec<usize> = (0..missing.len()).collect();
    let decisions = disambiguate(
        &mut *run.chooser,
        ObjectKind::Schema,
        &desired_only,
        &mut actual_only,
        |d| missing[d].clone(),
        |a| extra[a].clone(),
        all_candidates,
    )?;

    for decision in decisions {
        match decision {
            Decision::Create(d) => run.push(Op::CreateSchema {
                name: missing[d].clone(),
            }),
            Decision::Rename { desired, actual } => {
                let (from, to) = (&extra[actual], &missing[desired]);
                run.actual.rename_schema(from, to);
                run.push(Op::RenameSchema {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
    }

    for a in actual_only {
        run.drops.schemas.push(extra[a].clone());
    }
    Ok(())
}
