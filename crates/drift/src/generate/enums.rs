//! Enums.
//!
//! An enum found under its name in another schema is moved there. Matched
//! enums evolve their values in place when they can; otherwise the type is
//! recreated and every column using it is carried over.

use crate::choice::ObjectKind;
use crate::matching::{Decision, all_candidates, disambiguate, pair_by};
use crate::projection::{EnumEvolution, EnumProjection};
use crate::script::{Op, TypeKind};
use crate::Result;

use super::Run;

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    let current = run.current_schema().to_string();
    let desired: Vec<(String, String, Vec<String>)> = run
        .desired
        .enums
        .values()
        .map(|e| {
            let schema = e.schema.clone().unwrap_or_else(|| current.clone());
            (schema, e.name.clone(), e.values.clone())
        })
        .collect();

    let desired_keys: Vec<(&str, &str)> = desired
        .iter()
        .map(|(schema, name, _)| (schema.as_str(), name.as_str()))
        .collect();
    let actual_keys: Vec<(String, String)> = run
        .actual
        .enums
        .iter()
        .map(|e| (e.schema.clone(), e.name.clone()))
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
            .position(|&a| actual_keys[a].1 == desired[d].1);
        match found {
            Some(i) => {
                moved.push((d, pairing.actual_only.remove(i)));
                false
            }
            None => true,
        }
    });

    let decisions = disambiguate(
        &mut *run.chooser,
        ObjectKind::Enum,
        &pairing.desired_only,
        &mut pairing.actual_only,
        |d| desired[d].1.clone(),
        |a| actual_keys[a].1.clone(),
        all_candidates,
    )?;
    let renamed = decisions.iter().filter_map(|decision| match decision {
        Decision::Rename { desired, actual } => Some((*desired, *actual)),
        Decision::Create(_) => None,
    });

    for (d, a) in moved.into_iter().chain(renamed) {
        let (from_schema, from) = actual_keys[a].clone();
        let (to_schema, to, _) = &desired[d];
        run.actual.rename_type(&from_schema, &from, to_schema, to);
        run.pending.mark(to_schema, to);
        run.push(Op::RenameType {
            kind: TypeKind::Enum,
            from_schema,
            from,
            to_schema: to_schema.clone(),
            to: to.clone(),
        });
        pairing.pairs.push((d, a));
    }

    for decision in &decisions {
        if let Decision::Create(d) = decision {
            let (schema, name, values) = &desired[*d];
            run.pending.mark(schema, name);
            run.push(Op::CreateEnum {
                schema: schema.clone(),
                name: name.clone(),
                values: values.clone(),
            });
        }
    }

    for &(d, a) in &pairing.pairs {
        let (schema, name, values) = &desired[d];
        let evolution = {
            let found = &run.actual.enums[a].values;
            EnumProjection::of(found).evolve_to(&EnumProjection::of(values))
        };
        let op = match evolution {
            EnumEvolution::Unchanged => continue,
            EnumEvolution::Add(added) => Op::AddEnumValues {
                schema: schema.clone(),
                name: name.clone(),
                values: added,
            },
            EnumEvolution::Remove(removed) => Op::RemoveEnumValues {
                schema: schema.clone(),
                name: name.clone(),
                removed,
                values: values.clone(),
                dependents: run.columns_using(schema, name),
            },
            EnumEvolution::Replace => Op::ReplaceEnumValues {
                schema: schema.clone(),
                name: name.clone(),
                values: values.clone(),
                dependents: run.columns_using(schema, name),
            },
        };
        run.pending.mark(schema, name);
        run.push(op);
    }

    for a in pairing.actual_only {
        run.drops.enums.push(actual_keys[a].clone());
    }
    Ok(())
}
