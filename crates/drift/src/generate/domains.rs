//! Domains.
//!
//! A domain that differs in anything but its name is dropped and created
//! again, with the columns using it carried across. Defaults and checks that
//! differ as text go to the oracle; those comparisons are settled here,
//! before any table looks at the domain.

use drift_schema::DbDomain;
use drift_sql::{ProbeSource, SourceColumn, sql_text_eq};
use futures::future::try_join_all;

use crate::choice::ObjectKind;
use crate::matching::{Decision, all_candidates, disambiguate, pair_by};
use crate::oracle::{Comparison, ComparisonBatch};
use crate::projection::DomainProjection;
use crate::script::{Op, TypeKind};
use crate::state::ResolvedDomain;
use crate::Result;

use super::Run;

/// How a matched domain compares.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Same,
    Differs,
    Ask(Comparison),
}

/// Compare a domain's default and checks.
///
/// Parts that match as text are paired off first; the rest are compared in
/// declaration order.
fn compare(actual: &DbDomain, desired: &ResolvedDomain, current: &str) -> Verdict {
    if DomainProjection::of(&actual.base, current) != DomainProjection::of(&desired.base, current) {
        return Verdict::Differs;
    }
    if actual.checks.len() != desired.checks.len() {
        return Verdict::Differs;
    }

    let mut left = Vec::new();
    let mut right = Vec::new();
    match (&actual.base.default, &desired.base.default) {
        (None, None) => {}
        (Some(a), Some(d)) if sql_text_eq(a, d) => {}
        (Some(a), Some(d)) => {
            left.push(a.clone());
            right.push(d.clone());
        }
        _ => return Verdict::Differs,
    }

    let mut paired = vec![false; desired.checks.len()];
    let mut unpaired_actual = Vec::new();
    for check in &actual.checks {
        let found = (0..desired.checks.len())
            .find(|&d| !paired[d] && sql_text_eq(&check.expr, &desired.checks[d].expr));
        match found {
            Some(d) => paired[d] = true,
            None => unpaired_actual.push(check.expr.clone()),
        }
    }
    left.extend(unpaired_actual);
    right.extend(
        desired
            .checks
            .iter()
            .zip(&paired)
            .filter(|(_, paired)| !**paired)
            .map(|(check, _)| check.expr.clone()),
    );

    if left.is_empty() {
        Verdict::Same
    } else {
        Verdict::Ask(Comparison {
            actual: left,
            candidates: vec![right],
        })
    }
}

/// Domain expressions refer to the checked value as `VALUE`; the probe
/// source provides a column of that name with the base type.
fn probe_source(domain: &DbDomain) -> ProbeSource {
    ProbeSource {
        alias: domain.name.clone(),
        columns: vec![SourceColumn::new("value", domain.base.ty.to_string())],
    }
}

pub async fn generate(run: &mut Run<'_>) -> Result<()> {
    let current = run.current_schema().to_string();
    let desired: Vec<ResolvedDomain> = run
        .desired
        .domains
        .iter()
        .map(|d| ResolvedDomain::resolve(d, run.config))
        .collect();

    let keys = |schema: &str, name: &str| (schema.to_string(), name.to_string());
    let desired_keys: Vec<_> = desired.iter().map(|d| keys(&d.schema, &d.name)).collect();
    let actual_keys: Vec<_> = run
        .actual
        .domains
        .iter()
        .map(|d| keys(&d.schema, &d.name))
        .collect();
    let mut pairing = pair_by(&desired_keys, &actual_keys);

    // Same name in another schema: move it.
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

    let decisions = disambiguate(
        &mut *run.chooser,
        ObjectKind::Domain,
        &pairing.desired_only,
        &mut pairing.actual_only,
        |d| desired[d].name.clone(),
        |a| actual_keys[a].1.clone(),
        all_candidates,
    )?;
    let renamed = decisions.iter().filter_map(|decision| match decision {
        Decision::Rename { desired, actual } => Some((*desired, *actual)),
        Decision::Create(_) => None,
    });

    for (d, a) in moved.into_iter().chain(renamed) {
        let (from_schema, from) = actual_keys[a].clone();
        let target = &desired[d];
        run.actual
            .rename_type(&from_schema, &from, &target.schema, &target.name);
        run.pending.mark(&target.schema, &target.name);
        run.push(Op::RenameType {
            kind: TypeKind::Domain,
            from_schema,
            from,
            to_schema: target.schema.clone(),
            to: target.name.clone(),
        });
        pairing.pairs.push((d, a));
    }

    for decision in &decisions {
        if let Decision::Create(d) = decision {
            run.pending.mark(&desired[*d].schema, &desired[*d].name);
            run.push(desired[*d].create());
        }
    }

    // Positions are stable: renames rewrite rows in place.
    let mut recreate = Vec::new();
    let mut batches = Vec::new();
    let mut asked = Vec::new();
    for &(d, a) in &pairing.pairs {
        let actual = &run.actual.domains[a];
        match compare(actual, &desired[d], &current) {
            Verdict::Same => {}
            Verdict::Differs => recreate.push((d, a)),
            Verdict::Ask(comparison) => {
                batches.push(ComparisonBatch {
                    source: probe_source(actual),
                    comparisons: vec![comparison],
                });
                asked.push((d, a));
            }
        }
    }

    let oracle = run.oracle;
    let answers = try_join_all(batches.iter().map(|batch| oracle.compare(batch))).await?;
    for (pair, answer) in asked.into_iter().zip(answers) {
        if answer.first().copied().flatten().is_none() {
            recreate.push(pair);
        }
    }

    for (d, a) in recreate {
        let domain = &desired[d];
        let dependents = run.columns_using(&domain.schema, &domain.name);
        tracing::debug!(
            schema = %domain.schema,
            name = %domain.name,
            columns = dependents.len(),
            "recreating domain"
        );
        run.pending.mark(&domain.schema, &domain.name);
        run.push(Op::RecreateDomain {
            schema: domain.schema.clone(),
            name: domain.name.clone(),
            old_base: run.actual.domains[a].base.clone(),
            base: domain.base.clone(),
            checks: domain.checks.clone(),
            dependents,
        });
    }

    for a in pairing.actual_only {
        run.drops.domains.push(actual_keys[a].clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Answer;
    use crate::generate::testing::*;
    use crate::config::RunConfig;
    use crate::render::render_script;
    use drift_schema::{ActualStructure, CheckConstraint, Column, DesiredSchema, Domain, Table, TypeRef};

    fn email_domain(check: &str) -> DbDomain {
        DbDomain {
            schema: "public".to_string(),
            name: "email".to_string(),
            base: Column::new("email", "text"),
            checks: vec![CheckConstraint::new(check).named("email_check")],
        }
    }

    #[test]
    fn test_compare_pairs_textual_matches() {
        let desired = ResolvedDomain::resolve(
            &Domain::new("email", Column::new("email", "text"))
                .check(CheckConstraint::new("VALUE LIKE '%@%'")),
            &crate::config::RunConfig::default(),
        );
        assert_eq!(
            compare(&email_domain("(VALUE LIKE '%@%')"), &desired, "public"),
            Verdict::Same
        );
        assert_eq!(
            compare(&email_domain("VALUE ~~ '%@%'::text"), &desired, "public"),
            Verdict::Ask(Comparison {
                actual: vec!["VALUE ~~ '%@%'::text".to_string()],
                candidates: vec![vec!["VALUE LIKE '%@%'".to_string()]],
            })
        );
    }

    #[tokio::test]
    async fn test_domains() {
        let desired = DesiredSchema::new()
            .domain(
                Domain::new("email", Column::new("email", "text"))
                    .check(CheckConstraint::new("VALUE LIKE '%@%'")),
            )
            .domain(Domain::new("positive", Column::new("positive", "int4")))
            .domain(Domain::new("slug", Column::new("slug", "varchar").max_chars(64)));

        let mut actual = ActualStructure::new();
        actual.schemas.push("public".to_string());
        actual.domains = vec![
            email_domain("VALUE ~~ '%@%'::text"),
            DbDomain {
                schema: "public".to_string(),
                name: "positive".to_string(),
                base: Column::new("positive", "int8"),
                checks: vec![],
            },
            DbDomain {
                schema: "public".to_string(),
                name: "handle".to_string(),
                base: Column::new("handle", "varchar").max_chars(64),
                checks: vec![],
            },
        ];

        // The oracle considers `LIKE` and `~~` equal once casts are dropped.
        let oracle = FakeOracle::default()
            .rewrite("::text", "")
            .rewrite("~~", "LIKE");
        let script = compose_full(&desired, &actual, &oracle, [Answer::RenameFrom("handle".to_string())])
            .await
            .unwrap();
        insta::assert_snapshot!(lines(&script), @r"
        ~ rename domain public.handle -> public.slug
        ~ domain public.positive = int4
        ");
    }

    #[tokio::test]
    async fn test_recreated_domain_carries_its_columns() {
        let inventory = |base: &str| {
            DesiredSchema::new()
                .domain(Domain::new("positive", Column::new("positive", base)))
                .table(
                    Table::new("item")
                        .column(Column::new("id", "int8").primary_key())
                        .column(
                            Column::new("qty", TypeRef::user(None, "positive"))
                                .nullable()
                                .default_sql("1"),
                        )
                        .column(Column::new("scores", TypeRef::user(None, "positive").array()).nullable()),
                )
        };
        let mut actual = structure_of(&inventory("int8"), &RunConfig::default());

        let script = compose_with(&inventory("int4"), &actual, []).await.unwrap();
        insta::assert_snapshot!(lines(&script), @"~ domain public.positive = int4 (2 column(s) carried over)");
        insta::assert_snapshot!(render_script(&script).trim_end(), @r#"
        ALTER TABLE "public"."item" ALTER COLUMN "qty" DROP DEFAULT;
        ALTER TABLE "public"."item" ALTER COLUMN "qty" TYPE int8 USING "qty"::int8;
        ALTER TABLE "public"."item" ALTER COLUMN "scores" TYPE int8[] USING "scores"::int8[];
        DROP DOMAIN "public"."positive";
        CREATE DOMAIN "public"."positive" AS int4 NOT NULL;
        ALTER TABLE "public"."item" ALTER COLUMN "qty" TYPE "public"."positive" USING "qty"::"public"."positive";
        ALTER TABLE "public"."item" ALTER COLUMN "qty" SET DEFAULT 1;
        ALTER TABLE "public"."item" ALTER COLUMN "scores" TYPE "public"."positive"[] USING "scores"::"public"."positive"[];
        "#);

        apply_script(&mut actual, &script);
        let again = compose_with(&inventory("int4"), &actual, []).await.unwrap();
        assert!(again.is_empty(), "unexpected ops:\n{again}");
    }
}
