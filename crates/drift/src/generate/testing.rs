//! Helpers for generator tests: an in-memory oracle and cast catalog, a
//! structure builder that pretends a desired schema was already applied, and
//! an applier that plays a script onto a structure.

use std::collections::HashMap;

use drift_schema::{
    ActualStructure, Constraint, DbConstraint, DbDomain, DbEnum, DbExtension, DbTable,
    DesiredSchema, IndexKey, TableIndex,
};
use drift_sql::{actual_alias, candidate_alias, strip_outer_parens};
use futures::future::BoxFuture;

use crate::casts::{CastCatalog, CastEdge};
use crate::choice::{Answer, Scripted};
use crate::compose::{Services, compose};
use crate::config::RunConfig;
use crate::oracle::{ComparisonBatch, SemanticComparer, pick_matches};
use crate::script::{
    ChangeScript, ColumnChange, CreateTable, Op, Placement, TableChange, TableConstraint,
    TypeKind,
};
use crate::state::{ResolvedDomain, ResolvedTable};
use crate::Result;

/// Compares SQL with whitespace removed and a list of textual rewrites
/// applied, standing in for what the planner would normalize.
///
/// Like Postgres, it rejects a whole batch that names a type it does not
/// know, answering every comparison with `None`.
#[derive(Debug, Clone, Default)]
pub struct FakeOracle {
    rewrites: Vec<(String, String)>,
    missing_types: Vec<String>,
}

impl FakeOracle {
    pub fn rewrite(mut self, from: &str, to: &str) -> Self {
        self.rewrites.push((from.to_string(), to.to_string()));
        self
    }

    pub fn missing_type(mut self, schema: &str, name: &str) -> Self {
        self.missing_types
            .push(drift_sql::Qualified(Some(schema), name).to_string());
        self
    }

    fn rejects(&self, batch: &ComparisonBatch) -> bool {
        let mut texts = batch
            .source
            .columns
            .iter()
            .map(|c| c.sql_type.as_str())
            .chain(batch.comparisons.iter().flat_map(|c| {
                c.actual
                    .iter()
                    .chain(c.candidates.iter().flatten())
                    .map(String::as_str)
            }));
        texts.any(|text| self.missing_types.iter().any(|ty| text.contains(ty.as_str())))
    }

    fn normalize(&self, sql: &str) -> String {
        let mut sql: String = strip_outer_parens(sql)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        for (from, to) in &self.rewrites {
            sql = sql.replace(from.as_str(), to);
        }
        strip_outer_parens(&sql).to_string()
    }
}

impl SemanticComparer for FakeOracle {
    fn compare<'a>(
        &'a self,
        batch: &'a ComparisonBatch,
    ) -> BoxFuture<'a, Result<Vec<Option<usize>>>> {
        if self.rejects(batch) {
            let none = vec![None; batch.comparisons.len()];
            return Box::pin(async move { Ok(none) });
        }
        let mut normalized = HashMap::new();
        for (ci, comparison) in batch.comparisons.iter().enumerate() {
            for (p, part) in comparison.actual.iter().enumerate() {
                normalized.insert(actual_alias(ci, p), self.normalize(part));
            }
            for (k, candidate) in comparison.candidates.iter().enumerate() {
                for (p, part) in candidate.iter().enumerate() {
                    normalized.insert(candidate_alias(ci, k, p), self.normalize(part));
                }
            }
        }
        let answers = pick_matches(&batch.comparisons, |alias| normalized.get(alias).cloned());
        Box::pin(async move { Ok(answers) })
    }
}

/// A fixed list of implicit casts.
pub struct StaticCasts(pub Vec<CastEdge>);

impl StaticCasts {
    /// The usual widening casts.
    pub fn standard() -> Self {
        Self(
            [
                ("int2", "int4"),
                ("int4", "int8"),
                ("int4", "numeric"),
                ("int8", "numeric"),
                ("float4", "float8"),
                ("varchar", "text"),
                ("bpchar", "text"),
                ("bpchar", "varchar"),
                ("text", "varchar"),
                ("date", "timestamp"),
                ("timestamp", "timestamptz"),
            ]
            .into_iter()
            .map(|(from, to)| CastEdge::new(from, to))
            .collect(),
        )
    }
}

impl CastCatalog for StaticCasts {
    fn implicit_casts(&self) -> BoxFuture<'_, Result<Vec<CastEdge>>> {
        let edges = self.0.clone();
        Box::pin(async move { Ok(edges) })
    }
}

/// The script one line per op, without the trailing newline.
pub fn lines(script: &ChangeScript) -> String {
    script.to_string().trim_end().to_string()
}

pub async fn compose_with(
    desired: &DesiredSchema,
    actual: &ActualStructure,
    answers: impl IntoIterator<Item = Answer>,
) -> Result<ChangeScript> {
    compose_full(desired, actual, &FakeOracle::default(), answers).await
}

pub async fn compose_full(
    desired: &DesiredSchema,
    actual: &ActualStructure,
    oracle: &FakeOracle,
    answers: impl IntoIterator<Item = Answer>,
) -> Result<ChangeScript> {
    compose_configured(desired, actual, &RunConfig::default(), oracle, answers).await
}

pub async fn compose_configured(
    desired: &DesiredSchema,
    actual: &ActualStructure,
    config: &RunConfig,
    oracle: &FakeOracle,
    answers: impl IntoIterator<Item = Answer>,
) -> Result<ChangeScript> {
    let casts = StaticCasts::standard();
    let mut chooser = Scripted::new(answers);
    let services = Services {
        oracle,
        casts: &casts,
        chooser: &mut chooser,
    };
    compose(desired, std::slice::from_ref(actual), config, services).await
}

/// The structure introspection would find once `desired` is in place.
pub fn structure_of(desired: &DesiredSchema, config: &RunConfig) -> ActualStructure {
    let mut actual = ActualStructure::new();
    let current = config.schema.as_str();

    let mut schemas = vec![current.to_string()];
    let declared = desired
        .schemas
        .iter()
        .cloned()
        .chain(desired.tables.iter().map(|t| t.schema_or(current).to_string()))
        .chain(
            desired
                .enums
                .values()
                .map(|e| e.schema.clone().unwrap_or_else(|| current.to_string())),
        )
        .chain(
            desired
                .domains
                .iter()
                .map(|d| d.schema.clone().unwrap_or_else(|| current.to_string())),
        )
        .chain(desired.extensions.iter().filter_map(|e| e.schema.clone()));
    for schema in declared {
        if !schemas.contains(&schema) {
            schemas.push(schema);
        }
    }
    actual.schemas = schemas;

    actual.extensions = desired
        .extensions
        .iter()
        .map(|e| DbExtension {
            name: e.name.clone(),
            schema: e.schema.clone().unwrap_or_else(|| current.to_string()),
            version: e.version.clone().unwrap_or_else(|| "1.0".to_string()),
        })
        .collect();
    actual.enums = desired
        .enums
        .values()
        .map(|e| {
            let schema = e.schema.clone().unwrap_or_else(|| current.to_string());
            DbEnum::new(schema, &e.name, e.values.iter().cloned())
        })
        .collect();
    actual.domains = desired
        .domains
        .iter()
        .map(|d| {
            let resolved = ResolvedDomain::resolve(d, config);
            DbDomain {
                schema: resolved.schema,
                name: resolved.name,
                base: resolved.base,
                checks: resolved.checks,
            }
        })
        .collect();
    for table in &desired.tables {
        let resolved = ResolvedTable::resolve(table, desired, config);
        insert_table(&mut actual, &resolved.create(&config.language, |_| true));
    }
    actual
}

fn insert_table(actual: &mut ActualStructure, table: &CreateTable) {
    let (schema, name) = (&table.schema, &table.name);
    actual.tables.push(DbTable {
        schema: schema.clone(),
        name: name.clone(),
        comment: table.comment.clone(),
        columns: table.columns.clone(),
    });
    if let Some(pk) = &table.primary_key {
        push_constraint(
            actual,
            schema,
            name,
            pk.name_or_default(name),
            Constraint::PrimaryKey(pk.clone()),
        );
    }
    for index in &table.indexes {
        actual.indexes.push(index_row(schema, name, index, false));
    }
    for index in &table.excludes {
        actual.excludes.push(index_row(schema, name, index, true));
    }
    for fk in &table.foreign_keys {
        push_constraint(
            actual,
            schema,
            name,
            fk.name_or_default(name),
            Constraint::ForeignKey(fk.clone()),
        );
    }
    for check in &table.checks {
        push_constraint(
            actual,
            schema,
            name,
            check.name_or_default(name),
            Constraint::Check(check.clone()),
        );
    }
}

fn index_row(schema: &str, table: &str, index: &drift_schema::Index, exclude: bool) -> TableIndex {
    let mut index = index.clone();
    index.name = Some(index.name_or_default(table, exclude));
    TableIndex {
        schema: schema.to_string(),
        table: table.to_string(),
        index,
    }
}

fn push_constraint(
    actual: &mut ActualStructure,
    schema: &str,
    table: &str,
    name: String,
    constraint: Constraint,
) {
    actual.constraints.push(DbConstraint {
        schema: schema.to_string(),
        table: table.to_string(),
        name,
        constraint,
    });
}

/// Play one op onto `actual` the way Postgres would.
pub fn apply(actual: &mut ActualStructure, op: &Op) {
    match op {
        Op::CreateSchema { name } => actual.schemas.push(name.clone()),
        Op::DropSchema { name } => actual.schemas.retain(|s| s != name),
        Op::RenameSchema { from, to } => actual.rename_schema(from, to),
        Op::CreateExtension {
            name,
            schema,
            version,
        } => actual.extensions.push(DbExtension {
            name: name.clone(),
            schema: schema.clone().unwrap_or_else(|| "public".to_string()),
            version: version.clone().unwrap_or_else(|| "1.0".to_string()),
        }),
        Op::DropExtension { name } => actual.extensions.retain(|e| e.name != *name),
        Op::CreateDomain {
            schema,
            name,
            base,
            checks,
        } => actual.domains.push(DbDomain {
            schema: schema.clone(),
            name: name.clone(),
            base: base.clone(),
            checks: checks.clone(),
        }),
        Op::DropDomain { schema, name } => actual
            .domains
            .retain(|d| d.schema != *schema || d.name != *name),
        Op::RecreateDomain {
            schema,
            name,
            base,
            checks,
            ..
        } => {
            if let Some(row) = actual
                .domains
                .iter_mut()
                .find(|d| d.schema == *schema && d.name == *name)
            {
                row.base = base.clone();
                row.checks = checks.clone();
            }
        }
        Op::CreateEnum {
            schema,
            name,
            values,
        } => actual
            .enums
            .push(DbEnum::new(schema, name, values.iter().cloned())),
        Op::DropEnum { schema, name } => actual
            .enums
            .retain(|e| e.schema != *schema || e.name != *name),
        Op::AddEnumValues {
            schema,
            name,
            values,
        } => {
            let Some(row) = actual
                .enums
                .iter_mut()
                .find(|e| e.schema == *schema && e.name == *name)
            else {
                return;
            };
            for value in values {
                let position = |v: &String| row.values.iter().position(|x| x == v);
                let at = match &value.placement {
                    Placement::Before(other) => position(other),
                    Placement::After(other) => position(other).map(|i| i + 1),
                    Placement::End => None,
                }
                .unwrap_or(row.values.len());
                row.values.insert(at, value.value.clone());
            }
        }
        Op::RemoveEnumValues {
            schema,
            name,
            values,
            ..
        }
        | Op::ReplaceEnumValues {
            schema,
            name,
            values,
            ..
        } => {
            if let Some(row) = actual
                .enums
                .iter_mut()
                .find(|e| e.schema == *schema && e.name == *name)
            {
                row.values = values.clone();
            }
        }
        Op::CreateTable(table) => insert_table(actual, table),
        Op::DropTable { schema, name } => {
            actual
                .tables
                .retain(|t| t.schema != *schema || t.name != *name);
            actual.indexes.retain(|i| !i.belongs_to(schema, name));
            actual.excludes.retain(|i| !i.belongs_to(schema, name));
            actual.constraints.retain(|c| !c.belongs_to(schema, name));
        }
        Op::RenameType {
            kind: TypeKind::Table,
            from_schema,
            from,
            to_schema,
            to,
        } => actual.rename_table(from_schema, from, to_schema, to),
        Op::RenameType {
            from_schema,
            from,
            to_schema,
            to,
            ..
        } => actual.rename_type(from_schema, from, to_schema, to),
        Op::ChangeTable(change) => change_table(actual, change),
        Op::RenameTableItem {
            schema,
            table,
            from,
            to,
            ..
        } => actual.rename_table_item(schema, table, from, to),
    }
}

/// In render order: drops, then columns, then adds.
fn change_table(actual: &mut ActualStructure, change: &TableChange) {
    let (schema, table) = (change.schema.as_str(), change.name.as_str());
    let mine = |s: &str, t: &str| s == schema && t == table;

    actual.constraints.retain(|c| {
        !(mine(&c.schema, &c.table)
            && (change.drop_constraints.contains(&c.name)
                || change.drop_primary_key.as_ref() == Some(&c.name)))
    });
    actual.indexes.retain(|i| {
        !(mine(&i.schema, &i.table) && change.drop_indexes.iter().any(|n| n == i.name()))
    });
    actual.excludes.retain(|i| {
        !(mine(&i.schema, &i.table) && change.drop_excludes.iter().any(|n| n == i.name()))
    });

    for column in &change.columns {
        match column {
            ColumnChange::Rename { from, to } => actual.rename_column(schema, table, from, to),
            ColumnChange::Drop(name) => {
                drop_dependents(actual, schema, table, name);
                with_table(actual, schema, table, |t| t.columns.retain(|c| c.name != *name));
            }
            ColumnChange::Add(col) => with_table(actual, schema, table, |t| t.columns.push(col.clone())),
            ColumnChange::Change { to, .. } => with_table(actual, schema, table, |t| {
                if let Some(c) = t.columns.iter_mut().find(|c| c.name == to.name) {
                    *c = to.clone();
                }
            }),
            ColumnChange::Recreate { from, to } => {
                drop_dependents(actual, schema, table, &from.name);
                with_table(actual, schema, table, |t| {
                    t.columns.retain(|c| c.name != from.name);
                    t.columns.push(to.clone());
                });
            }
        }
    }

    if let Some(pk) = &change.add_primary_key {
        push_constraint(
            actual,
            schema,
            table,
            pk.name_or_default(table),
            Constraint::PrimaryKey(pk.clone()),
        );
    }
    for index in &change.add_indexes {
        actual.indexes.push(index_row(schema, table, index, false));
    }
    for index in &change.add_excludes {
        actual.excludes.push(index_row(schema, table, index, true));
    }
    for constraint in &change.add_constraints {
        let (name, constraint) = match constraint {
            TableConstraint::ForeignKey(fk) => {
                (fk.name_or_default(table), Constraint::ForeignKey(fk.clone()))
            }
            TableConstraint::Check(check) => {
                (check.name_or_default(table), Constraint::Check(check.clone()))
            }
        };
        push_constraint(actual, schema, table, name, constraint);
    }
    if let Some(comment) = &change.comment {
        with_table(actual, schema, table, |t| t.comment = comment.clone());
    }
}

fn with_table(actual: &mut ActualStructure, schema: &str, table: &str, f: impl FnOnce(&mut DbTable)) {
    if let Some(t) = actual
        .tables
        .iter_mut()
        .find(|t| t.schema == schema && t.name == table)
    {
        f(t);
    }
}

/// Dropping a column takes its indexes and constraints along.
fn drop_dependents(actual: &mut ActualStructure, schema: &str, table: &str, column: &str) {
    let touches = |index: &drift_schema::Index| {
        index
            .columns
            .iter()
            .any(|c| matches!(&c.key, IndexKey::Column(name) if name == column))
            || index.include.iter().any(|c| c == column)
    };
    actual
        .indexes
        .retain(|i| !(i.belongs_to(schema, table) && touches(&i.index)));
    actual
        .excludes
        .retain(|i| !(i.belongs_to(schema, table) && touches(&i.index)));
    actual
        .constraints
        .retain(|c| !(c.belongs_to(schema, table) && c.columns().iter().any(|c| c == column)));
}

/// Play a whole script.
pub fn apply_script(actual: &mut ActualStructure, script: &ChangeScript) {
    for op in &script.ops {
        apply(actual, op);
    }
}
