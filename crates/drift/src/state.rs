//! Per-run diff state.

use std::collections::HashSet;

use drift_schema::{
    CheckConstraint, Column, DbTable, DesiredSchema, Domain, ForeignKey, Index, IndexKey,
    PrimaryKey, Table, TypeRef,
};
use drift_sql::{ProbeSource, SourceColumn};
use indexmap::IndexMap;

use crate::config::RunConfig;
use crate::matching::ItemSet;
use crate::oracle::Comparison;
use crate::projection::{IndexProjection, qualify};
use crate::script::{ColumnChange, CreateTable, ItemKind, Op, TableChange, TableConstraint};

/// A desired table with every name resolved: storage column names, schemas,
/// and default names for unnamed keys, indexes and constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub schema: String,
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
    pub excludes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub checks: Vec<CheckConstraint>,
}

impl ResolvedTable {
    pub fn resolve(table: &Table, desired: &DesiredSchema, config: &RunConfig) -> Self {
        let snake = config.snake_case;
        let schema = table.schema_or(&config.schema).to_string();
        let column = |name: &str| table.storage_column(name, snake);

        let columns = table
            .columns
            .iter()
            .map(|c| Column {
                name: c.storage_name(snake),
                storage_name: None,
                ty: qualify(&c.ty, &config.schema),
                primary_key: false,
                ..c.clone()
            })
            .collect();

        let primary_key = table.effective_primary_key(snake).map(|pk| PrimaryKey {
            name: Some(pk.name_or_default(&table.name)),
            ..pk
        });

        let resolve_index = |idx: &Index, exclude: bool| {
            let mut idx = idx.clone();
            for col in &mut idx.columns {
                if let IndexKey::Column(name) = &mut col.key {
                    *name = column(name.as_str());
                }
            }
            idx.include = idx.include.iter().map(|c| column(c.as_str())).collect();
            idx.language_column = idx.language_column.as_deref().map(column);
            idx.name = Some(idx.name_or_default(&table.name, exclude));
            idx
        };

        let foreign_keys = table
            .foreign_keys
            .iter()
            .map(|fk| {
                let target_schema = fk
                    .references_schema
                    .clone()
                    .unwrap_or_else(|| config.schema.clone());
                let target = desired.find_table(&target_schema, &fk.references_table, &config.schema);
                let mut fk = ForeignKey {
                    columns: fk.columns.iter().map(|c| column(c.as_str())).collect(),
                    references_columns: fk
                        .references_columns
                        .iter()
                        .map(|c| match target {
                            Some(target) => target.storage_column(c, snake),
                            None => c.clone(),
                        })
                        .collect(),
                    references_schema: Some(target_schema),
                    ..fk.clone()
                };
                fk.name = Some(fk.name_or_default(&table.name));
                fk
            })
            .collect();

        let checks = table
            .all_checks(snake)
            .into_iter()
            .map(|check| CheckConstraint {
                name: Some(check.name_or_default(&table.name)),
                ..check
            })
            .collect();

        Self {
            schema,
            name: table.name.clone(),
            comment: table.comment.clone(),
            columns,
            primary_key,
            indexes: table.indexes.iter().map(|i| resolve_index(i, false)).collect(),
            excludes: table.excludes.iter().map(|i| resolve_index(i, true)).collect(),
            foreign_keys,
            checks,
        }
    }

    /// The `CREATE TABLE` for this table, carrying only the foreign keys
    /// `carry` accepts.
    pub fn create(&self, language: &str, carry: impl Fn(&ForeignKey) -> bool) -> CreateTable {
        CreateTable {
            schema: self.schema.clone(),
            name: self.name.clone(),
            comment: self.comment.clone(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            indexes: self
                .indexes
                .iter()
                .map(|idx| with_language(idx, language))
                .collect(),
            excludes: self.excludes.clone(),
            foreign_keys: self
                .foreign_keys
                .iter()
                .filter(|fk| carry(fk))
                .cloned()
                .collect(),
            checks: self.checks.clone(),
        }
    }
}

/// A full text search index with its language filled in.
pub fn with_language(idx: &Index, language: &str) -> Index {
    let mut idx = idx.clone();
    if idx.tsvector && idx.language.is_none() && idx.language_column.is_none() {
        idx.language = Some(language.to_string());
    }
    idx
}

/// A desired domain with schema, base type and check names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDomain {
    pub schema: String,
    pub name: String,
    pub base: Column,
    pub checks: Vec<CheckConstraint>,
}

impl ResolvedDomain {
    pub fn resolve(domain: &Domain, config: &RunConfig) -> Self {
        Self {
            schema: domain
                .schema
                .clone()
                .unwrap_or_else(|| config.schema.clone()),
            name: domain.name.clone(),
            base: Column {
                ty: qualify(&domain.base.ty, &config.schema),
                ..domain.base.clone()
            },
            checks: domain
                .checks
                .iter()
                .map(|check| CheckConstraint {
                    name: Some(check.name_or_default(&domain.name)),
                    ..check.clone()
                })
                .collect(),
        }
    }

    pub fn create(&self) -> Op {
        Op::CreateDomain {
            schema: self.schema.clone(),
            name: self.name.clone(),
            base: self.base.clone(),
            checks: self.checks.clone(),
        }
    }
}

/// Types created or altered earlier in the run.
///
/// The database does not know about them yet, so they cannot be probed and
/// casts to them cannot be looked up.
#[derive(Debug, Clone, Default)]
pub struct PendingTypeSet {
    types: HashSet<(String, String)>,
}

impl PendingTypeSet {
    pub fn mark(&mut self, schema: &str, name: &str) {
        self.types.insert((schema.to_string(), name.to_string()));
    }

    pub fn contains(&self, schema: &str, name: &str) -> bool {
        self.types.contains(&(schema.to_string(), name.to_string()))
    }

    /// The type a value of `ty` is probed as: `text` (with the same array
    /// dimensions) while the database does not know the type yet.
    pub fn probe_type(&self, ty: &TypeRef) -> String {
        let element = ty.element();
        match &element.schema {
            Some(schema) if self.contains(schema, &element.name) => {
                format!("text{}", "[]".repeat(ty.array_dims as usize))
            }
            _ => ty.to_string(),
        }
    }
}

/// What to do with the answer to a deferred comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Index or exclusion constraint `actual` against desired `candidates`.
    Index {
        exclude: bool,
        actual: usize,
        candidates: Vec<usize>,
    },
    Check {
        actual: usize,
        candidates: Vec<usize>,
    },
    /// The default is the only thing that may differ on this column.
    ColumnDefault { column: String },
}

/// A comparison waiting for the oracle, and what its answer means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredComparison {
    pub comparison: Comparison,
    pub resolution: Resolution,
}

/// A column whose default waits for the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDelta {
    pub from: Column,
    pub to: Column,
}

/// Everything known about one existing table while it is being diffed.
#[derive(Debug)]
pub struct TableDiffState {
    pub desired: ResolvedTable,
    /// The table as found, after column renames
    pub actual: DbTable,
    pub fragment: TableChange,
    pub indexes: ItemSet<IndexProjection>,
    pub excludes: ItemSet<IndexProjection>,
    pub checks: ItemSet<()>,
    /// Actual index/exclude/check payloads for drops
    pub actual_names: ActualNames,
    pub changing_columns: IndexMap<String, ColumnDelta>,
    /// Columns being dropped or recreated; their indexes and constraints go with them
    pub skipped_columns: HashSet<String>,
    pub deferred: Vec<DeferredComparison>,
    pub pending: usize,
    pub pushed: bool,
    /// Ops emitted right after the fragment
    pub delayed: Vec<Op>,
}

/// Names of the actual items in an [`ItemSet`], by position.
#[derive(Debug, Clone, Default)]
pub struct ActualNames {
    pub indexes: Vec<String>,
    pub excludes: Vec<String>,
    pub checks: Vec<String>,
}

impl TableDiffState {
    pub fn new(desired: ResolvedTable, actual: DbTable) -> Self {
        let fragment = TableChange::new(&actual.schema, &actual.name);
        Self {
            desired,
            actual,
            fragment,
            indexes: ItemSet::default(),
            excludes: ItemSet::default(),
            checks: ItemSet::default(),
            actual_names: ActualNames::default(),
            changing_columns: IndexMap::new(),
            skipped_columns: HashSet::new(),
            deferred: Vec::new(),
            pending: 0,
            pushed: false,
            delayed: Vec::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.actual.schema
    }

    pub fn name(&self) -> &str {
        &self.actual.name
    }

    /// Whether any of `columns` is being dropped or recreated.
    pub fn touches_skipped<'a>(&self, mut columns: impl Iterator<Item = &'a str>) -> bool {
        columns.any(|c| self.skipped_columns.contains(c))
    }

    pub fn defer(&mut self, comparison: Comparison, resolution: Resolution) {
        self.pending += 1;
        self.deferred.push(DeferredComparison {
            comparison,
            resolution,
        });
    }

    /// Queue a rename of an index or constraint for right after the fragment.
    pub fn rename_item(&mut self, kind: ItemKind, from: String, to: String) {
        tracing::debug!(table = %self.name(), %from, %to, "rename table item");
        self.delayed.push(Op::RenameTableItem {
            kind,
            schema: self.schema().to_string(),
            table: self.name().to_string(),
            from,
            to,
        });
    }

    /// The row source deferred comparisons of this table are evaluated over.
    ///
    /// Existing columns keep their current type, new ones get the desired
    /// type, and types the database does not know yet are probed as text.
    pub fn probe_source(&self, pending: &PendingTypeSet) -> ProbeSource {
        let sql_type = |col: &Column| pending.probe_type(&col.ty);

        let mut columns: Vec<SourceColumn> = self
            .actual
            .columns
            .iter()
            .map(|c| SourceColumn::new(&c.name, sql_type(c)))
            .collect();
        for col in &self.desired.columns {
            if self.actual.find_column(&col.name).is_none() {
                columns.push(SourceColumn::new(&col.name, sql_type(col)));
            }
        }
        ProbeSource {
            alias: self.actual.name.clone(),
            columns,
        }
    }

    /// Act on the oracle's answer to one deferred comparison: the position
    /// of the matching candidate, if any.
    pub fn apply(&mut self, resolution: Resolution, answer: Option<usize>) {
        self.pending = self.pending.saturating_sub(1);
        match resolution {
            Resolution::Index {
                exclude,
                actual,
                candidates,
            } => {
                let Some(d) = answer.and_then(|k| candidates.get(k).copied()) else {
                    return;
                };
                let (set, kind) = if exclude {
                    (&mut self.excludes, ItemKind::Constraint)
                } else {
                    (&mut self.indexes, ItemKind::Index)
                };
                if let Some((from, to)) = set.try_settle(actual, d).and_then(|m| m.rename) {
                    self.rename_item(kind, from, to);
                }
            }
            Resolution::Check { actual, candidates } => {
                let Some(d) = answer.and_then(|k| candidates.get(k).copied()) else {
                    return;
                };
                if let Some((from, to)) = self.checks.try_settle(actual, d).and_then(|m| m.rename) {
                    self.rename_item(ItemKind::Constraint, from, to);
                }
            }
            Resolution::ColumnDefault { column } => {
                let Some(delta) = self.changing_columns.shift_remove(&column) else {
                    return;
                };
                if answer.is_some() {
                    return;
                }
                // Keep changes ahead of drops and adds.
                let at = self
                    .fragment
                    .columns
                    .iter()
                    .position(|c| matches!(c, ColumnChange::Drop(_) | ColumnChange::Add(_)))
                    .unwrap_or(self.fragment.columns.len());
                self.fragment.columns.insert(
                    at,
                    ColumnChange::Change {
                        from: delta.from,
                        to: delta.to,
                        using: None,
                    },
                );
            }
        }
    }

    /// Turn every unsettled item into a drop or an add and hand out the
    /// fragment followed by the delayed ops. Runs once.
    pub fn finalize(&mut self, language: &str) -> Vec<Op> {
        if self.pushed {
            return Vec::new();
        }
        self.pushed = true;

        for a in self.indexes.unmatched_actual() {
            self.fragment
                .drop_indexes
                .push(self.actual_names.indexes[a].clone());
        }
        for d in self.indexes.unmatched_desired() {
            self.fragment
                .add_indexes
                .push(with_language(&self.desired.indexes[d], language));
        }
        for a in self.excludes.unmatched_actual() {
            self.fragment
                .drop_excludes
                .push(self.actual_names.excludes[a].clone());
        }
        for d in self.excludes.unmatched_desired() {
            self.fragment
                .add_excludes
                .push(self.desired.excludes[d].clone());
        }
        for a in self.checks.unmatched_actual() {
            self.fragment
                .drop_constraints
                .push(self.actual_names.checks[a].clone());
        }
        for d in self.checks.unmatched_desired() {
            self.fragment
                .add_constraints
                .push(TableConstraint::Check(self.desired.checks[d].clone()));
        }

        let mut ops = Vec::new();
        if !self.fragment.is_empty() {
            ops.push(Op::ChangeTable(std::mem::take(&mut self.fragment)));
        }
        ops.append(&mut self.delayed);
        ops
    }
}

/// Drops collected during the run, appended at the very end.
#[derive(Debug, Clone, Default)]
pub struct Drops {
    pub tables: Vec<(String, String)>,
    pub domains: Vec<(String, String)>,
    pub enums: Vec<(String, String)>,
    pub extensions: Vec<String>,
    pub schemas: Vec<String>,
}

impl Drops {
    /// Drop ops: tables (referencing tables before the tables they
    /// reference), then domains, enums, extensions and schemas.
    pub fn into_ops(self, actual: &drift_schema::ActualStructure) -> Vec<Op> {
        let mut ops = Vec::new();

        let mut remaining = self.tables;
        while !remaining.is_empty() {
            let referenced = |target: &(String, String)| {
                remaining.iter().any(|source| {
                    source != target
                        && actual
                            .table_constraints(&source.0, &source.1)
                            .any(|c| references(c, &target.0, &target.1))
                })
            };
            let next = remaining
                .iter()
                .position(|t| !referenced(t))
                .unwrap_or_default();
            let (schema, name) = remaining.remove(next);
            ops.push(Op::DropTable { schema, name });
        }

        ops.extend(
            self.domains
                .into_iter()
                .map(|(schema, name)| Op::DropDomain { schema, name }),
        );
        ops.extend(
            self.enums
                .into_iter()
                .map(|(schema, name)| Op::DropEnum { schema, name }),
        );
        ops.extend(
            self.extensions
                .into_iter()
                .map(|name| Op::DropExtension { name }),
        );
        ops.extend(self.schemas.into_iter().map(|name| Op::DropSchema { name }));
        ops
    }
}

fn references(constraint: &drift_schema::DbConstraint, schema: &str, table: &str) -> bool {
    match &constraint.constraint {
        drift_schema::Constraint::ForeignKey(fk) => {
            fk.references_schema.as_deref().unwrap_or(&constraint.schema) == schema
                && fk.references_table == table
        }
        _ => false,
    }
}
