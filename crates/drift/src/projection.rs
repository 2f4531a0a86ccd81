//! Comparable projections.
//!
//! A projection is what is left of an item once its name and every default
//! spelling are stripped. Two items with equal projections are the same item,
//! possibly under another name. SQL text is kept apart from the projection:
//! it only counts as equal when it matches textually or the oracle says so.

use drift_schema::{
    CheckConstraint, Column, FkAction, FkMatch, ForeignKey, Index, IndexKey, NullsOrder,
    ResolvedIdentity, SortOrder, TypeRef,
};
use drift_sql::sql_text_eq;

use crate::script::{EnumValue, Placement};

/// Resolve a type reference against the current schema.
///
/// Built-ins stay unqualified; user types always get a schema.
pub fn qualify(ty: &TypeRef, current: &str) -> TypeRef {
    if ty.schema.is_some() || drift_schema::is_builtin(&ty.name) {
        return ty.clone();
    }
    TypeRef {
        schema: Some(current.to_string()),
        ..ty.clone()
    }
}

/// Whether every part of `a` matches the part of `b` at the same position as text.
pub fn sql_parts_eq(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| sql_text_eq(a, b))
}

/// Everything about a column except its name and default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjection {
    pub ty: TypeRef,
    pub max_chars: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub datetime_precision: Option<u32>,
    pub collate: Option<String>,
    pub nullable: bool,
    pub identity: Option<ResolvedIdentity>,
    pub comment: Option<String>,
}

impl ColumnProjection {
    pub fn of(col: &Column, current: &str) -> Self {
        Self {
            ty: qualify(&col.ty, current),
            max_chars: col.max_chars,
            precision: col.precision,
            scale: col.scale,
            datetime_precision: col.datetime_precision,
            collate: col.collate.clone(),
            nullable: col.nullable,
            identity: col.identity.as_ref().map(|i| i.resolve(&col.ty)),
            comment: col.comment.clone(),
        }
    }

    /// Whether the stored representation changes between `self` and `other`.
    pub fn type_differs(&self, other: &ColumnProjection) -> bool {
        self.ty != other.ty
            || self.max_chars != other.max_chars
            || self.precision != other.precision
            || self.scale != other.scale
            || self.datetime_precision != other.datetime_precision
            || self.collate != other.collate
    }
}

/// One key of an index, with the expression text taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProjection {
    /// `None` for expression keys
    pub column: Option<String>,
    pub collate: Option<String>,
    pub opclass: Option<String>,
    pub order: SortOrder,
    pub nulls: NullsOrder,
    pub with: Option<String>,
}

/// An index or exclusion constraint without its name and SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProjection {
    pub keys: Vec<KeyProjection>,
    pub unique: bool,
    pub nulls_not_distinct: bool,
    pub using: String,
    pub include: Vec<String>,
    pub with: Option<String>,
    pub tablespace: Option<String>,
    pub partial: bool,
    pub tsvector: bool,
    pub language: Option<String>,
    pub language_column: Option<String>,
}

impl IndexProjection {
    pub fn of(idx: &Index, exclude: bool) -> Self {
        let default_using = if exclude { "gist" } else { "btree" };
        let using = if idx.tsvector {
            "gin".to_string()
        } else {
            idx.using
                .as_deref()
                .unwrap_or(default_using)
                .to_ascii_lowercase()
        };
        Self {
            keys: idx
                .columns
                .iter()
                .map(|c| KeyProjection {
                    column: c.column_name().map(str::to_string),
                    collate: c.collate.clone(),
                    opclass: c.opclass.clone(),
                    order: c.order,
                    nulls: c.nulls,
                    with: c.with.as_deref().map(|w| w.trim().to_string()),
                })
                .collect(),
            unique: idx.unique,
            nulls_not_distinct: idx.nulls_not_distinct,
            using,
            include: idx.include.clone(),
            with: idx.with.as_deref().map(drift_sql::normalize_sql),
            tablespace: idx.tablespace.clone(),
            partial: idx.where_clause.is_some(),
            tsvector: idx.tsvector,
            language: idx.language.clone(),
            language_column: idx.language_column.clone(),
        }
    }

    /// The projection with kind-specific gaps filled from run configuration.
    pub fn relaxed(&self, language: &str) -> Self {
        let mut relaxed = self.clone();
        if relaxed.tsvector && relaxed.language.is_none() && relaxed.language_column.is_none() {
            relaxed.language = Some(language.to_string());
        }
        relaxed
    }
}

/// SQL parts of an index: expression keys in order, then the predicate.
pub fn index_sql(idx: &Index) -> Vec<String> {
    idx.columns
        .iter()
        .filter_map(|c| match &c.key {
            IndexKey::Expression(expr) => Some(expr.clone()),
            IndexKey::Column(_) => None,
        })
        .chain(idx.where_clause.clone())
        .collect()
}

/// SQL parts of a check: its expression.
pub fn check_sql(check: &CheckConstraint) -> Vec<String> {
    vec![check.expr.clone()]
}

/// The full tuple a foreign key is compared on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyProjection {
    pub columns: Vec<String>,
    pub references_schema: String,
    pub references_table: String,
    pub references_columns: Vec<String>,
    pub match_type: FkMatch,
    pub on_update: FkAction,
    pub on_delete: FkAction,
}

impl ForeignKeyProjection {
    /// `schema` is the schema of the referencing table.
    pub fn of(fk: &ForeignKey, schema: &str) -> Self {
        Self {
            columns: fk.columns.clone(),
            references_schema: fk
                .references_schema
                .clone()
                .unwrap_or_else(|| schema.to_string()),
            references_table: fk.references_table.clone(),
            references_columns: fk.references_columns.clone(),
            match_type: fk.match_type,
            on_update: fk.on_update,
            on_delete: fk.on_delete,
        }
    }
}

/// A domain without its name, default and checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainProjection {
    pub ty: TypeRef,
    pub nullable: bool,
    pub collate: Option<String>,
    pub max_chars: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub datetime_precision: Option<u32>,
}

impl DomainProjection {
    pub fn of(base: &Column, current: &str) -> Self {
        Self {
            ty: qualify(&base.ty, current),
            nullable: base.nullable,
            collate: base.collate.clone(),
            max_chars: base.max_chars,
            precision: base.precision,
            scale: base.scale,
            datetime_precision: base.datetime_precision,
        }
    }
}

/// How an enum's values get from one list to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumEvolution {
    Unchanged,
    /// New values slot in around the existing ones.
    Add(Vec<EnumValue>),
    /// Some values go away; the rest keep the desired order.
    Remove(Vec<String>),
    Replace,
}

/// The ordered value list of an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumProjection<'a> {
    pub values: &'a [String],
}

impl<'a> EnumProjection<'a> {
    pub fn of(values: &'a [String]) -> Self {
        Self { values }
    }

    /// Classify the change from `self` (actual) to `desired`.
    pub fn evolve_to(&self, desired: &EnumProjection<'_>) -> EnumEvolution {
        let actual = self.values;
        let desired = desired.values;
        if actual == desired {
            return EnumEvolution::Unchanged;
        }

        let existing: Vec<&String> = desired.iter().filter(|v| actual.contains(v)).collect();
        let kept_in_order = existing.len() == actual.len() && existing.iter().copied().eq(actual);
        if kept_in_order {
            let values = desired
                .iter()
                .enumerate()
                .filter(|(_, v)| !actual.contains(v))
                .map(|(i, v)| EnumValue {
                    value: v.clone(),
                    placement: match i.checked_sub(1) {
                        Some(prev) => Placement::After(desired[prev].clone()),
                        None => match actual.first() {
                            Some(first) => Placement::Before(first.clone()),
                            None => Placement::End,
                        },
                    },
                })
                .collect();
            return EnumEvolution::Add(values);
        }

        // Removal keeps the survivors in place; a reorder needs a new type.
        let survivors: Vec<&String> = actual.iter().filter(|v| desired.contains(v)).collect();
        if survivors.len() == desired.len() && survivors.iter().copied().eq(desired) {
            let removed = actual
                .iter()
                .filter(|v| !desired.contains(v))
                .cloned()
                .collect();
            return EnumEvolution::Remove(removed);
        }

        EnumEvolution::Replace
    }
}
