//! Schema types for drift.
//!
//! Two views of the same database live here:
//!
//! - [`DesiredSchema`]: what the code declares.
//! - [`ActualStructure`]: what introspection found in the live database.
//!
//! Both sides share the item types ([`Column`], [`Index`], [`ForeignKey`], ...)
//! so comparisons can work on a single shape.

use std::fmt;

mod actual;
mod desired;
mod types;

pub use actual::*;
pub use desired::*;
pub use types::*;


/// Identity column options (`GENERATED ... AS IDENTITY`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    /// `ALWAYS` when true, `BY DEFAULT` otherwise.
    pub always: bool,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub cache: Option<i64>,
    pub cycle: bool,
}

/// Identity options with Postgres defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedIdentity {
    pub always: bool,
    pub start: i64,
    pub increment: i64,
    pub min: i64,
    pub max: i64,
    pub cache: i64,
    pub cycle: bool,
}

impl Identity {
    /// Fill in the sequence defaults Postgres applies for a column of `ty`.
    pub fn resolve(&self, ty: &TypeRef) -> ResolvedIdentity {
        let type_max = match ty.canonical_name() {
            "int2" => i16::MAX as i64,
            "int4" => i32::MAX as i64,
            _ => i64::MAX,
        };
        let increment = self.increment.unwrap_or(1);
        let min = self.min.unwrap_or(1);
        ResolvedIdentity {
            always: self.always,
            start: self.start.unwrap_or(min),
            increment,
            min,
            max: self.max.unwrap_or(type_max),
            cache: self.cache.unwrap_or(1),
            cycle: self.cycle,
        }
    }
}

/// A column definition.
///
/// Used for desired table columns, introspected table columns and domain base
/// types alike.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name as declared in code, or as stored in the database.
    pub name: String,
    /// Explicit storage name overriding the casing convention.
    pub storage_name: Option<String>,
    /// Column type
    pub ty: TypeRef,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
    pub comment: Option<String>,
    /// `varchar(n)` / `char(n)` length
    pub max_chars: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// `timestamp(p)` / `time(p)` / `interval(p)` precision
    pub datetime_precision: Option<u32>,
    pub collate: Option<String>,
    pub identity: Option<Identity>,
    /// Column-level primary key marker (desired side only)
    pub primary_key: bool,
}

impl Column {
    /// A NOT NULL column of the given type.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            ty: ty.into(),
            nullable: false,
            default: None,
            comment: None,
            max_chars: None,
            precision: None,
            scale: None,
            datetime_precision: None,
            collate: None,
            identity: None,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_sql(mut self, sql: impl Into<String>) -> Self {
        self.default = Some(sql.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn max_chars(mut self, n: u32) -> Self {
        self.max_chars = Some(n);
        self
    }

    pub fn numeric(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collate = Some(collation.into());
        self
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn named(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    /// The name this column has in the database.
    ///
    /// An explicit storage name wins; otherwise the declared name is converted
    /// to `snake_case` when the casing convention asks for it.
    pub fn storage_name(&self, snake_case: bool) -> String {
        match &self.storage_name {
            Some(name) => name.clone(),
            None if snake_case => drift_sql::to_snake_case(&self.name),
            None => self.name.clone(),
        }
    }
}

/// Sort order for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending order (default)
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword for this sort order, or empty string for ASC (default).
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "",
            SortOrder::Desc => " DESC",
        }
    }
}

/// Nulls ordering for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullsOrder {
    /// Use database default (NULLS LAST for ASC, NULLS FIRST for DESC)
    #[default]
    Default,
    /// Sort nulls before non-null values
    First,
    /// Sort nulls after non-null values
    Last,
}

impl NullsOrder {
    /// Returns the SQL clause for this nulls ordering, or empty string for default.
    pub fn to_sql(&self) -> &'static str {
        match self {
            NullsOrder::Default => "",
            NullsOrder::First => " NULLS FIRST",
            NullsOrder::Last => " NULLS LAST",
        }
    }
}

/// What an index column indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// A plain column reference
    Column(String),
    /// An arbitrary SQL expression
    Expression(String),
}

/// A column of an index or exclusion constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexColumn {
    pub key: IndexKey,
    pub collate: Option<String>,
    pub opclass: Option<String>,
    pub order: SortOrder,
    pub nulls: NullsOrder,
    /// Exclusion operator (`WITH &&`), only meaningful for exclusion constraints.
    pub with: Option<String>,
}

impl IndexColumn {
    /// Create a new index column with default (ASC) ordering and default nulls.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: IndexKey::Column(name.into()),
            collate: None,
            opclass: None,
            order: SortOrder::Asc,
            nulls: NullsOrder::Default,
            with: None,
        }
    }

    /// Create an expression index column.
    pub fn expression(sql: impl Into<String>) -> Self {
        Self {
            key: IndexKey::Expression(sql.into()),
            ..Self::new("")
        }
    }

    /// Create a new index column with DESC ordering and default nulls.
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            order: SortOrder::Desc,
            ..Self::new(name)
        }
    }

    /// Create an exclusion constraint element `column WITH operator`.
    pub fn excluding(name: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            with: Some(operator.into()),
            ..Self::new(name)
        }
    }

    /// The column name, when this is a plain column.
    pub fn column_name(&self) -> Option<&str> {
        match &self.key {
            IndexKey::Column(name) => Some(name),
            IndexKey::Expression(_) => None,
        }
    }

    /// Parse a column specification like "col_name", "col_name DESC", or "col_name DESC NULLS FIRST".
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let upper = spec.to_uppercase();

        // Parse nulls ordering first (it comes at the end)
        let (spec_without_nulls, nulls) = if upper.ends_with(" NULLS FIRST") {
            (&spec[..spec.len() - 12], NullsOrder::First)
        } else if upper.ends_with(" NULLS LAST") {
            (&spec[..spec.len() - 11], NullsOrder::Last)
        } else {
            (spec, NullsOrder::Default)
        };

        let trimmed = spec_without_nulls.trim();
        let upper_trimmed = trimmed.to_uppercase();

        let (name, order) = if upper_trimmed.ends_with(" DESC") {
            (trimmed[..trimmed.len() - 5].trim(), SortOrder::Desc)
        } else if upper_trimmed.ends_with(" ASC") {
            (trimmed[..trimmed.len() - 4].trim(), SortOrder::Asc)
        } else {
            (trimmed, SortOrder::Asc)
        };

        let key = if name.starts_with('(') {
            IndexKey::Expression(drift_sql::strip_outer_parens(name).to_string())
        } else {
            IndexKey::Column(unquote_ident(name))
        };

        Self {
            key,
            order,
            nulls,
            ..Self::new("")
        }
    }
}

fn unquote_ident(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        return inner.replace("\"\"", "\"");
    }
    s.to_string()
}

/// An index or exclusion constraint.
///
/// Whether this is an index or an exclusion constraint depends on which list it
/// is stored in; exclusion columns carry their `with` operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Index {
    /// Index name (always set on the actual side)
    pub name: Option<String>,
    /// Column(s) in the index with sort order
    pub columns: Vec<IndexColumn>,
    /// Whether this is a unique index
    pub unique: bool,
    pub nulls_not_distinct: bool,
    /// Access method, `btree` when unset
    pub using: Option<String>,
    /// Non-key columns (`INCLUDE (...)`)
    pub include: Vec<String>,
    /// Storage parameters (`WITH (...)`)
    pub with: Option<String>,
    pub tablespace: Option<String>,
    /// Optional WHERE clause for partial indexes (PostgreSQL-specific)
    pub where_clause: Option<String>,
    /// Full text search index over the listed columns
    pub tsvector: bool,
    /// Full text search language; the run configuration supplies it when unset
    pub language: Option<String>,
    /// Column holding the per-row search language
    pub language_column: Option<String>,
}

impl Index {
    pub fn on(columns: impl IntoIterator<Item = IndexColumn>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    pub fn filter(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    /// Names of all plain columns the index touches, key and included.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| c.column_name())
            .chain(self.include.iter().map(|s| s.as_str()))
            .chain(self.language_column.as_deref())
            .collect()
    }

    /// Name this index gets when the code does not name it.
    pub fn default_name(&self, table: &str, exclude: bool) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| match &c.key {
                IndexKey::Column(name) => name.clone(),
                IndexKey::Expression(_) => "expr".to_string(),
            })
            .collect();
        if exclude {
            drift_sql::exclude_name(table, &cols)
        } else if self.unique {
            drift_sql::unique_index_name(table, &cols)
        } else {
            drift_sql::index_name(table, &cols)
        }
    }

    /// The declared name, or the default one.
    pub fn name_or_default(&self, table: &str, exclude: bool) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.default_name(table, exclude))
    }
}

/// `MATCH` type of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FkMatch {
    #[default]
    Simple,
    Full,
    Partial,
}

impl fmt::Display for FkMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkMatch::Simple => write!(f, "SIMPLE"),
            FkMatch::Full => write!(f, "FULL"),
            FkMatch::Partial => write!(f, "PARTIAL"),
        }
    }
}

/// Referential action on update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl fmt::Display for FkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkAction::NoAction => write!(f, "NO ACTION"),
            FkAction::Restrict => write!(f, "RESTRICT"),
            FkAction::Cascade => write!(f, "CASCADE"),
            FkAction::SetNull => write!(f, "SET NULL"),
            FkAction::SetDefault => write!(f, "SET DEFAULT"),
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub name: Option<String>,
    /// Column(s) in this table
    pub columns: Vec<String>,
    /// Schema of the referenced table (current schema when unset)
    pub references_schema: Option<String>,
    /// Referenced table
    pub references_table: String,
    /// Referenced column(s)
    pub references_columns: Vec<String>,
    pub match_type: FkMatch,
    pub on_update: FkAction,
    pub on_delete: FkAction,
}

impl ForeignKey {
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<String>>,
        references_table: impl Into<String>,
        references_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            references_schema: None,
            references_table: references_table.into(),
            references_columns: references_columns.into_iter().map(Into::into).collect(),
            match_type: FkMatch::Simple,
            on_update: FkAction::NoAction,
            on_delete: FkAction::NoAction,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_delete(mut self, action: FkAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn name_or_default(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| drift_sql::foreign_key_name(table, &self.columns))
    }
}

/// A CHECK constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expr: String,
    /// Columns the expression references (column-level checks name one)
    pub columns: Vec<String>,
}

impl CheckConstraint {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            name: None,
            expr: expr.into(),
            columns: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn name_or_default(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| drift_sql::check_constraint_name(table, &self.expr))
    }
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

impl PrimaryKey {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name_or_default(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| drift_sql::primary_key_name(table))
    }
}
