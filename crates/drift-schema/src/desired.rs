//! The code-declared side.

use indexmap::IndexMap;

use crate::{CheckConstraint, Column, ForeignKey, Index, PrimaryKey};

/// A table as declared in code.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Schema, current schema when unset
    pub schema: Option<String>,
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    /// Table-level primary key; column-level markers are used when unset
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
    /// Exclusion constraints
    pub excludes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub checks: Vec<CheckConstraint>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            comment: None,
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            excludes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.primary_key = Some(pk);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn exclude(mut self, exclude: Index) -> Self {
        self.excludes.push(exclude);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    /// Schema of this table, resolving the current schema.
    pub fn schema_or<'a>(&'a self, current: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(current)
    }

    /// Storage name of a column referenced by its declared name.
    ///
    /// Names that match no declared column are returned as-is, so constraint
    /// definitions may also use storage names directly.
    pub fn storage_column(&self, name: &str, snake_case: bool) -> String {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.storage_name(snake_case))
            .unwrap_or_else(|| name.to_string())
    }

    /// The effective primary key, with column names resolved to storage names.
    pub fn effective_primary_key(&self, snake_case: bool) -> Option<PrimaryKey> {
        if let Some(pk) = &self.primary_key {
            return Some(PrimaryKey {
                name: pk.name.clone(),
                columns: pk
                    .columns
                    .iter()
                    .map(|c| self.storage_column(c, snake_case))
                    .collect(),
            });
        }

        let columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.storage_name(snake_case))
            .collect();
        (!columns.is_empty()).then(|| PrimaryKey {
            name: None,
            columns,
        })
    }

    /// Table- and column-level checks, with column references resolved.
    pub fn all_checks(&self, snake_case: bool) -> Vec<CheckConstraint> {
        self.checks
            .iter()
            .map(|check| CheckConstraint {
                name: check.name.clone(),
                expr: check.expr.clone(),
                columns: check
                    .columns
                    .iter()
                    .map(|c| self.storage_column(c, snake_case))
                    .collect(),
            })
            .collect()
    }
}

/// An enum type as declared in code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub schema: Option<String>,
    pub name: String,
    /// Values in declaration order
    pub values: Vec<String>,
}

impl Enum {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// A domain type as declared in code.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub schema: Option<String>,
    pub name: String,
    /// Base type definition: type, nullability, default, collation, precision
    pub base: Column,
    pub checks: Vec<CheckConstraint>,
}

impl Domain {
    pub fn new(name: impl Into<String>, base: Column) -> Self {
        Self {
            schema: None,
            name: name.into(),
            base,
            checks: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }
}

/// An extension the code depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub schema: Option<String>,
    pub version: Option<String>,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            version: None,
        }
    }
}

/// Everything the code declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSchema {
    /// Schemas that must exist (besides the current one)
    pub schemas: Vec<String>,
    pub extensions: Vec<Extension>,
    /// Enums keyed by their declaration key
    pub enums: IndexMap<String, Enum>,
    pub tables: Vec<Table>,
    pub domains: Vec<Domain>,
}

impl DesiredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schemas.push(name.into());
        self
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn enum_type(mut self, e: Enum) -> Self {
        let key = match &e.schema {
            Some(schema) => format!("{schema}.{}", e.name),
            None => e.name.clone(),
        };
        self.enums.insert(key, e);
        self
    }

    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domains.push(domain);
        self
    }

    /// Look up a desired table by resolved schema and name.
    pub fn find_table(&self, schema: &str, name: &str, current: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name == name && t.schema_or(current) == schema)
    }
}
