//! The introspected side.
//!
//! Rows are kept in flat, parallel collections and addressed by position.
//! Nothing here owns anything else: an index row points at its table through
//! `(schema, table)`. Renames are propagated by walking every collection that
//! can hold the old key.
//!
//! User-defined type references on this side are always schema-qualified.

use crate::{CheckConstraint, Column, ForeignKey, Index, IndexKey, PrimaryKey, TypeRef};

/// A table row.
#[derive(Debug, Clone, PartialEq)]
pub struct DbTable {
    pub schema: String,
    pub name: String,
    pub comment: Option<String>,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
}

impl DbTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            comment: None,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// An index or exclusion constraint row. `index.name` is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct TableIndex {
    pub schema: String,
    pub table: String,
    pub index: Index,
}

impl TableIndex {
    pub fn name(&self) -> &str {
        self.index.name.as_deref().unwrap_or_default()
    }

    pub fn belongs_to(&self, schema: &str, table: &str) -> bool {
        self.schema == schema && self.table == table
    }
}

/// Constraint payload. Names live on [`DbConstraint`].
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKey),
    Check(CheckConstraint),
}

/// A table constraint row.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub constraint: Constraint,
}

impl DbConstraint {
    pub fn belongs_to(&self, schema: &str, table: &str) -> bool {
        self.schema == schema && self.table == table
    }

    /// Local columns the constraint touches.
    pub fn columns(&self) -> &[String] {
        match &self.constraint {
            Constraint::PrimaryKey(pk) => &pk.columns,
            Constraint::ForeignKey(fk) => &fk.columns,
            Constraint::Check(check) => &check.columns,
        }
    }
}

/// A trigger row. Triggers are carried for renames only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTrigger {
    pub schema: String,
    pub table: String,
    pub name: String,
}

/// An enum type row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbEnum {
    pub schema: String,
    pub name: String,
    /// Values in sort order
    pub values: Vec<String>,
}

impl DbEnum {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A domain type row.
#[derive(Debug, Clone, PartialEq)]
pub struct DbDomain {
    pub schema: String,
    pub name: String,
    pub base: Column,
    /// Named check constraints
    pub checks: Vec<CheckConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbExtension {
    pub name: String,
    pub schema: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCollation {
    pub schema: String,
    pub name: String,
}

/// Everything introspection found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualStructure {
    pub schemas: Vec<String>,
    pub tables: Vec<DbTable>,
    pub indexes: Vec<TableIndex>,
    pub excludes: Vec<TableIndex>,
    pub constraints: Vec<DbConstraint>,
    pub triggers: Vec<DbTrigger>,
    pub extensions: Vec<DbExtension>,
    pub enums: Vec<DbEnum>,
    pub domains: Vec<DbDomain>,
    pub collations: Vec<DbCollation>,
}

impl ActualStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_table(&self, schema: &str, name: &str) -> Option<&DbTable> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
    }

    pub fn find_enum(&self, schema: &str, name: &str) -> Option<&DbEnum> {
        self.enums
            .iter()
            .find(|e| e.schema == schema && e.name == name)
    }

    pub fn table_indexes<'a>(
        &'a self,
        schema: &'a str,
        table: &'a str,
    ) -> impl Iterator<Item = &'a TableIndex> + 'a {
        self.indexes.iter().filter(move |i| i.belongs_to(schema, table))
    }

    pub fn table_excludes<'a>(
        &'a self,
        schema: &'a str,
        table: &'a str,
    ) -> impl Iterator<Item = &'a TableIndex> + 'a {
        self.excludes.iter().filter(move |i| i.belongs_to(schema, table))
    }

    pub fn table_constraints<'a>(
        &'a self,
        schema: &'a str,
        table: &'a str,
    ) -> impl Iterator<Item = &'a DbConstraint> + 'a {
        self.constraints
            .iter()
            .filter(move |c| c.belongs_to(schema, table))
    }

    /// Describe the first collection in which `self` and `other` differ.
    ///
    /// Used to refuse running against several databases that are not
    /// structurally identical.
    pub fn divergence(&self, other: &ActualStructure) -> Option<&'static str> {
        if self.schemas != other.schemas {
            return Some("schemas");
        }
        if self.tables != other.tables {
            return Some("tables");
        }
        if self.indexes != other.indexes {
            return Some("indexes");
        }
        if self.excludes != other.excludes {
            return Some("exclusion constraints");
        }
        if self.constraints != other.constraints {
            return Some("constraints");
        }
        if self.triggers != other.triggers {
            return Some("triggers");
        }
        if self.extensions != other.extensions {
            return Some("extensions");
        }
        if self.enums != other.enums {
            return Some("enums");
        }
        if self.domains != other.domains {
            return Some("domains");
        }
        if self.collations != other.collations {
            return Some("collations");
        }
        None
    }

    /// Rename a schema in every row that mentions it.
    pub fn rename_schema(&mut self, from: &str, to: &str) {
        for schema in &mut self.schemas {
            if schema == from {
                *schema = to.to_string();
            }
        }
        let rename = |s: &mut String| {
            if s == from {
                *s = to.to_string();
            }
        };

        for table in &mut self.tables {
            rename(&mut table.schema);
            for column in &mut table.columns {
                rename_type_schema(&mut column.ty, from, to);
            }
        }
        for row in self.indexes.iter_mut().chain(self.excludes.iter_mut()) {
            rename(&mut row.schema);
        }
        for row in &mut self.constraints {
            rename(&mut row.schema);
            if let Constraint::ForeignKey(fk) = &mut row.constraint {
                if let Some(s) = &mut fk.references_schema {
                    rename(s);
                }
            }
        }
        for row in &mut self.triggers {
            rename(&mut row.schema);
        }
        for row in &mut self.extensions {
            rename(&mut row.schema);
        }
        for row in &mut self.enums {
            rename(&mut row.schema);
        }
        for row in &mut self.domains {
            rename(&mut row.schema);
            rename_type_schema(&mut row.base.ty, from, to);
        }
        for row in &mut self.collations {
            rename(&mut row.schema);
        }
    }

    /// Move and/or rename a table, updating every row that points at it.
    pub fn rename_table(&mut self, schema: &str, from: &str, to_schema: &str, to: &str) {
        let matches = |s: &str, t: &str| s == schema && t == from;

        for table in &mut self.tables {
            if matches(&table.schema, &table.name) {
                table.schema = to_schema.to_string();
                table.name = to.to_string();
            }
        }
        for row in self.indexes.iter_mut().chain(self.excludes.iter_mut()) {
            if matches(&row.schema, &row.table) {
                row.schema = to_schema.to_string();
                row.table = to.to_string();
            }
        }
        for row in &mut self.constraints {
            // An unqualified target is resolved against the schema the row had.
            let owner_schema = row.schema.clone();
            if matches(&row.schema, &row.table) {
                row.schema = to_schema.to_string();
                row.table = to.to_string();
            }
            if let Constraint::ForeignKey(fk) = &mut row.constraint {
                let target_schema = fk.references_schema.as_deref().unwrap_or(&owner_schema);
                let retarget = target_schema == schema && fk.references_table == from;
                if fk.references_schema.is_none() && row.schema != owner_schema {
                    fk.references_schema = Some(owner_schema.clone());
                }
                if retarget {
                    fk.references_schema = Some(to_schema.to_string());
                    fk.references_table = to.to_string();
                }
            }
        }
        for row in &mut self.triggers {
            if matches(&row.schema, &row.table) {
                row.schema = to_schema.to_string();
                row.table = to.to_string();
            }
        }
    }

    /// Rename a column, updating indexes, constraints and incoming foreign keys.
    pub fn rename_column(&mut self, schema: &str, table: &str, from: &str, to: &str) {
        let rename = |s: &mut String| {
            if s == from {
                *s = to.to_string();
            }
        };

        for t in &mut self.tables {
            if t.schema == schema && t.name == table {
                for column in &mut t.columns {
                    rename(&mut column.name);
                }
            }
        }
        for row in self.indexes.iter_mut().chain(self.excludes.iter_mut()) {
            if !row.belongs_to(schema, table) {
                continue;
            }
            for col in &mut row.index.columns {
                if let IndexKey::Column(name) = &mut col.key {
                    rename(name);
                }
            }
            row.index.include.iter_mut().for_each(rename);
            if let Some(lang) = &mut row.index.language_column {
                rename(lang);
            }
        }
        for row in &mut self.constraints {
            let local = row.belongs_to(schema, table);
            match &mut row.constraint {
                Constraint::PrimaryKey(pk) if local => pk.columns.iter_mut().for_each(rename),
                Constraint::Check(check) if local => check.columns.iter_mut().for_each(rename),
                Constraint::ForeignKey(fk) => {
                    if local {
                        fk.columns.iter_mut().for_each(rename);
                    }
                    let target_schema = fk.references_schema.as_deref().unwrap_or(&row.schema);
                    if target_schema == schema && fk.references_table == table {
                        fk.references_columns.iter_mut().for_each(rename);
                    }
                }
                _ => {}
            }
        }
    }

    /// Move and/or rename an enum or domain type, updating every column using it.
    pub fn rename_type(&mut self, schema: &str, from: &str, to_schema: &str, to: &str) {
        let retarget = |ty: &mut TypeRef| {
            if ty.schema.as_deref() == Some(schema) && ty.name == from {
                ty.schema = Some(to_schema.to_string());
                ty.name = to.to_string();
            }
        };

        for row in &mut self.enums {
            if row.schema == schema && row.name == from {
                row.schema = to_schema.to_string();
                row.name = to.to_string();
            }
        }
        for row in &mut self.domains {
            if row.schema == schema && row.name == from {
                row.schema = to_schema.to_string();
                row.name = to.to_string();
            }
            retarget(&mut row.base.ty);
        }
        for table in &mut self.tables {
            for column in &mut table.columns {
                retarget(&mut column.ty);
            }
        }
    }

    /// Rename an index, exclusion constraint or constraint of a table.
    pub fn rename_table_item(&mut self, schema: &str, table: &str, from: &str, to: &str) {
        for row in self.indexes.iter_mut().chain(self.excludes.iter_mut()) {
            if row.belongs_to(schema, table) && row.name() == from {
                row.index.name = Some(to.to_string());
            }
        }
        for row in &mut self.constraints {
            if row.belongs_to(schema, table) && row.name == from {
                row.name = to.to_string();
            }
        }
    }
}

fn rename_type_schema(ty: &mut TypeRef, from: &str, to: &str) {
    if ty.schema.as_deref() == Some(from) {
        ty.schema = Some(to.to_string());
    }
}
