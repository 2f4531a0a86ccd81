//! The change-script: an ordered list of typed operations.
//!
//! Order matters. Schemas and types come before the tables that use them,
//! renames come before the work that assumes the new names, and drops come
//! last.

use std::fmt;

use drift_schema::{CheckConstraint, Column, ForeignKey, Index, PrimaryKey};

/// An ordered sequence of operations bridging the actual structure to the
/// desired one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeScript {
    pub ops: Vec<Op>,
}

impl ChangeScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Counts over the whole script.
    pub fn summary(&self) -> Summary {
        self.ops.iter().map(Op::summary).sum()
    }
}

impl fmt::Display for ChangeScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

/// How many objects an operation (or script) adds, changes and drops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub added: usize,
    pub changed: usize,
    pub dropped: usize,
}

impl Summary {
    fn added(n: usize) -> Self {
        Self {
            added: n,
            ..Self::default()
        }
    }

    fn changed(n: usize) -> Self {
        Self {
            changed: n,
            ..Self::default()
        }
    }

    fn dropped(n: usize) -> Self {
        Self {
            dropped: n,
            ..Self::default()
        }
    }
}

impl std::ops::Add for Summary {
    type Output = Summary;

    fn add(self, rhs: Summary) -> Summary {
        Summary {
            added: self.added + rhs.added,
            changed: self.changed + rhs.changed,
            dropped: self.dropped + rhs.dropped,
        }
    }
}

impl std::iter::Sum for Summary {
    fn sum<I: Iterator<Item = Summary>>(iter: I) -> Summary {
        iter.fold(Summary::default(), |a, b| a + b)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} changed, {} dropped",
            self.added, self.changed, self.dropped
        )
    }
}

/// Which kind of type a [`Op::RenameType`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Table,
    Enum,
    Domain,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Table => write!(f, "table"),
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Domain => write!(f, "domain"),
        }
    }
}

/// Which kind of table item a [`Op::RenameTableItem`] renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Index,
    /// Exclusion constraints and every other table constraint
    Constraint,
}

/// Where a new enum value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Before(String),
    After(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub value: String,
    pub placement: Placement,
}

/// A column whose type is an enum or domain being recreated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub array_dims: u32,
    /// Defaults must be dropped while the type is swapped, then restored.
    pub default: Option<String>,
}

/// A new table with everything it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub schema: String,
    pub name: String,
    pub comment: Option<String>,
    /// Columns with storage names
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
    pub excludes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub checks: Vec<CheckConstraint>,
}

/// A constraint added to an existing table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    ForeignKey(ForeignKey),
    Check(CheckConstraint),
}

impl TableConstraint {
    pub fn name(&self) -> &str {
        match self {
            TableConstraint::ForeignKey(fk) => fk.name.as_deref().unwrap_or_default(),
            TableConstraint::Check(check) => check.name.as_deref().unwrap_or_default(),
        }
    }
}

/// What happens to one column of an existing table.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Add(Column),
    Drop(String),
    Rename {
        from: String,
        to: String,
    },
    /// Alter in place; every attribute that differs between `from` and `to`
    /// is rendered.
    Change {
        from: Column,
        to: Column,
        /// `USING` expression for a type change
        using: Option<String>,
    },
    /// Drop and add again; data in the column is lost.
    Recreate {
        from: Column,
        to: Column,
    },
}

/// Accumulated changes for one existing table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableChange {
    pub schema: String,
    pub name: String,
    /// `Some(new)` when the comment changes
    pub comment: Option<Option<String>>,
    pub columns: Vec<ColumnChange>,
    pub drop_primary_key: Option<String>,
    pub add_primary_key: Option<PrimaryKey>,
    pub drop_indexes: Vec<String>,
    pub add_indexes: Vec<Index>,
    pub drop_excludes: Vec<String>,
    pub add_excludes: Vec<Index>,
    pub drop_constraints: Vec<String>,
    pub add_constraints: Vec<TableConstraint>,
}

impl TableChange {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comment.is_none()
            && self.columns.is_empty()
            && self.drop_primary_key.is_none()
            && self.add_primary_key.is_none()
            && self.drop_indexes.is_empty()
            && self.add_indexes.is_empty()
            && self.drop_excludes.is_empty()
            && self.add_excludes.is_empty()
            && self.drop_constraints.is_empty()
            && self.add_constraints.is_empty()
    }
}

/// A single operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },
    RenameSchema {
        from: String,
        to: String,
    },
    CreateExtension {
        name: String,
        schema: Option<String>,
        version: Option<String>,
    },
    DropExtension {
        name: String,
    },
    CreateDomain {
        schema: String,
        name: String,
        base: Column,
        /// Named checks
        checks: Vec<CheckConstraint>,
    },
    DropDomain {
        schema: String,
        name: String,
    },
    /// Drop and create a domain again. Columns using it hold the old base
    /// type in between.
    RecreateDomain {
        schema: String,
        name: String,
        /// Base of the domain being replaced
        old_base: Column,
        base: Column,
        checks: Vec<CheckConstraint>,
        dependents: Vec<DependentColumn>,
    },
    CreateEnum {
        schema: String,
        name: String,
        values: Vec<String>,
    },
    DropEnum {
        schema: String,
        name: String,
    },
    AddEnumValues {
        schema: String,
        name: String,
        values: Vec<EnumValue>,
    },
    /// Values cannot be removed in place: the type is recreated without them.
    RemoveEnumValues {
        schema: String,
        name: String,
        removed: Vec<String>,
        /// Values of the recreated type
        values: Vec<String>,
        dependents: Vec<DependentColumn>,
    },
    ReplaceEnumValues {
        schema: String,
        name: String,
        values: Vec<String>,
        dependents: Vec<DependentColumn>,
    },
    CreateTable(CreateTable),
    DropTable {
        schema: String,
        name: String,
    },
    /// Move a table or type to another schema and/or give it another name.
    RenameType {
        kind: TypeKind,
        from_schema: String,
        from: String,
        to_schema: String,
        to: String,
    },
    ChangeTable(TableChange),
    RenameTableItem {
        kind: ItemKind,
        schema: String,
        table: String,
        from: String,
        to: String,
    },
}

impl Op {
    /// Counts for this operation alone.
    pub fn summary(&self) -> Summary {
        match self {
            Op::CreateSchema { .. }
            | Op::CreateExtension { .. }
            | Op::CreateDomain { .. }
            | Op::CreateEnum { .. }
            | Op::CreateTable(_) => Summary::added(1),
            Op::DropSchema { .. }
            | Op::DropExtension { .. }
            | Op::DropDomain { .. }
            | Op::DropEnum { .. }
            | Op::DropTable { .. } => Summary::dropped(1),
            Op::RenameSchema { .. }
            | Op::RecreateDomain { .. }
            | Op::AddEnumValues { .. }
            | Op::RemoveEnumValues { .. }
            | Op::ReplaceEnumValues { .. }
            | Op::RenameType { .. }
            | Op::RenameTableItem { .. } => Summary::changed(1),
            Op::ChangeTable(change) => {
                let mut summary = Summary::default();
                for column in &change.columns {
                    summary = summary
                        + match column {
                            ColumnChange::Add(_) => Summary::added(1),
                            ColumnChange::Drop(_) => Summary::dropped(1),
                            _ => Summary::changed(1),
                        };
                }
                let added = change.add_primary_key.iter().count()
                    + change.add_indexes.len()
                    + change.add_excludes.len()
                    + change.add_constraints.len();
                let dropped = change.drop_primary_key.iter().count()
                    + change.drop_indexes.len()
                    + change.drop_excludes.len()
                    + change.drop_constraints.len();
                summary
                    + Summary::added(added)
                    + Summary::dropped(dropped)
                    + Summary::changed(change.comment.iter().count())
            }
        }
    }
}

struct Name<'a>(&'a str, &'a str);

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::CreateSchema { name } => write!(f, "+ schema {name}"),
            Op::DropSchema { name } => write!(f, "- schema {name}"),
            Op::RenameSchema { from, to } => write!(f, "~ rename schema {from} -> {to}"),
            Op::CreateExtension { name, .. } => write!(f, "+ extension {name}"),
            Op::DropExtension { name } => write!(f, "- extension {name}"),
            Op::CreateDomain { schema, name, base, .. } => {
                write!(f, "+ domain {}: {}", Name(schema, name), base.ty)
            }
            Op::DropDomain { schema, name } => write!(f, "- domain {}", Name(schema, name)),
            Op::RecreateDomain {
                schema,
                name,
                base,
                dependents,
                ..
            } => {
                write!(f, "~ domain {} = {}", Name(schema, name), base.ty)?;
                if !dependents.is_empty() {
                    write!(f, " ({} column(s) carried over)", dependents.len())?;
                }
                Ok(())
            }
            Op::CreateEnum {
                schema,
                name,
                values,
            } => write!(f, "+ enum {} ({})", Name(schema, name), values.join(", ")),
            Op::DropEnum { schema, name } => write!(f, "- enum {}", Name(schema, name)),
            Op::AddEnumValues {
                schema,
                name,
                values,
            } => {
                let values: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
                write!(f, "~ enum {} + ({})", Name(schema, name), values.join(", "))
            }
            Op::RemoveEnumValues {
                schema,
                name,
                removed,
                ..
            } => write!(f, "~ enum {} - ({})", Name(schema, name), removed.join(", ")),
            Op::ReplaceEnumValues {
                schema,
                name,
                values,
                ..
            } => write!(f, "~ enum {} = ({})", Name(schema, name), values.join(", ")),
            Op::CreateTable(t) => {
                writeln!(f, "+ table {}", Name(&t.schema, &t.name))?;
                for (i, col) in t.columns.iter().enumerate() {
                    let nullable = if col.nullable { " (nullable)" } else { "" };
                    if i + 1 < t.columns.len() {
                        writeln!(f, "    + {}: {}{}", col.name, col.ty, nullable)?;
                    } else {
                        write!(f, "    + {}: {}{}", col.name, col.ty, nullable)?;
                    }
                }
                Ok(())
            }
            Op::DropTable { schema, name } => write!(f, "- table {}", Name(schema, name)),
            Op::RenameType {
                kind,
                from_schema,
                from,
                to_schema,
                to,
            } => write!(
                f,
                "~ rename {kind} {} -> {}",
                Name(from_schema, from),
                Name(to_schema, to)
            ),
            Op::ChangeTable(change) => {
                write!(f, "~ table {}", Name(&change.schema, &change.name))?;
                for line in change_lines(change) {
                    write!(f, "\n    {line}")?;
                }
                Ok(())
            }
            Op::RenameTableItem {
                schema,
                table,
                from,
                to,
                ..
            } => write!(f, "~ {}: rename {from} -> {to}", Name(schema, table)),
        }
    }
}

fn change_lines(change: &TableChange) -> Vec<String> {
    let mut lines = Vec::new();
    for col in &change.columns {
        lines.push(match col {
            ColumnChange::Add(c) => {
                let nullable = if c.nullable { " (nullable)" } else { "" };
                format!("+ {}: {}{}", c.name, c.ty, nullable)
            }
            ColumnChange::Drop(name) => format!("- {name}"),
            ColumnChange::Rename { from, to } => format!("~ rename {from} -> {to}"),
            ColumnChange::Change { from, to, .. } if from.ty != to.ty => {
                format!("~ {}: {} -> {}", to.name, from.ty, to.ty)
            }
            ColumnChange::Change { to, .. } => format!("~ {}", to.name),
            ColumnChange::Recreate { from, to } => {
                format!("! {}: {} -> {} (recreate)", to.name, from.ty, to.ty)
            }
        });
    }
    if let Some(name) = &change.drop_primary_key {
        lines.push(format!("- PRIMARY KEY {name}"));
    }
    if let Some(pk) = &change.add_primary_key {
        lines.push(format!("+ PRIMARY KEY ({})", pk.columns.join(", ")));
    }
    for name in change.drop_indexes.iter().chain(&change.drop_excludes) {
        lines.push(format!("- {name}"));
    }
    for idx in change.add_indexes.iter().chain(&change.add_excludes) {
        lines.push(format!("+ {}", idx.name.as_deref().unwrap_or_default()));
    }
    for name in &change.drop_constraints {
        lines.push(format!("- {name}"));
    }
    for constraint in &change.add_constraints {
        lines.push(format!("+ {}", constraint.name()));
    }
    if let Some(comment) = &change.comment {
        lines.push(format!("~ comment: {}", comment.as_deref().unwrap_or("(none)")));
    }
    lines
}
