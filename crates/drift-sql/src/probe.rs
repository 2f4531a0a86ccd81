//! Probe queries for the SQL-equivalence oracle.
//!
//! A probe selects a set of expressions as aliased projections over a typed
//! zero-row source. Postgres stores view definitions in a normalized form, so
//! creating the probe as a view and reading back `pg_get_viewdef` tells us how
//! the planner rewrote every expression. Two expressions are equivalent when
//! their rewritten forms are identical.

use std::fmt;

use indexmap::IndexMap;

use crate::{Ident, normalize_sql, strip_outer_parens};

/// Alias of part `part` of the actual-side expression of comparison `comparison`.
pub fn actual_alias(comparison: usize, part: usize) -> String {
    format!("*a{comparison}_{part}*")
}

/// Alias of part `part` of candidate `candidate` of comparison `comparison`.
pub fn candidate_alias(comparison: usize, candidate: usize, part: usize) -> String {
    format!("*c{comparison}_{candidate}_{part}*")
}

/// A column of the zero-row source, with the SQL type it is cast to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub name: String,
    pub sql_type: String,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// The row source expressions are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSource {
    /// Alias of the sub-select, usually the table name.
    pub alias: String,
    pub columns: Vec<SourceColumn>,
}

/// A projected expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeColumn {
    pub expr: String,
    pub alias: String,
}

/// A probe `SELECT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSelect {
    pub columns: Vec<ProbeColumn>,
    pub source: ProbeSource,
}

impl ProbeSelect {
    pub fn new(source: ProbeSource) -> Self {
        Self {
            columns: Vec::new(),
            source,
        }
    }

    /// Add a projection.
    pub fn project(&mut self, expr: impl Into<String>, alias: impl Into<String>) {
        self.columns.push(ProbeColumn {
            expr: expr.into(),
            alias: alias.into(),
        });
    }

    /// Projection aliases in render order.
    pub fn aliases(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.alias.clone()).collect()
    }
}

impl fmt::Display for ProbeSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " ({}) AS {}", col.expr, Ident(&col.alias))?;
        }

        write!(f, "\nFROM (SELECT")?;
        for (i, col) in self.source.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " NULL::{} AS {}", col.sql_type, Ident(&col.name))?;
        }
        write!(f, " WHERE false) AS {}", Ident(&self.source.alias))
    }
}

/// Extract the normalized projection expressions from a `pg_get_viewdef` result.
///
/// `aliases` must be given in the order the probe projected them. Returns
/// `None` when the definition does not have the expected shape.
pub fn parse_view_projections(
    definition: &str,
    aliases: &[String],
) -> Option<IndexMap<String, String>> {
    let body = definition.trim_start();
    let rest = body.strip_prefix("SELECT")?;

    let mut projections = IndexMap::with_capacity(aliases.len());
    let mut cursor = 0;
    for alias in aliases {
        let marker = format!(" AS {}", Ident(alias));
        let pos = cursor + rest[cursor..].find(&marker)?;
        let expr = rest[cursor..pos].trim().trim_start_matches(',').trim();
        projections.insert(alias.clone(), normalize_sql(strip_outer_parens(expr)));
        cursor = pos + marker.len();
    }

    Some(projections)
}
