//! SQL text helpers for drift.
//!
//! Quoting, default object naming, whitespace normalization for textual
//! comparisons, and the probe `SELECT` used by the SQL-equivalence oracle.

mod probe;
pub use probe::*;

#[cfg(test)]
mod tests;

/// Longest identifier Postgres keeps without truncating.
pub const PG_IDENT_MAX: usize = 63;

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use drift_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use drift_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// A possibly schema-qualified object name.
///
/// # Example
/// ```
/// use drift_sql::Qualified;
/// assert_eq!(Qualified(Some("app"), "user").to_string(), "\"app\".\"user\"");
/// assert_eq!(Qualified(None, "user").to_string(), "\"user\"");
/// ```
pub struct Qualified<'a>(pub Option<&'a str>, pub &'a str);

impl std::fmt::Display for Qualified<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(schema) = self.0 {
            write!(f, "{}.", Ident(schema))?;
        }
        write!(f, "{}", Ident(self.1))
    }
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `user`, `order`, `table`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Generate a standard index name for a table and columns.
///
/// Uses the convention `idx_{table}_{columns}` where columns are joined by underscore.
///
/// # Examples
///
/// ```
/// assert_eq!(drift_sql::index_name("user", &["email"]), "idx_user_email");
/// assert_eq!(drift_sql::index_name("post", &["author_id", "created_at"]), "idx_post_author_id_created_at");
/// ```
pub fn index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    truncate_ident(format!("idx_{}_{}", table, join_columns(columns)))
}

/// Generate a standard unique index name for a table and columns.
///
/// Uses the convention `uq_{table}_{columns}` where columns are joined by underscore.
///
/// # Examples
///
/// ```
/// assert_eq!(drift_sql::unique_index_name("user", &["email"]), "uq_user_email");
/// assert_eq!(drift_sql::unique_index_name("category", &["shop_id", "handle"]), "uq_category_shop_id_handle");
/// ```
pub fn unique_index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    truncate_ident(format!("uq_{}_{}", table, join_columns(columns)))
}

/// Generate a standard exclusion constraint name: `excl_{table}_{columns}`.
pub fn exclude_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    truncate_ident(format!("excl_{}_{}", table, join_columns(columns)))
}

/// The name Postgres gives a primary key constraint when none is specified.
pub fn primary_key_name(table: &str) -> String {
    truncate_ident(format!("{}_pkey", table))
}

/// The name Postgres gives a foreign key constraint when none is specified.
///
/// ```
/// assert_eq!(drift_sql::foreign_key_name("post", &["author_id"]), "post_author_id_fkey");
/// ```
pub fn foreign_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    truncate_ident(format!("{}_{}_fkey", table, join_columns(columns)))
}

/// Generate a deterministic CHECK constraint name for a table and expression.
///
/// Constraint names must be unique within a schema, so we include the table name
/// and a stable hash of the expression (after whitespace normalization).
pub fn check_constraint_name(table: &str, expr: &str) -> String {
    let normalized = normalize_sql(expr);
    let hex = blake3::hash(normalized.as_bytes()).to_hex().to_string();
    let suffix = &hex[..16];

    let prefix_overhead = "ck__".len(); // "ck_" + "_" between table and suffix
    let max_table_len = PG_IDENT_MAX.saturating_sub(prefix_overhead + suffix.len());

    format!("ck_{}_{}", truncate_at_boundary(table, max_table_len), suffix)
}

fn join_columns(columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    cols.join("_")
}

fn truncate_ident(name: String) -> String {
    if name.len() <= PG_IDENT_MAX {
        return name;
    }
    truncate_at_boundary(&name, PG_IDENT_MAX).to_string()
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    // Names are expected to be ASCII snake_case; still, avoid splitting UTF-8.
    let mut len = max;
    while len > 0 && !s.is_char_boundary(len) {
        len -= 1;
    }
    &s[..len]
}

/// Collapse whitespace runs outside of quoted sections into single spaces.
///
/// Used both for hashing expressions into constraint names and as the cheap
/// first pass of expression comparison before asking the database.
pub fn normalize_sql(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut pending_space = false;

    let mut in_single_quote = false;
    let mut in_double_quote = false;

    let mut chars = expr.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_single_quote {
            out.push(ch);
            if ch == '\'' {
                // SQL escapes single quotes by doubling them: ''
                if let Some(next) = chars.next_if_eq(&'\'') {
                    out.push(next);
                } else {
                    in_single_quote = false;
                }
            }
            continue;
        }

        if in_double_quote {
            out.push(ch);
            if ch == '"' {
                // SQL escapes double quotes in identifiers by doubling them: ""
                if let Some(next) = chars.next_if_eq(&'"') {
                    out.push(next);
                } else {
                    in_double_quote = false;
                }
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch);
                if ch == '\'' {
                    in_single_quote = true;
                } else {
                    in_double_quote = true;
                }
            }
            c if c.is_whitespace() => {
                pending_space = true;
            }
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Strip parentheses that wrap the whole expression, e.g. `((a = b))` → `a = b`.
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut current = expr.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

/// Whether the opening paren at position 0 closes at the very end.
fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    let last = expr.len() - 1;
    for (i, ch) in expr.char_indices() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => in_quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Textual equality of two SQL fragments, ignoring whitespace and wrapping parens.
///
/// A `false` here does not mean the expressions differ; only the database can
/// tell that.
pub fn sql_text_eq(a: &str, b: &str) -> bool {
    normalize_sql(strip_outer_parens(a)) == normalize_sql(strip_outer_parens(b))
}

/// Convert a `camelCase` or `PascalCase` identifier to `snake_case`.
///
/// ```
/// assert_eq!(drift_sql::to_snake_case("createdAt"), "created_at");
/// assert_eq!(drift_sql::to_snake_case("HTTPStatus"), "http_status");
/// assert_eq!(drift_sql::to_snake_case("already_snake"), "already_snake");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
