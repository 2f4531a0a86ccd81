use std::fmt;

/// A reference to a SQL type, as used by columns and domains.
///
/// Built-in types are stored under their canonical catalog name (`int4`,
/// `timestamptz`, ...) so that `integer` and `int4` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Schema of a user-defined type (enum, domain, ...). `None` for built-ins
    /// and for user types living in the current schema.
    pub schema: Option<String>,
    pub name: String,
    /// Number of array dimensions (`text[][]` has 2)
    pub array_dims: u32,
}

impl TypeRef {
    /// A built-in scalar type, canonicalized.
    pub fn builtin(name: &str) -> Self {
        Self {
            schema: None,
            name: canonical_type_name(name).to_string(),
            array_dims: 0,
        }
    }

    /// A user-defined type (enum, domain, composite) in an optional schema.
    pub fn user(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
            array_dims: 0,
        }
    }

    /// An array of this type.
    pub fn array(mut self) -> Self {
        self.array_dims += 1;
        self
    }

    /// Canonical scalar name, ignoring the array dimensions and schema.
    pub fn canonical_name(&self) -> &str {
        canonical_type_name(&self.name)
    }

    /// The scalar element type.
    pub fn element(&self) -> TypeRef {
        TypeRef {
            array_dims: 0,
            ..self.clone()
        }
    }

    /// Compare two type references, resolving a missing schema to `current`.
    pub fn same_type(&self, other: &TypeRef, current: &str) -> bool {
        self.array_dims == other.array_dims
            && self.canonical_name() == other.canonical_name()
            && self.schema.as_deref().unwrap_or(current)
                == other.schema.as_deref().unwrap_or(current)
    }

    /// Whether the scalar type is one of the textual built-ins.
    pub fn is_text_like(&self) -> bool {
        self.schema.is_none() && matches!(self.canonical_name(), "text" | "varchar" | "bpchar")
    }
}

impl From<&str> for TypeRef {
    /// Parse a type name such as `integer`, `text[]` or `app.mood`.
    fn from(s: &str) -> Self {
        let mut rest = s.trim();
        let mut array_dims = 0;
        while let Some(stripped) = rest.strip_suffix("[]") {
            array_dims += 1;
            rest = stripped.trim_end();
        }

        let (schema, name) = match rest.split_once('.') {
            Some((schema, name)) if !rest.contains(' ') => {
                (Some(unquote(schema)), unquote(name))
            }
            _ => (None, unquote(rest)),
        };

        let name = if schema.is_none() {
            canonical_type_name(&name).to_string()
        } else {
            name
        };

        Self {
            schema,
            name,
            array_dims,
        }
    }
}

impl From<String> for TypeRef {
    fn from(s: String) -> Self {
        TypeRef::from(s.as_str())
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => s.to_string(),
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}", drift_sql::Qualified(Some(schema), &self.name))?,
            None if is_builtin(&self.name) => write!(f, "{}", self.name)?,
            None => write!(f, "{}", drift_sql::Ident(&self.name))?,
        }
        for _ in 0..self.array_dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Map SQL-standard and alias spellings to the catalog name Postgres reports.
pub fn canonical_type_name(name: &str) -> &str {
    match name.trim().to_ascii_lowercase().as_str() {
        "smallint" | "int2" | "smallserial" | "serial2" => "int2",
        "integer" | "int" | "int4" | "serial" | "serial4" => "int4",
        "bigint" | "int8" | "bigserial" | "serial8" => "int8",
        "real" | "float4" => "float4",
        "double precision" | "float8" | "float" => "float8",
        "decimal" | "numeric" => "numeric",
        "boolean" | "bool" => "bool",
        "character varying" | "varchar" => "varchar",
        "character" | "char" | "bpchar" => "bpchar",
        "text" => "text",
        "timestamp" | "timestamp without time zone" => "timestamp",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "time" | "time without time zone" => "time",
        "timetz" | "time with time zone" => "timetz",
        "date" => "date",
        "interval" => "interval",
        "bytea" => "bytea",
        "uuid" => "uuid",
        "json" => "json",
        "jsonb" => "jsonb",
        "inet" => "inet",
        "cidr" => "cidr",
        "tsvector" => "tsvector",
        "tsrange" => "tsrange",
        "tstzrange" => "tstzrange",
        "daterange" => "daterange",
        "int4range" => "int4range",
        "int8range" => "int8range",
        _ => name.trim(),
    }
}

/// Whether `name` is a built-in type we render without quoting.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&canonical_type_name(name))
}

const BUILTIN_NAMES: &[&str] = &[
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "numeric",
    "bool",
    "varchar",
    "bpchar",
    "text",
    "timestamp",
    "timestamptz",
    "time",
    "timetz",
    "date",
    "interval",
    "bytea",
    "uuid",
    "json",
    "jsonb",
    "inet",
    "cidr",
    "tsvector",
    "tsrange",
    "tstzrange",
    "daterange",
    "int4range",
    "int8range",
];
