//! Configuration schema for drift.
//!
//! This is the shape of `.config/drift.styx`:
//!
//! ```styx
//! databases (postgres://localhost/app postgres://replica/app)
//! migrations-path migrations
//! schema public
//! snake-case true
//! language english
//! ignore {
//!     schemas (audit)
//!     tables (legacy_import)
//! }
//! ```

use facet::Facet;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct Config {
    /// Connection strings. The first one is the primary, the rest are
    /// replicas that must be structurally identical to it.
    #[facet(default)]
    pub databases: Vec<String>,

    /// Directory migration files are written to. Required.
    pub migrations_path: Option<String>,

    /// Current schema, `public` when unset.
    pub schema: Option<String>,

    /// Convert camelCase column keys to snake_case storage names.
    #[facet(default)]
    pub snake_case: bool,

    /// Default full text search language.
    pub language: Option<String>,

    /// Table that records applied migrations. Never diffed.
    pub migrations_table: Option<String>,

    /// Objects drift must leave alone.
    #[facet(default)]
    pub ignore: Ignore,

    /// Replay every generated script in a rolled-back transaction.
    #[facet(default)]
    pub verify: bool,
}

/// Ignore lists.
#[derive(Debug, Clone, Default, Facet)]
pub struct Ignore {
    #[facet(default)]
    pub schemas: Vec<String>,
    #[facet(default)]
    pub tables: Vec<String>,
    #[facet(default)]
    pub enums: Vec<String>,
}
