//! Configuration file handling for drift.
//!
//! Looks for `.config/drift.styx` in the current directory or any parent
//! directory, and turns it into the [`RunConfig`] the engine works with.

pub use drift_config::{Config, Ignore};

use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use thiserror::Error;

/// Load configuration from `.config/drift.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(e.to_string()))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let config = parse(&content)?;
    Ok((config, config_path))
}

/// Parse the contents of a `.config/drift.styx` file.
pub fn parse(content: &str) -> Result<Config, ConfigError> {
    facet_styx::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Find `.config/drift.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".config/drift.styx");
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no .config/drift.styx found in current directory or any parent")]
    NotFound,
    #[error("failed to read .config/drift.styx: {0}")]
    Io(String),
    #[error("failed to parse .config/drift.styx: {0}")]
    Parse(String),
}

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        crate::Error::Configuration(e.to_string())
    }
}

/// Connection strings to diff against, primary first.
///
/// Falls back to `DATABASE_URL` (a `.env` file is honored) when the
/// configuration lists none.
pub fn database_urls(config: &Config) -> crate::Result<Vec<String>> {
    if !config.databases.is_empty() {
        return Ok(config.databases.clone());
    }
    let _ = dotenvy::dotenv();
    match std::env::var("DATABASE_URL") {
        Ok(url) => Ok(vec![url]),
        Err(_) => Err(crate::Error::Configuration(
            "no databases configured and DATABASE_URL is not set".to_string(),
        )),
    }
}

/// The settings one reconciliation run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Schema unqualified objects live in
    pub schema: String,
    /// Convert camelCase column keys to snake_case storage names
    pub snake_case: bool,
    /// Default full text search language
    pub language: String,
    /// Table recording applied migrations; never diffed
    pub migrations_table: String,
    pub migrations_path: Utf8PathBuf,
    pub ignore_schemas: Vec<String>,
    pub ignore_tables: Vec<String>,
    pub ignore_enums: Vec<String>,
    /// Replay generated scripts in a rolled-back transaction
    pub verify: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            snake_case: false,
            language: "english".to_string(),
            migrations_table: "schema_migrations".to_string(),
            migrations_path: Utf8PathBuf::from("migrations"),
            ignore_schemas: Vec::new(),
            ignore_tables: Vec::new(),
            ignore_enums: Vec::new(),
            verify: false,
        }
    }
}

impl RunConfig {
    /// Build the run configuration, checking required settings.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let migrations_path = config
            .migrations_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                crate::Error::Configuration("migrations-path is required".to_string())
            })?;

        let defaults = Self::default();
        Ok(Self {
            schema: config.schema.clone().unwrap_or(defaults.schema),
            snake_case: config.snake_case,
            language: config.language.clone().unwrap_or(defaults.language),
            migrations_table: config
                .migrations_table
                .clone()
                .unwrap_or(defaults.migrations_table),
            migrations_path: Utf8PathBuf::from(migrations_path),
            ignore_schemas: config.ignore.schemas.clone(),
            ignore_tables: config.ignore.tables.clone(),
            ignore_enums: config.ignore.enums.clone(),
            verify: config.verify,
        })
    }

    /// Whether a schema is off limits.
    pub fn ignores_schema(&self, schema: &str) -> bool {
        schema.starts_with("pg_")
            || schema == "information_schema"
            || self.ignore_schemas.iter().any(|s| s == schema)
    }

    /// Whether a table is off limits. Ignore entries may be qualified.
    pub fn ignores_table(&self, schema: &str, table: &str) -> bool {
        self.ignores_schema(schema)
            || (table == self.migrations_table && schema == self.schema)
            || self
                .ignore_tables
                .iter()
                .any(|t| t == table || *t == format!("{schema}.{table}"))
    }

    /// Whether an enum is off limits. Ignore entries may be qualified.
    pub fn ignores_enum(&self, schema: &str, name: &str) -> bool {
        self.ignores_schema(schema)
            || self
                .ignore_enums
                .iter()
                .any(|e| e == name || *e == format!("{schema}.{name}"))
    }
}
