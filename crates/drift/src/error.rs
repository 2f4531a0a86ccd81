use thiserror::Error;

use crate::script::Op;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("target databases diverge: {what} differ between {first} and {other}")]
    StructuralDivergence {
        what: &'static str,
        first: usize,
        other: usize,
    },

    #[error("a choice is required for {kind} {name}, but none can be made")]
    AmbiguousChoice { kind: String, name: String },

    #[error("cannot change {table}.{column} from {from} to {to}")]
    UnresolvableTypeChange {
        table: String,
        column: String,
        from: String,
        to: String,
    },

    #[error("verification failed: {} operation(s) left after replay", residual.len())]
    Verification {
        /// The rendered script that was replayed
        script: String,
        /// What a second diff still wanted to do
        residual: Vec<Op>,
    },

    #[error("could not read probe view definition: {0}")]
    Oracle(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
