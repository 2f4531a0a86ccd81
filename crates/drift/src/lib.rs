//! Schema reconciliation and migration synthesis for Postgres.
//!
//! drift compares a schema declared in code ([`DesiredSchema`]) with what a
//! database actually contains ([`ActualStructure`]) and computes the ordered
//! [`ChangeScript`] that brings the database in line:
//!
//! ```ignore
//! let script = drift::compose(&desired, &[actual], &config, Services {
//!     oracle: &PgOracle::new(&conn),
//!     casts: &PgCastCatalog::new(&conn),
//!     chooser: &mut Interactive::stdio(),
//! })
//! .await?;
//! println!("{}", drift::render_script(&script));
//! ```
//!
//! # Renames
//!
//! Something missing on one side and something new on the other may be the
//! same object under another name. drift never guesses: it asks a
//! [`Disambiguate`] strategy, and carries the dependent names (primary keys,
//! indexes, constraints) over to the new name.
//!
//! # Equivalent SQL
//!
//! Defaults, check expressions and index predicates are first compared as
//! text. When that fails, Postgres itself is asked whether two fragments
//! mean the same thing (see [`oracle`]).

pub mod casts;
pub mod choice;
mod compose;
pub mod config;
mod error;
mod generate;
mod matching;
pub mod oracle;
mod projection;
pub mod render;
pub mod script;
mod session;
mod state;
mod traced;
mod verify;

pub use casts::{CastCatalog, CastEdge, PgCastCatalog};
pub use choice::{Abort, Answer, Choice, Disambiguate, Interactive, NonInteractive, ObjectKind, Scripted};
pub use compose::{Services, compose};
pub use config::RunConfig;
pub use error::{Error, Result};
pub use oracle::{PgOracle, SemanticComparer};
pub use render::render_script;
pub use script::{ChangeScript, Op, Summary};
pub use session::{connect_all, reconcile};
pub use traced::{Connection, ConnectionExt, TracedConn, TracedObject, TracedPool};
pub use verify::{Introspect, verify};

pub use drift_schema::{ActualStructure, DesiredSchema};
