//! Verification runner.
//!
//! Replays a script inside a transaction, introspects the result and diffs it
//! again against the desired schema. Anything left over means the script does
//! not do what it claims. The transaction is always rolled back.

use drift_schema::{ActualStructure, DesiredSchema};
use futures::future::BoxFuture;

use crate::casts::PgCastCatalog;
use crate::choice::NonInteractive;
use crate::compose::{Services, compose};
use crate::config::RunConfig;
use crate::oracle::PgOracle;
use crate::render::render_script;
use crate::script::ChangeScript;
use crate::traced::{Connection, ConnectionExt};
use crate::{Error, Result};

/// Reads the structure of a live database.
pub trait Introspect: Send + Sync {
    fn introspect<'a>(
        &'a self,
        conn: &'a dyn Connection,
        config: &'a RunConfig,
    ) -> BoxFuture<'a, Result<ActualStructure>>;
}

/// Check that `script` brings the database behind `conn` to `desired`.
pub async fn verify(
    conn: &dyn Connection,
    desired: &DesiredSchema,
    script: &ChangeScript,
    config: &RunConfig,
    introspector: &dyn Introspect,
) -> Result<()> {
    let sql = render_script(script);
    let traced = conn.traced();

    traced.batch_execute("BEGIN").await?;
    let replayed = replay(conn, desired, &sql, config, introspector).await;
    let rolled_back = traced.batch_execute("ROLLBACK").await;

    let residual = replayed?;
    rolled_back?;
    if residual.is_empty() {
        tracing::info!(ops = script.len(), "verified change script");
        return Ok(());
    }

    tracing::warn!(left = residual.len(), "change script does not converge");
    Err(Error::Verification {
        script: sql,
        residual: residual.ops,
    })
}

async fn replay(
    conn: &dyn Connection,
    desired: &DesiredSchema,
    sql: &str,
    config: &RunConfig,
    introspector: &dyn Introspect,
) -> Result<ChangeScript> {
    if !sql.is_empty() {
        conn.traced().batch_execute(sql).await?;
    }
    let actual = introspector.introspect(conn, config).await?;

    let oracle = PgOracle::in_transaction(conn);
    let casts = PgCastCatalog::new(conn);
    let mut chooser = NonInteractive;
    let services = Services {
        oracle: &oracle,
        casts: &casts,
        chooser: &mut chooser,
    };
    compose(desired, std::slice::from_ref(&actual), config, services).await
}
