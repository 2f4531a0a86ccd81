//! Running against live databases.

use drift_schema::DesiredSchema;
use futures::future::try_join_all;

use crate::casts::PgCastCatalog;
use crate::choice::Disambiguate;
use crate::compose::{Services, compose};
use crate::config::RunConfig;
use crate::oracle::PgOracle;
use crate::script::ChangeScript;
use crate::traced::TracedPool;
use crate::verify::{Introspect, verify};
use crate::Result;

/// Introspect every database, compose one script against them, and verify
/// it on the primary when the configuration asks for it.
///
/// `pools` holds the primary first.
pub async fn reconcile(
    pools: &[TracedPool],
    desired: &DesiredSchema,
    config: &RunConfig,
    introspector: &dyn Introspect,
    chooser: &mut dyn Disambiguate,
) -> Result<ChangeScript> {
    let conns = try_join_all(pools.iter().map(TracedPool::get)).await?;
    let targets = try_join_all(conns.iter().map(|conn| introspector.introspect(conn, config))).await?;
    tracing::debug!(targets = targets.len(), "introspected");

    let Some(primary) = conns.first() else {
        return Err(crate::Error::Configuration(
            "no database to reconcile".to_string(),
        ));
    };
    let oracle = PgOracle::new(primary);
    let casts = PgCastCatalog::new(primary);
    let services = Services {
        oracle: &oracle,
        casts: &casts,
        chooser,
    };
    let script = compose(desired, &targets, config, services).await?;

    if config.verify && !script.is_empty() {
        verify(primary, desired, &script, config, introspector).await?;
    }
    Ok(script)
}

/// Pools for every configured database, primary first.
pub fn connect_all(config: &crate::config::Config) -> Result<Vec<TracedPool>> {
    crate::config::database_urls(config)?
        .iter()
        .map(|url| TracedPool::connect(url))
        .collect()
}
