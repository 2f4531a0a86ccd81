//! Traced database connections.
//!
//! Everything drift sends to Postgres (probe views, cast catalog reads,
//! verification replays) goes through [`Connection`], and every call is wrapped
//! in a `debug_span!`.

use std::ops::Deref;

use futures::future::BoxFuture;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::Instrument;

/// Trait for database connections drift can talk to.
///
/// This is implemented for `tokio_postgres::Client`, `deadpool_postgres::Object`
/// and [`TracedObject`].
pub trait Connection: Send + Sync {
    /// Execute one or more statements without parameters.
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>>;

    /// Execute a query, returning all rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>>;

    /// Execute a query, returning exactly one row.
    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Row, Error>>;
}

impl Connection for tokio_postgres::Client {
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(tokio_postgres::Client::batch_execute(self, sql))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>> {
        Box::pin(tokio_postgres::Client::query(self, sql, params))
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Row, Error>> {
        Box::pin(tokio_postgres::Client::query_one(self, sql, params))
    }
}

impl Connection for deadpool_postgres::Object {
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        // Deref to the underlying Client to avoid recursion
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.batch_execute(sql))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>> {
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.query(sql, params))
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Row, Error>> {
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.query_one(sql, params))
    }
}

/// A traced connection pool.
///
/// Wraps a `deadpool_postgres::Pool` and returns [`TracedObject`] from `get()`.
#[derive(Clone)]
pub struct TracedPool {
    inner: deadpool_postgres::Pool,
}

impl TracedPool {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Build a small pool for one connection string.
    pub fn connect(url: &str) -> crate::Result<Self> {
        let config: tokio_postgres::Config = url.parse()?;
        let manager = deadpool_postgres::Manager::from_config(
            config,
            tokio_postgres::NoTls,
            deadpool_postgres::ManagerConfig {
                recycling_method: deadpool_postgres::RecyclingMethod::Fast,
            },
        );
        let pool = deadpool_postgres::Pool::builder(manager)
            .max_size(4)
            .build()
            .map_err(|e| crate::Error::Configuration(format!("cannot build pool: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Get a traced connection from the pool.
    pub async fn get(&self) -> Result<TracedObject, deadpool_postgres::PoolError> {
        let conn = self.inner.get().await?;
        Ok(TracedObject { inner: conn })
    }
}

/// A pooled connection whose calls are all traced.
///
/// The connection goes back to the pool when this is dropped.
pub struct TracedObject {
    inner: deadpool_postgres::Object,
}

impl Connection for TracedObject {
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move { TracedConn::new(&self.inner).batch_execute(sql).await })
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>> {
        Box::pin(async move { TracedConn::new(&self.inner).query(sql, params).await })
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Row, Error>> {
        Box::pin(async move { TracedConn::new(&self.inner).query_one(sql, params).await })
    }
}

/// A wrapper around a connection that logs all queries via tracing.
pub struct TracedConn<'a, C: Connection + ?Sized> {
    conn: &'a C,
}

impl<'a, C: Connection + ?Sized> TracedConn<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), Error> {
        let span = tracing::debug_span!("db.batch_execute", sql = %sql);
        self.conn.batch_execute(sql).instrument(span).await
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .conn
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = 1u64,
        );
        self.conn.query_one(sql, params).instrument(span).await
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection {
    fn traced(&self) -> TracedConn<'_, Self> {
        TracedConn::new(self)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}
