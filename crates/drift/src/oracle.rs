//! SQL-equivalence oracle.
//!
//! Two SQL fragments that differ as text may still mean the same thing:
//! `(a = b)` and `a=b`, `'x'` and `'x'::text`. Only Postgres can certify that.
//! We project both sides over a typed zero-row source, store that as a
//! temporary view, and read back the definition the planner normalized.

use std::sync::atomic::{AtomicUsize, Ordering};

use drift_sql::{ProbeSelect, ProbeSource, actual_alias, candidate_alias, parse_view_projections};
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::traced::{Connection, ConnectionExt};
use crate::{Error, Result};

/// One actual-side expression against its desired-side candidates.
///
/// An expression may have several parts (e.g. the key expressions and the
/// predicate of an index); every candidate has as many parts as `actual`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub actual: Vec<String>,
    pub candidates: Vec<Vec<String>>,
}

/// Comparisons sharing one row source, answered with a single probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonBatch {
    pub source: ProbeSource,
    pub comparisons: Vec<Comparison>,
}

impl ComparisonBatch {
    /// Build the probe `SELECT` for this batch.
    pub fn probe(&self) -> ProbeSelect {
        let mut probe = ProbeSelect::new(self.source.clone());
        for (ci, comparison) in self.comparisons.iter().enumerate() {
            for (p, part) in comparison.actual.iter().enumerate() {
                probe.project(part, actual_alias(ci, p));
            }
            for (k, candidate) in comparison.candidates.iter().enumerate() {
                for (p, part) in candidate.iter().enumerate() {
                    probe.project(part, candidate_alias(ci, k, p));
                }
            }
        }
        probe
    }
}

/// Decides which candidate, if any, is equivalent to the actual expression.
pub trait SemanticComparer: Send + Sync {
    /// For every comparison of the batch, the position of the first candidate
    /// whose every part normalizes like the actual one.
    fn compare<'a>(&'a self, batch: &'a ComparisonBatch)
    -> BoxFuture<'a, Result<Vec<Option<usize>>>>;
}

/// Pick matches out of normalized projections.
pub fn pick_matches(
    comparisons: &[Comparison],
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Option<usize>> {
    comparisons
        .iter()
        .enumerate()
        .map(|(ci, comparison)| {
            let actual: Vec<Option<String>> = (0..comparison.actual.len())
                .map(|p| lookup(&actual_alias(ci, p)))
                .collect();
            comparison.candidates.iter().enumerate().position(|(k, candidate)| {
                candidate.len() == actual.len()
                    && (0..candidate.len()).all(|p| {
                        let normalized = lookup(&candidate_alias(ci, k, p));
                        normalized.is_some() && normalized == actual[p]
                    })
            })
        })
        .collect()
}

/// [`SemanticComparer`] backed by a live connection.
pub struct PgOracle<'c> {
    conn: &'c dyn Connection,
    seq: AtomicUsize,
    /// Set when the connection is inside a transaction: probes then run one
    /// at a time, each under a savepoint, so a rejected probe cannot abort it.
    savepoint: Option<Mutex<()>>,
}

impl<'c> PgOracle<'c> {
    pub fn new(conn: &'c dyn Connection) -> Self {
        Self {
            conn,
            seq: AtomicUsize::new(0),
            savepoint: None,
        }
    }

    /// An oracle for a connection with an open transaction.
    pub fn in_transaction(conn: &'c dyn Connection) -> Self {
        Self {
            savepoint: Some(Mutex::new(())),
            ..Self::new(conn)
        }
    }

    async fn run_probe(&self, batch: &ComparisonBatch) -> Result<Vec<Option<usize>>> {
        if batch.comparisons.is_empty() {
            return Ok(Vec::new());
        }
        let _serial = match &self.savepoint {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        if let Some(answers) = self.attempt(batch).await? {
            return Ok(answers);
        }
        if batch.comparisons.len() == 1 {
            tracing::warn!(source = %batch.source.alias, "probe rejected, treating as different");
            return Ok(vec![None]);
        }

        // One bad fragment must not cost the others their answer.
        tracing::debug!(
            source = %batch.source.alias,
            comparisons = batch.comparisons.len(),
            "probe rejected, retrying comparisons one at a time"
        );
        let mut answers = Vec::with_capacity(batch.comparisons.len());
        for comparison in &batch.comparisons {
            let single = ComparisonBatch {
                source: batch.source.clone(),
                comparisons: vec![comparison.clone()],
            };
            let answer = match self.attempt(&single).await? {
                Some(answer) => answer.into_iter().next().flatten(),
                None => {
                    tracing::warn!(
                        source = %batch.source.alias,
                        actual = ?comparison.actual,
                        "probe rejected, treating as different"
                    );
                    None
                }
            };
            answers.push(answer);
        }
        Ok(answers)
    }

    /// One probe, under a savepoint when the connection is in a transaction.
    async fn attempt(&self, batch: &ComparisonBatch) -> Result<Option<Vec<Option<usize>>>> {
        if self.savepoint.is_none() {
            return self.probe(batch).await;
        }
        let conn = self.conn.traced();
        conn.batch_execute("SAVEPOINT drift_probe").await?;
        let result = self.probe(batch).await;
        conn.batch_execute("ROLLBACK TO SAVEPOINT drift_probe; RELEASE SAVEPOINT drift_probe")
            .await?;
        result
    }

    /// `None` when Postgres rejects the probe, typically because it names a
    /// type created later in the script.
    async fn probe(&self, batch: &ComparisonBatch) -> Result<Option<Vec<Option<usize>>>> {
        let probe = batch.probe();
        let view = format!("drift_probe_{}", self.seq.fetch_add(1, Ordering::Relaxed));
        let quoted = drift_sql::quote_ident(&view);
        let conn = self.conn.traced();

        let create = format!("CREATE TEMPORARY VIEW {quoted} AS {probe}");
        if let Err(e) = conn.batch_execute(&create).await {
            if e.as_db_error().is_some() {
                tracing::debug!(error = %e, source = %batch.source.alias, "probe rejected");
                return Ok(None);
            }
            return Err(e.into());
        }

        let definition = conn
            .query_one("SELECT pg_get_viewdef($1::text::regclass, true)", &[&quoted])
            .await;
        conn.batch_execute(&format!("DROP VIEW IF EXISTS {quoted}"))
            .await?;
        let definition: String = definition?.get(0);

        let projections = parse_view_projections(&definition, &probe.aliases())
            .ok_or_else(|| Error::Oracle(definition.clone()))?;
        Ok(Some(pick_matches(&batch.comparisons, |alias| {
            projections.get(alias).cloned()
        })))
    }
}

impl SemanticComparer for PgOracle<'_> {
    fn compare<'a>(
        &'a self,
        batch: &'a ComparisonBatch,
    ) -> BoxFuture<'a, Result<Vec<Option<usize>>>> {
        let span = tracing::debug_span!(
            "oracle.compare",
            source = %batch.source.alias,
            comparisons = batch.comparisons.len()
        );
        Box::pin(self.run_probe(batch).instrument(span))
    }
}
