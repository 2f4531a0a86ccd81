//! Implicit cast reachability.
//!
//! A column type can be altered in place when Postgres can cast the old type
//! to the new one. We read the implicit casts once and answer reachability
//! questions from their transitive closure.

use std::collections::{HashMap, HashSet};

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::Result;
use crate::traced::{Connection, ConnectionExt};

/// A directed implicit cast edge, by canonical type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastEdge {
    pub from: String,
    pub to: String,
}

impl CastEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Source of implicit cast edges.
pub trait CastCatalog: Send + Sync {
    fn implicit_casts(&self) -> BoxFuture<'_, Result<Vec<CastEdge>>>;
}

/// Reads `pg_cast` over a live connection.
pub struct PgCastCatalog<'c> {
    conn: &'c dyn Connection,
}

impl<'c> PgCastCatalog<'c> {
    pub fn new(conn: &'c dyn Connection) -> Self {
        Self { conn }
    }
}

const IMPLICIT_CASTS: &str = "\
SELECT s.typname::text, t.typname::text
FROM pg_cast c
JOIN pg_type s ON s.oid = c.castsource
JOIN pg_type t ON t.oid = c.casttarget
WHERE c.castcontext = 'i'";

impl CastCatalog for PgCastCatalog<'_> {
    fn implicit_casts(&self) -> BoxFuture<'_, Result<Vec<CastEdge>>> {
        Box::pin(async move {
            let rows = self.conn.traced().query(IMPLICIT_CASTS, &[]).await?;
            Ok(rows
                .iter()
                .map(|row| CastEdge::new(row.get::<_, String>(0), row.get::<_, String>(1)))
                .collect())
        })
    }
}

/// Memoized transitive closure of implicit casts.
///
/// The catalog is read on first use and never again for the run.
pub struct TypeCastIndex<'a> {
    catalog: &'a dyn CastCatalog,
    closure: OnceCell<HashMap<String, HashSet<String>>>,
}

impl<'a> TypeCastIndex<'a> {
    pub fn new(catalog: &'a dyn CastCatalog) -> Self {
        Self {
            catalog,
            closure: OnceCell::new(),
        }
    }

    /// Whether `from` reaches `to` through implicit casts. A type always
    /// reaches itself.
    pub async fn can_cast(&self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            return Ok(true);
        }
        let closure = self
            .closure
            .get_or_try_init(|| async {
                let edges = self.catalog.implicit_casts().await?;
                tracing::debug!(edges = edges.len(), "loaded implicit casts");
                Ok::<_, crate::Error>(transitive_closure(&edges))
            })
            .await?;
        Ok(closure.get(from).is_some_and(|targets| targets.contains(to)))
    }
}

/// For every source type, every type reachable through one or more edges.
pub fn transitive_closure(edges: &[CastEdge]) -> HashMap<String, HashSet<String>> {
    let mut direct: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        direct.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut closure = HashMap::new();
    for &start in direct.keys() {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<&str> = direct[start].clone();
        while let Some(ty) = stack.pop() {
            if !seen.insert(ty.to_string()) {
                continue;
            }
            if let Some(next) = direct.get(ty) {
                stack.extend(next.iter().copied());
            }
        }
        closure.insert(start.to_string(), seen);
    }
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCatalog {
        edges: Vec<CastEdge>,
        loads: AtomicUsize,
    }

    impl CastCatalog for CountingCatalog {
        fn implicit_casts(&self) -> BoxFuture<'_, Result<Vec<CastEdge>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let edges = self.edges.clone();
            Box::pin(async move { Ok(edges) })
        }
    }

    #[test]
    fn test_transitive_closure() {
        let closure = transitive_closure(&[
            CastEdge::new("int2", "int4"),
            CastEdge::new("int4", "int8"),
            CastEdge::new("int8", "numeric"),
        ]);
        assert!(closure["int2"].contains("numeric"));
        assert!(!closure["int8"].contains("int2"));
        assert!(!closure.contains_key("numeric"));
    }

    #[tokio::test]
    async fn test_catalog_is_read_once() {
        let catalog = CountingCatalog {
            edges: vec![CastEdge::new("varchar", "text"), CastEdge::new("bpchar", "varchar")],
            loads: AtomicUsize::new(0),
        };
        let index = TypeCastIndex::new(&catalog);

        assert!(index.can_cast("bpchar", "text").await.unwrap());
        assert!(!index.can_cast("text", "bpchar").await.unwrap());
        assert!(index.can_cast("uuid", "uuid").await.unwrap());
        assert_eq!(catalog.loads.load(Ordering::SeqCst), 1);
    }
}
