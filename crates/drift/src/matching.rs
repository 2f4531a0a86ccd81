//! Matching desired items against actual ones.
//!
//! Named objects (schemas, types, tables, columns) are paired by key first.
//! Whatever is left on both sides is a create-vs-rename question for the
//! [`Disambiguate`] strategy. Table items (indexes, exclusion constraints,
//! checks) are matched by projection instead, in [`ItemSet`].

use std::collections::HashSet;

use crate::choice::{Abort, Choice, Disambiguate, ObjectKind};
use crate::projection::sql_parts_eq;
use crate::{Error, Result};

/// Outcome of pairing two keyed lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// `(desired, actual)` positions
    pub pairs: Vec<(usize, usize)>,
    pub desired_only: Vec<usize>,
    pub actual_only: Vec<usize>,
}

/// Pair items whose keys are equal. Each actual item pairs at most once.
pub fn pair_by<K: PartialEq>(desired: &[K], actual: &[K]) -> Pairing {
    let mut taken = vec![false; actual.len()];
    let mut pairing = Pairing::default();
    for (d, key) in desired.iter().enumerate() {
        match (0..actual.len()).find(|&a| !taken[a] && actual[a] == *key) {
            Some(a) => {
                taken[a] = true;
                pairing.pairs.push((d, a));
            }
            None => pairing.desired_only.push(d),
        }
    }
    pairing.actual_only = (0..actual.len()).filter(|&a| !taken[a]).collect();
    pairing
}

/// A create-vs-rename answer for one desired-only item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create(usize),
    Rename { desired: usize, actual: usize },
}

/// Ask about every desired-only item that has candidates.
///
/// `rank` filters and orders the remaining actual-only items for one desired
/// item; an empty ranking means create without asking. Renamed items leave
/// `actual_only`.
pub fn disambiguate(
    chooser: &mut dyn Disambiguate,
    kind: ObjectKind,
    desired_only: &[usize],
    actual_only: &mut Vec<usize>,
    desired_name: impl Fn(usize) -> String,
    actual_name: impl Fn(usize) -> String,
    rank: impl Fn(usize, &[usize]) -> Vec<usize>,
) -> Result<Vec<Decision>> {
    let mut decisions = Vec::with_capacity(desired_only.len());
    for &d in desired_only {
        let ranked = rank(d, actual_only);
        if ranked.is_empty() {
            decisions.push(Decision::Create(d));
            continue;
        }

        let name = desired_name(d);
        let names: Vec<String> = ranked.iter().map(|&a| actual_name(a)).collect();
        let choice = chooser
            .choose(kind, &name, &names)
            .map_err(|abort| match abort {
                Abort::Io(e) => Error::Io(e),
                Abort::Declined => Error::AmbiguousChoice {
                    kind: kind.to_string(),
                    name: name.clone(),
                },
            })?;
        match choice {
            Choice::RenameFrom(i) if i < ranked.len() => {
                let a = ranked[i];
                actual_only.retain(|&x| x != a);
                tracing::debug!(%kind, from = %names[i], to = %name, "rename");
                decisions.push(Decision::Rename { desired: d, actual: a });
            }
            _ => decisions.push(Decision::Create(d)),
        }
    }
    Ok(decisions)
}

/// Every remaining candidate, in order.
pub fn all_candidates(_: usize, actual_only: &[usize]) -> Vec<usize> {
    actual_only.to_vec()
}

/// Whether two table names are the plural and singular of one another.
///
/// Recognizes `users`/`user`, `categories`/`category` and the same patterns
/// on the last segment of compound names (`post_tags`/`post_tag`).
pub fn is_plural_singular_pair(a: &str, b: &str) -> bool {
    let (plural, singular) = if a.len() > b.len() { (a, b) } else { (b, a) };

    if plural == format!("{singular}s") {
        return true;
    }
    if let (Some(p), Some(s)) = (plural.strip_suffix("ies"), singular.strip_suffix('y')) {
        if p == s {
            return true;
        }
    }

    if let (Some((p_prefix, p_last)), Some((s_prefix, s_last))) =
        (plural.rsplit_once('_'), singular.rsplit_once('_'))
    {
        return p_prefix == s_prefix && is_plural_singular_pair(p_last, s_last);
    }
    false
}

/// Similarity score between two tables, from 0.0 to 1.0.
///
/// 0.3 for plural/singular names, plus 0.7 times the Jaccard overlap of
/// their column names.
pub fn table_similarity(a_name: &str, a_cols: &[&str], b_name: &str, b_cols: &[&str]) -> f64 {
    let mut score = 0.0;
    if is_plural_singular_pair(a_name, b_name) {
        score += 0.3;
    }

    let a: HashSet<&str> = a_cols.iter().copied().collect();
    let b: HashSet<&str> = b_cols.iter().copied().collect();
    let union = a.union(&b).count();
    if union > 0 {
        score += 0.7 * a.intersection(&b).count() as f64 / union as f64;
    }
    score
}

/// Tables scoring below this are never offered as rename sources.
pub const RENAME_THRESHOLD: f64 = 0.6;

/// An item in name-aware projection matching.
#[derive(Debug, Clone)]
pub struct Item<P> {
    pub name: String,
    pub projection: P,
    pub sql: Vec<String>,
    pub done: bool,
}

impl<P> Item<P> {
    pub fn new(name: impl Into<String>, projection: P, sql: Vec<String>) -> Self {
        Self {
            name: name.into(),
            projection,
            sql,
            done: false,
        }
    }
}

/// A settled match. `rename` is set when the names differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMatch {
    pub actual: usize,
    pub desired: usize,
    pub rename: Option<(String, String)>,
}

/// Actual and desired items of one kind on one table.
#[derive(Debug, Clone)]
pub struct ItemSet<P> {
    pub actual: Vec<Item<P>>,
    pub desired: Vec<Item<P>>,
}

impl<P> Default for ItemSet<P> {
    fn default() -> Self {
        Self {
            actual: Vec::new(),
            desired: Vec::new(),
        }
    }
}

impl<P: PartialEq + Clone> ItemSet<P> {
    /// Settle every pair whose projections are equal and whose SQL matches as
    /// text: same-name pairs first, then any name.
    pub fn match_exact(&mut self) -> Vec<ItemMatch> {
        let mut matches = self.match_pass(true, |p| p.clone());
        matches.extend(self.match_pass(false, |p| p.clone()));
        matches
    }

    /// Like [`match_exact`](Self::match_exact) with both projections passed
    /// through `relax` first.
    pub fn match_relaxed(&mut self, relax: impl Fn(&P) -> P) -> Vec<ItemMatch> {
        self.match_pass(false, relax)
    }

    fn match_pass(&mut self, same_name: bool, relax: impl Fn(&P) -> P) -> Vec<ItemMatch> {
        let mut matches = Vec::new();
        for a in 0..self.actual.len() {
            if self.actual[a].done {
                continue;
            }
            let actual_projection = relax(&self.actual[a].projection);
            let found = (0..self.desired.len()).find(|&d| {
                let desired = &self.desired[d];
                !desired.done
                    && (!same_name || desired.name == self.actual[a].name)
                    && relax(&desired.projection) == actual_projection
                    && sql_parts_eq(&desired.sql, &self.actual[a].sql)
            });
            if let Some(d) = found {
                matches.push(self.settle(a, d));
            }
        }
        matches
    }

    /// Unsettled desired items the oracle could pair with actual item `a`:
    /// equal (relaxed) projections and as many SQL parts, at least one.
    pub fn candidates(&self, a: usize, relax: impl Fn(&P) -> P) -> Vec<usize> {
        let actual = &self.actual[a];
        if actual.done || actual.sql.is_empty() {
            return Vec::new();
        }
        let projection = relax(&actual.projection);
        (0..self.desired.len())
            .filter(|&d| {
                let desired = &self.desired[d];
                !desired.done
                    && desired.sql.len() == actual.sql.len()
                    && relax(&desired.projection) == projection
            })
            .collect()
    }

    /// Settle a pair, unless either side already is.
    pub fn try_settle(&mut self, a: usize, d: usize) -> Option<ItemMatch> {
        (!self.actual[a].done && !self.desired[d].done).then(|| self.settle(a, d))
    }

    fn settle(&mut self, a: usize, d: usize) -> ItemMatch {
        self.actual[a].done = true;
        self.desired[d].done = true;
        let from = &self.actual[a].name;
        let to = &self.desired[d].name;
        ItemMatch {
            actual: a,
            desired: d,
            rename: (from != to).then(|| (from.clone(), to.clone())),
        }
    }

    pub fn unmatched_actual(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.actual.len()).filter(|&a| !self.actual[a].done)
    }

    pub fn unmatched_desired(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.desired.len()).filter(|&d| !self.desired[d].done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::{Answer, NonInteractive, Scripted};

    #[test]
    fn test_pair_by() {
        let pairing = pair_by(&["a", "b", "c"], &["c", "x", "a"]);
        assert_eq!(pairing.pairs, vec![(0, 2), (2, 0)]);
        assert_eq!(pairing.desired_only, vec![1]);
        assert_eq!(pairing.actual_only, vec![1]);
    }

    #[test]
    fn test_plural_singular_detection() {
        assert!(is_plural_singular_pair("users", "user"));
        assert!(is_plural_singular_pair("categories", "category"));
        assert!(is_plural_singular_pair("post_tags", "post_tag"));
        assert!(is_plural_singular_pair("post_categories", "post_category"));

        assert!(!is_plural_singular_pair("users", "posts"));
        assert!(!is_plural_singular_pair("user_tags", "post_tag"));
        assert!(!is_plural_singular_pair("foo", "bar"));
    }

    #[test]
    fn test_table_similarity() {
        let cols = ["id", "email", "name"];
        let sim = table_similarity("users", &cols, "user", &cols);
        assert!(sim > 0.9, "expected high similarity, got {sim}");

        let sim = table_similarity("users", &cols, "posts", &["id", "title"]);
        assert!(sim < RENAME_THRESHOLD, "expected low similarity, got {sim}");
    }

    #[test]
    fn test_disambiguate_renames_and_creates() {
        let desired = ["author", "tag"];
        let actual = ["writer", "label"];
        let mut actual_only = vec![0, 1];
        let mut chooser = Scripted::new([Answer::RenameFrom("writer".to_string()), Answer::Create]);

        let decisions = disambiguate(
            &mut chooser,
            ObjectKind::Table,
            &[0, 1],
            &mut actual_only,
            |d| desired[d].to_string(),
            |a| actual[a].to_string(),
            all_candidates,
        )
        .unwrap();

        assert_eq!(
            decisions,
            vec![Decision::Rename { desired: 0, actual: 0 }, Decision::Create(1)]
        );
        assert_eq!(actual_only, vec![1]);
    }

    #[test]
    fn test_disambiguate_abort_is_ambiguous_choice() {
        let mut actual_only = vec![0];
        let err = disambiguate(
            &mut NonInteractive,
            ObjectKind::Column,
            &[0],
            &mut actual_only,
            |_| "title".to_string(),
            |_| "name".to_string(),
            all_candidates,
        )
        .unwrap_err();
        assert!(matches!(err, Error::AmbiguousChoice { ref kind, ref name } if kind == "column" && name == "title"));
    }

    /// A strategy whose terminal has gone away.
    struct Hangup;

    impl Disambiguate for Hangup {
        fn choose(&mut self, _: ObjectKind, _: &str, _: &[String]) -> Result<Choice, Abort> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
        }

        fn confirm_recreate(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Abort> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
        }
    }

    #[test]
    fn test_disambiguate_reports_prompt_failures() {
        let mut actual_only = vec![0];
        let err = disambiguate(
            &mut Hangup,
            ObjectKind::Table,
            &[0],
            &mut actual_only,
            |_| "post".to_string(),
            |_| "posts".to_string(),
            all_candidates,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_item_set_passes() {
        let mut set = ItemSet {
            actual: vec![
                Item::new("idx_a", 1, vec![]),
                Item::new("old_b", 2, vec![]),
                Item::new("idx_c", 3, vec!["lower(c)".to_string()]),
            ],
            desired: vec![
                Item::new("idx_b", 2, vec![]),
                Item::new("idx_a", 1, vec![]),
                Item::new("idx_c", 3, vec!["LOWER(c)".to_string()]),
            ],
        };

        let matches = set.match_exact();
        assert_eq!(
            matches,
            vec![
                ItemMatch { actual: 0, desired: 1, rename: None },
                ItemMatch {
                    actual: 1,
                    desired: 0,
                    rename: Some(("old_b".to_string(), "idx_b".to_string())),
                },
            ]
        );
        // Differing SQL text is left for the oracle.
        assert_eq!(set.candidates(2, |p| *p), vec![2]);
        assert!(set.try_settle(2, 2).is_some());
        assert!(set.try_settle(2, 2).is_none());
        assert_eq!(set.unmatched_actual().count(), 0);
    }
}
