//! Friend-of-friend recommendations over the follow graph.

use rayon::prelude::*;
use socialrank_core::model::{NodeKind, Recommendation};
use socialrank_core::relations::FriendRow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

/// `follows_of[u] = { v : u follows v }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowGraph {
    follows: BTreeMap<String, BTreeSet<String>>,
}

impl FollowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from `friends` rows, returning the number of rows
    /// skipped for a missing or reserved-prefix id.
    pub fn from_rows(rows: &[FriendRow]) -> (Self, u64) {
        let mut graph = Self::new();
        let mut malformed = 0u64;
        for row in rows {
            match (valid_id(row.follower.as_deref()), valid_id(row.followed.as_deref())) {
                (Some(follower), Some(followed)) => graph.add_follow(follower, followed),
                _ => {
                    malformed += 1;
                    warn!("Skipping malformed friends row: {:?}", row);
                }
            }
        }
        (graph, malformed)
    }

    pub fn add_follow(&mut self, follower: impl Into<String>, followed: impl Into<String>) {
        self.follows
            .entry(follower.into())
            .or_default()
            .insert(followed.into());
    }

    pub fn follows_of(&self, user: &str) -> Option<&BTreeSet<String>> {
        self.follows.get(user)
    }

    pub fn user_count(&self) -> usize {
        self.follows.len()
    }
}

fn valid_id(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|id| !id.is_empty() && NodeKind::of(id) == NodeKind::User)
}

type CandidateCounts = HashMap<(String, String), u64>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FriendRecommender {
    top_n: Option<usize>,
}

impl FriendRecommender {
    pub fn new(top_n: Option<usize>) -> Self {
        Self { top_n }
    }

    /// Scores every `(u, c)` with `c` two follow-hops from `u`, `c != u` and
    /// `u` not already following `c`. The strength is the number of distinct
    /// intermediaries. Output is ordered by person, strength descending,
    /// then candidate id.
    pub fn recommend(&self, graph: &FollowGraph) -> Vec<Recommendation> {
        let users: Vec<(&String, &BTreeSet<String>)> = graph.follows.iter().collect();

        let counts = users
            .par_iter()
            .fold(CandidateCounts::new, |mut acc, (user, followed)| {
                for intermediate in followed.iter() {
                    let Some(second_hop) = graph.follows_of(intermediate) else {
                        continue;
                    };
                    for candidate in second_hop {
                        if candidate != *user && !followed.contains(candidate) {
                            *acc.entry(((*user).clone(), candidate.clone()))
                                .or_insert(0) += 1;
                        }
                    }
                }
                acc
            })
            .reduce(CandidateCounts::new, merge_counts);

        let mut out: Vec<Recommendation> = counts
            .into_iter()
            .map(|((person, candidate), strength)| Recommendation::new(person, candidate, strength))
            .collect();
        out.sort_by(recommendation_order);

        if let Some(n) = self.top_n {
            let mut kept = 0usize;
            let mut current: Option<String> = None;
            out.retain(|rec| {
                if current.as_deref() != Some(rec.person.as_str()) {
                    current = Some(rec.person.clone());
                    kept = 0;
                }
                kept += 1;
                kept <= n
            });
        }

        info!(
            "Generated {} recommendations for {} users",
            out.len(),
            graph.user_count()
        );
        out
    }
}

fn merge_counts(mut a: CandidateCounts, b: CandidateCounts) -> CandidateCounts {
    if a.len() < b.len() {
        return merge_counts(b, a);
    }
    for (key, count) in b {
        *a.entry(key).or_insert(0) += count;
    }
    a
}

fn recommendation_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    a.person
        .cmp(&b.person)
        .then_with(|| b.strength.cmp(&a.strength))
        .then_with(|| a.recommendation.cmp(&b.recommendation))
}
