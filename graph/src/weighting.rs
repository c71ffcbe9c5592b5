//! Per-source outgoing edge weights.
//!
//! Post and hashtag nodes spread their mass uniformly over their outgoing
//! edges. User nodes split a fixed budget across the three neighbor
//! categories and then evenly within each category. A category the user has
//! no neighbors in keeps its budget under [`UnallocatedBudget::Leave`], so the
//! user's outgoing weights can sum to less than 1.0.

use crate::builder::EdgeSet;
use rayon::prelude::*;
use socialrank_core::config::{ConfigValidationError, UnallocatedBudget, UserBudget};
use socialrank_core::error::{ErrorCode, SocialRankError};
use socialrank_core::model::{NodeId, NodeKind, WeightedEdge};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum WeightError {
    #[error("invalid user budget: {0}")]
    InvalidBudget(#[from] ConfigValidationError),
    #[error("edge {from} -> {to} has weight {weight} outside (0, 1]")]
    InvalidWeight { from: NodeId, to: NodeId, weight: f64 },
}

impl SocialRankError for WeightError {
    fn error_code(&self) -> ErrorCode {
        match self {
            WeightError::InvalidBudget(_) => ErrorCode::InvalidArgument,
            WeightError::InvalidWeight { .. } => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CategoryCounts {
    hashtags: usize,
    posts: usize,
    users: usize,
}

impl CategoryCounts {
    fn of(destinations: &[&NodeId]) -> Self {
        let mut counts = Self::default();
        for dest in destinations {
            match dest.kind() {
                NodeKind::Hashtag => counts.hashtags += 1,
                NodeKind::Post => counts.posts += 1,
                NodeKind::User => counts.users += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeWeighter {
    budget: UserBudget,
    unallocated: UnallocatedBudget,
}

impl Default for EdgeWeighter {
    fn default() -> Self {
        Self {
            budget: UserBudget::default(),
            unallocated: UnallocatedBudget::Leave,
        }
    }
}

impl EdgeWeighter {
    pub fn new(budget: UserBudget, unallocated: UnallocatedBudget) -> Result<Self, WeightError> {
        budget.validate()?;
        Ok(Self {
            budget,
            unallocated,
        })
    }

    pub fn weigh(&self, edges: &EdgeSet) -> Result<WeightedEdgeSet, WeightError> {
        let grouped: Vec<(&NodeId, Vec<&NodeId>)> = edges.grouped_by_source().into_iter().collect();

        let per_source: Vec<Vec<WeightedEdge>> = grouped
            .par_iter()
            .map(|(source, destinations)| self.weigh_source(source, destinations))
            .collect::<Result<_, _>>()?;

        let edges: Vec<WeightedEdge> = per_source.into_iter().flatten().collect();
        debug!("Weighted {} edges", edges.len());
        Ok(WeightedEdgeSet { edges })
    }

    fn weigh_source(
        &self,
        source: &NodeId,
        destinations: &[&NodeId],
    ) -> Result<Vec<WeightedEdge>, WeightError> {
        let mut out = Vec::with_capacity(destinations.len());
        let counts = CategoryCounts::of(destinations);
        let budget = self.effective_budget(counts);

        for dest in destinations {
            let weight = match source.kind() {
                NodeKind::Hashtag | NodeKind::Post => 1.0 / destinations.len() as f64,
                NodeKind::User => match dest.kind() {
                    NodeKind::Hashtag => budget.hashtag / counts.hashtags as f64,
                    NodeKind::Post => budget.post / counts.posts as f64,
                    NodeKind::User => budget.user / counts.users as f64,
                },
            };

            // A zero-budget category carries no mass.
            if weight == 0.0 {
                continue;
            }
            if !weight.is_finite() || weight < 0.0 || weight > 1.0 + 1e-12 {
                return Err(WeightError::InvalidWeight {
                    from: source.clone(),
                    to: (*dest).clone(),
                    weight,
                });
            }

            out.push(WeightedEdge {
                source: source.clone(),
                target: (*dest).clone(),
                weight,
            });
        }

        Ok(out)
    }

    fn effective_budget(&self, counts: CategoryCounts) -> UserBudget {
        let present = UserBudget {
            hashtag: if counts.hashtags > 0 { self.budget.hashtag } else { 0.0 },
            post: if counts.posts > 0 { self.budget.post } else { 0.0 },
            user: if counts.users > 0 { self.budget.user } else { 0.0 },
        };

        match self.unallocated {
            UnallocatedBudget::Leave => present,
            UnallocatedBudget::Redistribute => {
                let allocated = present.total();
                if allocated <= f64::EPSILON {
                    return present;
                }
                let scale = self.budget.total() / allocated;
                UserBudget {
                    hashtag: present.hashtag * scale,
                    post: present.post * scale,
                    user: present.user * scale,
                }
            }
        }
    }
}

/// Weighted edges, immutable for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedEdgeSet {
    edges: Vec<WeightedEdge>,
}

impl WeightedEdgeSet {
    pub fn from_edges(edges: Vec<WeightedEdge>) -> Self {
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedEdge> {
        self.edges.iter()
    }

    /// Sum of outgoing weights for every source node.
    pub fn out_weight_sums(&self) -> BTreeMap<&NodeId, f64> {
        let mut sums: BTreeMap<&NodeId, f64> = BTreeMap::new();
        for edge in &self.edges {
            *sums.entry(&edge.source).or_insert(0.0) += edge.weight;
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialrank_core::model::Edge;

    fn edges(pairs: &[(NodeId, NodeId)]) -> EdgeSet {
        EdgeSet::from_edges(
            pairs
                .iter()
                .map(|(a, b)| Edge::new(a.clone(), b.clone()))
                .collect(),
        )
    }

    fn weight_of(set: &WeightedEdgeSet, source: &NodeId, target: &NodeId) -> f64 {
        set.iter()
            .filter(|e| &e.source == source && &e.target == target)
            .map(|e| e.weight)
            .sum()
    }

    #[test]
    fn test_user_budget_split_per_category() {
        let u1 = NodeId::user("u1");
        let set = edges(&[
            (u1.clone(), NodeId::user("u2")),
            (u1.clone(), NodeId::user("u3")),
            (u1.clone(), NodeId::post("p1")),
            (u1.clone(), NodeId::hashtag("a")),
            (u1.clone(), NodeId::hashtag("b")),
            (u1.clone(), NodeId::hashtag("c")),
        ]);
        let weighted = EdgeWeighter::default().weigh(&set).unwrap();

        assert!((weight_of(&weighted, &u1, &NodeId::user("u2")) - 0.15).abs() < 1e-12);
        assert!((weight_of(&weighted, &u1, &NodeId::post("p1")) - 0.4).abs() < 1e-12);
        assert!((weight_of(&weighted, &u1, &NodeId::hashtag("a")) - 0.1).abs() < 1e-12);
        assert!((weighted.out_weight_sums()[&u1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_post_and_hashtag_sources_are_uniform() {
        let p1 = NodeId::post("p1");
        let tag = NodeId::hashtag("rust");
        let set = edges(&[
            (p1.clone(), NodeId::user("u1")),
            (p1.clone(), NodeId::hashtag("rust")),
            (p1.clone(), NodeId::hashtag("go")),
            (tag.clone(), NodeId::post("p1")),
        ]);
        let weighted = EdgeWeighter::default().weigh(&set).unwrap();

        assert!((weight_of(&weighted, &p1, &NodeId::user("u1")) - 1.0 / 3.0).abs() < 1e-12);
        assert!((weight_of(&weighted, &tag, &p1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_category_budget_left_unallocated() {
        let u1 = NodeId::user("u1");
        let set = edges(&[
            (u1.clone(), NodeId::user("u2")),
            (u1.clone(), NodeId::post("p1")),
        ]);
        let weighted = EdgeWeighter::default().weigh(&set).unwrap();
        assert!((weighted.out_weight_sums()[&u1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_missing_category_budget_redistributed() {
        let u1 = NodeId::user("u1");
        let set = edges(&[
            (u1.clone(), NodeId::user("u2")),
            (u1.clone(), NodeId::post("p1")),
        ]);
        let weighter =
            EdgeWeighter::new(UserBudget::default(), UnallocatedBudget::Redistribute).unwrap();
        let weighted = weighter.weigh(&set).unwrap();

        assert!((weighted.out_weight_sums()[&u1] - 1.0).abs() < 1e-12);
        assert!((weight_of(&weighted, &u1, &NodeId::post("p1")) - 0.4 / 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_negative_budget_is_fatal() {
        let budget = UserBudget {
            hashtag: 0.3,
            post: -0.4,
            user: 0.3,
        };
        let err = EdgeWeighter::new(budget, UnallocatedBudget::Leave).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_duplicate_edges_each_get_a_share() {
        let u1 = NodeId::user("u1");
        let p1 = NodeId::post("p1");
        let set = edges(&[(u1.clone(), p1.clone()), (u1.clone(), p1.clone())]);
        let weighted = EdgeWeighter::default().weigh(&set).unwrap();

        assert_eq!(weighted.len(), 2);
        assert!((weight_of(&weighted, &u1, &p1) - 0.4).abs() < 1e-12);
    }
}
