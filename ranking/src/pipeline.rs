//! End-to-end entry points: relations in, sink rows out.

use crate::adsorption::{AdsorptionEngine, ConvergenceStatus, RunControl};
use crate::error::RankingError;
use crate::friends::{FollowGraph, FriendRecommender};
use crate::topk::TopKExtractor;
use graph::{BuildReport, EdgeWeighter, GraphBuilder, GraphIndex};
use socialrank_core::config::RankingConfig;
use socialrank_core::model::{FeedEntry, Recommendation};
use socialrank_core::relations::RelationSnapshot;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedRanking {
    pub entries: Vec<FeedEntry>,
    pub report: BuildReport,
    pub status: ConvergenceStatus,
    pub generations: usize,
    pub deltas: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRecommendations {
    pub entries: Vec<Recommendation>,
    pub malformed: u64,
}

pub struct FeedRanker {
    config: RankingConfig,
    weighter: EdgeWeighter,
}

impl FeedRanker {
    pub fn new(config: RankingConfig) -> Result<Self, RankingError> {
        config.validate()?;
        let weighter = EdgeWeighter::new(config.user_budget, config.unallocated)?;
        Ok(Self { config, weighter })
    }

    pub fn rank(&self, snapshot: &RelationSnapshot) -> Result<FeedRanking, RankingError> {
        self.rank_with_control(snapshot, &RunControl::from_timeout_ms(self.config.timeout_ms))
    }

    pub fn rank_with_control(
        &self,
        snapshot: &RelationSnapshot,
        control: &RunControl,
    ) -> Result<FeedRanking, RankingError> {
        let (edges, report) = GraphBuilder::from_snapshot(snapshot);
        let weighted = self.weighter.weigh(&edges)?;
        let index = GraphIndex::build(&weighted);

        let engine = AdsorptionEngine::new(self.config.clone());
        let outcome = engine.run_with_control(&index, control)?;
        let entries = TopKExtractor::new(self.config.top_n).extract(&outcome.labels);

        info!(
            "Ranked {} feed entries after {} generations ({:?})",
            entries.len(),
            outcome.generations,
            outcome.status
        );

        Ok(FeedRanking {
            entries,
            report,
            status: outcome.status,
            generations: outcome.generations,
            deltas: outcome.deltas,
        })
    }
}

pub fn recommend_friends(snapshot: &RelationSnapshot, top_n: Option<usize>) -> FriendRecommendations {
    let (graph, malformed) = FollowGraph::from_rows(&snapshot.friends);
    let entries = FriendRecommender::new(top_n).recommend(&graph);
    FriendRecommendations { entries, malformed }
}
