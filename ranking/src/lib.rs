pub mod adsorption;
pub mod convergence;
pub mod error;
pub mod friends;
pub mod pipeline;
pub mod topk;

pub use adsorption::{AdsorptionEngine, AdsorptionOutcome, ConvergenceStatus, LabelSet, RunControl};
pub use convergence::{ConvergencePolicy, Decision, MaxDeltaPolicy, StopReason};
pub use error::RankingError;
pub use friends::{FollowGraph, FriendRecommender};
pub use pipeline::{recommend_friends, FeedRanker, FeedRanking, FriendRecommendations};
pub use topk::TopKExtractor;
