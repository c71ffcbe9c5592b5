use graph::Relation;
use ranking::{ConvergenceStatus, FeedRanker};
use socialrank_core::config::{RankingConfig, UserBudget};
use socialrank_core::relations::{
    FriendRow, HashtagInterestRow, LikeRow, PostHashtagRow, RelationSnapshot,
};

fn snapshot() -> RelationSnapshot {
    RelationSnapshot {
        friends: vec![
            FriendRow::new("1", "2"),
            FriendRow::new("2", "3"),
            FriendRow::new("3", "1"),
        ],
        likes: vec![
            LikeRow::new("1", "100"),
            LikeRow::new("2", "101"),
            LikeRow::new("3", "102"),
            LikeRow::new("3", "100"),
        ],
        hashtags: vec![
            HashtagInterestRow::new("1", "rust"),
            HashtagInterestRow::new("2", ""),
        ],
        posts: vec![
            PostHashtagRow::new("100", "rust"),
            PostHashtagRow::new("101", "rust,cooking"),
        ],
    }
}

#[test]
fn test_malformed_hashtag_row_is_skipped() {
    let ranker = FeedRanker::new(RankingConfig::new(1e-4, 30)).unwrap();
    let ranking = ranker.rank(&snapshot()).unwrap();

    assert_eq!(ranking.report.malformed(), 1);
    assert_eq!(ranking.report.malformed_in(Relation::Hashtags), 1);
    assert!(!ranking.entries.is_empty());
    assert!(ranking.generations >= 1);
}

#[test]
fn test_feed_entries_use_bare_ids() {
    let ranker = FeedRanker::new(RankingConfig::new(1e-4, 30)).unwrap();
    let ranking = ranker.rank(&snapshot()).unwrap();

    for entry in &ranking.entries {
        assert!(!entry.post_id.starts_with("post:"));
        assert!(["1", "2", "3"].contains(&entry.user_id.as_str()));
        assert!(entry.weight > 0.0 && entry.weight <= 1.0 + 1e-9);
    }
}

#[test]
fn test_top_n_truncates_per_user() {
    let config = RankingConfig {
        top_n: Some(1),
        ..RankingConfig::new(1e-4, 30)
    };
    let ranking = FeedRanker::new(config).unwrap().rank(&snapshot()).unwrap();

    let mut users: Vec<&str> = ranking.entries.iter().map(|e| e.user_id.as_str()).collect();
    let total = users.len();
    users.dedup();
    assert_eq!(users.len(), total);
}

#[test]
fn test_invalid_budget_is_rejected_up_front() {
    let config = RankingConfig {
        user_budget: UserBudget {
            hashtag: 0.3,
            post: 0.4,
            user: -0.3,
        },
        ..RankingConfig::default()
    };
    assert!(FeedRanker::new(config).is_err());
}

#[test]
fn test_empty_snapshot_ranks_nothing() {
    let ranking = FeedRanker::new(RankingConfig::default())
        .unwrap()
        .rank(&RelationSnapshot::default())
        .unwrap();
    assert_eq!(ranking.status, ConvergenceStatus::EmptyGraph);
    assert!(ranking.entries.is_empty());
}
