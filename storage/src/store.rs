//! Output sinks for `post_rankings` and `recommendations`.
//!
//! Both tables are upserts: a row whose key already exists overwrites the
//! stored weight or strength.

use crate::wal::{Wal, WalError};
use async_trait::async_trait;
use dashmap::DashMap;
use rkyv::ser::{serializers::AllocSerializer, Serializer};
use rkyv::{Archive, Deserialize, Serialize};
use socialrank_core::error::{ErrorCode, SocialRankError};
use socialrank_core::model::{FeedEntry, Recommendation};
use std::path::Path;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("Serialization error")]
    Serialization,
}

impl SocialRankError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Wal(inner) => inner.error_code(),
            StoreError::Serialization => ErrorCode::Internal,
        }
    }
}

#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Upserts keyed by `(user_id, post_id)`; returns the number of rows written.
    async fn upsert_post_rankings(&self, entries: &[FeedEntry]) -> Result<usize, StoreError>;

    /// Upserts keyed by `(person, recommendation)`; returns the number of rows written.
    async fn upsert_recommendations(&self, recs: &[Recommendation]) -> Result<usize, StoreError>;

    /// A user's ranked posts, heaviest first.
    async fn post_rankings_for(&self, user_id: &str) -> Vec<FeedEntry>;

    /// A person's recommendations, strongest first.
    async fn recommendations_for(&self, person: &str) -> Vec<Recommendation>;

    async fn post_ranking_count(&self) -> usize;

    async fn recommendation_count(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    post_rankings: DashMap<(String, String), f64>,
    recommendations: DashMap<(String, String), u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_post_rankings(&self, entries: &[FeedEntry]) {
        for entry in entries {
            self.post_rankings.insert(entry.key(), entry.weight);
        }
    }

    fn apply_recommendations(&self, recs: &[Recommendation]) {
        for rec in recs {
            self.recommendations.insert(rec.key(), rec.strength);
        }
    }

    fn rankings_for(&self, user_id: &str) -> Vec<FeedEntry> {
        let mut out: Vec<FeedEntry> = self
            .post_rankings
            .iter()
            .filter(|item| item.key().0 == user_id)
            .map(|item| FeedEntry::new(item.key().0.clone(), item.key().1.clone(), *item.value()))
            .collect();
        out.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        out
    }

    fn recs_for(&self, person: &str) -> Vec<Recommendation> {
        let mut out: Vec<Recommendation> = self
            .recommendations
            .iter()
            .filter(|item| item.key().0 == person)
            .map(|item| Recommendation::new(item.key().0.clone(), item.key().1.clone(), *item.value()))
            .collect();
        out.sort_by(|a, b| {
            b.strength
                .cmp(&a.strength)
                .then_with(|| a.recommendation.cmp(&b.recommendation))
        });
        out
    }
}

#[async_trait]
impl RankingStore for MemoryStore {
    async fn upsert_post_rankings(&self, entries: &[FeedEntry]) -> Result<usize, StoreError> {
        self.apply_post_rankings(entries);
        Ok(entries.len())
    }

    async fn upsert_recommendations(&self, recs: &[Recommendation]) -> Result<usize, StoreError> {
        self.apply_recommendations(recs);
        Ok(recs.len())
    }

    async fn post_rankings_for(&self, user_id: &str) -> Vec<FeedEntry> {
        self.rankings_for(user_id)
    }

    async fn recommendations_for(&self, person: &str) -> Vec<Recommendation> {
        self.recs_for(person)
    }

    async fn post_ranking_count(&self) -> usize {
        self.post_rankings.len()
    }

    async fn recommendation_count(&self) -> usize {
        self.recommendations.len()
    }
}

/// WAL entry types; one entry per upsert batch.
#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
#[archive(check_bytes)]
pub enum WalEntry {
    PostRankings(Vec<FeedEntry>),
    Recommendations(Vec<Recommendation>),
}

/// In-memory tables made durable by a write-ahead log that is replayed on open.
pub struct WalStore {
    wal: Mutex<Wal>,
    tables: MemoryStore,
}

impl WalStore {
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut wal = Wal::open(&wal_path).await?;
        let tables = MemoryStore::new();

        let last_lsn = wal
            .replay(|_lsn, data| {
                let archived = rkyv::check_archived_root::<WalEntry>(&data[..])
                    .map_err(|_| WalError::CorruptEntry)?;
                let entry: WalEntry = archived
                    .deserialize(&mut rkyv::Infallible)
                    .map_err(|_| WalError::CorruptEntry)?;
                match entry {
                    WalEntry::PostRankings(entries) => tables.apply_post_rankings(&entries),
                    WalEntry::Recommendations(recs) => tables.apply_recommendations(&recs),
                }
                Ok(())
            })
            .await?;

        info!(
            "Opened ranking store at LSN {} ({} rankings, {} recommendations)",
            last_lsn,
            tables.post_rankings.len(),
            tables.recommendations.len()
        );

        Ok(Self {
            wal: Mutex::new(wal),
            tables,
        })
    }

    async fn log(&self, entry: &WalEntry) -> Result<u64, StoreError> {
        let bytes = serialize_wal_entry(entry)?;
        let mut wal = self.wal.lock().await;
        let lsn = wal.append(&bytes).await?;
        wal.flush().await?;
        Ok(lsn)
    }
}

#[async_trait]
impl RankingStore for WalStore {
    async fn upsert_post_rankings(&self, entries: &[FeedEntry]) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.log(&WalEntry::PostRankings(entries.to_vec())).await?;
        self.tables.apply_post_rankings(entries);
        Ok(entries.len())
    }

    async fn upsert_recommendations(&self, recs: &[Recommendation]) -> Result<usize, StoreError> {
        if recs.is_empty() {
            return Ok(0);
        }
        self.log(&WalEntry::Recommendations(recs.to_vec())).await?;
        self.tables.apply_recommendations(recs);
        Ok(recs.len())
    }

    async fn post_rankings_for(&self, user_id: &str) -> Vec<FeedEntry> {
        self.tables.rankings_for(user_id)
    }

    async fn recommendations_for(&self, person: &str) -> Vec<Recommendation> {
        self.tables.recs_for(person)
    }

    async fn post_ranking_count(&self) -> usize {
        self.tables.post_rankings.len()
    }

    async fn recommendation_count(&self) -> usize {
        self.tables.recommendations.len()
    }
}

fn serialize_wal_entry(entry: &WalEntry) -> Result<Vec<u8>, StoreError> {
    let mut serializer = AllocSerializer::<1024>::default();
    serializer
        .serialize_value(entry)
        .map_err(|_| StoreError::Serialization)?;
    Ok(serializer.into_serializer().into_inner().to_vec())
}
