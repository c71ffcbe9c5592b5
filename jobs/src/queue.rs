use crate::runner::{JobError, JobReport};
use serde::{Deserialize, Serialize};
use socialrank_core::config::RankingConfig;
use socialrank_core::relations::RelationSnapshot;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Job {
    RankFeed {
        snapshot: RelationSnapshot,
        config: RankingConfig,
    },
    RecommendFriends {
        snapshot: RelationSnapshot,
        top_n: Option<usize>,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::RankFeed { .. } => "rank_feed",
            Job::RecommendFriends { .. } => "recommend_friends",
        }
    }

    /// Relation rows the job consumes.
    pub fn input_rows(&self) -> u64 {
        match self {
            Job::RankFeed { snapshot, .. } => snapshot.row_count() as u64,
            Job::RecommendFriends { snapshot, .. } => snapshot.friends.len() as u64,
        }
    }
}

/// A job plus the channel its report is sent back on.
pub struct JobEnvelope {
    pub job: Job,
    pub reply: oneshot::Sender<Result<JobReport, JobError>>,
}

impl JobEnvelope {
    pub fn new(job: Job) -> (Self, oneshot::Receiver<Result<JobReport, JobError>>) {
        let (reply, receiver) = oneshot::channel();
        (Self { job, reply }, receiver)
    }
}

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, envelope: JobEnvelope) -> Result<(), JobError>;
}

/// In-process queue using Tokio channels
pub struct ChannelJobQueue {
    sender: mpsc::Sender<JobEnvelope>,
}

impl ChannelJobQueue {
    pub fn new(sender: mpsc::Sender<JobEnvelope>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, envelope: JobEnvelope) -> Result<(), JobError> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| JobError::QueueClosed)
    }
}
