use crate::queue::{ChannelJobQueue, Job, JobEnvelope, JobQueue};
use crate::worker::Worker;
use async_trait::async_trait;
use ranking::{recommend_friends, ConvergenceStatus, FeedRanker, FeedRanking, FriendRecommendations, RankingError};
use serde::Serialize;
use socialrank_core::error::{ErrorCode, SocialRankError};
use socialrank_core::metrics::RunMetricsCollector;
use std::sync::Arc;
use std::time::Instant;
use storage::{RankingStore, StoreError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("ranking failed: {0}")]
    Ranking(#[from] RankingError),
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
    #[error("job queue is closed")]
    QueueClosed,
    #[error("worker dropped the job without replying")]
    WorkerDropped,
    #[error("compute task failed: {0}")]
    Join(String),
}

impl SocialRankError for JobError {
    fn error_code(&self) -> ErrorCode {
        match self {
            JobError::Ranking(inner) => inner.error_code(),
            JobError::Store(inner) => inner.error_code(),
            JobError::QueueClosed => ErrorCode::ResourceExhausted,
            JobError::WorkerDropped | JobError::Join(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub kind: &'static str,
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub rows_written: usize,
    /// Only set for feed ranking.
    pub generations: Option<usize>,
    pub status: Option<ConvergenceStatus>,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: Job) -> Result<JobReport, JobError>;
}

enum JobOutput {
    Feed(FeedRanking),
    Friends(FriendRecommendations),
}

fn compute(job: Job) -> Result<JobOutput, RankingError> {
    match job {
        Job::RankFeed { snapshot, config } => {
            let ranking = FeedRanker::new(config)?.rank(&snapshot)?;
            Ok(JobOutput::Feed(ranking))
        }
        Job::RecommendFriends { snapshot, top_n } => {
            Ok(JobOutput::Friends(recommend_friends(&snapshot, top_n)))
        }
    }
}

/// Runs a job on the blocking pool, writes its rows to `store`, and records metrics.
pub async fn process_job(
    job: Job,
    store: &dyn RankingStore,
    metrics: &RunMetricsCollector,
) -> Result<JobReport, JobError> {
    let kind = job.kind();
    let rows_read = job.input_rows();
    let started = Instant::now();

    let output = tokio::task::spawn_blocking(move || compute(job))
        .await
        .map_err(|e| JobError::Join(e.to_string()))??;

    let report = match output {
        JobOutput::Feed(ranking) => {
            let malformed_rows = ranking.report.malformed();
            let rows_written = store.upsert_post_rankings(&ranking.entries).await?;
            metrics.record_input(rows_read, malformed_rows);
            metrics.record_rank_run(
                ranking.generations as u64,
                ranking.status == ConvergenceStatus::Converged,
                ranking.entries.len() as u64,
            );
            JobReport {
                kind,
                rows_read,
                malformed_rows,
                rows_written,
                generations: Some(ranking.generations),
                status: Some(ranking.status),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        }
        JobOutput::Friends(recs) => {
            let rows_written = store.upsert_recommendations(&recs.entries).await?;
            metrics.record_input(rows_read, recs.malformed);
            metrics.record_recommendations(recs.entries.len() as u64);
            JobReport {
                kind,
                rows_read,
                malformed_rows: recs.malformed,
                rows_written,
                generations: None,
                status: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        }
    };

    info!(
        "Job {} finished: {} rows read, {} malformed, {} written in {}ms",
        report.kind, report.rows_read, report.malformed_rows, report.rows_written, report.elapsed_ms
    );
    Ok(report)
}

/// Runs jobs in-process.
pub struct LocalRunner {
    store: Arc<dyn RankingStore>,
    metrics: RunMetricsCollector,
}

impl LocalRunner {
    pub fn new(store: Arc<dyn RankingStore>, metrics: RunMetricsCollector) -> Self {
        Self { store, metrics }
    }
}

#[async_trait]
impl JobRunner for LocalRunner {
    async fn run(&self, job: Job) -> Result<JobReport, JobError> {
        process_job(job, self.store.as_ref(), &self.metrics).await
    }
}

/// Hands jobs to a worker over a queue and waits for its reply.
pub struct RemoteRunner {
    queue: Arc<dyn JobQueue>,
}

impl RemoteRunner {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Starts a channel-backed worker. The worker exits once the runner is dropped.
    pub fn spawn(
        store: Arc<dyn RankingStore>,
        metrics: RunMetricsCollector,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Worker::new(rx, store, metrics);
        let handle = tokio::spawn(worker.run());
        (Self::new(Arc::new(ChannelJobQueue::new(tx))), handle)
    }
}

#[async_trait]
impl JobRunner for RemoteRunner {
    async fn run(&self, job: Job) -> Result<JobReport, JobError> {
        let (envelope, reply) = JobEnvelope::new(job);
        self.queue.enqueue(envelope).await?;
        reply.await.map_err(|_| JobError::WorkerDropped)?
    }
}
