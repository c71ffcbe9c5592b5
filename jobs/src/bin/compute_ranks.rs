use jobs::{Job, JobRunner, LocalRunner, RemoteRunner};
use socialrank_core::config::{AppConfig, RunnerMode};
use socialrank_core::metrics::RunMetricsCollector;
use socialrank_core::relations::RelationSnapshot;
use std::sync::Arc;
use storage::{MemoryStore, RankingStore, WalStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    socialrank_core::init_tracing();

    let config = AppConfig::load()?;
    info!("Loading relations from {}", config.input.snapshot_path);
    let snapshot = RelationSnapshot::load(&config.input.snapshot_path)?;

    let store: Arc<dyn RankingStore> = match &config.storage.wal_path {
        Some(path) => Arc::new(WalStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let metrics = RunMetricsCollector::new(100);

    let (runner, worker) = match config.runner.mode {
        RunnerMode::Local => (
            Box::new(LocalRunner::new(store.clone(), metrics.clone())) as Box<dyn JobRunner>,
            None,
        ),
        RunnerMode::Remote => {
            let (runner, handle) =
                RemoteRunner::spawn(store.clone(), metrics.clone(), config.runner.queue_capacity);
            (Box::new(runner) as Box<dyn JobRunner>, Some(handle))
        }
    };

    let feed = runner
        .run(Job::RankFeed {
            snapshot: snapshot.clone(),
            config: config.ranking.clone(),
        })
        .await?;
    info!(
        "Feed ranking: {:?} after {} generations",
        feed.status,
        feed.generations.unwrap_or_default()
    );

    runner
        .run(Job::RecommendFriends {
            snapshot,
            top_n: config.ranking.top_n,
        })
        .await?;

    drop(runner);
    if let Some(handle) = worker {
        handle.await?;
    }

    let summary = metrics.snapshot();
    info!(
        "Done: {} rows read ({} malformed), {} post rankings and {} recommendations stored",
        summary.rows_read,
        summary.malformed_rows,
        store.post_ranking_count().await,
        store.recommendation_count().await
    );
    Ok(())
}
