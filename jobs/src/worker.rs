use crate::queue::JobEnvelope;
use crate::runner::process_job;
use socialrank_core::metrics::RunMetricsCollector;
use std::sync::Arc;
use storage::RankingStore;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct Worker {
    receiver: mpsc::Receiver<JobEnvelope>,
    store: Arc<dyn RankingStore>,
    metrics: RunMetricsCollector,
}

impl Worker {
    pub fn new(
        receiver: mpsc::Receiver<JobEnvelope>,
        store: Arc<dyn RankingStore>,
        metrics: RunMetricsCollector,
    ) -> Self {
        Self {
            receiver,
            store,
            metrics,
        }
    }

    pub async fn run(mut self) {
        info!("Worker started");
        while let Some(JobEnvelope { job, reply }) = self.receiver.recv().await {
            let kind = job.kind();
            info!("Processing {} job", kind);
            let result = process_job(job, self.store.as_ref(), &self.metrics).await;
            if let Err(e) = &result {
                error!("Job {} failed: {}", kind, e);
            }
            if reply.send(result).is_err() {
                warn!("Submitter of {} job went away before the reply", kind);
            }
        }
        info!("Worker stopped");
    }
}
