use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct RankMetrics {
    pub total_runs: u64,
    pub converged_runs: u64,
    pub generations: VecDeque<u64>,
    pub feed_entries: u64,
}

#[derive(Debug, Clone, Default)]
pub struct InputMetrics {
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub recommendations: u64,
}

/// Process-wide counters shared by the runners; cloning shares the state.
#[derive(Clone)]
pub struct RunMetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    rank_metrics: RankMetrics,
    input_metrics: InputMetrics,
    max_history: usize,
}

impl RunMetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                rank_metrics: RankMetrics::default(),
                input_metrics: InputMetrics::default(),
                max_history,
            })),
        }
    }

    // Counters stay usable even if a panicking holder poisoned the lock.
    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_input(&self, rows_read: u64, malformed_rows: u64) {
        let mut state = self.lock();
        state.input_metrics.rows_read += rows_read;
        state.input_metrics.malformed_rows += malformed_rows;
    }

    pub fn record_rank_run(&self, generations: u64, converged: bool, feed_entries: u64) {
        let mut state = self.lock();
        let max_history = state.max_history;
        let rank = &mut state.rank_metrics;
        rank.total_runs += 1;
        if converged {
            rank.converged_runs += 1;
        }
        rank.feed_entries += feed_entries;
        rank.generations.push_back(generations);
        if rank.generations.len() > max_history {
            rank.generations.pop_front();
        }
    }

    pub fn record_recommendations(&self, count: u64) {
        let mut state = self.lock();
        state.input_metrics.recommendations += count;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        let r = &state.rank_metrics;
        let i = &state.input_metrics;

        let mut sorted_generations: Vec<u64> = r.generations.iter().copied().collect();
        sorted_generations.sort_unstable();

        let convergence_rate = if r.total_runs > 0 {
            r.converged_runs as f32 / r.total_runs as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            total_runs: r.total_runs,
            convergence_rate,
            generations_p50: percentile(&sorted_generations, 50.0),
            generations_p95: percentile(&sorted_generations, 95.0),
            history_count: r.generations.len(),
            feed_entries: r.feed_entries,
            rows_read: i.rows_read,
            malformed_rows: i.malformed_rows,
            recommendations: i.recommendations,
        }
    }
}

impl Default for RunMetricsCollector {
    fn default() -> Self {
        Self::new(128)
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_runs: u64,
    pub convergence_rate: f32,
    pub generations_p50: u64,
    pub generations_p95: u64,
    pub history_count: usize,
    pub feed_entries: u64,
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub recommendations: u64,
}
