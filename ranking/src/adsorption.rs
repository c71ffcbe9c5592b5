//! Adsorption label propagation.
//!
//! Every user node starts with its own label at weight 1.0. Each generation
//! pushes every label along the weighted out-edges, sums the contributions
//! per `(node, origin)`, normalizes each node to unit mass and measures the
//! largest per-label change against the previous generation.
//!
//! A generation is computed from the previous one only: every node pulls
//! from its in-neighbors, so nodes are processed in parallel without shared
//! mutable state and the new generation replaces the old one as a whole.

use crate::convergence::{ConvergencePolicy, Decision, MaxDeltaPolicy, StopReason};
use crate::error::RankingError;
use graph::GraphIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use socialrank_core::config::{CancelPolicy, RankingConfig};
use socialrank_core::model::{Label, NodeId, NodeKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Labels of one node, sorted by origin index.
type NodeLabels = Vec<(u32, f64)>;

/// One immutable generation, indexed by node.
#[derive(Debug, Clone)]
struct Generation(Vec<NodeLabels>);

impl Generation {
    fn initial(graph: &GraphIndex) -> Self {
        let labels = (0..graph.node_count() as u32)
            .map(|idx| match graph.kind(idx) {
                NodeKind::User => vec![(idx, 1.0)],
                NodeKind::Post | NodeKind::Hashtag => Vec::new(),
            })
            .collect();
        Self(labels)
    }

    fn from_label_set(graph: &GraphIndex, labels: &LabelSet) -> Self {
        let mut out = vec![NodeLabels::new(); graph.node_count()];
        for (node, label) in labels.iter() {
            let (Some(node_idx), Some(origin_idx)) =
                (graph.index_of(node), graph.index_of(&label.origin))
            else {
                continue;
            };
            out[node_idx as usize].push((origin_idx, label.weight));
        }
        for node_labels in &mut out {
            node_labels.sort_unstable_by_key(|(origin, _)| *origin);
        }
        Self(out)
    }

    /// Steps 1 and 2: propagate along weighted edges and sum per origin.
    fn propagate(&self, graph: &GraphIndex) -> Self {
        let labels = (0..graph.node_count() as u32)
            .into_par_iter()
            .map(|idx| {
                let (sources, weights) = graph.in_edges(idx);
                let mut acc: HashMap<u32, f64> = HashMap::new();
                for (&source, &edge_weight) in sources.iter().zip(weights) {
                    for &(origin, weight) in &self.0[source as usize] {
                        let contribution = weight * edge_weight;
                        if contribution != 0.0 {
                            *acc.entry(origin).or_insert(0.0) += contribution;
                        }
                    }
                }
                let mut node_labels: NodeLabels = acc.into_iter().collect();
                node_labels.sort_unstable_by_key(|(origin, _)| *origin);
                node_labels
            })
            .collect();
        Self(labels)
    }

    /// Step 3: scale each node's labels to unit mass.
    fn normalize(mut self) -> Self {
        self.0.par_iter_mut().for_each(|node_labels| {
            let sum: f64 = node_labels.iter().map(|(_, w)| *w).sum();
            if sum > 0.0 {
                for (_, weight) in node_labels.iter_mut() {
                    *weight /= sum;
                }
            }
        });
        self
    }

    /// Step 4: largest `|w_next - w_prev|` over every `(node, origin)` present
    /// in either generation; an absent label counts as 0.
    fn max_delta(&self, next: &Generation) -> f64 {
        self.0
            .par_iter()
            .zip(next.0.par_iter())
            .map(|(prev, next)| label_delta(prev, next))
            .reduce(|| 0.0, f64::max)
    }

    fn into_label_set(self, graph: &GraphIndex) -> LabelSet {
        let mut nodes = BTreeMap::new();
        for (idx, node_labels) in self.0.into_iter().enumerate() {
            if node_labels.is_empty() {
                continue;
            }
            let labels = node_labels
                .into_iter()
                .map(|(origin, weight)| Label {
                    origin: graph.node(origin).clone(),
                    weight,
                })
                .collect();
            nodes.insert(graph.node(idx as u32).clone(), labels);
        }
        LabelSet { nodes }
    }
}

/// Merge walk over two origin-sorted label lists.
fn label_delta(prev: &[(u32, f64)], next: &[(u32, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut max = 0.0f64;
    while i < prev.len() || j < next.len() {
        let diff = match (prev.get(i), next.get(j)) {
            (Some(&(a, wa)), Some(&(b, wb))) if a == b => {
                i += 1;
                j += 1;
                (wa - wb).abs()
            }
            (Some(&(a, wa)), Some(&(b, _))) if a < b => {
                i += 1;
                wa.abs()
            }
            (Some(_), Some(&(_, wb))) => {
                j += 1;
                wb.abs()
            }
            (Some(&(_, wa)), None) => {
                i += 1;
                wa.abs()
            }
            (None, Some(&(_, wb))) => {
                j += 1;
                wb.abs()
            }
            (None, None) => break,
        };
        max = max.max(diff);
    }
    max
}

/// Labels of every reached node after a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelSet {
    nodes: BTreeMap<NodeId, Vec<Label>>,
}

impl LabelSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn label_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    pub fn labels_of(&self, node: &NodeId) -> &[Label] {
        self.nodes.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn weight(&self, node: &NodeId, origin: &NodeId) -> f64 {
        self.labels_of(node)
            .iter()
            .find(|label| &label.origin == origin)
            .map(|label| label.weight)
            .unwrap_or(0.0)
    }

    pub fn node_weight_sum(&self, node: &NodeId) -> f64 {
        self.labels_of(node).iter().map(|label| label.weight).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Every `(holding node, label)` pair, ordered by node.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Label)> {
        self.nodes
            .iter()
            .flat_map(|(node, labels)| labels.iter().map(move |label| (node, label)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    Converged,
    /// `i_max` was hit before the delta fell below `d_max`.
    IterationCapReached,
    /// No edges; nothing to propagate.
    EmptyGraph,
    /// Stopped between generations; the labels are the last completed generation.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdsorptionOutcome {
    pub labels: LabelSet,
    /// Completed transitions beyond the initial state.
    pub generations: usize,
    pub status: ConvergenceStatus,
    /// Delta of every completed generation, in order.
    pub deltas: Vec<f64>,
}

impl AdsorptionOutcome {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    pub fn last_delta(&self) -> Option<f64> {
        self.deltas.last().copied()
    }
}

/// External stop signals, honoured only between generations.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) => Self::with_timeout(Duration::from_millis(ms)),
            None => Self::new(),
        }
    }

    /// Clones share the cancellation flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

pub struct AdsorptionEngine<P = MaxDeltaPolicy> {
    config: RankingConfig,
    policy: P,
}

impl AdsorptionEngine<MaxDeltaPolicy> {
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            policy: MaxDeltaPolicy,
        }
    }
}

impl<P: ConvergencePolicy> AdsorptionEngine<P> {
    pub fn with_policy(config: RankingConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn run(&self, graph: &GraphIndex) -> Result<AdsorptionOutcome, RankingError> {
        self.run_with_control(graph, &RunControl::new())
    }

    pub fn run_with_control(
        &self,
        graph: &GraphIndex,
        control: &RunControl,
    ) -> Result<AdsorptionOutcome, RankingError> {
        if graph.is_empty() {
            info!("Empty graph, skipping propagation");
            return Ok(AdsorptionOutcome {
                labels: LabelSet::default(),
                generations: 0,
                status: ConvergenceStatus::EmptyGraph,
                deltas: Vec::new(),
            });
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            d_max = self.config.d_max,
            i_max = self.config.i_max,
            "Running adsorption"
        );

        let mut current = Generation::initial(graph);
        let mut deltas = Vec::new();

        if self.config.i_max == 0 {
            return Ok(AdsorptionOutcome {
                labels: current.into_label_set(graph),
                generations: 0,
                status: ConvergenceStatus::IterationCapReached,
                deltas,
            });
        }

        let mut iteration = 0;
        let status = loop {
            if control.is_cancelled() {
                warn!("Adsorption cancelled after {} generations", iteration);
                if self.config.cancel_policy == CancelPolicy::Discard {
                    return Err(RankingError::Cancelled {
                        generations: iteration,
                    });
                }
                break ConvergenceStatus::Cancelled;
            }

            let next = current.propagate(graph).normalize();
            let delta = current.max_delta(&next);
            current = next;
            deltas.push(delta);
            debug!(generation = iteration + 1, delta, "Generation complete");

            match self
                .policy
                .decide(iteration, delta, self.config.d_max, self.config.i_max)
            {
                Decision::Continue => iteration += 1,
                Decision::Stop(StopReason::Converged) => {
                    iteration += 1;
                    break ConvergenceStatus::Converged;
                }
                Decision::Stop(StopReason::IterationCap) => {
                    iteration += 1;
                    warn!(
                        "Adsorption hit i_max={} with delta {} >= d_max {}",
                        self.config.i_max, delta, self.config.d_max
                    );
                    break ConvergenceStatus::IterationCapReached;
                }
            }
        };

        info!(generations = iteration, ?status, "Adsorption finished");
        Ok(AdsorptionOutcome {
            labels: current.into_label_set(graph),
            generations: iteration,
            status,
            deltas,
        })
    }
}

/// The g=0 state: each user labelled with itself at weight 1.0.
pub fn initial_labels(graph: &GraphIndex) -> LabelSet {
    Generation::initial(graph).into_label_set(graph)
}

/// One propagate + aggregate step without normalization. Labels on nodes
/// or origins outside `graph` are ignored.
pub fn propagate(graph: &GraphIndex, labels: &LabelSet) -> LabelSet {
    Generation::from_label_set(graph, labels)
        .propagate(graph)
        .into_label_set(graph)
}
