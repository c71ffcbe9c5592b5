use graph::{EdgeWeighter, GraphBuilder, GraphIndex};
use ranking::adsorption::{initial_labels, propagate};
use ranking::{
    AdsorptionEngine, ConvergencePolicy, ConvergenceStatus, Decision, RankingError, RunControl,
    StopReason, TopKExtractor,
};
use socialrank_core::config::{CancelPolicy, RankingConfig};
use socialrank_core::model::{NodeId, NodeKind};
use socialrank_core::relations::{
    FriendRow, HashtagInterestRow, LikeRow, PostHashtagRow, RelationSnapshot,
};

const EPS: f64 = 1e-9;

fn index_for(snapshot: &RelationSnapshot) -> GraphIndex {
    let (edges, _) = GraphBuilder::from_snapshot(snapshot);
    let weighted = EdgeWeighter::default().weigh(&edges).unwrap();
    GraphIndex::build(&weighted)
}

/// u1 follows u2 and likes p1.
fn scenario_a() -> GraphIndex {
    index_for(&RelationSnapshot {
        friends: vec![FriendRow::new("u1", "u2")],
        likes: vec![LikeRow::new("u1", "p1")],
        ..Default::default()
    })
}

fn triangle() -> GraphIndex {
    index_for(&RelationSnapshot {
        friends: vec![
            FriendRow::new("u1", "u2"),
            FriendRow::new("u2", "u3"),
            FriendRow::new("u3", "u1"),
        ],
        ..Default::default()
    })
}

fn social_network() -> GraphIndex {
    index_for(&RelationSnapshot {
        friends: vec![
            FriendRow::new("alice", "bob"),
            FriendRow::new("bob", "carol"),
            FriendRow::new("carol", "alice"),
            FriendRow::new("dave", "carol"),
        ],
        likes: vec![
            LikeRow::new("alice", "1"),
            LikeRow::new("bob", "1"),
            LikeRow::new("bob", "2"),
            LikeRow::new("dave", "3"),
        ],
        hashtags: vec![
            HashtagInterestRow::new("alice", "rust,music"),
            HashtagInterestRow::new("dave", "travel"),
        ],
        posts: vec![
            PostHashtagRow::new("1", "rust"),
            PostHashtagRow::new("2", "music"),
            PostHashtagRow::new("3", "travel,music"),
        ],
    })
}

#[test]
fn test_scenario_a_first_generation_contributions() {
    let graph = scenario_a();
    let contributions = propagate(&graph, &initial_labels(&graph));

    let u1 = NodeId::user("u1");
    let u2 = NodeId::user("u2");
    let p1 = NodeId::post("p1");

    assert!((contributions.weight(&p1, &u1) - 0.4).abs() < EPS);
    assert_eq!(contributions.labels_of(&p1).len(), 1);
    // u1 -> u2 moves u1's label; u2's own label travels back to u1.
    assert!((contributions.weight(&u2, &u1) - 0.3).abs() < EPS);
    assert_eq!(contributions.weight(&u2, &u2), 0.0);
    assert!((contributions.weight(&u1, &u2) - 0.3).abs() < EPS);
}

#[test]
fn test_scenario_a_first_generation_is_normalized() {
    let graph = scenario_a();
    let outcome = AdsorptionEngine::new(RankingConfig::new(0.0, 1))
        .run(&graph)
        .unwrap();

    assert_eq!(outcome.generations, 1);
    assert!((outcome.labels.weight(&NodeId::post("p1"), &NodeId::user("u1")) - 1.0).abs() < EPS);
}

#[test]
fn test_i_max_zero_returns_initial_labels() {
    let graph = social_network();
    let outcome = AdsorptionEngine::new(RankingConfig::new(0.01, 0))
        .run(&graph)
        .unwrap();

    assert_eq!(outcome.generations, 0);
    assert!(outcome.deltas.is_empty());
    assert_eq!(outcome.labels, initial_labels(&graph));

    for (node, label) in outcome.labels.iter() {
        assert_eq!(node.kind(), NodeKind::User);
        assert_eq!(&label.origin, node);
        assert_eq!(label.weight, 1.0);
    }
    let user_count = graph.user_indices().count();
    assert_eq!(outcome.labels.node_count(), user_count);
}

#[test]
fn test_initial_state_has_no_feed_entries() {
    let graph = social_network();
    let entries = TopKExtractor::default().extract(&initial_labels(&graph));
    assert!(entries.is_empty());
}

#[test]
fn test_weight_conservation_per_node() {
    let graph = social_network();
    let outcome = AdsorptionEngine::new(RankingConfig::new(1e-6, 15))
        .run(&graph)
        .unwrap();

    assert!(!outcome.labels.is_empty());
    for node in graph.nodes() {
        let sum = outcome.labels.node_weight_sum(node);
        assert!(
            (sum - 1.0).abs() < EPS || sum == 0.0,
            "{} holds {} units of mass",
            node,
            sum
        );
    }
}

#[test]
fn test_only_users_originate_labels() {
    let graph = social_network();
    let outcome = AdsorptionEngine::new(RankingConfig::new(1e-6, 10))
        .run(&graph)
        .unwrap();
    assert!(outcome
        .labels
        .iter()
        .all(|(_, label)| label.origin.kind() == NodeKind::User));
}

#[test]
fn test_triangle_deltas_are_non_increasing_and_converge() {
    let graph = triangle();
    let outcome = AdsorptionEngine::new(RankingConfig::new(1e-6, 60))
        .run(&graph)
        .unwrap();

    assert_eq!(outcome.status, ConvergenceStatus::Converged);
    assert!(outcome.converged());
    assert!((outcome.deltas[0] - 1.0).abs() < EPS);
    assert!((outcome.deltas[1] - 0.5).abs() < EPS);
    for pair in outcome.deltas.windows(2) {
        assert!(pair[1] <= pair[0] + EPS, "deltas grew: {:?}", outcome.deltas);
    }
    assert!(outcome.last_delta().unwrap() < 1e-6);

    let u1 = NodeId::user("u1");
    for origin in ["u1", "u2", "u3"] {
        let weight = outcome.labels.weight(&u1, &NodeId::user(origin));
        assert!((weight - 1.0 / 3.0).abs() < 1e-5);
    }
}

#[test]
fn test_oscillating_graph_hits_iteration_cap() {
    let graph = index_for(&RelationSnapshot {
        friends: vec![FriendRow::new("u1", "u2")],
        ..Default::default()
    });
    let outcome = AdsorptionEngine::new(RankingConfig::new(0.1, 5))
        .run(&graph)
        .unwrap();

    assert_eq!(outcome.status, ConvergenceStatus::IterationCapReached);
    assert_eq!(outcome.generations, 5);
    assert_eq!(outcome.deltas.len(), 5);
    // Odd generation count: labels are swapped.
    assert!((outcome.labels.weight(&NodeId::user("u2"), &NodeId::user("u1")) - 1.0).abs() < EPS);
}

#[test]
fn test_empty_graph_short_circuits() {
    let graph = index_for(&RelationSnapshot::default());
    let outcome = AdsorptionEngine::new(RankingConfig::default())
        .run(&graph)
        .unwrap();

    assert_eq!(outcome.status, ConvergenceStatus::EmptyGraph);
    assert!(outcome.labels.is_empty());
    assert_eq!(outcome.generations, 0);
}

#[test]
fn test_cancelled_run_returns_last_generation() {
    let graph = triangle();
    let control = RunControl::new();
    control.cancel();

    let outcome = AdsorptionEngine::new(RankingConfig::new(1e-6, 60))
        .run_with_control(&graph, &control)
        .unwrap();

    assert_eq!(outcome.status, ConvergenceStatus::Cancelled);
    assert_eq!(outcome.generations, 0);
    assert_eq!(outcome.labels, initial_labels(&graph));
}

#[test]
fn test_cancelled_run_can_discard_results() {
    let graph = triangle();
    let control = RunControl::new();
    control.cancel();

    let config = RankingConfig {
        cancel_policy: CancelPolicy::Discard,
        ..RankingConfig::new(1e-6, 60)
    };
    let err = AdsorptionEngine::new(config)
        .run_with_control(&graph, &control)
        .unwrap_err();

    assert!(matches!(err, RankingError::Cancelled { generations: 0 }));
}

struct FixedGenerations(usize);

impl ConvergencePolicy for FixedGenerations {
    fn decide(&self, iteration: usize, _delta: f64, _d_max: f64, _i_max: usize) -> Decision {
        if iteration + 1 >= self.0 {
            Decision::Stop(StopReason::IterationCap)
        } else {
            Decision::Continue
        }
    }
}

#[test]
fn test_convergence_policy_is_pluggable() {
    let graph = triangle();
    let engine = AdsorptionEngine::with_policy(RankingConfig::new(10.0, 100), FixedGenerations(3));
    let outcome = engine.run(&graph).unwrap();

    assert_eq!(outcome.generations, 3);
    assert_eq!(outcome.status, ConvergenceStatus::IterationCapReached);
}
