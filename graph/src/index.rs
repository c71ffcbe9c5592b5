use crate::weighting::WeightedEdgeSet;
use socialrank_core::model::{NodeId, NodeKind};
use std::collections::HashMap;

/// Dense, immutable view of a weighted edge set.
///
/// Node ids are interned to `u32` indices in sorted id order. Edges are kept
/// twice, CSR-style: grouped by source (out-adjacency) and grouped by target
/// (in-adjacency), each with a parallel weight slice.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    nodes: Vec<NodeId>,
    kinds: Vec<NodeKind>,
    lookup: HashMap<NodeId, u32>,
    out_offsets: Vec<usize>,
    out_targets: Vec<u32>,
    out_weights: Vec<f64>,
    in_offsets: Vec<usize>,
    in_sources: Vec<u32>,
    in_weights: Vec<f64>,
}

impl GraphIndex {
    pub fn build(edges: &WeightedEdgeSet) -> Self {
        let mut nodes: Vec<NodeId> = edges
            .iter()
            .flat_map(|e| [e.source.clone(), e.target.clone()])
            .collect();
        nodes.sort_unstable();
        nodes.dedup();

        let lookup: HashMap<NodeId, u32> = nodes
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx as u32))
            .collect();
        let kinds = nodes.iter().map(NodeId::kind).collect();

        let triples: Vec<(u32, u32, f64)> = edges
            .iter()
            .map(|e| (lookup[&e.source], lookup[&e.target], e.weight))
            .collect();

        let (out_offsets, out_targets, out_weights) =
            compress(nodes.len(), triples.iter().map(|&(s, t, w)| (s, t, w)));
        let (in_offsets, in_sources, in_weights) =
            compress(nodes.len(), triples.iter().map(|&(s, t, w)| (t, s, w)));

        Self {
            nodes,
            kinds,
            lookup,
            out_offsets,
            out_targets,
            out_weights,
            in_offsets,
            in_sources,
            in_weights,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: u32) -> &NodeId {
        &self.nodes[idx as usize]
    }

    pub fn kind(&self, idx: u32) -> NodeKind {
        self.kinds[idx as usize]
    }

    pub fn index_of(&self, id: &NodeId) -> Option<u32> {
        self.lookup.get(id).copied()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn user_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == NodeKind::User)
            .map(|(idx, _)| idx as u32)
    }

    /// `(targets, weights)` of the edges leaving `idx`.
    pub fn out_edges(&self, idx: u32) -> (&[u32], &[f64]) {
        let range = self.out_offsets[idx as usize]..self.out_offsets[idx as usize + 1];
        (&self.out_targets[range.clone()], &self.out_weights[range])
    }

    /// `(sources, weights)` of the edges entering `idx`.
    pub fn in_edges(&self, idx: u32) -> (&[u32], &[f64]) {
        let range = self.in_offsets[idx as usize]..self.in_offsets[idx as usize + 1];
        (&self.in_sources[range.clone()], &self.in_weights[range])
    }

    pub fn out_weight_sum(&self, idx: u32) -> f64 {
        self.out_edges(idx).1.iter().sum()
    }
}

/// Counting sort of `(key, value, weight)` triples into CSR arrays.
fn compress(
    node_count: usize,
    triples: impl Iterator<Item = (u32, u32, f64)> + Clone,
) -> (Vec<usize>, Vec<u32>, Vec<f64>) {
    let mut offsets = vec![0usize; node_count + 1];
    for (key, _, _) in triples.clone() {
        offsets[key as usize + 1] += 1;
    }
    for i in 0..node_count {
        offsets[i + 1] += offsets[i];
    }

    let total = offsets[node_count];
    let mut values = vec![0u32; total];
    let mut weights = vec![0.0f64; total];
    let mut cursor = offsets.clone();
    for (key, value, weight) in triples {
        let slot = cursor[key as usize];
        values[slot] = value;
        weights[slot] = weight;
        cursor[key as usize] += 1;
    }

    (offsets, values, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialrank_core::model::WeightedEdge;

    fn edge(source: NodeId, target: NodeId, weight: f64) -> WeightedEdge {
        WeightedEdge {
            source,
            target,
            weight,
        }
    }

    #[test]
    fn test_index_out_and_in_adjacency() {
        let u1 = NodeId::user("u1");
        let u2 = NodeId::user("u2");
        let p1 = NodeId::post("p1");
        let set = WeightedEdgeSet::from_edges(vec![
            edge(u1.clone(), u2.clone(), 0.3),
            edge(u1.clone(), p1.clone(), 0.4),
            edge(u2.clone(), u1.clone(), 0.3),
            edge(p1.clone(), u1.clone(), 1.0),
        ]);
        let index = GraphIndex::build(&set);

        assert_eq!(index.node_count(), 3);
        assert_eq!(index.edge_count(), 4);

        let i1 = index.index_of(&u1).unwrap();
        let ip = index.index_of(&p1).unwrap();
        assert_eq!(index.out_edges(i1).0.len(), 2);
        assert!((index.out_weight_sum(i1) - 0.7).abs() < 1e-12);

        let (sources, weights) = index.in_edges(ip);
        assert_eq!(sources, &[i1]);
        assert_eq!(weights, &[0.4]);
        assert_eq!(index.kind(ip), NodeKind::Post);
    }

    #[test]
    fn test_user_indices_skip_posts_and_hashtags() {
        let set = WeightedEdgeSet::from_edges(vec![
            edge(NodeId::user("u1"), NodeId::hashtag("t"), 0.3),
            edge(NodeId::hashtag("t"), NodeId::user("u1"), 1.0),
        ]);
        let index = GraphIndex::build(&set);
        let users: Vec<&NodeId> = index.user_indices().map(|i| index.node(i)).collect();
        assert_eq!(users, vec![&NodeId::user("u1")]);
    }

    #[test]
    fn test_empty_index() {
        let index = GraphIndex::build(&WeightedEdgeSet::default());
        assert!(index.is_empty());
        assert_eq!(index.edge_count(), 0);
    }
}
