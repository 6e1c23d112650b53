//! HNSW graph — core data structures and algorithms.
//!
//! Implements the Hierarchical Navigable Small World graph from:
//! "Efficient and robust approximate nearest neighbor search using
//!  Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016/2018).
//!
//! Nodes live in a contiguous owned array and refer to each other by dense
//! internal index, never by pointer. Ids are assigned in insertion order and
//! never reused within the lifetime of a graph.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::DistanceMetric;
use crate::error::{AnnDbError, Result};
use crate::vector::Vector;

use super::queue::{MaxHeap, MinHeap, Neighbor};

/// Hard ceiling on the assigned layer. Real heights are typically <= 4;
/// the cap keeps adjacency vectors bounded no matter what the RNG does.
const MAX_LEVEL: usize = 16;

/// Configuration parameters for the HNSW graph.
#[derive(Debug, Clone)]
pub struct HnswParams {
    /// Target number of connections per node (layers > 0).
    pub m: usize,
    /// Hard degree bound at layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Number of candidates kept during construction.
    pub ef_construction: usize,
    /// Layer generation factor: 1 / ln(m).
    pub ml: f64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 32, 200)
    }
}

impl HnswParams {
    pub fn new(m: usize, m_max0: usize, ef_construction: usize) -> Self {
        debug_assert!(m >= 2, "m must be at least 2");
        Self {
            m,
            m_max0,
            ef_construction,
            ml: 1.0 / (m as f64).ln(),
        }
    }

    /// Degree bound for a given layer: `m_max0` at layer 0, `m` above.
    pub fn max_degree(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

/// A node in the graph: an owned copy of the vector, the caller's label,
/// and one adjacency list per layer up to the node's assigned layer.
#[derive(Debug, Clone)]
struct HnswNode {
    label: u64,
    vector: Vector,
    /// friends[l] is the list of neighbor ids at layer l.
    /// friends.len() - 1 is the node's assigned layer.
    friends: Vec<Vec<usize>>,
}

/// The multi-layer proximity graph.
#[derive(Debug)]
pub struct HnswGraph {
    /// Nodes indexed by internal id, in insertion order.
    nodes: Vec<HnswNode>,
    /// Entry point for every search; lives on the top layer.
    entry_point: Option<usize>,
    /// Highest assigned layer among all inserted nodes.
    top_level: usize,
    /// Fixed vector dimensionality.
    dim: usize,
    params: HnswParams,
    metric: DistanceMetric,
    /// Private RNG for layer assignment; seedable for reproducible builds.
    rng: StdRng,
}

impl HnswGraph {
    /// Create an empty graph for `dim`-dimensional vectors. `capacity` is a
    /// hint for the expected node count.
    pub fn new(dim: usize, capacity: usize, params: HnswParams, metric: DistanceMetric) -> Self {
        Self::with_rng(dim, capacity, params, metric, StdRng::from_entropy())
    }

    /// Like [`HnswGraph::new`] but with a pinned RNG seed, so two graphs
    /// built with the same seed and insertion order are identical.
    pub fn with_seed(
        dim: usize,
        capacity: usize,
        params: HnswParams,
        metric: DistanceMetric,
        seed: u64,
    ) -> Self {
        Self::with_rng(dim, capacity, params, metric, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        dim: usize,
        capacity: usize,
        params: HnswParams,
        metric: DistanceMetric,
        rng: StdRng,
    ) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            entry_point: None,
            top_level: 0,
            dim,
            params,
            metric,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Internal id of the entry point, or None before the first insertion.
    pub fn entry_point(&self) -> Option<usize> {
        self.entry_point
    }

    /// Highest layer currently present in the graph (0 when empty).
    pub fn top_layer(&self) -> usize {
        self.top_level
    }

    /// The caller-supplied label of a node.
    pub fn label_of(&self, id: usize) -> Option<u64> {
        self.nodes.get(id).map(|n| n.label)
    }

    /// A node's assigned (highest) layer.
    pub fn level_of(&self, id: usize) -> Option<usize> {
        self.nodes.get(id).map(|n| n.friends.len() - 1)
    }

    /// Read-only borrow of a node's adjacency at one layer. Empty when the
    /// node's assigned layer is below `level`.
    pub fn neighbors_of(&self, id: usize, level: usize) -> &[usize] {
        self.nodes
            .get(id)
            .and_then(|n| n.friends.get(level))
            .map(|f| f.as_slice())
            .unwrap_or(&[])
    }

    /// Draw the assigned layer for a new node: repeated uniform draws, each
    /// success (probability 1/ln m) raising the layer by one, capped.
    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level < MAX_LEVEL && self.rng.gen::<f64>() < self.params.ml {
            level += 1;
        }
        level
    }

    fn distance_to(&self, query: &[f32], id: usize) -> f32 {
        self.metric.compute(query, self.nodes[id].vector.as_slice())
    }

    /// Bounded best-first search of a single layer.
    ///
    /// Returns up to `ef` closest nodes to `query`, ascending by
    /// (distance, id). With `ef = 1` this degenerates to the greedy walk
    /// used by the descent phase.
    fn search_layer(&self, query: &[f32], ep: usize, ef: usize, level: usize) -> Vec<Neighbor> {
        let mut visited = HashSet::new();
        let mut candidates = MinHeap::new(); // closest unexplored on top
        let mut results = MaxHeap::new(); // farthest accepted on top

        let d0 = self.distance_to(query, ep);
        visited.insert(ep);
        candidates.push(Neighbor::new(ep, d0));
        results.push(Neighbor::new(ep, d0));

        while let Some(c) = candidates.pop() {
            let farthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
            // No remaining candidate can improve the result set.
            if c.distance > farthest {
                break;
            }

            let node = &self.nodes[c.id];
            // Nodes assigned a smaller layer carry no adjacency up here.
            if level >= node.friends.len() {
                continue;
            }
            for &nb in &node.friends[level] {
                if !visited.insert(nb) {
                    continue;
                }
                let d = self.distance_to(query, nb);
                let farthest = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
                if results.len() < ef || d < farthest {
                    candidates.push(Neighbor::new(nb, d));
                    results.push_bounded(Neighbor::new(nb, d), ef);
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Re-select a node's adjacency at one layer down to `limit` entries,
    /// keeping the closest (ties toward the smaller id). Dropping is
    /// one-sided: the counterpart keeps its edge until its own pruning
    /// triggers.
    fn prune_neighbors(&mut self, node_id: usize, level: usize, limit: usize) {
        let mut scored: Vec<Neighbor> = {
            let node = &self.nodes[node_id];
            node.friends[level]
                .iter()
                .map(|&nb| {
                    Neighbor::new(
                        nb,
                        self.metric
                            .compute(node.vector.as_slice(), self.nodes[nb].vector.as_slice()),
                    )
                })
                .collect()
        };
        scored.sort_unstable();
        scored.truncate(limit);
        self.nodes[node_id].friends[level] = scored.into_iter().map(|n| n.id).collect();
    }

    /// Insert a vector with a caller-supplied label, returning the internal
    /// id just assigned. Fails only on a dimension mismatch, before any
    /// state is touched.
    pub fn insert(&mut self, vector: Vector, label: u64) -> Result<usize> {
        if vector.dimension() != self.dim {
            return Err(AnnDbError::DimensionMismatch {
                expected: self.dim,
                actual: vector.dimension(),
            });
        }

        let level = self.random_level();
        let id = self.nodes.len();
        self.nodes.push(HnswNode {
            label,
            vector,
            friends: vec![Vec::new(); level + 1],
        });

        // First node becomes the entry point with no edges.
        let Some(mut ep) = self.entry_point else {
            self.entry_point = Some(id);
            self.top_level = level;
            return Ok(id);
        };

        let query = self.nodes[id].vector.clone();
        let top = self.top_level;

        // Phase 1: greedy descent through the layers above the new node's,
        // cheaply locating a good entry point for the linking phase.
        for l in (level + 1..=top).rev() {
            let nearest = self.search_layer(query.as_slice(), ep, 1, l);
            if let Some(best) = nearest.first() {
                ep = best.id;
            }
        }

        // Phase 2: link at layers min(level, top) down to 0. The entry point
        // found for a layer is reused unchanged for the layer below.
        for l in (0..=level.min(top)).rev() {
            let candidates = self.search_layer(query.as_slice(), ep, self.params.ef_construction, l);
            let chosen: Vec<usize> = candidates
                .iter()
                .take(self.params.m)
                .map(|n| n.id)
                .collect();
            self.nodes[id].friends[l] = chosen.clone();

            let limit = self.params.max_degree(l);
            for &nb in &chosen {
                let list = &mut self.nodes[nb].friends[l];
                list.push(id);
                if list.len() > limit {
                    self.prune_neighbors(nb, l, limit);
                }
            }
        }

        // A strictly taller node takes over as entry point; ties retain the
        // old one.
        if level > self.top_level {
            self.top_level = level;
            self.entry_point = Some(id);
        }

        Ok(id)
    }

    /// Search for the k nearest neighbors of `query` using an `ef`-wide
    /// candidate list at layer 0. Returns internal-id entries ascending by
    /// (distance, id); an empty graph yields an empty Vec.
    pub fn search_knn(&self, query: &Vector, k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        if query.dimension() != self.dim {
            return Err(AnnDbError::DimensionMismatch {
                expected: self.dim,
                actual: query.dimension(),
            });
        }

        let Some(mut ep) = self.entry_point else {
            return Ok(Vec::new());
        };

        // Zoom-in descent, same as insertion.
        for l in (1..=self.top_level).rev() {
            let nearest = self.search_layer(query.as_slice(), ep, 1, l);
            if let Some(best) = nearest.first() {
                ep = best.id;
            }
        }

        let mut results = self.search_layer(query.as_slice(), ep, ef.max(k), 0);
        results.truncate(k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_graph(dim: usize, seed: u64) -> HnswGraph {
        HnswGraph::with_seed(
            dim,
            16,
            HnswParams::new(4, 8, 32),
            DistanceMetric::SquaredEuclidean,
            seed,
        )
    }

    #[test]
    fn test_insert_single() {
        let mut graph = make_graph(3, 1);
        let id = graph.insert(Vector::new(vec![1.0, 0.0, 0.0]), 7).unwrap();
        assert_eq!(id, 0);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.entry_point(), Some(0));
        assert_eq!(graph.label_of(0), Some(7));
    }

    #[test]
    fn test_insert_assigns_dense_ids() {
        let mut graph = make_graph(2, 1);
        for i in 0..10u64 {
            let id = graph.insert(Vector::new(vec![i as f32, 0.0]), 100 + i).unwrap();
            assert_eq!(id, i as usize);
        }
        assert_eq!(graph.len(), 10);
    }

    #[test]
    fn test_insert_dimension_mismatch() {
        let mut graph = make_graph(3, 1);
        let err = graph.insert(Vector::new(vec![1.0, 2.0]), 0);
        assert!(matches!(err, Err(AnnDbError::DimensionMismatch { .. })));
        // Nothing was published.
        assert_eq!(graph.len(), 0);
        assert_eq!(graph.entry_point(), None);
    }

    #[test]
    fn test_search_empty_graph() {
        let graph = make_graph(3, 1);
        let results = graph.search_knn(&Vector::new(vec![0.0; 3]), 5, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let mut graph = make_graph(3, 1);
        graph.insert(Vector::new(vec![0.0; 3]), 0).unwrap();
        assert!(matches!(
            graph.search_knn(&Vector::new(vec![0.0; 4]), 1, 10),
            Err(AnnDbError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_edges_are_bidirectional_below_degree_cap() {
        // With default-sized bounds and only 20 nodes, pruning never fires,
        // so every edge must have its reverse.
        let mut graph = HnswGraph::with_seed(
            2,
            20,
            HnswParams::default(),
            DistanceMetric::SquaredEuclidean,
            7,
        );
        for i in 0..20u64 {
            graph
                .insert(Vector::new(vec![i as f32, (i * 3 % 7) as f32]), i)
                .unwrap();
        }
        for id in 0..graph.len() {
            for level in 0..=graph.level_of(id).unwrap() {
                for &nb in graph.neighbors_of(id, level) {
                    assert!(
                        graph.neighbors_of(nb, level).contains(&id),
                        "edge {}->{} at layer {} has no reverse",
                        id,
                        nb,
                        level
                    );
                }
            }
        }
    }

    #[test]
    fn test_self_search() {
        let mut graph = make_graph(3, 42);
        let vectors: Vec<Vector> = (0..100)
            .map(|i| {
                Vector::new(vec![
                    (i as f32) * 0.1,
                    ((i * 7) as f32) * 0.1,
                    ((i * 13) as f32) * 0.1,
                ])
            })
            .collect();
        for (i, v) in vectors.iter().enumerate() {
            graph.insert(v.clone(), i as u64).unwrap();
        }

        // The top hit for each inserted vector should be itself, at distance 0.
        for (i, v) in vectors.iter().enumerate() {
            let results = graph.search_knn(v, 1, 16).unwrap();
            assert!(!results.is_empty(), "no results for vector {}", i);
            assert!(
                results[0].distance < 1e-5,
                "self-search for {} returned distance {} (id={})",
                i,
                results[0].distance,
                results[0].id
            );
        }
    }

    #[test]
    fn test_layer_cap() {
        // m = 2 makes ml = 1/ln(2) > 1, so every draw succeeds and the
        // assigned layer hits the ceiling.
        let mut graph = HnswGraph::with_seed(
            2,
            1,
            HnswParams::new(2, 4, 8),
            DistanceMetric::SquaredEuclidean,
            0,
        );
        graph.insert(Vector::new(vec![0.0, 0.0]), 0).unwrap();
        assert_eq!(graph.level_of(0), Some(16));
        assert_eq!(graph.top_layer(), 16);
    }

    #[test]
    fn test_neighbors_of_absent_layer_is_empty() {
        let mut graph = make_graph(2, 3);
        graph.insert(Vector::new(vec![0.0, 0.0]), 0).unwrap();
        let level = graph.level_of(0).unwrap();
        assert!(graph.neighbors_of(0, level + 1).is_empty());
        assert!(graph.neighbors_of(99, 0).is_empty());
    }

    #[test]
    fn test_knn_ordering_and_ties() {
        let mut graph = make_graph(2, 5);
        graph.insert(Vector::new(vec![0.0, 0.0]), 10).unwrap();
        graph.insert(Vector::new(vec![1.0, 0.0]), 11).unwrap();
        graph.insert(Vector::new(vec![-1.0, 0.0]), 12).unwrap();
        graph.insert(Vector::new(vec![3.0, 0.0]), 13).unwrap();

        let results = graph.search_knn(&Vector::new(vec![0.0, 0.0]), 4, 16).unwrap();
        assert_eq!(results.len(), 4);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        // Ids 1 and 2 tie at distance 1; the smaller internal id comes first.
        assert_eq!(results[1].id, 1);
        assert_eq!(results[2].id, 2);
    }
}
