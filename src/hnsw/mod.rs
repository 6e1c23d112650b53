//! HNSW (Hierarchical Navigable Small World) index module.

pub mod graph;
pub mod queue;

pub use graph::{HnswGraph, HnswParams};
pub use queue::Neighbor;

use parking_lot::RwLock;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::vector::Vector;

/// An HNSW index guarded for shared use: single writer, multiple readers.
///
/// One lock covers the whole graph. `insert` holds exclusive access for its
/// full duration; searches and accessors take shared access, so concurrent
/// searches proceed in parallel with each other but never with an insert.
/// No I/O happens under the lock; all work is CPU-bound over owned memory.
#[derive(Debug)]
pub struct HnswIndex {
    graph: RwLock<HnswGraph>,
}

impl HnswIndex {
    /// Create an index with default parameters and the default metric.
    pub fn new(dim: usize, capacity: usize) -> Self {
        Self::with_params(dim, capacity, HnswParams::default(), DistanceMetric::default())
    }

    /// Create an index with explicit parameters.
    pub fn with_params(
        dim: usize,
        capacity: usize,
        params: HnswParams,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            graph: RwLock::new(HnswGraph::new(dim, capacity, params, metric)),
        }
    }

    /// Create an index with a pinned RNG seed for reproducible builds.
    pub fn with_seed(
        dim: usize,
        capacity: usize,
        params: HnswParams,
        metric: DistanceMetric,
        seed: u64,
    ) -> Self {
        Self {
            graph: RwLock::new(HnswGraph::with_seed(dim, capacity, params, metric, seed)),
        }
    }

    /// Insert a vector with a caller-supplied label; returns the internal id.
    pub fn insert(&self, vector: Vector, label: u64) -> Result<usize> {
        self.graph.write().insert(vector, label)
    }

    /// Search for the k nearest neighbors, returning `(distance, label)`
    /// pairs ascending by distance. Empty index yields an empty Vec.
    pub fn search_knn(&self, query: &Vector, k: usize, ef: usize) -> Result<Vec<(f32, u64)>> {
        let graph = self.graph.read();
        let hits = graph.search_knn(query, k, ef)?;
        Ok(hits
            .into_iter()
            .filter_map(|n| graph.label_of(n.id).map(|label| (n.distance, label)))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.graph.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.read().is_empty()
    }

    pub fn dim(&self) -> usize {
        self.graph.read().dim()
    }

    pub fn entry_point(&self) -> Option<usize> {
        self.graph.read().entry_point()
    }

    pub fn top_layer(&self) -> usize {
        self.graph.read().top_layer()
    }

    /// Snapshot of a node's adjacency at one layer.
    pub fn neighbors_of(&self, id: usize, level: usize) -> Vec<usize> {
        self.graph.read().neighbors_of(id, level).to_vec()
    }
}
