//! # anndb
//!
//! A small embeddable vector database: approximate k-nearest-neighbour
//! search over fixed-dimensional float vectors with attached opaque
//! metadata.
//!
//! The core is an HNSW (Hierarchical Navigable Small World) graph index;
//! around it sits a JSON-backed record store and a thin CLI.
//!
//! ## Example
//!
//! ```rust
//! use anndb::hnsw::HnswIndex;
//! use anndb::Vector;
//!
//! let index = HnswIndex::new(3, 16);
//! index.insert(Vector::new(vec![1.0, 2.0, 3.0]), 7).unwrap();
//! index.insert(Vector::new(vec![4.0, 5.0, 6.0]), 8).unwrap();
//!
//! let results = index
//!     .search_knn(&Vector::new(vec![1.0, 2.0, 3.0]), 1, 10)
//!     .unwrap();
//! assert_eq!(results[0].1, 7);
//! ```

pub mod distance;
pub mod error;
pub mod hnsw;
pub mod store;
pub mod vector;

pub use distance::DistanceMetric;
pub use error::{AnnDbError, Result};
pub use hnsw::{HnswGraph, HnswIndex, HnswParams};
pub use store::{Record, RecordStore, SearchResult};
pub use vector::Vector;
