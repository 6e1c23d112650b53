//! Record store: external ids, opaque metadata, JSON document persistence.
//!
//! The store owns the durable state, a single human-readable document of
//! the shape `{ dim, nextId, vectors: [{id, vec, metadata}] }`, plus an
//! in-memory HNSW index rebuilt from it on demand. The graph itself is
//! never persisted. Mutations mark the document dirty; search refuses a
//! dirty store until an explicit rebuild, so results always reflect the
//! records as of the last rebuild.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::distance::DistanceMetric;
use crate::error::{AnnDbError, Result};
use crate::hnsw::{HnswIndex, HnswParams};
use crate::vector::Vector;

/// Rebuild seed. Pinned so a clean document always rebuilds the identical
/// graph, making one-shot CLI searches agree run-to-run.
const INDEX_SEED: u64 = 42;

/// One stored record: external id, vector, and caller-opaque metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub vec: Vector,
    pub metadata: Value,
}

/// The persisted document. `dirty` defaults to false so documents with the
/// bare three-field shape still load.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    dim: usize,
    #[serde(rename = "nextId")]
    next_id: u64,
    #[serde(default)]
    dirty: bool,
    vectors: Vec<Record>,
}

/// A search result translated back to an external record id.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: u64,
    pub distance: f32,
}

/// Vector record store backed by one JSON document, with an in-memory
/// HNSW index over its records.
pub struct RecordStore {
    path: PathBuf,
    dim: usize,
    next_id: u64,
    dirty: bool,
    records: Vec<Record>,
    /// external id -> position in `records`
    by_id: HashMap<u64, usize>,
    index: Option<HnswIndex>,
    /// internal id -> external id, frozen at the last rebuild
    index_labels: Vec<u64>,
}

impl RecordStore {
    /// Create a fresh store document at `path` for `dim`-dimensional vectors.
    pub fn create(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(AnnDbError::InvalidVector {
                reason: "dimension must be at least 1".to_string(),
            });
        }
        let store = Self {
            path: path.as_ref().to_path_buf(),
            dim,
            next_id: 0,
            dirty: false,
            records: Vec::new(),
            by_id: HashMap::new(),
            index: None,
            index_labels: Vec::new(),
        };
        store.save()?;
        Ok(store)
    }

    /// Load a store document from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let doc: StoreDocument = serde_json::from_slice(&bytes)
            .map_err(|e| AnnDbError::Serialization(e.to_string()))?;

        let by_id = doc
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.id, pos))
            .collect();

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            dim: doc.dim,
            next_id: doc.next_id,
            dirty: doc.dirty,
            records: doc.vectors,
            by_id,
            index: None,
            index_labels: Vec::new(),
        })
    }

    /// Write the document back to disk, pretty-printed.
    pub fn save(&self) -> Result<()> {
        let doc = StoreDocument {
            dim: self.dim,
            next_id: self.next_id,
            dirty: self.dirty,
            vectors: self.records.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| AnnDbError::Serialization(e.to_string()))?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether records changed since the last rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn check_dim(&self, vec: &Vector) -> Result<()> {
        if vec.dimension() != self.dim {
            return Err(AnnDbError::DimensionMismatch {
                expected: self.dim,
                actual: vec.dimension(),
            });
        }
        Ok(())
    }

    /// Add a record, assigning the next external id.
    pub fn add(&mut self, vec: Vector, metadata: Value) -> Result<u64> {
        self.check_dim(&vec)?;
        let id = self.next_id;
        self.next_id += 1;
        self.by_id.insert(id, self.records.len());
        self.records.push(Record { id, vec, metadata });
        self.dirty = true;
        Ok(id)
    }

    /// Look up a record by external id.
    pub fn get(&self, id: u64) -> Option<&Record> {
        self.by_id.get(&id).map(|&pos| &self.records[pos])
    }

    /// Replace a record's vector and metadata in place.
    pub fn update(&mut self, id: u64, vec: Vector, metadata: Value) -> Result<()> {
        self.check_dim(&vec)?;
        let &pos = self
            .by_id
            .get(&id)
            .ok_or(AnnDbError::RecordNotFound { id })?;
        self.records[pos].vec = vec;
        self.records[pos].metadata = metadata;
        self.dirty = true;
        Ok(())
    }

    /// Remove a record, returning it.
    pub fn delete(&mut self, id: u64) -> Result<Record> {
        let pos = self
            .by_id
            .remove(&id)
            .ok_or(AnnDbError::RecordNotFound { id })?;
        let record = self.records.remove(pos);
        for (i, moved) in self.records.iter().enumerate().skip(pos) {
            self.by_id.insert(moved.id, i);
        }
        self.dirty = true;
        Ok(record)
    }

    /// Rebuild the index from scratch: a fresh graph with capacity for the
    /// current record count (minimum 1), records inserted in document order
    /// with their position as the label, and the position -> external-id
    /// side table refreshed. Clears the dirty marker.
    pub fn rebuild_index(&mut self) -> Result<()> {
        let index = HnswIndex::with_seed(
            self.dim,
            self.records.len().max(1),
            HnswParams::default(),
            DistanceMetric::default(),
            INDEX_SEED,
        );
        for (i, record) in self.records.iter().enumerate() {
            index.insert(record.vec.clone(), i as u64)?;
        }
        self.index_labels = self.records.iter().map(|r| r.id).collect();
        self.index = Some(index);
        self.dirty = false;
        Ok(())
    }

    /// Search the index built at the last rebuild, translating labels back
    /// to external ids. Fails if records changed since that rebuild (or no
    /// rebuild happened yet).
    pub fn search(&self, query: &Vector, k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        if self.dirty {
            return Err(AnnDbError::IndexOutOfDate);
        }
        let index = self.index.as_ref().ok_or(AnnDbError::IndexOutOfDate)?;

        let hits = index.search_knn(query, k, ef)?;
        Ok(hits
            .into_iter()
            .filter_map(|(distance, label)| {
                self.index_labels
                    .get(label as usize)
                    .map(|&id| SearchResult { id, distance })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_store(dim: usize) -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::create(dir.path().join("db.json"), dim).unwrap();
        (dir, store)
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let (_dir, mut store) = temp_store(2);
        let a = store.add(Vector::new(vec![1.0, 0.0]), Value::Null).unwrap();
        let b = store.add(Vector::new(vec![0.0, 1.0]), Value::Null).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_add_dimension_mismatch() {
        let (_dir, mut store) = temp_store(3);
        assert!(matches!(
            store.add(Vector::new(vec![1.0, 2.0]), Value::Null),
            Err(AnnDbError::DimensionMismatch { .. })
        ));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_delete_keeps_positions_consistent() {
        let (_dir, mut store) = temp_store(1);
        for i in 0..5 {
            store.add(Vector::new(vec![i as f32]), Value::Null).unwrap();
        }
        store.delete(1).unwrap();
        assert!(store.get(1).is_none());
        assert_eq!(store.get(4).unwrap().vec.as_slice(), &[4.0]);
        // Ids are never reused.
        let id = store.add(Vector::new(vec![9.0]), Value::Null).unwrap();
        assert_eq!(id, 5);
    }

    #[test]
    fn test_delete_missing() {
        let (_dir, mut store) = temp_store(1);
        assert!(matches!(
            store.delete(3),
            Err(AnnDbError::RecordNotFound { id: 3 })
        ));
    }

    #[test]
    fn test_dirty_lifecycle() {
        let (_dir, mut store) = temp_store(2);
        assert!(!store.is_dirty());

        store.add(Vector::new(vec![1.0, 0.0]), Value::Null).unwrap();
        assert!(store.is_dirty());
        assert!(matches!(
            store.search(&Vector::new(vec![1.0, 0.0]), 1, 10),
            Err(AnnDbError::IndexOutOfDate)
        ));

        store.rebuild_index().unwrap();
        assert!(!store.is_dirty());
        let results = store.search(&Vector::new(vec![1.0, 0.0]), 1, 10).unwrap();
        assert_eq!(results[0].id, 0);

        store.update(0, Vector::new(vec![0.0, 1.0]), Value::Null).unwrap();
        assert!(store.is_dirty());
    }

    #[test]
    fn test_search_translates_external_ids() {
        let (_dir, mut store) = temp_store(2);
        for i in 0..6 {
            store
                .add(Vector::new(vec![i as f32, 0.0]), json!({"n": i}))
                .unwrap();
        }
        // Removing a middle record shifts positions; labels must still map
        // back to the surviving external ids.
        store.delete(2).unwrap();
        store.rebuild_index().unwrap();

        let results = store.search(&Vector::new(vec![5.0, 0.0]), 1, 20).unwrap();
        assert_eq!(results[0].id, 5);
        let results = store.search(&Vector::new(vec![3.0, 0.0]), 1, 20).unwrap();
        assert_eq!(results[0].id, 3);
    }

    #[test]
    fn test_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        let mut store = RecordStore::create(&path, 2).unwrap();
        store
            .add(Vector::new(vec![1.5, 2.5]), json!({"tag": "x"}))
            .unwrap();
        store.save().unwrap();

        let doc: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["dim"], 2);
        assert_eq!(doc["nextId"], 1);
        assert_eq!(doc["vectors"][0]["id"], 0);
        assert_eq!(doc["vectors"][0]["vec"], json!([1.5, 2.5]));
        assert_eq!(doc["vectors"][0]["metadata"], json!({"tag": "x"}));
    }

    #[test]
    fn test_open_bare_document_without_dirty_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{ "dim": 2, "nextId": 1, "vectors": [ { "id": 0, "vec": [1.0, 2.0], "metadata": null } ] }"#,
        )
        .unwrap();

        let store = RecordStore::open(&path).unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().vec.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_create_zero_dim() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RecordStore::create(dir.path().join("db.json"), 0),
            Err(AnnDbError::InvalidVector { .. })
        ));
    }
}
