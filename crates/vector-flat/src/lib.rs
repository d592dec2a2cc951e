//! Brute-force [`VectorIndex`] and a deterministic toy [`Embedder`] (C10
//! collaborators).
//!
//! `FlatVectorIndex` holds every vector in memory and scores a query against
//! all of them in parallel with `rayon`; there is no approximate structure to
//! maintain, which is the point — it exists to give the vector post-filter
//! something real to query in tests and small deployments, not to scale past
//! what fits in memory.

use std::collections::HashMap;
use std::sync::RwLock;

use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use hexastore_core::error::{GraphError, Result};
use hexastore_core::vector::{Embedder, VectorIndex};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vector of dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<Error> for GraphError {
    fn from(error: Error) -> Self {
        match error {
            Error::DimensionMismatch { expected, actual } => {
                GraphError::DimensionMismatch { expected, actual }
            }
        }
    }
}

/// In-memory brute-force vector index, fixed at construction to `dims`
/// dimensions.
pub struct FlatVectorIndex {
    dims: usize,
    vectors: RwLock<HashMap<Vec<u8>, Vec<f32>>>,
}

impl FlatVectorIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(GraphError::from(Error::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            }));
        }
        Ok(())
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

impl VectorIndex for FlatVectorIndex {
    fn add(&self, id: &[u8], vector: &[f32]) -> Result<()> {
        self.check_dims(vector)?;
        self.vectors
            .write()
            .unwrap()
            .insert(id.to_vec(), vector.to_vec());
        Ok(())
    }

    fn get(&self, id: &[u8]) -> Result<Option<Vec<f32>>> {
        Ok(self.vectors.read().unwrap().get(id).cloned())
    }

    fn delete(&self, id: &[u8]) -> Result<()> {
        self.vectors.write().unwrap().remove(id);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Vec<u8>, f32)>> {
        self.check_dims(query)?;
        let guard = self.vectors.read().unwrap();
        let entries: Vec<(&Vec<u8>, &Vec<f32>)> = guard.iter().collect();

        let mut scored: Vec<(Vec<u8>, f32)> = entries
            .par_iter()
            .map(|(id, vector)| ((*id).clone(), cosine_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if k > 0 {
            scored.truncate(k);
        }
        Ok(scored)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.vectors.read().unwrap().len()
    }
}

/// Deterministic bag-of-characters embedder: hashes each byte of the input
/// into one of `dims` buckets and L2-normalizes the result. Not a real text
/// embedding model — it exists so tests and small demos can exercise the
/// vector post-filter without depending on an external model.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut buckets = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            let bucket = (byte as usize).wrapping_add(i) % self.dims;
            buckets[bucket] += 1.0;
        }
        let norm: f32 = buckets.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for b in &mut buckets {
                *b /= norm;
            }
        }
        Ok(buckets)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_orders_by_ascending_distance() {
        let index = FlatVectorIndex::new(2);
        index.add(b"a", &[1.0, 0.0]).unwrap();
        index.add(b"b", &[0.0, 1.0]).unwrap();
        index.add(b"c", &[0.9, 0.1]).unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"a".to_vec());
        assert_eq!(results[1].0, b"c".to_vec());
    }

    #[test]
    fn add_with_wrong_dimension_is_rejected() {
        let index = FlatVectorIndex::new(3);
        let err = index.add(b"a", &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, GraphError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn delete_removes_from_subsequent_search() {
        let index = FlatVectorIndex::new(2);
        index.add(b"a", &[1.0, 0.0]).unwrap();
        index.add(b"b", &[0.0, 1.0]).unwrap();
        index.delete(b"a").unwrap();

        let results = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, b"b".to_vec());
    }

    #[test]
    fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("tennis").unwrap();
        let b = embedder.embed("tennis").unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hash_embedder_distinguishes_different_text() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("tennis").unwrap();
        let b = embedder.embed("democracy").unwrap();
        assert_ne!(a, b);
    }
}
