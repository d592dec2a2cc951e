//! In-memory ordered KV store.
//!
//! Backed by a `BTreeMap` behind a single `RwLock`, cloned cheaply via an
//! `Arc` handle. This is the default backend for tests and for callers who
//! don't need persistence — the equivalent of keeping everything in a single
//! keyspace table the way the on-disk backends keep one table per hexastore
//! index, but collapsed into one map since ordering is all that matters.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use hexastore_core::error::Result;
use hexastore_core::kv::{Batch, BatchOp, KvStore};

#[derive(Clone, Default)]
pub struct MemKv {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully-materialized snapshot of a range scan.
///
/// The in-memory backend has no concept of a cursor that outlives the read
/// lock, so a scan copies its matching entries up front; this keeps the
/// `RwLock` guard scoped to `scan` itself.
pub struct MemKvIter {
    items: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl Iterator for MemKvIter {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.pop_front().map(Ok)
    }
}

impl DoubleEndedIterator for MemKvIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.items.pop_back().map(Ok)
    }
}

impl KvStore for MemKv {
    type Iter = MemKvIter;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().unwrap().get(key).cloned())
    }

    fn write_batch(&self, batch: Batch) -> Result<()> {
        let mut guard = self.inner.write().unwrap();
        for op in batch.ops() {
            match op {
                BatchOp::Put(key, value) => {
                    guard.insert(key.clone(), value.clone());
                }
                BatchOp::Delete(key) => {
                    guard.remove(key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, lower: &[u8], upper: Option<&[u8]>) -> Result<Self::Iter> {
        let guard = self.inner.read().unwrap();
        let lower_bound = Bound::Included(lower.to_vec());
        let upper_bound = match upper {
            Some(u) => Bound::Excluded(u.to_vec()),
            None => Bound::Unbounded,
        };
        let items = guard
            .range((lower_bound, upper_bound))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(MemKvIter { items })
    }

    /// Nothing to flush: the map lives entirely in memory and is dropped with
    /// the last `Arc` handle.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        kv.write_batch(batch).unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn delete_removes_key() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        kv.write_batch(batch).unwrap();

        let mut del = Batch::new();
        del.delete(b"a".to_vec());
        kv.write_batch(del).unwrap();

        assert_eq!(kv.get(b"a").unwrap(), None);
    }

    #[test]
    fn scan_respects_bounds_and_order() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        for key in [b"a".as_slice(), b"b", b"c", b"d"] {
            batch.put(key.to_vec(), key.to_vec());
        }
        kv.write_batch(batch).unwrap();

        let results: Vec<_> = kv
            .scan(b"b", Some(b"d"))
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(results, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn scan_reversed_via_rev() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        for key in [b"a".as_slice(), b"b", b"c"] {
            batch.put(key.to_vec(), key.to_vec());
        }
        kv.write_batch(batch).unwrap();

        let results: Vec<_> = kv
            .scan(b"a", None)
            .unwrap()
            .rev()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(results, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn scan_unbounded_upper_reaches_end() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        batch.put(b"zzz".to_vec(), b"1".to_vec());
        kv.write_batch(batch).unwrap();

        let results: Vec<_> = kv.scan(b"a", None).unwrap().collect();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn close_is_a_harmless_no_op() {
        let kv = MemKv::new();
        let mut batch = Batch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        kv.write_batch(batch).unwrap();
        kv.close().unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
    }
}
