//! The ordered KV store contract (C2, collaborator).
//!
//! Any backend satisfying this trait — an on-disk LSM engine, a redb table,
//! or a plain in-memory sorted map — can back a [`crate::store::TripleStore`]
//! with no change anywhere else in the engine.

use crate::error::Result;

/// A single write within a [`Batch`].
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// An ordered sequence of writes submitted to [`KvStore::write_batch`] as one
/// atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete(key.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn extend(&mut self, other: Batch) {
        self.ops.extend(other.ops);
    }
}

/// Ordered, byte-keyed key-value store.
///
/// Implementors may allow concurrent readers and writers freely; the triple
/// store above this contract serializes mutations against close with its own
/// lock (§4.11), so `KvStore` itself only needs to guarantee that
/// `write_batch` is atomic and that iterators remain valid while other
/// iterators or writers are in use.
pub trait KvStore: Send + Sync + 'static {
    /// Range-scan iterator. Yields entries in ascending key order and
    /// supports reversal via `DoubleEndedIterator::rev` for reverse scans.
    type Iter: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Applies every op in `batch` atomically: readers never observe a
    /// partially-applied batch.
    fn write_batch(&self, batch: Batch) -> Result<()>;

    /// Scans `[lower, upper)`. `upper = None` means unbounded above.
    fn scan(&self, lower: &[u8], upper: Option<&[u8]>) -> Result<Self::Iter>;

    /// Flushes and releases the backend's resources. Idempotent: a backend
    /// that has nothing to flush (or is already closed) returns `Ok(())`.
    fn close(&self) -> Result<()>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(key, value);
        self.write_batch(batch)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = Batch::new();
        batch.delete(key);
        self.write_batch(batch)
    }

    /// Scans every key with prefix `prefix`, computing the exclusive upper
    /// bound via [`crate::codec::prefix_upper_bound`].
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Self::Iter> {
        let upper = crate::codec::prefix_upper_bound(prefix);
        self.scan(prefix, upper.as_deref())
    }
}
