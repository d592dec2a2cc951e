//! fjall-backed ordered KV store (C2).
//!
//! All hexastore keyspaces (the six indexes, journal, facets, vectors) share
//! a single flat fjall keyspace, addressed by key prefix — the store itself
//! has no notion of the six-way hexastore split; that lives entirely in the
//! key bytes built by `hexastore_core::codec`.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};

use hexastore_core::error::{GraphError, Result};
use hexastore_core::kv::{Batch, BatchOp, KvStore};

const KEYSPACE_NAME: &str = "hexastore";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),
}

impl From<Error> for GraphError {
    fn from(error: Error) -> Self {
        GraphError::Store(error.to_string())
    }
}

/// Ordered KV store backed by a single fjall keyspace.
#[derive(Clone)]
pub struct FjallKv {
    db: Arc<Database>,
    keyspace: Keyspace,
}

impl FjallKv {
    /// Opens (creating if absent) a fjall database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::builder(path.as_ref())
            .open()
            .map_err(|e| GraphError::from(Error::Fjall(e)))?;
        let keyspace = db
            .keyspace(KEYSPACE_NAME, KeyspaceCreateOptions::default)
            .map_err(|e| GraphError::from(Error::Fjall(e)))?;
        Ok(Self {
            db: Arc::new(db),
            keyspace,
        })
    }
}

/// Eagerly-materialized snapshot of a range scan, double-ended the same way
/// `hexastore-kv-mem`'s iterator is — fjall's range iterator doesn't need to
/// be walked backwards, so collecting up front keeps reverse scans simple.
pub struct FjallKvIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    front: usize,
    back: usize,
}

impl Iterator for FjallKvIter {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.entries[self.front].clone();
        self.front += 1;
        Some(Ok(item))
    }
}

impl DoubleEndedIterator for FjallKvIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(Ok(self.entries[self.back].clone()))
    }
}

impl KvStore for FjallKv {
    type Iter = FjallKvIter;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .keyspace
            .get(key)
            .map_err(|e| GraphError::from(Error::Fjall(e)))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn write_batch(&self, batch: Batch) -> Result<()> {
        let mut write_batch = self.db.batch();
        for op in batch.ops() {
            match op {
                BatchOp::Put(key, value) => {
                    write_batch.insert(&self.keyspace, key.clone(), value.clone());
                }
                BatchOp::Delete(key) => {
                    write_batch.remove(&self.keyspace, key.clone());
                }
            }
        }
        write_batch
            .durability(Some(PersistMode::Buffer))
            .commit()
            .map_err(|e| GraphError::from(Error::Fjall(e)))?;
        Ok(())
    }

    fn scan(&self, lower: &[u8], upper: Option<&[u8]>) -> Result<Self::Iter> {
        let lower_bound = Bound::Included(lower.to_vec());
        let upper_bound = match upper {
            Some(u) => Bound::Excluded(u.to_vec()),
            None => Bound::Unbounded,
        };

        let mut entries = Vec::new();
        for guard in self.keyspace.range((lower_bound, upper_bound)) {
            let key = guard.key().map_err(|e| GraphError::from(Error::Fjall(e)))?;
            let value = guard.value().map_err(|e| GraphError::from(Error::Fjall(e)))?;
            entries.push((key.to_vec(), value.to_vec()));
        }

        let len = entries.len();
        Ok(FjallKvIter {
            entries,
            front: 0,
            back: len,
        })
    }

    /// Flushes buffered writes (`PersistMode::Buffer` at commit time, see
    /// `write_batch`) to disk.
    fn close(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| GraphError::from(Error::Fjall(e)))
    }
}
