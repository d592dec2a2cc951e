//! redb-backed ordered KV store (C2).
//!
//! Like `hexastore-kv-fjall`, every hexastore keyspace shares a single flat
//! table keyed by prefix; the six-way hexastore split lives entirely in the
//! key bytes built by `hexastore_core::codec`.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use hexastore_core::error::{GraphError, Result};
use hexastore_core::kv::{Batch, BatchOp, KvStore};

const TABLE: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("hexastore");

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),

    #[error(transparent)]
    Transaction(Box<redb::TransactionError>),

    #[error(transparent)]
    Table(#[from] redb::TableError),

    #[error(transparent)]
    Storage(#[from] redb::StorageError),

    #[error(transparent)]
    Commit(#[from] redb::CommitError),
}

impl From<redb::TransactionError> for Error {
    fn from(error: redb::TransactionError) -> Self {
        Error::Transaction(Box::new(error))
    }
}

impl From<Error> for GraphError {
    fn from(error: Error) -> Self {
        GraphError::Store(error.to_string())
    }
}

/// Ordered KV store backed by a single redb table.
#[derive(Clone)]
pub struct RedbKv {
    db: Arc<Database>,
}

impl RedbKv {
    /// Opens (creating if absent) a redb database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(|e| GraphError::from(Error::from(e)))?;

        let wx = db
            .begin_write()
            .map_err(|e| GraphError::from(Error::from(e)))?;
        {
            let _ = wx
                .open_table(TABLE)
                .map_err(|e| GraphError::from(Error::from(e)))?;
        }
        wx.commit().map_err(|e| GraphError::from(Error::from(e)))?;

        Ok(Self { db: Arc::new(db) })
    }
}

/// Eagerly-materialized snapshot of a range scan: redb's range iterator
/// borrows from the read transaction it was opened on, so the transaction is
/// collected and dropped inside `scan` rather than threaded through `Iter`.
pub struct RedbKvIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    front: usize,
    back: usize,
}

impl Iterator for RedbKvIter {
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

impl DoubleEndedIterator for RedbKvIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(Ok(self.entries[self.back].clone()))
    }
}

impl KvStore for RedbKv {
    type Iter = RedbKvIter;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let rx = self
            .db
            .begin_read()
            .map_err(|e| GraphError::from(Error::from(e)))?;
        let table = rx
            .open_table(TABLE)
            .map_err(|e| GraphError::from(Error::from(e)))?;
        let value = table
            .get(key)
            .map_err(|e| GraphError::from(Error::from(e)))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn write_batch(&self, batch: Batch) -> Result<()> {
        let wx = self
            .db
            .begin_write()
            .map_err(|e| GraphError::from(Error::from(e)))?;
        {
            let mut table = wx
                .open_table(TABLE)
                .map_err(|e| GraphError::from(Error::from(e)))?;
            for op in batch.ops() {
                match op {
                    BatchOp::Put(key, value) => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(|e| GraphError::from(Error::from(e)))?;
                    }
                    BatchOp::Delete(key) => {
                        table
                            .remove(key.as_slice())
                            .map_err(|e| GraphError::from(Error::from(e)))?;
                    }
                }
            }
        }
        wx.commit().map_err(|e| GraphError::from(Error::from(e)))?;
        Ok(())
    }

    fn scan(&self, lower: &[u8], upper: Option<&[u8]>) -> Result<Self::Iter> {
        let rx = self
            .db
            .begin_read()
            .map_err(|e| GraphError::from(Error::from(e)))?;
        let table = rx
            .open_table(TABLE)
            .map_err(|e| GraphError::from(Error::from(e)))?;

        let lower_owned = lower.to_vec();
        let upper_owned = upper.map(|u| u.to_vec());

        let mut entries = Vec::new();
        let range = match &upper_owned {
            Some(upper) => table.range(lower_owned.as_slice()..upper.as_slice()),
            None => table.range(lower_owned.as_slice()..),
        }
        .map_err(|e| GraphError::from(Error::from(e)))?;

        for item in range {
            let (key, value) = item.map_err(|e| GraphError::from(Error::from(e)))?;
            entries.push((key.value().to_vec(), value.value().to_vec()));
        }

        let len = entries.len();
        Ok(RedbKvIter {
            entries,
            front: 0,
            back: len,
        })
    }

    /// redb commits are durable by the time `write_batch` returns, so there
    /// is nothing left to flush; the underlying `Database` closes when the
    /// last `Arc` handle is dropped.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
