//! The triple store mutation path (C4): validate, fan out to the six index
//! keys, and optionally stage a journal entry, all in one atomic batch.

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::index::ALL_INDEXES;
use crate::journal::Journal;
use crate::kv::{Batch, KvStore};
use crate::record::{self, Op};
use crate::triple::Triple;

/// Fans triple mutations out across all six hexastore indexes, plus the
/// journal when one is attached, as a single atomic [`Batch`].
pub struct TripleStore<K: KvStore> {
    kv: Arc<K>,
    journal: Option<Arc<Journal<K>>>,
}

impl<K: KvStore> TripleStore<K> {
    pub fn new(kv: Arc<K>, journal: Option<Arc<Journal<K>>>) -> Self {
        Self { kv, journal }
    }

    pub fn kv(&self) -> &Arc<K> {
        &self.kv
    }

    /// Inserts every triple in `triples`. All six index entries for every
    /// triple (and the journal entries, if enabled) become visible together,
    /// or none of them do.
    pub fn put(&self, triples: &[Triple]) -> Result<()> {
        self.mutate(Op::Put, triples)
    }

    /// Removes every triple in `triples`. Symmetric with [`Self::put`].
    pub fn del(&self, triples: &[Triple]) -> Result<()> {
        self.mutate(Op::Del, triples)
    }

    /// A single triple's current state, read directly off the canonical
    /// (SPO) index without going through the pattern scanner.
    pub fn contains(&self, triple: &Triple) -> Result<bool> {
        if !triple.is_valid() {
            return Err(GraphError::InvalidTriple);
        }
        let key = crate::index::Index::Spo.key_for(triple);
        Ok(self.kv.get(&key)?.is_some())
    }

    fn mutate(&self, op: Op, triples: &[Triple]) -> Result<()> {
        for t in triples {
            if !t.is_valid() {
                return Err(GraphError::InvalidTriple);
            }
        }

        let mut batch = Batch::new();
        for triple in triples {
            for index in ALL_INDEXES {
                let key = index.key_for(triple);
                match op {
                    Op::Put => {
                        batch.put(key, record::encode_triple(triple));
                    }
                    Op::Del => {
                        batch.delete(key);
                    }
                }
            }
        }

        if let Some(journal) = &self.journal {
            journal.stage(&mut batch, op, triples)?;
        }

        tracing::debug!(
            target: "hexastore::store",
            op = ?op,
            count = triples.len(),
            "applying triple batch"
        );

        self.kv.write_batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexastore_kv_mem::MemKv;

    fn store() -> TripleStore<MemKv> {
        TripleStore::new(Arc::new(MemKv::new()), None)
    }

    #[test]
    fn put_then_contains() {
        let store = store();
        let t = Triple::new("alice", "knows", "bob");
        store.put(&[t.clone()]).unwrap();
        assert!(store.contains(&t).unwrap());
    }

    #[test]
    fn del_removes_all_six_index_entries() {
        let store = store();
        let t = Triple::new("alice", "knows", "bob");
        store.put(&[t.clone()]).unwrap();
        store.del(&[t.clone()]).unwrap();
        assert!(!store.contains(&t).unwrap());

        for index in ALL_INDEXES {
            let key = index.key_for(&t);
            assert!(store.kv().get(&key).unwrap().is_none());
        }
    }

    #[test]
    fn put_is_visible_under_all_six_indexes() {
        let store = store();
        let t = Triple::new("alice", "knows", "bob");
        store.put(&[t.clone()]).unwrap();

        for index in ALL_INDEXES {
            let key = index.key_for(&t);
            let raw = store.kv().get(&key).unwrap().expect("index entry present");
            assert_eq!(record::decode_triple(&raw).unwrap(), t);
        }
    }

    #[test]
    fn empty_field_is_rejected() {
        let store = store();
        let invalid = Triple::new("alice", "", "bob");
        assert!(matches!(store.put(&[invalid]), Err(GraphError::InvalidTriple)));
    }

    #[test]
    fn invalid_triple_in_batch_aborts_whole_batch() {
        let store = store();
        let valid = Triple::new("alice", "knows", "bob");
        let invalid = Triple::new("carol", "", "dave");
        assert!(store.put(&[valid.clone(), invalid]).is_err());
        assert!(!store.contains(&valid).unwrap());
    }
}
