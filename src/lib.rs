//! `GraphDb` (C11): wires a chosen [`KvStore`] backend into the full
//! hexastore engine — triple store, optional journal, optional facets, and
//! an optional vector post-filter — behind a single open/close lifecycle,
//! the way `dolos`'s root crate wires `StateStore` + `WalStore` +
//! `IndexStore` into a `Domain`.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::thread::JoinHandle;

pub use hexastore_core::{
    BackendKind, Batch, BatchOp, CancellationToken, ComponentKind, Config, Embedder, Facets,
    Field, GraphError, Index, JoinIter, JoinOptions, Journal, JournalConfig, JournalEntry,
    KvStore, Navigator, Op, Pattern, PatternFilter, PatternPosition, Result, ScanDefaults,
    Solution, SystemClock, Triple, TripleStore, Value, VectorConfig, VectorFilterSpec, VectorId,
    VectorIndex, VectorQuery,
};

pub use hexastore_kv_mem::MemKv;

#[cfg(feature = "fjall")]
pub use hexastore_kv_fjall::FjallKv;

#[cfg(feature = "redb")]
pub use hexastore_kv_redb::RedbKv;

#[cfg(feature = "vector")]
pub use hexastore_vector_flat::{FlatVectorIndex, HashEmbedder};

/// A request to embed `text` and index the resulting vector under `id`,
/// queued for the background embed worker.
struct EmbedJob {
    id: Vec<u8>,
    text: String,
}

/// The vector subsystem, wired in only when [`Config::vector`] is enabled
/// and a collaborator index (and, for text queries, an embedder) has been
/// attached via [`GraphDb::with_vector`].
struct VectorHandle {
    index: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    embed_tx: Option<SyncSender<EmbedJob>>,
    embed_worker: Option<JoinHandle<()>>,
}

/// An embedded graph database: hexastore indexing, joins, traversal, and the
/// optional journal/facets/vector subsystems over a single [`KvStore`]
/// backend.
///
/// Reads and writes take the shared side of an internal gate; [`Self::close`]
/// takes the exclusive side, so no operation can start once a close is in
/// flight and any in-flight operation finishes before close returns (§4.11,
/// §5).
pub struct GraphDb<K: KvStore> {
    kv: Arc<K>,
    store: TripleStore<K>,
    journal: Option<Arc<Journal<K>>>,
    facets: Facets<K>,
    config: Config,
    vector: RwLock<Option<VectorHandle>>,
    gate: RwLock<bool>,
}

impl<K: KvStore> GraphDb<K> {
    /// Opens a database over an already-constructed `kv` backend.
    pub fn open(kv: Arc<K>, config: Config) -> Result<Self> {
        config.validate()?;

        let journal = if config.journal.enabled {
            let clock: Arc<dyn hexastore_core::journal::Clock> = Arc::new(SystemClock);
            Some(Arc::new(Journal::open(kv.clone(), clock)?))
        } else {
            None
        };

        let store = TripleStore::new(kv.clone(), journal.clone());
        let facets = Facets::new(kv.clone());

        tracing::debug!(
            target: "hexastore::db",
            backend = ?config.backend,
            journal = config.journal.enabled,
            facets = config.facets_enabled,
            vector = config.vector.enabled,
            "opened graph database"
        );

        Ok(Self {
            kv,
            store,
            journal,
            facets,
            config,
            vector: RwLock::new(None),
            gate: RwLock::new(false),
        })
    }

    /// Attaches a vector index (and optionally an embedder for text queries)
    /// for use by [`Self::vector_filter`] and [`Self::index_vector`]. Starts
    /// the background embed worker when the config requests async embedding
    /// (`embed_queue_depth > 0`) and an embedder is given.
    pub fn with_vector(
        &self,
        index: Arc<dyn VectorIndex>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<()> {
        if !self.config.vector.enabled {
            return Err(GraphError::VectorsDisabled);
        }

        let (embed_tx, embed_worker) = match (&embedder, self.config.vector.embed_queue_depth) {
            (Some(embedder), depth) if depth > 0 => {
                let (tx, rx): (SyncSender<EmbedJob>, Receiver<EmbedJob>) =
                    mpsc::sync_channel(depth);
                let worker_index = index.clone();
                let worker_embedder = embedder.clone();
                let handle = std::thread::spawn(move || {
                    embed_worker_loop(rx, worker_index, worker_embedder);
                });
                (Some(tx), Some(handle))
            }
            _ => (None, None),
        };

        *self.vector.write().unwrap() = Some(VectorHandle {
            index,
            embedder,
            embed_tx,
            embed_worker,
        });
        Ok(())
    }

    /// Takes the shared side of the gate, held by the caller for the
    /// duration of its operation. `close` takes the exclusive side, which
    /// blocks until every outstanding guard (and so every in-flight read or
    /// write) has been dropped.
    fn guard(&self) -> Result<RwLockReadGuard<'_, bool>> {
        let guard = self.gate.read().unwrap();
        if *guard {
            return Err(GraphError::Closed);
        }
        Ok(guard)
    }

    /// Closes the database: blocks new operations, waits for any in-flight
    /// one to finish, closes the `KvStore` backend, and joins the background
    /// embed worker (if running).
    pub fn close(&self) -> Result<()> {
        let mut closed = self.gate.write().unwrap();
        if *closed {
            return Ok(());
        }
        *closed = true;
        drop(closed);

        if let Some(handle) = self.vector.write().unwrap().as_mut() {
            handle.embed_tx.take();
            if let Some(worker) = handle.embed_worker.take() {
                let _ = worker.join();
            }
        }

        self.kv.close()?;

        tracing::debug!(target: "hexastore::db", "closed graph database");
        Ok(())
    }

    pub fn kv(&self) -> &Arc<K> {
        &self.kv
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scan_defaults(&self) -> ScanDefaults {
        ScanDefaults {
            default_limit: self.config.default_pattern_limit,
        }
    }

    // -- triples -----------------------------------------------------------

    pub fn put(&self, triples: &[Triple]) -> Result<()> {
        let _guard = self.guard()?;
        self.store.put(triples)
    }

    pub fn del(&self, triples: &[Triple]) -> Result<()> {
        let _guard = self.guard()?;
        self.store.del(triples)
    }

    pub fn contains(&self, triple: &Triple) -> Result<bool> {
        let _guard = self.guard()?;
        self.store.contains(triple)
    }

    /// Runs `navigator`'s recorded patterns against this database. The
    /// returned iterator keeps the gate's shared side held until it is
    /// exhausted or dropped, so `close` waits for it too.
    pub fn solutions(&self, navigator: &Navigator) -> Result<GuardedJoinIter<'_, K>> {
        let guard = self.guard()?;
        let inner = navigator.solutions(self.kv.clone(), self.scan_defaults())?;
        Ok(GuardedJoinIter { inner, _guard: guard })
    }

    pub fn values(&self, navigator: &Navigator) -> Result<Vec<Value>> {
        let _guard = self.guard()?;
        navigator.values(self.kv.clone(), self.scan_defaults())
    }

    /// Same in-flight guarantee as [`Self::solutions`].
    pub fn triples(&self, navigator: &Navigator, materialise: Pattern) -> Result<GuardedJoinIter<'_, K>> {
        let guard = self.guard()?;
        let inner = navigator.triples(self.kv.clone(), materialise, self.scan_defaults())?;
        Ok(GuardedJoinIter { inner, _guard: guard })
    }

    // -- journal -------------------------------------------------------------

    fn journal(&self) -> Result<&Arc<Journal<K>>> {
        self.journal.as_ref().ok_or(GraphError::JournalDisabled)
    }

    pub fn journal_count(&self, before: Option<u64>) -> Result<usize> {
        let _guard = self.guard()?;
        self.journal()?.count(before)
    }

    pub fn journal_trim(&self, before: u64) -> Result<usize> {
        let _guard = self.guard()?;
        self.journal()?.trim(before)
    }

    pub fn journal_replay(&self, after: Option<(u64, u64)>, target: &TripleStore<K>) -> Result<usize> {
        let _guard = self.guard()?;
        self.journal()?.replay(after, target)
    }

    // -- facets --------------------------------------------------------------

    fn facets(&self) -> Result<&Facets<K>> {
        if !self.config.facets_enabled {
            return Err(GraphError::FacetsDisabled);
        }
        Ok(&self.facets)
    }

    pub fn set_component_facet(
        &self,
        kind: ComponentKind,
        value: &[u8],
        facet_key: &[u8],
        facet_value: &[u8],
    ) -> Result<()> {
        let _guard = self.guard()?;
        self.facets()?.set_component(kind, value, facet_key, facet_value)
    }

    pub fn get_component_facet(
        &self,
        kind: ComponentKind,
        value: &[u8],
        facet_key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let _guard = self.guard()?;
        self.facets()?.get_component(kind, value, facet_key)
    }

    pub fn set_triple_facet(&self, triple: &Triple, facet_key: &[u8], facet_value: &[u8]) -> Result<()> {
        let _guard = self.guard()?;
        self.facets()?.set_triple(triple, facet_key, facet_value)
    }

    pub fn get_triple_facet(&self, triple: &Triple, facet_key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _guard = self.guard()?;
        self.facets()?.get_triple(triple, facet_key)
    }

    // -- vector --------------------------------------------------------------

    /// Adds `vector` to the attached vector index under `id`, synchronously.
    pub fn index_vector(&self, id: &[u8], vector: &[f32]) -> Result<()> {
        let _guard = self.guard()?;
        let guard = self.vector.read().unwrap();
        let handle = guard.as_ref().ok_or(GraphError::VectorsDisabled)?;
        handle.index.add(id, vector)
    }

    /// Embeds `text` and indexes it under `id`. Runs inline when no
    /// background worker is configured; otherwise queues the job and returns
    /// immediately (back-pressured by the bounded channel).
    pub fn index_text(&self, id: &[u8], text: &str) -> Result<()> {
        let _guard = self.guard()?;
        let guard = self.vector.read().unwrap();
        let handle = guard.as_ref().ok_or(GraphError::VectorsDisabled)?;

        match &handle.embed_tx {
            Some(tx) => {
                tx.send(EmbedJob {
                    id: id.to_vec(),
                    text: text.to_string(),
                })
                .map_err(|_| GraphError::Store("embed worker channel closed".into()))?;
                Ok(())
            }
            None => {
                let embedder = handle.embedder.as_ref().ok_or(GraphError::EmbedderRequired)?;
                let vector = embedder.embed(text)?;
                handle.index.add(id, &vector)
            }
        }
    }

    pub fn vector_filter(&self, solutions: Vec<Solution>, spec: &VectorFilterSpec) -> Result<Vec<Solution>> {
        let _guard = self.guard()?;
        if !self.config.vector.enabled {
            return Err(GraphError::VectorsDisabled);
        }
        let guard = self.vector.read().unwrap();
        let handle = guard.as_ref().ok_or(GraphError::VectorsDisabled)?;
        hexastore_core::vector::filter_solutions(
            solutions,
            spec,
            handle.index.as_ref(),
            handle.embedder.as_deref(),
        )
    }
}

/// A [`JoinIter`] wrapped with the gate's shared-side guard, returned by
/// [`GraphDb::solutions`] and [`GraphDb::triples`]. Keeps the guard alive
/// for as long as the caller holds or streams this iterator, so `close`'s
/// exclusive-side acquisition genuinely blocks on it (§4.11, §9).
pub struct GuardedJoinIter<'a, K: KvStore> {
    inner: JoinIter<K>,
    _guard: RwLockReadGuard<'a, bool>,
}

impl<'a, K: KvStore> Iterator for GuardedJoinIter<'a, K> {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

fn embed_worker_loop(rx: Receiver<EmbedJob>, index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) {
    while let Ok(job) = rx.recv() {
        match embedder.embed(&job.text) {
            Ok(vector) => {
                if let Err(err) = index.add(&job.id, &vector) {
                    tracing::warn!(target: "hexastore::db", error = %err, "background embed index write failed");
                }
            }
            Err(err) => {
                tracing::warn!(target: "hexastore::db", error = %err, "background embed failed");
            }
        }
    }
}

impl GraphDb<MemKv> {
    /// Opens an in-memory database. Never fails.
    pub fn open_memory(config: Config) -> Result<Self> {
        Self::open(Arc::new(MemKv::new()), config)
    }
}

#[cfg(feature = "fjall")]
impl GraphDb<FjallKv> {
    pub fn open_fjall(path: impl AsRef<std::path::Path>, config: Config) -> Result<Self> {
        Self::open(Arc::new(FjallKv::open(path)?), config)
    }
}

#[cfg(feature = "redb")]
impl GraphDb<RedbKv> {
    pub fn open_redb(path: impl AsRef<std::path::Path>, config: Config) -> Result<Self> {
        Self::open(Arc::new(RedbKv::open(path)?), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_contains_del_roundtrip() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        let t = Triple::new("alice", "knows", "bob");
        db.put(&[t.clone()]).unwrap();
        assert!(db.contains(&t).unwrap());
        db.del(&[t.clone()]).unwrap();
        assert!(!db.contains(&t).unwrap());
    }

    #[test]
    fn closed_database_rejects_further_operations() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        db.close().unwrap();
        let err = db.put(&[Triple::new("a", "p", "b")]).unwrap_err();
        assert!(matches!(err, GraphError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        db.close().unwrap();
        db.close().unwrap();
    }

    #[test]
    fn navigator_traversal_through_the_facade() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        db.put(&[
            Triple::new("alice", "knows", "bob"),
            Triple::new("alice", "knows", "carol"),
        ])
        .unwrap();

        let nav = Navigator::new().go("alice").arch_out("knows");
        let mut values: Vec<_> = db
            .values(&nav)
            .unwrap()
            .into_iter()
            .map(|v| v.into_bytes())
            .collect();
        values.sort();
        assert_eq!(values, vec![b"bob".to_vec(), b"carol".to_vec()]);
    }

    #[test]
    fn journal_disabled_by_default() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        let err = db.journal_count(None).unwrap_err();
        assert!(matches!(err, GraphError::JournalDisabled));
    }

    #[test]
    fn journal_enabled_records_mutations() {
        let mut config = Config::default();
        config.journal.enabled = true;
        let db = GraphDb::open_memory(config).unwrap();
        db.put(&[Triple::new("a", "p", "b")]).unwrap();
        assert_eq!(db.journal_count(None).unwrap(), 1);
    }

    #[test]
    fn facets_disabled_by_default() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        let err = db
            .set_triple_facet(&Triple::new("a", "p", "b"), b"k", b"v")
            .unwrap_err();
        assert!(matches!(err, GraphError::FacetsDisabled));
    }

    #[test]
    fn facets_enabled_roundtrip() {
        let mut config = Config::default();
        config.facets_enabled = true;
        let db = GraphDb::open_memory(config).unwrap();
        let t = Triple::new("a", "p", "b");
        db.set_triple_facet(&t, b"since", b"2020").unwrap();
        assert_eq!(db.get_triple_facet(&t, b"since").unwrap(), Some(b"2020".to_vec()));
    }

    #[test]
    fn vector_disabled_by_default() {
        let db = GraphDb::open_memory(Config::default()).unwrap();
        let err = db.index_vector(b"x", &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, GraphError::VectorsDisabled));
    }

    #[cfg(feature = "vector")]
    #[test]
    fn vector_enabled_synchronous_embed_and_filter() {
        let mut config = Config::default();
        config.vector.enabled = true;
        config.vector.dimensions = 8;
        let db = GraphDb::open_memory(config).unwrap();

        let index: Arc<dyn VectorIndex> = Arc::new(FlatVectorIndex::new(8));
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(8));
        db.with_vector(index, Some(embedder)).unwrap();

        // index_text keys the vector under the raw id passed in, while
        // filter_solutions looks it up under VectorId::encode(id_type, value)
        // — the two must agree for a bound variable to resolve to a vector.
        let tennis_id = VectorId::new("topic", b"tennis".to_vec()).encode();
        let football_id = VectorId::new("topic", b"football".to_vec()).encode();
        db.index_text(&tennis_id, "tennis").unwrap();
        db.index_text(&football_id, "football").unwrap();

        let solution = Solution::new().unify("topic", &"tennis".into()).unwrap();
        let spec = VectorFilterSpec {
            variable: "topic".to_string(),
            query: VectorQuery::Text("tennis"),
            id_type: "topic".to_string(),
            top_k: 1,
            min_score: 0.0,
        };

        let results = db.vector_filter(vec![solution], &spec).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn close_waits_for_an_outstanding_solutions_iterator() {
        let db = Arc::new(GraphDb::open_memory(Config::default()).unwrap());
        db.put(&[Triple::new("alice", "knows", "bob")]).unwrap();

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();

        let reader_db = db.clone();
        let reader = std::thread::spawn(move || {
            let nav = Navigator::new().go("alice").arch_out("knows");
            let iter = reader_db.solutions(&nav).unwrap();
            ready_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            drop(iter);
        });

        ready_rx.recv().unwrap();

        let closer_db = db.clone();
        let closer = std::thread::spawn(move || closer_db.close().unwrap());

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(
            !closer.is_finished(),
            "close must block while a solutions iterator is still outstanding"
        );

        release_tx.send(()).unwrap();
        reader.join().unwrap();
        closer.join().unwrap();
    }
}
