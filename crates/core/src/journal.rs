//! Append-only mutation log (C8): replay, trim, export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GraphError, Result};
use crate::kv::{Batch, KvStore};
use crate::record::{self, Op};
use crate::store::TripleStore;
use crate::triple::Triple;

const JOURNAL_PREFIX: &[u8] = b"journal";

/// Source of timestamps for journal entries. Abstracted so tests can use a
/// deterministic clock instead of the wall clock.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// The wall clock, in nanoseconds since the Unix epoch.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before the Unix epoch")
            .as_nanos() as u64
    }
}

fn journal_key(timestamp_ns: u64, counter: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(JOURNAL_PREFIX.len() + 2 + 8 + 8);
    out.extend_from_slice(JOURNAL_PREFIX);
    out.extend_from_slice(crate::codec::SEPARATOR);
    out.extend_from_slice(&timestamp_ns.to_be_bytes());
    out.extend_from_slice(&counter.to_be_bytes());
    out
}

fn journal_scan_prefix() -> Vec<u8> {
    let mut out = JOURNAL_PREFIX.to_vec();
    out.extend_from_slice(crate::codec::SEPARATOR);
    out
}

fn decode_key_suffix(key: &[u8]) -> Option<(u64, u64)> {
    let prefix = journal_scan_prefix();
    let tail = key.strip_prefix(prefix.as_slice())?;
    if tail.len() != 16 {
        return None;
    }
    let timestamp_ns = u64::from_be_bytes(tail[..8].try_into().ok()?);
    let counter = u64::from_be_bytes(tail[8..].try_into().ok()?);
    Some((timestamp_ns, counter))
}

/// A single journal record: the mutation kind, the triple it applied to, and
/// when (and in what order relative to same-tick siblings) it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub op: Op,
    pub triple: Triple,
    pub timestamp_ns: u64,
    pub counter: u64,
}

/// Append-only log of successful mutations, keyed so that byte order equals
/// temporal order (timestamp, then a monotonic per-database counter that
/// disambiguates entries created within the same clock tick).
pub struct Journal<K: KvStore> {
    kv: Arc<K>,
    counter: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<K: KvStore> Journal<K> {
    /// Opens the journal, recovering the counter from the highest existing
    /// entry so a freshly-reopened database never reuses a counter value —
    /// the counter is per-open-database state, not a process-wide global.
    pub fn open(kv: Arc<K>, clock: Arc<dyn Clock>) -> Result<Self> {
        let next_counter = match Self::tip_entry(&kv)? {
            Some(entry) => entry.counter + 1,
            None => 0,
        };

        Ok(Self {
            kv,
            counter: AtomicU64::new(next_counter),
            clock,
        })
    }

    fn tip_entry(kv: &K) -> Result<Option<JournalEntry>> {
        let prefix = journal_scan_prefix();
        let upper = crate::codec::prefix_upper_bound(&prefix);
        let mut iter = kv.scan(&prefix, upper.as_deref())?;
        match iter.next_back() {
            Some(entry) => {
                let (key, value) = entry?;
                Ok(Some(decode_entry(&key, &value)?))
            }
            None => Ok(None),
        }
    }

    /// Stages one journal entry per triple into `batch`, sharing a single
    /// timestamp tick and consuming one counter value per triple, so the
    /// entries commit atomically with whatever index writes share the batch.
    pub fn stage(&self, batch: &mut Batch, op: Op, triples: &[Triple]) -> Result<()> {
        let timestamp_ns = self.clock.now_ns();
        for triple in triples {
            let counter = self.counter.fetch_add(1, Ordering::SeqCst);
            let key = journal_key(timestamp_ns, counter);
            let value = record::encode_journal_record(op, timestamp_ns, triple);
            batch.put(key, value);
        }
        Ok(())
    }

    /// Iterates every entry with timestamp strictly less than `before`, or
    /// every entry when `before` is `None`.
    pub fn iter(&self, before: Option<u64>) -> Result<impl Iterator<Item = Result<JournalEntry>>> {
        let prefix = journal_scan_prefix();
        let upper = match before {
            Some(ts) => Some(journal_key(ts, 0)),
            None => crate::codec::prefix_upper_bound(&prefix),
        };
        let inner = self.kv.scan(&prefix, upper.as_deref())?;
        Ok(inner.map(|r| r.and_then(|(k, v)| decode_entry(&k, &v))))
    }

    pub fn count(&self, before: Option<u64>) -> Result<usize> {
        Ok(self.iter(before)?.collect::<Result<Vec<_>>>()?.len())
    }

    /// Deletes every entry with timestamp strictly less than `before` in one
    /// batch, returning the number removed.
    pub fn trim(&self, before: u64) -> Result<usize> {
        let entries: Vec<JournalEntry> = self.iter(Some(before))?.collect::<Result<_>>()?;

        let mut batch = Batch::new();
        for entry in &entries {
            batch.delete(journal_key(entry.timestamp_ns, entry.counter));
        }
        self.kv.write_batch(batch)?;

        tracing::debug!(target: "hexastore::journal", count = entries.len(), before, "trimmed journal");
        Ok(entries.len())
    }

    /// Writes every entry with timestamp strictly less than `before` into
    /// `target`'s journal, then deletes them from this journal. The target
    /// write happens first; if it fails, this journal is left untouched.
    pub fn trim_and_export(&self, before: u64, target: &Journal<K>) -> Result<usize> {
        let entries: Vec<JournalEntry> = self.iter(Some(before))?.collect::<Result<_>>()?;

        let mut export_batch = Batch::new();
        for entry in &entries {
            let key = journal_key(entry.timestamp_ns, entry.counter);
            let value = record::encode_journal_record(entry.op, entry.timestamp_ns, &entry.triple);
            export_batch.put(key, value);
        }
        target.kv.write_batch(export_batch)?;

        let mut delete_batch = Batch::new();
        for entry in &entries {
            delete_batch.delete(journal_key(entry.timestamp_ns, entry.counter));
        }
        self.kv.write_batch(delete_batch)?;

        Ok(entries.len())
    }

    /// Replays every entry with timestamp/counter strictly after `after`
    /// into `target`, reproducing the exact sequence of puts/deletes.
    /// `after = None` replays the whole journal.
    pub fn replay(&self, after: Option<(u64, u64)>, target: &TripleStore<K>) -> Result<usize> {
        let prefix = journal_scan_prefix();
        let lower = match after {
            Some((ts, counter)) => {
                crate::codec::prefix_upper_bound(&journal_key(ts, counter)).unwrap_or(prefix.clone())
            }
            None => prefix.clone(),
        };
        let upper = crate::codec::prefix_upper_bound(&prefix);
        let iter = self.kv.scan(&lower, upper.as_deref())?;

        let mut applied = 0;
        for item in iter {
            let (key, value) = item?;
            let entry = decode_entry(&key, &value)?;
            match entry.op {
                Op::Put => target.put(std::slice::from_ref(&entry.triple))?,
                Op::Del => target.del(std::slice::from_ref(&entry.triple))?,
            }
            applied += 1;
        }

        Ok(applied)
    }
}

fn decode_entry(key: &[u8], value: &[u8]) -> Result<JournalEntry> {
    let (timestamp_from_key, counter) =
        decode_key_suffix(key).ok_or_else(|| GraphError::Decode("malformed journal key".into()))?;
    let (op, timestamp_ns, triple) =
        record::decode_journal_record(value).map_err(|e| GraphError::Decode(e.to_string()))?;
    debug_assert_eq!(timestamp_from_key, timestamp_ns);
    Ok(JournalEntry {
        op,
        triple,
        timestamp_ns,
        counter,
    })
}
