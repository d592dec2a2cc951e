//! Side-band component and triple facets (C9).
//!
//! Facets live in their own keyspace and have an independent lifecycle from
//! the triples or components they annotate — deleting a triple does not
//! cascade-delete its triple facets (see the design note this mirrors).

use crate::codec::{self, SEPARATOR};
use crate::error::{GraphError, Result};
use crate::kv::KvStore;
use crate::triple::Triple;

const COMPONENT_PREFIX: &[u8] = b"facet";
const TRIPLE_PREFIX: &[u8] = b"triple_facet";

/// Which triple position a component facet is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Subject,
    Predicate,
    Object,
}

impl ComponentKind {
    fn tag(self) -> &'static [u8] {
        match self {
            ComponentKind::Subject => b"subject",
            ComponentKind::Predicate => b"predicate",
            ComponentKind::Object => b"object",
        }
    }
}

fn component_prefix(kind: ComponentKind, value: &[u8]) -> Vec<u8> {
    let mut out = COMPONENT_PREFIX.to_vec();
    codec::push_field(&mut out, kind.tag());
    codec::push_field(&mut out, value);
    out
}

fn component_key(kind: ComponentKind, value: &[u8], facet_key: &[u8]) -> Vec<u8> {
    let mut out = component_prefix(kind, value);
    codec::push_field(&mut out, facet_key);
    out
}

fn triple_prefix(triple: &Triple) -> Vec<u8> {
    let mut out = TRIPLE_PREFIX.to_vec();
    codec::push_field(&mut out, triple.subject.as_bytes());
    codec::push_field(&mut out, triple.predicate.as_bytes());
    codec::push_field(&mut out, triple.object.as_bytes());
    out
}

fn triple_key(triple: &Triple, facet_key: &[u8]) -> Vec<u8> {
    let mut out = triple_prefix(triple);
    codec::push_field(&mut out, facet_key);
    out
}

/// Decodes the `facet_key` tail of a key built as `prefix ‖ S ‖ encode(facet_key)`.
fn decode_tail_field(key: &[u8], prefix: &[u8]) -> Result<Vec<u8>> {
    let tail = key
        .strip_prefix(prefix)
        .and_then(|t| t.strip_prefix(SEPARATOR))
        .ok_or_else(|| GraphError::Decode("malformed facet key".into()))?;
    codec::decode(tail).map_err(GraphError::from)
}

/// Facet storage layered over a [`KvStore`].
pub struct Facets<K: KvStore> {
    kv: std::sync::Arc<K>,
}

impl<K: KvStore> Facets<K> {
    pub fn new(kv: std::sync::Arc<K>) -> Self {
        Self { kv }
    }

    pub fn get_component(
        &self,
        kind: ComponentKind,
        value: &[u8],
        facet_key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.kv.get(&component_key(kind, value, facet_key))
    }

    pub fn set_component(
        &self,
        kind: ComponentKind,
        value: &[u8],
        facet_key: &[u8],
        facet_value: &[u8],
    ) -> Result<()> {
        self.kv.put(&component_key(kind, value, facet_key), facet_value)
    }

    pub fn delete_component(&self, kind: ComponentKind, value: &[u8], facet_key: &[u8]) -> Result<()> {
        self.kv.delete(&component_key(kind, value, facet_key))
    }

    /// All `(facet_key, facet_value)` pairs attached to `(kind, value)`.
    pub fn iter_component(
        &self,
        kind: ComponentKind,
        value: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = component_prefix(kind, value);
        self.kv
            .scan_prefix(&prefix)?
            .map(|r| {
                let (key, value) = r?;
                let facet_key = decode_tail_field(&key, &prefix)?;
                Ok((facet_key, value))
            })
            .collect()
    }

    pub fn get_triple(&self, triple: &Triple, facet_key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.kv.get(&triple_key(triple, facet_key))
    }

    pub fn set_triple(&self, triple: &Triple, facet_key: &[u8], facet_value: &[u8]) -> Result<()> {
        self.kv.put(&triple_key(triple, facet_key), facet_value)
    }

    pub fn delete_triple(&self, triple: &Triple, facet_key: &[u8]) -> Result<()> {
        self.kv.delete(&triple_key(triple, facet_key))
    }

    /// All `(facet_key, facet_value)` pairs attached to `triple`.
    pub fn iter_triple(&self, triple: &Triple) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = triple_prefix(triple);
        self.kv
            .scan_prefix(&prefix)?
            .map(|r| {
                let (key, value) = r?;
                let facet_key = decode_tail_field(&key, &prefix)?;
                Ok((facet_key, value))
            })
            .collect()
    }

    /// Deletes every facet attached to `triple`. Does not touch the triple
    /// itself or its component facets; callers wanting those gone must
    /// delete them separately.
    pub fn delete_all_triple_facets(&self, triple: &Triple) -> Result<usize> {
        let prefix = triple_prefix(triple);
        let keys: Vec<Vec<u8>> = self
            .kv
            .scan_prefix(&prefix)?
            .map(|r| r.map(|(k, _)| k))
            .collect::<Result<_>>()?;

        let mut batch = crate::kv::Batch::new();
        for key in &keys {
            batch.delete(key.clone());
        }
        self.kv.write_batch(batch)?;
        Ok(keys.len())
    }
}
