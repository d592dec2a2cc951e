//! The pattern iterator (C5): a lazy, single-pass sequence of triples
//! matching a [`Pattern`], honouring offset/limit/reverse and the pattern's
//! optional filter.

use crate::error::{GraphError, Result};
use crate::index::{self, leading_exact_values};
use crate::kv::KvStore;
use crate::pattern::Pattern;
use crate::record;
use crate::triple::Triple;

/// Process-wide default applied when a pattern's `limit` is absent or zero
/// and no explicit default has been configured. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanDefaults {
    pub default_limit: Option<usize>,
}

/// Iterates the triples matching `pattern` against `kv`.
///
/// Equivalent to materializing the whole matching, offset-and-limited,
/// filtered sequence eagerly; implemented lazily so joins can short-circuit.
pub struct PatternIter<K: KvStore> {
    inner: K::Iter,
    filter: Option<crate::pattern::PatternFilter>,
    remaining_skip: usize,
    remaining_take: Option<usize>,
    reverse: bool,
    done: bool,
}

impl<K: KvStore> PatternIter<K> {
    pub fn new(kv: &K, pattern: &Pattern, defaults: ScanDefaults) -> Result<Self> {
        let index = index::select(pattern);
        let leading = leading_exact_values(index, pattern);
        let prefix = crate::codec::build_prefix(index.tag(), &leading);
        let upper = crate::codec::prefix_upper_bound(&prefix);

        let inner = kv.scan(&prefix, upper.as_deref())?;

        let limit = match pattern.limit {
            Some(0) | None => defaults.default_limit,
            Some(n) => Some(n),
        };

        Ok(Self {
            inner,
            filter: pattern.filter.clone(),
            remaining_skip: pattern.offset,
            remaining_take: limit,
            reverse: pattern.reverse,
            done: false,
        })
    }

    fn passes_filter(&self, triple: &Triple) -> bool {
        self.filter.as_ref().map(|f| f(triple)).unwrap_or(true)
    }

    fn next_raw(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>)>> {
        if self.reverse {
            self.inner.next_back()
        } else {
            self.inner.next()
        }
    }
}

impl<K: KvStore> Iterator for PatternIter<K> {
    type Item = Result<Triple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.remaining_take == Some(0) {
            self.done = true;
            return None;
        }

        loop {
            let (_, value) = match self.next_raw()? {
                Ok(kv) => kv,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let triple = match record::decode_triple(&value) {
                Ok(t) => t,
                Err(e) => {
                    self.done = true;
                    return Some(Err(GraphError::Decode(e.to_string())));
                }
            };

            if !self.passes_filter(&triple) {
                continue;
            }

            if self.remaining_skip > 0 {
                self.remaining_skip -= 1;
                continue;
            }

            if let Some(take) = self.remaining_take.as_mut() {
                *take -= 1;
            }

            return Some(Ok(triple));
        }
    }
}

/// Eagerly materializes every triple matching `pattern`.
pub fn match_pattern<K: KvStore>(
    kv: &K,
    pattern: &Pattern,
    defaults: ScanDefaults,
) -> Result<Vec<Triple>> {
    PatternIter::new(kv, pattern, defaults)?.collect()
}
