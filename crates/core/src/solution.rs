//! Variable bindings produced by the join engine (§3, §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use crate::triple::Value;

/// A mapping from binding name to value. Order-irrelevant; a name appears at
/// most once. The empty solution is valid and is the seed of any join.
///
/// Cloning a `Solution` is cheap: the backing map is reference-counted and
/// copy-on-write, since the join engine clones a solution at every
/// extension point on the backtracking stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    bindings: Arc<HashMap<String, Value>>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Attempts to bind `name` to `value`.
    ///
    /// A binding, once set, is never rewritten to a different value:
    /// unification fails (returns `None`) instead, pruning that branch. If
    /// `name` is already bound to `value`, this is a no-op success.
    pub fn unify(&self, name: &str, value: &Value) -> Option<Solution> {
        match self.bindings.get(name) {
            Some(existing) if existing == value => Some(self.clone()),
            Some(_) => None,
            None => {
                let mut map = (*self.bindings).clone();
                map.insert(name.to_string(), value.clone());
                Some(Solution {
                    bindings: Arc::new(map),
                })
            }
        }
    }
}

impl FromIterator<(String, Value)> for Solution {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            bindings: Arc::new(iter.into_iter().collect()),
        }
    }
}
