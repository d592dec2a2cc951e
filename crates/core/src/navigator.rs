//! Fluent graph-traversal builder (C7): compiles a sequence of steps into
//! the pattern list consumed by the join engine.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::join::{self, JoinIter, JoinOptions};
use crate::kv::KvStore;
use crate::pattern::{Pattern, PatternFilter, PatternPosition};
use crate::scan::ScanDefaults;
use crate::solution::Solution;
use crate::triple::Value;

/// Reserved prefix for auto-generated binding names, so they never collide
/// with a name the caller passes to [`Navigator::as_name`].
const ANON_PREFIX: &str = "__anon";

#[derive(Clone, Debug)]
enum Position {
    Value(Value),
    Binding(String),
}

/// Builds a pattern list by recording directed steps over an implicit
/// "current position", then runs it through the join engine.
#[derive(Clone)]
pub struct Navigator {
    current: Position,
    patterns: Vec<Pattern>,
    initial: Solution,
    anon_counter: usize,
    cancel: Option<CancellationToken>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    /// Starts a traversal at a fresh anonymous binding.
    pub fn new() -> Self {
        let mut nav = Self {
            current: Position::Binding(String::new()),
            patterns: Vec::new(),
            initial: Solution::new(),
            anon_counter: 0,
            cancel: None,
        };
        nav.current = nav.fresh_anon();
        nav
    }

    fn fresh_anon(&mut self) -> Position {
        let name = format!("{ANON_PREFIX}{}", self.anon_counter);
        self.anon_counter += 1;
        Position::Binding(name)
    }

    fn current_position(&self) -> PatternPosition {
        match &self.current {
            Position::Value(v) => PatternPosition::Exact(v.clone()),
            Position::Binding(name) => PatternPosition::Binding(name.clone()),
        }
    }

    /// Sets the current position to a concrete value.
    pub fn go(mut self, value: impl Into<Value>) -> Self {
        self.current = Position::Value(value.into());
        self
    }

    /// Sets the current position to a fresh anonymous binding.
    pub fn go_anonymous(mut self) -> Self {
        self.current = self.fresh_anon();
        self
    }

    /// Sets the current position to an existing named binding.
    pub fn go_binding(mut self, name: impl Into<String>) -> Self {
        self.current = Position::Binding(name.into());
        self
    }

    /// Appends `(current, predicate, new_anon)`; current becomes `new_anon`.
    pub fn arch_out(mut self, predicate: impl Into<Value>) -> Self {
        let from = self.current_position();
        let next = self.fresh_anon();
        let pattern = Pattern::new(
            from,
            PatternPosition::exact(predicate.into()),
            position_to_pattern(&next),
        );
        self.patterns.push(pattern);
        self.current = next;
        self
    }

    /// Appends `(new_anon, predicate, current)`; current becomes `new_anon`.
    pub fn arch_in(mut self, predicate: impl Into<Value>) -> Self {
        let to = self.current_position();
        let next = self.fresh_anon();
        let pattern = Pattern::new(
            position_to_pattern(&next),
            PatternPosition::exact(predicate.into()),
            to,
        );
        self.patterns.push(pattern);
        self.current = next;
        self
    }

    /// Renames the current anonymous binding to `name`, rewriting every
    /// pattern and any initial binding already recorded under the old name.
    pub fn as_name(mut self, name: impl Into<String>) -> Self {
        let new_name = name.into();
        if let Position::Binding(old_name) = self.current.clone() {
            self.rename_binding(&old_name, &new_name);
        }
        self.current = Position::Binding(new_name);
        self
    }

    fn rename_binding(&mut self, old: &str, new: &str) {
        for pattern in &mut self.patterns {
            for position in [&mut pattern.subject, &mut pattern.predicate, &mut pattern.object] {
                if let PatternPosition::Binding(name) = position {
                    if name == old {
                        *name = new.to_string();
                    }
                }
            }
        }

        if let Some(value) = self.initial.get(old).cloned() {
            let remaining: Vec<(String, Value)> = self
                .initial
                .iter()
                .filter(|(k, _)| *k != old)
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            self.initial = remaining
                .into_iter()
                .chain(std::iter::once((new.to_string(), value)))
                .collect();
        }
    }

    /// Pins the current binding to `value` in the initial solution.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        if let Position::Binding(name) = self.current.clone() {
            let value = value.into();
            if let Some(updated) = self.initial.unify(&name, &value) {
                self.initial = updated;
            }
        }
        self
    }

    /// Attaches `filter` to the most recently appended pattern.
    pub fn filter(mut self, filter: PatternFilter) -> Self {
        if let Some(last) = self.patterns.last_mut() {
            last.filter = Some(filter);
        }
        self
    }

    /// Attaches a cancellation token, checked once per solution by every
    /// terminal that streams through the join engine.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The name of the current binding, if the current position isn't
    /// already pinned to a concrete value.
    pub fn current_binding_name(&self) -> Option<&str> {
        match &self.current {
            Position::Binding(name) => Some(name),
            Position::Value(_) => None,
        }
    }

    /// Runs the recorded patterns through the join engine, returning every
    /// solution.
    pub fn solutions<K: KvStore>(&self, kv: Arc<K>, defaults: ScanDefaults) -> Result<JoinIter<K>> {
        let options = JoinOptions {
            cancel: self.cancel.clone(),
            ..Default::default()
        };
        join::join(kv, self.patterns.clone(), self.initial.clone(), options, defaults)
    }

    /// Deduplicated values bound to the current position across all
    /// solutions. If the current position is already a concrete value,
    /// returns that single value without running the join.
    pub fn values<K: KvStore>(&self, kv: Arc<K>, defaults: ScanDefaults) -> Result<Vec<Value>> {
        let name = match &self.current {
            Position::Value(v) => return Ok(vec![v.clone()]),
            Position::Binding(name) => name.clone(),
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for solution in self.solutions(kv, defaults)? {
            let solution = solution?;
            if let Some(value) = solution.get(&name) {
                if seen.insert(value.clone()) {
                    out.push(value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Runs the join with materialisation pattern `m`, projecting each
    /// solution into a `subject`/`predicate`/`object`-bound solution.
    pub fn triples<K: KvStore>(
        &self,
        kv: Arc<K>,
        m: Pattern,
        defaults: ScanDefaults,
    ) -> Result<JoinIter<K>> {
        let options = JoinOptions {
            materialise: Some(m),
            cancel: self.cancel.clone(),
            ..Default::default()
        };
        join::join(kv, self.patterns.clone(), self.initial.clone(), options, defaults)
    }

    pub fn first<K: KvStore>(&self, kv: Arc<K>, defaults: ScanDefaults) -> Result<Option<Solution>> {
        match self.solutions(kv, defaults)?.next() {
            Some(r) => r.map(Some),
            None => Ok(None),
        }
    }

    pub fn exists<K: KvStore>(&self, kv: Arc<K>, defaults: ScanDefaults) -> Result<bool> {
        Ok(self.first(kv, defaults)?.is_some())
    }

    pub fn count<K: KvStore>(&self, kv: Arc<K>, defaults: ScanDefaults) -> Result<usize> {
        let mut n = 0;
        for solution in self.solutions(kv, defaults)? {
            solution?;
            n += 1;
        }
        Ok(n)
    }
}

fn position_to_pattern(position: &Position) -> PatternPosition {
    match position {
        Position::Value(v) => PatternPosition::Exact(v.clone()),
        Position::Binding(name) => PatternPosition::Binding(name.clone()),
    }
}
