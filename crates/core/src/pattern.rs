//! Pattern positions and patterns (§3, §4.5).

use std::sync::Arc;

use crate::index::Field;
use crate::solution::Solution;
use crate::triple::{Triple, Value};

/// A per-triple filter attached to a pattern. Filters are applied after a
/// pattern matches a triple via the index and before it reaches the join
/// engine's unification step.
pub type PatternFilter = Arc<dyn Fn(&Triple) -> bool + Send + Sync>;

/// One position (subject, predicate, or object) of a [`Pattern`].
#[derive(Clone)]
pub enum PatternPosition {
    /// No constraint; matches anything.
    Wildcard,
    /// Must equal this exact value.
    Exact(Value),
    /// Must unify with the named binding in the current solution.
    Binding(String),
}

impl PatternPosition {
    pub fn exact(value: impl Into<Value>) -> Self {
        PatternPosition::Exact(value.into())
    }

    pub fn binding(name: impl Into<String>) -> Self {
        PatternPosition::Binding(name.into())
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, PatternPosition::Exact(_))
    }

    pub fn binding_name(&self) -> Option<&str> {
        match self {
            PatternPosition::Binding(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Debug for PatternPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternPosition::Wildcard => write!(f, "*"),
            PatternPosition::Exact(v) => write!(f, "{v:?}"),
            PatternPosition::Binding(name) => write!(f, "?{name}"),
        }
    }
}

/// A query shape over a single triple position triple, plus execution
/// options consumed by the pattern iterator (C5).
#[derive(Clone)]
pub struct Pattern {
    pub subject: PatternPosition,
    pub predicate: PatternPosition,
    pub object: PatternPosition,
    pub filter: Option<PatternFilter>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub reverse: bool,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("subject", &self.subject)
            .field("predicate", &self.predicate)
            .field("object", &self.object)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("reverse", &self.reverse)
            .finish()
    }
}

impl Pattern {
    pub fn new(subject: PatternPosition, predicate: PatternPosition, object: PatternPosition) -> Self {
        Self {
            subject,
            predicate,
            object,
            filter: None,
            limit: None,
            offset: 0,
            reverse: false,
        }
    }

    pub fn with_filter(mut self, filter: PatternFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// The position held by `field` in this pattern.
    pub fn position(&self, field: Field) -> &PatternPosition {
        match field {
            Field::Subject => &self.subject,
            Field::Predicate => &self.predicate,
            Field::Object => &self.object,
        }
    }

    /// The binding names this pattern can introduce, in subject/predicate/object order.
    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|p| p.binding_name())
    }

    /// Returns a copy of this pattern where every `Binding(name)` position
    /// already known in `solution` has been rewritten to `Exact(value)`.
    /// Unknown bindings are left untouched; the join engine unifies those
    /// against matching triples once the scan runs.
    pub fn substitute(&self, solution: &Solution) -> Pattern {
        let resolve = |pos: &PatternPosition| -> PatternPosition {
            match pos {
                PatternPosition::Binding(name) => match solution.get(name) {
                    Some(value) => PatternPosition::Exact(value.clone()),
                    None => pos.clone(),
                },
                other => other.clone(),
            }
        };

        Pattern {
            subject: resolve(&self.subject),
            predicate: resolve(&self.predicate),
            object: resolve(&self.object),
            filter: self.filter.clone(),
            limit: self.limit,
            offset: self.offset,
            reverse: self.reverse,
        }
    }
}
