//! The six hexastore orderings and the index selector (C3).

use std::collections::HashSet;

use crate::pattern::{Pattern, PatternPosition};
use crate::triple::Triple;

/// Which triple position a key field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Subject,
    Predicate,
    Object,
}

/// One of the six hexastore orderings. The name spells out the order in
/// which subject/predicate/object appear in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Spo,
    Sop,
    Pos,
    Pso,
    Ops,
    Osp,
}

/// All six indexes, with `Spo` listed first so that ties in [`select`]
/// resolve to it (the canonical choice per the design notes).
pub const ALL_INDEXES: [Index; 6] = [
    Index::Spo,
    Index::Sop,
    Index::Pos,
    Index::Pso,
    Index::Ops,
    Index::Osp,
];

impl Index {
    /// Distinct fixed 3-byte ASCII tag, also the on-disk key prefix.
    pub fn tag(self) -> &'static [u8] {
        match self {
            Index::Spo => b"spo",
            Index::Sop => b"sop",
            Index::Pos => b"pos",
            Index::Pso => b"pso",
            Index::Ops => b"ops",
            Index::Osp => b"osp",
        }
    }

    /// The field order this index stores a triple's components in.
    pub fn order(self) -> [Field; 3] {
        use Field::*;
        match self {
            Index::Spo => [Subject, Predicate, Object],
            Index::Sop => [Subject, Object, Predicate],
            Index::Pos => [Predicate, Object, Subject],
            Index::Pso => [Predicate, Subject, Object],
            Index::Ops => [Object, Predicate, Subject],
            Index::Osp => [Object, Subject, Predicate],
        }
    }

    /// Reorders a triple's fields into this index's key order.
    pub fn fields_of(self, triple: &Triple) -> [&[u8]; 3] {
        self.order().map(|field| field_value(triple, field))
    }

    /// Builds the full key for `triple` under this index.
    pub fn key_for(self, triple: &Triple) -> Vec<u8> {
        crate::codec::build_key(self.tag(), self.fields_of(triple))
    }
}

fn field_value(triple: &Triple, field: Field) -> &[u8] {
    match field {
        Field::Subject => triple.subject.as_bytes(),
        Field::Predicate => triple.predicate.as_bytes(),
        Field::Object => triple.object.as_bytes(),
    }
}

fn exact_fields(pattern: &Pattern) -> HashSet<Field> {
    [Field::Subject, Field::Predicate, Field::Object]
        .into_iter()
        .filter(|&f| pattern.position(f).is_exact())
        .collect()
}

/// The values bound to the leading Exact positions of `pattern` under
/// `index`'s field order, stopping at the first Wildcard/Binding position.
pub fn leading_exact_values<'p>(index: Index, pattern: &'p Pattern) -> Vec<&'p [u8]> {
    let mut out = Vec::new();
    for field in index.order() {
        match pattern.position(field) {
            PatternPosition::Exact(value) => out.push(value.as_bytes()),
            _ => break,
        }
    }
    out
}

/// Picks the index whose leading `k` positions, for `k = |Exact|`, are
/// exactly the pattern's Exact positions (in any order) — so the prefix
/// derived from those positions is maximal.
pub fn select(pattern: &Pattern) -> Index {
    let exact = exact_fields(pattern);

    for index in ALL_INDEXES {
        let order = index.order();
        let leading: HashSet<Field> = order[..exact.len()].iter().copied().collect();
        if leading == exact {
            return index;
        }
    }

    // Unreachable: every index's full 3-element order set equals any
    // |Exact| <= 3 field set picked from {Subject, Predicate, Object}
    // for at least one index, and Spo always matches |Exact| == 0 and 3.
    Index::Spo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    #[test]
    fn no_exact_positions_selects_spo() {
        let pattern = Pattern::new(
            PatternPosition::Wildcard,
            PatternPosition::Wildcard,
            PatternPosition::Wildcard,
        );
        assert_eq!(select(&pattern), Index::Spo);
    }

    #[test]
    fn fully_exact_selects_spo() {
        let pattern = Pattern::new(
            PatternPosition::exact("a"),
            PatternPosition::exact("b"),
            PatternPosition::exact("c"),
        );
        assert_eq!(select(&pattern), Index::Spo);
    }

    #[test]
    fn subject_exact_prefers_subject_leading_index() {
        let pattern = Pattern::new(
            PatternPosition::exact("a"),
            PatternPosition::Wildcard,
            PatternPosition::Wildcard,
        );
        let chosen = select(&pattern);
        assert_eq!(chosen.order()[0], Field::Subject);
    }

    #[test]
    fn object_exact_prefers_object_leading_index() {
        let pattern = Pattern::new(
            PatternPosition::Wildcard,
            PatternPosition::Wildcard,
            PatternPosition::exact("c"),
        );
        let chosen = select(&pattern);
        assert_eq!(chosen.order()[0], Field::Object);
    }

    #[test]
    fn predicate_and_object_exact_selects_matching_prefix() {
        let pattern = Pattern::new(
            PatternPosition::Wildcard,
            PatternPosition::exact("p"),
            PatternPosition::exact("o"),
        );
        let chosen = select(&pattern);
        let leading: HashSet<Field> = chosen.order()[..2].iter().copied().collect();
        assert_eq!(
            leading,
            [Field::Predicate, Field::Object].into_iter().collect()
        );
    }
}
