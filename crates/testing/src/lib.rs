//! Shared fixtures, builders, and `proptest` strategies for hexastore's test
//! suites (ambient test tooling).

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use hexastore_core::triple::{Triple, Value};

/// A small social-graph fixture reused across join/navigator tests: three
/// friendship edges forming a triangle plus one out-of-cycle edge.
pub fn triangle_fixture() -> Vec<Triple> {
    vec![
        Triple::new("alice", "knows", "bob"),
        Triple::new("bob", "knows", "carol"),
        Triple::new("carol", "knows", "alice"),
        Triple::new("alice", "knows", "dave"),
    ]
}

/// Builds `count` triples of the form `(subject_i, predicate, object_i)`,
/// useful for exercising limit/offset and scan-boundary behaviour at scale.
pub fn linear_chain(predicate: &str, count: usize) -> Vec<Triple> {
    (0..count)
        .map(|i| Triple::new(format!("s{i}"), predicate, format!("o{i}")))
        .collect()
}

/// An arbitrary non-empty byte string, including bytes that collide with the
/// key codec's separator (`::`) and escape (`\`) tokens — this is the case
/// the codec's escaping exists to handle correctly.
pub fn arbitrary_value_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..12)
}

/// An arbitrary [`Value`] built from [`arbitrary_value_bytes`].
pub fn arbitrary_value() -> impl Strategy<Value = Value> {
    arbitrary_value_bytes().prop_map(Value::new)
}

/// An arbitrary valid (non-empty on every field) [`Triple`].
pub fn arbitrary_triple() -> impl Strategy<Value = Triple> {
    (arbitrary_value(), arbitrary_value(), arbitrary_value())
        .prop_map(|(s, p, o)| Triple::new(s, p, o))
}

/// Shuffles `items` using a seeded RNG, for tests asserting join results are
/// independent of pattern order (commutativity, L5).
pub fn shuffled<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items
}

/// A random non-empty byte string of length `1..=max_len`, for fuzzing the
/// key codec outside of `proptest`'s shrinking strategies.
pub fn random_bytes(rng: &mut impl Rng, max_len: usize) -> Vec<u8> {
    let len = rng.random_range(1..=max_len.max(1));
    (0..len).map(|_| rng.random()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_fixture_has_four_edges() {
        assert_eq!(triangle_fixture().len(), 4);
    }

    #[test]
    fn linear_chain_builds_requested_count() {
        assert_eq!(linear_chain("p", 10).len(), 10);
    }

    #[test]
    fn shuffled_is_a_permutation_of_the_input() {
        let items = vec![1, 2, 3, 4, 5];
        let mut permuted = shuffled(items.clone(), 7);
        permuted.sort();
        assert_eq!(permuted, items);
    }

    #[test]
    fn shuffled_is_deterministic_for_a_given_seed() {
        let items = vec!["a", "b", "c", "d"];
        assert_eq!(shuffled(items.clone(), 99), shuffled(items, 99));
    }

    #[test]
    fn random_bytes_respects_the_length_bound() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let bytes = random_bytes(&mut rng, 8);
        assert!(!bytes.is_empty());
        assert!(bytes.len() <= 8);
    }

    proptest! {
        #[test]
        fn arbitrary_triples_are_always_valid(triple in arbitrary_triple()) {
            prop_assert!(triple.is_valid());
        }
    }
}
