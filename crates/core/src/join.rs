//! Multi-pattern backtracking join engine (C6).
//!
//! Executes an ordered list of patterns against a fixed initial solution,
//! producing a streaming sequence of solutions. Patterns run in the order
//! given — the engine never reorders for selectivity, so the result set
//! (ignoring order) is the same no matter which legal order the caller picks.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::kv::KvStore;
use crate::pattern::{Pattern, PatternPosition};
use crate::scan::{PatternIter, ScanDefaults};
use crate::solution::Solution;
use crate::triple::Triple;

pub type SolutionFilter = Arc<dyn Fn(&Solution) -> bool + Send + Sync>;

/// Options that shape the final solution sequence, applied after the raw
/// backtracking join produces full solutions.
#[derive(Clone, Default)]
pub struct JoinOptions {
    pub filter: Option<SolutionFilter>,
    /// Projects each surviving solution into a synthetic triple-shaped
    /// solution with `subject`/`predicate`/`object` bindings.
    pub materialise: Option<Pattern>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Checked once per solution pulled from the stream; a cancelled token
    /// ends the iterator with `Err(Cancelled)` followed by `None`.
    pub cancel: Option<CancellationToken>,
}

fn unify_triple(pattern: &Pattern, triple: &Triple, solution: &Solution) -> Option<Solution> {
    let mut current = solution.clone();
    for (position, value) in [
        (&pattern.subject, &triple.subject),
        (&pattern.predicate, &triple.predicate),
        (&pattern.object, &triple.object),
    ] {
        if let PatternPosition::Binding(name) = position {
            current = current.unify(name, value)?;
        }
    }
    Some(current)
}

/// Projects `solution` through materialisation pattern `m`, resolving every
/// position to a concrete value. Returns `None` if any position cannot be
/// resolved (a `Binding` not present in `solution`, or a bare `Wildcard`) —
/// such a solution contributes no triple and is dropped.
fn materialise(m: &Pattern, solution: &Solution) -> Option<Solution> {
    let resolved = m.substitute(solution);
    let value_of = |pos: &PatternPosition| match pos {
        PatternPosition::Exact(v) => Some(v.clone()),
        _ => None,
    };

    let subject = value_of(&resolved.subject)?;
    let predicate = value_of(&resolved.predicate)?;
    let object = value_of(&resolved.object)?;

    Some(
        [
            ("subject".to_string(), subject),
            ("predicate".to_string(), predicate),
            ("object".to_string(), object),
        ]
        .into_iter()
        .collect(),
    )
}

struct Frame<K: KvStore> {
    solution: Solution,
    iter: PatternIter<K>,
}

/// Raw backtracking join, yielding full solutions with no filter/offset/
/// limit/materialisation applied.
struct RawJoin<K: KvStore> {
    kv: Arc<K>,
    patterns: Vec<Pattern>,
    defaults: ScanDefaults,
    stack: Vec<Frame<K>>,
    /// Set only for the empty-pattern-list case: yields the initial solution
    /// exactly once, then is cleared.
    seed: Option<Solution>,
}

impl<K: KvStore> RawJoin<K> {
    fn new(kv: Arc<K>, patterns: Vec<Pattern>, initial: Solution, defaults: ScanDefaults) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self {
                kv,
                patterns,
                defaults,
                stack: Vec::new(),
                seed: Some(initial),
            });
        }

        let first_pattern = patterns[0].substitute(&initial);
        let iter = PatternIter::new(&kv, &first_pattern, defaults)?;
        Ok(Self {
            kv,
            patterns,
            defaults,
            stack: vec![Frame {
                solution: initial,
                iter,
            }],
            seed: None,
        })
    }

    fn descend(&mut self, depth: usize, solution: Solution) -> Result<()> {
        let next_pattern = self.patterns[depth].substitute(&solution);
        let iter = PatternIter::new(&self.kv, &next_pattern, self.defaults)?;
        self.stack.push(Frame { solution, iter });
        Ok(())
    }
}

impl<K: KvStore> Iterator for RawJoin<K> {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(solution) = self.seed.take() {
            return Some(Ok(solution));
        }

        loop {
            let depth = self.stack.len().checked_sub(1)?;
            let pattern = &self.patterns[depth];

            let next_triple = self.stack[depth].iter.next();
            let triple = match next_triple {
                Some(Ok(t)) => t,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            let extended = match unify_triple(pattern, &triple, &self.stack[depth].solution) {
                Some(s) => s,
                None => continue,
            };

            if depth + 1 == self.patterns.len() {
                return Some(Ok(extended));
            }

            if let Err(e) = self.descend(depth + 1, extended) {
                return Some(Err(e));
            }
        }
    }
}

/// Public streaming join result, with solution-level filter, offset, limit,
/// and materialisation applied over the raw backtracking sequence.
pub struct JoinIter<K: KvStore> {
    inner: RawJoin<K>,
    options: JoinOptions,
    remaining_skip: usize,
    remaining_take: Option<usize>,
    done: bool,
}

impl<K: KvStore> JoinIter<K> {
    fn passes_filter(&self, solution: &Solution) -> bool {
        self.options
            .filter
            .as_ref()
            .map(|f| f(solution))
            .unwrap_or(true)
    }
}

impl<K: KvStore> Iterator for JoinIter<K> {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.remaining_take == Some(0) {
            self.done = true;
            return None;
        }

        if let Some(token) = &self.options.cancel {
            if let Err(e) = token.check() {
                self.done = true;
                return Some(Err(e));
            }
        }

        loop {
            let solution = match self.inner.next()? {
                Ok(s) => s,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if !self.passes_filter(&solution) {
                continue;
            }

            let projected = match &self.options.materialise {
                Some(m) => match materialise(m, &solution) {
                    Some(p) => p,
                    None => continue,
                },
                None => solution,
            };

            if self.remaining_skip > 0 {
                self.remaining_skip -= 1;
                continue;
            }

            if let Some(take) = self.remaining_take.as_mut() {
                *take -= 1;
            }

            return Some(Ok(projected));
        }
    }
}

/// Runs the join engine over `patterns` seeded with `initial`, returning a
/// lazy iterator of solutions shaped by `options`.
pub fn join<K: KvStore>(
    kv: Arc<K>,
    patterns: Vec<Pattern>,
    initial: Solution,
    options: JoinOptions,
    defaults: ScanDefaults,
) -> Result<JoinIter<K>> {
    let inner = RawJoin::new(kv, patterns, initial, defaults)?;
    let remaining_take = options.limit;
    let remaining_skip = options.offset;
    Ok(JoinIter {
        inner,
        options,
        remaining_skip,
        remaining_take,
        done: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexastore_kv_mem::MemKv;
    use std::collections::BTreeSet;
    use std::sync::Arc as StdArc;

    fn store_with(triples: &[Triple]) -> StdArc<MemKv> {
        let kv = StdArc::new(MemKv::new());
        let store = crate::store::TripleStore::new(kv.clone(), None);
        store.put(triples).unwrap();
        kv
    }

    fn p(s: PatternPosition, pr: PatternPosition, o: PatternPosition) -> Pattern {
        Pattern::new(s, pr, o)
    }

    #[test]
    fn empty_pattern_list_yields_initial_solution_once() {
        let kv = store_with(&[]);
        let mut iter = join(
            kv,
            vec![],
            Solution::new(),
            JoinOptions::default(),
            ScanDefaults::default(),
        )
        .unwrap();
        assert!(iter.next().unwrap().unwrap().is_empty());
        assert!(iter.next().is_none());
    }

    #[test]
    fn friends_of_friends_join() {
        let kv = store_with(&[
            Triple::new("alice", "knows", "bob"),
            Triple::new("bob", "knows", "charlie"),
            Triple::new("alice", "knows", "dave"),
        ]);

        let patterns = vec![
            p(
                PatternPosition::exact("alice"),
                PatternPosition::exact("knows"),
                PatternPosition::binding("x"),
            ),
            p(
                PatternPosition::binding("x"),
                PatternPosition::exact("knows"),
                PatternPosition::binding("y"),
            ),
        ];

        let solutions: Vec<Solution> = join(
            kv,
            patterns,
            Solution::new(),
            JoinOptions::default(),
            ScanDefaults::default(),
        )
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("x").unwrap().as_bytes(), b"bob");
        assert_eq!(solutions[0].get("y").unwrap().as_bytes(), b"charlie");
    }

    #[test]
    fn triangle_cycle_detection_yields_three_rotations() {
        let kv = store_with(&[
            Triple::new("a", "c", "b"),
            Triple::new("b", "c", "c_node"),
            Triple::new("c_node", "c", "a"),
        ]);

        let patterns = vec![
            p(
                PatternPosition::binding("x"),
                PatternPosition::exact("c"),
                PatternPosition::binding("y"),
            ),
            p(
                PatternPosition::binding("y"),
                PatternPosition::exact("c"),
                PatternPosition::binding("z"),
            ),
            p(
                PatternPosition::binding("z"),
                PatternPosition::exact("c"),
                PatternPosition::binding("x"),
            ),
        ];

        let solutions: Vec<Solution> = join(
            kv,
            patterns,
            Solution::new(),
            JoinOptions::default(),
            ScanDefaults::default(),
        )
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(solutions.len(), 3);
        let triples_seen: BTreeSet<(Vec<u8>, Vec<u8>, Vec<u8>)> = solutions
            .iter()
            .map(|s| {
                (
                    s.get("x").unwrap().as_bytes().to_vec(),
                    s.get("y").unwrap().as_bytes().to_vec(),
                    s.get("z").unwrap().as_bytes().to_vec(),
                )
            })
            .collect();
        assert_eq!(triples_seen.len(), 3);
    }

    #[test]
    fn join_commutes_modulo_order() {
        let kv = store_with(&[
            Triple::new("alice", "knows", "bob"),
            Triple::new("bob", "knows", "charlie"),
        ]);

        let p1 = p(
            PatternPosition::binding("x"),
            PatternPosition::exact("knows"),
            PatternPosition::binding("y"),
        );
        let p2 = p(
            PatternPosition::binding("y"),
            PatternPosition::exact("knows"),
            PatternPosition::binding("z"),
        );

        let forward: BTreeSet<_> = join(
            kv.clone(),
            vec![p1.clone(), p2.clone()],
            Solution::new(),
            JoinOptions::default(),
            ScanDefaults::default(),
        )
        .unwrap()
        .map(|s| s.unwrap())
        .map(|s| {
            (
                s.get("x").unwrap().as_bytes().to_vec(),
                s.get("y").unwrap().as_bytes().to_vec(),
                s.get("z").unwrap().as_bytes().to_vec(),
            )
        })
        .collect();

        let backward: BTreeSet<_> = join(
            kv,
            vec![p2, p1],
            Solution::new(),
            JoinOptions::default(),
            ScanDefaults::default(),
        )
        .unwrap()
        .map(|s| s.unwrap())
        .map(|s| {
            (
                s.get("x").unwrap().as_bytes().to_vec(),
                s.get("y").unwrap().as_bytes().to_vec(),
                s.get("z").unwrap().as_bytes().to_vec(),
            )
        })
        .collect();

        assert_eq!(forward, backward);
    }

    #[test]
    fn materialisation_projects_solution_into_triple_bindings() {
        let kv = store_with(&[Triple::new("alice", "likes", "tennis")]);

        let patterns = vec![p(
            PatternPosition::binding("s"),
            PatternPosition::exact("likes"),
            PatternPosition::binding("o"),
        )];

        let m = p(
            PatternPosition::binding("s"),
            PatternPosition::exact("likes"),
            PatternPosition::binding("o"),
        );

        let options = JoinOptions {
            materialise: Some(m),
            ..Default::default()
        };

        let solutions: Vec<Solution> = join(kv, patterns, Solution::new(), options, ScanDefaults::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("subject").unwrap().as_bytes(), b"alice");
        assert_eq!(solutions[0].get("object").unwrap().as_bytes(), b"tennis");
    }

    #[test]
    fn offset_and_limit_apply_to_solutions() {
        let triples: Vec<Triple> = (0..5)
            .map(|i| Triple::new("alice", "likes", format!("topic{i}")))
            .collect();
        let kv = store_with(&triples);

        let patterns = vec![p(
            PatternPosition::exact("alice"),
            PatternPosition::exact("likes"),
            PatternPosition::binding("topic"),
        )];

        let options = JoinOptions {
            offset: 2,
            limit: Some(2),
            ..Default::default()
        };

        let solutions: Vec<Solution> = join(kv, patterns, Solution::new(), options, ScanDefaults::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(solutions.len(), 2);
    }

    #[test]
    fn binding_bound_by_initial_solution_constrains_first_stage() {
        let kv = store_with(&[
            Triple::new("alice", "knows", "bob"),
            Triple::new("carol", "knows", "dave"),
        ]);

        let patterns = vec![p(
            PatternPosition::binding("s"),
            PatternPosition::exact("knows"),
            PatternPosition::binding("o"),
        )];

        let mut initial = Solution::new();
        initial = initial.unify("s", &"alice".into()).unwrap();

        let solutions: Vec<Solution> = join(kv, patterns, initial, JoinOptions::default(), ScanDefaults::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("o").unwrap().as_bytes(), b"bob");
    }

    #[test]
    fn cancellation_ends_the_stream_with_an_error_then_none() {
        let kv = store_with(&[
            Triple::new("alice", "likes", "tennis"),
            Triple::new("alice", "likes", "football"),
        ]);

        let patterns = vec![p(
            PatternPosition::exact("alice"),
            PatternPosition::exact("likes"),
            PatternPosition::binding("topic"),
        )];

        let token = CancellationToken::new();
        token.cancel();
        let options = JoinOptions {
            cancel: Some(token),
            ..Default::default()
        };

        let mut iter = join(kv, patterns, Solution::new(), options, ScanDefaults::default()).unwrap();
        assert!(matches!(iter.next(), Some(Err(crate::error::GraphError::Cancelled))));
        assert!(iter.next().is_none());
    }
}
