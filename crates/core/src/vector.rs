//! Vector similarity post-filter over join solutions (C10).
//!
//! Consumes an externally-implemented [`VectorIndex`] (and optionally an
//! [`Embedder`]) to re-rank and prune a solution sequence by similarity of a
//! bound variable. Replaces any ordering already present on the input.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::solution::Solution;
use crate::triple::Value;

/// Reserved binding name a surviving solution's similarity score is
/// attached under.
pub const SCORE_BINDING: &str = "__score";

/// An externally-supplied similarity index over fixed-dimension vectors.
pub trait VectorIndex: Send + Sync {
    fn add(&self, id: &[u8], vector: &[f32]) -> Result<()>;
    fn get(&self, id: &[u8]) -> Result<Option<Vec<f32>>>;
    fn delete(&self, id: &[u8]) -> Result<()>;
    /// Nearest neighbours of `query`, as `(id, distance)` pairs, closest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Vec<u8>, f32)>>;
    fn dimensions(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An externally-supplied text embedder.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
    fn dimensions(&self) -> usize;
}

/// A typed vector id: which kind of value it names, plus the value itself.
/// Mirrors the on-disk vector id format (`id_type_tag ‖ ":" ‖ value`), with a
/// legacy fallback that accepts a bare `type:value` split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorId {
    pub id_type: String,
    pub value: Vec<u8>,
}

impl VectorId {
    pub fn new(id_type: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id_type: id_type.into(),
            value: value.into(),
        }
    }

    /// Encodes as `id_type ‖ ":" ‖ varint(len) ‖ value`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.id_type.len() + 1 + self.value.len() + 5);
        out.extend_from_slice(self.id_type.as_bytes());
        out.push(b':');
        write_varint(&mut out, self.value.len() as u64);
        out.extend_from_slice(&self.value);
        out
    }

    /// Decodes the length-prefixed format, falling back to a bare
    /// `type:value` split (the pre-length-prefixing legacy format) on
    /// failure.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if let Some(colon) = bytes.iter().position(|&b| b == b':') {
            let (id_type_bytes, rest) = bytes.split_at(colon);
            let rest = &rest[1..];
            if let Ok(id_type) = std::str::from_utf8(id_type_bytes) {
                if let Ok((len, consumed)) = read_varint(rest) {
                    let len = len as usize;
                    if rest.len() == consumed + len {
                        return Ok(Self {
                            id_type: id_type.to_string(),
                            value: rest[consumed..].to_vec(),
                        });
                    }
                }
                // Legacy fallback: plain `type:value`, value taken verbatim.
                return Ok(Self {
                    id_type: id_type.to_string(),
                    value: rest.to_vec(),
                });
            }
        }
        Err(GraphError::Decode("malformed vector id".into()))
    }
}

fn write_varint(out: &mut Vec<u8>, mut n: u64) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn read_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(GraphError::Decode("varint overflow in vector id".into()));
        }
        result |= ((b & 0x7f) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(GraphError::Decode("truncated vector id".into()))
}

/// Specifies a vector post-filter pass over a solution sequence.
pub struct VectorFilterSpec<'a> {
    /// Which binding's value is looked up in the vector index.
    pub variable: String,
    pub query: VectorQuery<'a>,
    pub id_type: String,
    pub top_k: usize,
    pub min_score: f32,
}

pub enum VectorQuery<'a> {
    Vector(Vec<f32>),
    Text(&'a str),
}

/// Cosine distance in `[0, 2]` mapped to a similarity score in `[0, 1]`.
fn score_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Applies `spec` to `solutions`, resolving a query vector (embedding query
/// text if needed), scoring each solution's bound value, dropping solutions
/// below `min_score` or missing from the index, sorting by score descending,
/// and truncating to `top_k`.
pub fn filter_solutions(
    solutions: Vec<Solution>,
    spec: &VectorFilterSpec,
    index: &dyn VectorIndex,
    embedder: Option<&dyn Embedder>,
) -> Result<Vec<Solution>> {
    let query_vec = match &spec.query {
        VectorQuery::Vector(v) => v.clone(),
        VectorQuery::Text(text) => {
            let embedder = embedder.ok_or(GraphError::EmbedderRequired)?;
            embedder.embed(text)?
        }
    };

    let mut score_cache: HashMap<Vec<u8>, Option<f32>> = HashMap::new();
    let mut scored = Vec::with_capacity(solutions.len());

    for solution in solutions {
        let Some(value) = solution.get(&spec.variable) else {
            continue;
        };
        let vector_id = VectorId::new(spec.id_type.clone(), value.as_bytes().to_vec()).encode();

        let score = match score_cache.get(&vector_id) {
            Some(cached) => *cached,
            None => {
                let found = index.get(&vector_id)?;
                let score = found.map(|v| score_from_distance(cosine_distance(&query_vec, &v)));
                score_cache.insert(vector_id, score);
                score
            }
        };

        let Some(score) = score else {
            continue;
        };
        if spec.min_score > 0.0 && score < spec.min_score {
            continue;
        }

        let scored_solution = attach_score(&solution, score);
        scored.push((score, scored_solution));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    if spec.top_k > 0 {
        scored.truncate(spec.top_k);
    }

    Ok(scored.into_iter().map(|(_, s)| s).collect())
}

fn attach_score(solution: &Solution, score: f32) -> Solution {
    let mut pairs: Vec<(String, Value)> = solution
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    pairs.push((SCORE_BINDING.to_string(), Value::new(score.to_le_bytes().to_vec())));
    pairs.into_iter().collect()
}

/// Reads the score a [`filter_solutions`] pass attached to `solution`.
pub fn score_of(solution: &Solution) -> Option<f32> {
    let bytes = solution.get(SCORE_BINDING)?.as_bytes();
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some(f32::from_le_bytes(arr))
}
