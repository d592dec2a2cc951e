use thiserror::Error;

use crate::codec::CodecError;

/// Unified error type returned by every public hexastore operation.
///
/// Mirrors the teacher's per-subsystem error enums (`StateError`, `WalError`,
/// `IndexError`) collapsed into one, since here all subsystems sit directly
/// on top of a single `KvStore` contract rather than several domain stores.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("database is closed")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid triple: subject, predicate, and object must all be non-empty")]
    InvalidTriple,

    #[error("not found")]
    NotFound,

    #[error("failed to decode stored record: {0}")]
    Decode(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector filter requested a text query but no embedder is configured")]
    EmbedderRequired,

    #[error("vector subsystem is not enabled for this database")]
    VectorsDisabled,

    #[error("journal is not enabled for this database")]
    JournalDisabled,

    #[error("facets are not enabled for this database")]
    FacetsDisabled,

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
