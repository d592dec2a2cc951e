//! Core hexastore engine: indexing, pattern matching, joins, traversal,
//! journaling, facets, and the vector post-filter. The `KvStore` trait is
//! the only dependency on a concrete storage backend; see `hexastore-kv-mem`,
//! `hexastore-kv-fjall`, and `hexastore-kv-redb`.

pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod facets;
pub mod index;
pub mod join;
pub mod journal;
pub mod kv;
pub mod navigator;
pub mod pattern;
pub mod record;
pub mod scan;
pub mod solution;
pub mod store;
pub mod triple;
pub mod vector;

pub use cancel::CancellationToken;
pub use config::{BackendKind, Config, JournalConfig, VectorConfig};
pub use error::{GraphError, Result};
pub use facets::{ComponentKind, Facets};
pub use index::{Field, Index};
pub use join::{JoinIter, JoinOptions};
pub use journal::{Clock, Journal, JournalEntry, SystemClock};
pub use kv::{Batch, BatchOp, KvStore};
pub use navigator::Navigator;
pub use pattern::{Pattern, PatternFilter, PatternPosition};
pub use record::Op;
pub use scan::{PatternIter, ScanDefaults};
pub use solution::Solution;
pub use store::TripleStore;
pub use triple::{Triple, Value};
pub use vector::{Embedder, VectorFilterSpec, VectorId, VectorIndex, VectorQuery};
