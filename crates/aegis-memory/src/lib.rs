//! Short-term/long-term memory and the retrieval policy engine for the
//! aegis runtime (spec.md §4.6, §4.7, §4.9).

pub mod error;
pub mod long_term;
pub mod retrieval;
pub mod short_term;

pub use error::{MemoryError, Result};
pub use long_term::{decode_embedding, LongTermMemory, LongTermMemoryRecord, LongTermStats, ScoredLongTermMemory};
pub use retrieval::{RetrievalEngine, RetrievedContext};
pub use short_term::{ShortTermItem, ShortTermMemory};

/// A retrieved memory of any kind, as a discriminated variant (spec.md §9
/// "Dynamic dispatch over heterogeneous memories" REDESIGN FLAG) rather
/// than a duck-typed map.
#[derive(Debug, Clone)]
pub enum Memory {
    ShortTerm(ShortTermItem),
    LongTerm(ScoredLongTermMemory),
}
