pub mod memory;
pub mod signature;

pub use memory::{CandidateMatch, InMemoryIndex, SimilarityIndex};
pub use signature::{cosine, SchemaSignature, EMBEDDING_DIM};
