use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::MatchingError;
use crate::vector::signature::{cosine, SchemaSignature, EMBEDDING_DIM};

/// One scored dataset from a similarity search, descending by score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
    pub dataset_id: String,
    pub table_name: String,
    pub score: f32,
}

/// Seam for the similarity backend. The in-memory engine below is the
/// default; a networked vector store can replace it without touching the
/// pipeline.
pub trait SimilarityIndex: Send + Sync {
    fn upsert(&self, dataset_id: &str, table_name: &str, signature: &SchemaSignature)
        -> Result<(), MatchingError>;

    fn remove(&self, dataset_id: &str) -> Result<(), MatchingError>;

    fn search(&self, signature: &SchemaSignature, top_k: usize)
        -> Result<Vec<CandidateMatch>, MatchingError>;

    fn count(&self) -> usize;
}

struct IndexEntry {
    table_name: String,
    vector: Vec<f32>,
}

/// Brute-force cosine index over dataset schema signatures. Rebuilt from
/// dataset metadata on startup; dataset counts stay small enough that a
/// linear scan is not worth improving on.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, IndexEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Similarity index lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, IndexEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Similarity index lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl SimilarityIndex for InMemoryIndex {
    fn upsert(
        &self,
        dataset_id: &str,
        table_name: &str,
        signature: &SchemaSignature,
    ) -> Result<(), MatchingError> {
        let vector = signature.embed();
        if vector.len() != EMBEDDING_DIM {
            return Err(MatchingError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: vector.len(),
            });
        }
        let mut entries = self.write_entries();
        entries.insert(
            dataset_id.to_string(),
            IndexEntry {
                table_name: table_name.to_string(),
                vector,
            },
        );
        Ok(())
    }

    fn remove(&self, dataset_id: &str) -> Result<(), MatchingError> {
        let mut entries = self.write_entries();
        entries.remove(dataset_id);
        Ok(())
    }

    fn search(
        &self,
        signature: &SchemaSignature,
        top_k: usize,
    ) -> Result<Vec<CandidateMatch>, MatchingError> {
        let query = signature.embed();
        let entries = self.read_entries();
        let mut scored: Vec<CandidateMatch> = entries
            .iter()
            .map(|(dataset_id, entry)| {
                if entry.vector.len() != query.len() {
                    return Err(MatchingError::DimensionMismatch {
                        expected: query.len(),
                        actual: entry.vector.len(),
                    });
                }
                Ok(CandidateMatch {
                    dataset_id: dataset_id.clone(),
                    table_name: entry.table_name.clone(),
                    score: cosine(&query, &entry.vector).clamp(0.0, 1.0),
                })
            })
            .collect::<Result<_, _>>()?;
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.dataset_id.cmp(&b.dataset_id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn count(&self) -> usize {
        self.read_entries().len()
    }
}
