//! Routes a job to an incremental or one-time load based on the top
//! similarity candidate.

use serde::{Deserialize, Serialize};

use crate::vector::CandidateMatch;

/// Load route decided for a job. Carries the winning candidate so the
/// pipeline can validate against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum RouteDecision {
    Incremental { candidate: CandidateMatch },
    OneTime,
}

impl RouteDecision {
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental { .. })
    }
}

pub struct SimilarityMatcher {
    threshold: f32,
}

impl SimilarityMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Picks the single highest-scoring candidate. At or above the threshold
    /// the job is an incremental load against that dataset; below it, or
    /// with no candidates at all, the file becomes a new table.
    pub fn route(&self, candidates: &[CandidateMatch]) -> RouteDecision {
        let top = candidates
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score));
        match top {
            Some(candidate) if candidate.score >= self.threshold => RouteDecision::Incremental {
                candidate: candidate.clone(),
            },
            _ => RouteDecision::OneTime,
        }
    }
}
