//! Schema inference backends. The heuristic backend is always available;
//! the remote chat-completions backend is compiled behind the `ai` feature
//! and falls back to the heuristic when a request fails.

pub mod heuristic;
#[cfg(feature = "ai")]
pub mod remote;

pub use heuristic::HeuristicInference;
#[cfg(feature = "ai")]
pub use remote::RemoteInference;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::InferenceError;
use crate::reader::TableData;
use crate::schema::ColumnSchema;

/// The schema proposed for an incoming file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredSchema {
    /// Proposed table name, canonical form.
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_column: Option<String>,
    pub has_header_row: bool,
    /// Backend's own estimate in `[0, 1]`.
    pub confidence: f32,
}

impl InferredSchema {
    /// Canonical column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A backend that proposes a schema for raw table data.
pub trait SchemaInference: Send + Sync {
    fn infer(&self, table: &TableData) -> Result<InferredSchema, InferenceError>;

    /// Short backend name for log lines.
    fn name(&self) -> &'static str;
}

/// Remote backend that retreats to the heuristic when a request fails.
#[cfg(feature = "ai")]
pub struct FallbackInference {
    primary: RemoteInference,
    fallback: HeuristicInference,
}

#[cfg(feature = "ai")]
impl SchemaInference for FallbackInference {
    fn infer(&self, table: &TableData) -> Result<InferredSchema, InferenceError> {
        match self.primary.infer(table) {
            Ok(schema) => Ok(schema),
            Err(e) => {
                log::warn!(
                    "remote inference failed for '{}', using heuristic: {e}",
                    table.file_name
                );
                self.fallback.infer(table)
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote+heuristic"
    }
}

/// Builds the inference backend described by `config`.
///
/// Construction never fails: when the remote backend is requested but
/// cannot be set up (feature disabled, missing API key) the heuristic is
/// used and a warning is logged.
pub fn build_backend(config: &AiConfig) -> Box<dyn SchemaInference> {
    if !config.enabled {
        return Box::new(HeuristicInference::new());
    }

    #[cfg(feature = "ai")]
    {
        match RemoteInference::new(config) {
            Ok(remote) => {
                return Box::new(FallbackInference {
                    primary: remote,
                    fallback: HeuristicInference::new(),
                });
            }
            Err(e) => {
                log::warn!("remote inference unavailable, using heuristic: {e}");
            }
        }
    }
    #[cfg(not(feature = "ai"))]
    {
        log::warn!("ai.enabled is set but this build lacks the 'ai' feature, using heuristic");
    }

    Box::new(HeuristicInference::new())
}
