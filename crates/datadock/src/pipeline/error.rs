use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Reading table failed: {0}")]
    Read(#[from] crate::error::ReadError),

    #[error("Schema inference failed: {0}")]
    Inference(#[from] crate::error::InferenceError),

    #[error("Similarity search failed: {0}")]
    Matching(#[from] crate::error::MatchingError),

    #[error("Dataset lookup failed: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Matched dataset {0} no longer exists")]
    TargetVanished(String),
}
