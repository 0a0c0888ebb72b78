use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatadockError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Matching error: {0}")]
    Matching(#[from] MatchingError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid alias '{alias}': {reason}")]
    InvalidAlias { alias: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open file '{path}': {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("File contains no rows: {0}")]
    EmptyFile(PathBuf),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Table has no columns to infer a schema from")]
    EmptyTable,

    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    #[error("Inference backend returned no usable response")]
    EmptyResponse,

    #[error("Failed to parse inference response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug)]
pub enum MatchingError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Similarity index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Similarity search failed: {0}")]
    SearchFailed(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Job '{id}' is not awaiting a decision (status '{status}')")]
    NotDecidable { id: String, status: String },

    #[error("Job '{id}' has no decision packet")]
    MissingDecision { id: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Worker queue is full")]
    QueueFull,

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type Result<T> = std::result::Result<T, DatadockError>;
