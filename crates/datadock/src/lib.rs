//! datadock — a decision engine for tabular-file ingestion.
//!
//! Files arrive at the dock, have their schema inferred, are matched
//! against existing datasets by similarity, and are staged as either a
//! one-time load (new table) or an incremental load (append). Nothing is
//! written durably until a human approves the staged decision.
//!
//! [`IngestService`] is the public surface; everything below it is
//! exposed for embedding and testing.

pub mod ai;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod init;
pub mod job;
pub mod matcher;
pub mod period;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod service;
pub mod store;
pub mod vector;
pub mod worker;

pub use broadcast::{JobEvent, JobEventBroadcaster};
pub use config::{load_config, Config};
pub use error::{
    ConfigError, DatadockError, InferenceError, JobError, MatchingError, ReadError, Result,
    WorkerError,
};
pub use init::init_tracing;
pub use job::{
    ApprovalReport, ApprovalRequest, DecisionPacket, IngestJob, JobRegistry, JobStatus,
    RejectRequest,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use service::IngestService;
