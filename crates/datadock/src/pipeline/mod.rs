//! The analysis pipeline: read the file, infer its schema, search for
//! similar datasets, route IL/OTL and build the decision packet. Runs on
//! worker threads; performs no durable write.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{incoming_headers, period_source_index, select_rows_to_append, Pipeline};
