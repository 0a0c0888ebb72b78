//! Background execution: the analysis worker pool, directory intake and
//! the approval-timeout sweep.

pub mod job;
pub mod pool;
pub mod scanner;
pub mod sweeper;

pub use job::{AnalysisResult, WorkItem};
pub use pool::{WorkerContext, WorkerPool};
pub use scanner::DirectoryScanner;
pub use sweeper::ApprovalSweeper;
