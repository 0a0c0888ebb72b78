//! Event streaming to interested subscribers.

pub mod job_events;

pub use job_events::{JobEvent, JobEventBroadcaster};
