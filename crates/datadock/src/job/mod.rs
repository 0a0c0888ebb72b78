//! Job lifecycle: status machine, decision packets and the registry.

pub mod preview;
pub mod record;
pub mod registry;
pub mod status;

pub use preview::{
    ApprovalOutcome, ApprovalReport, ApprovalRequest, DecisionPacket, IlPreview, OtlPreview,
    RejectRequest,
};
pub use record::{IngestJob, JobCounts, StatusChange};
pub use registry::JobRegistry;
pub use status::JobStatus;
