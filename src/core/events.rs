use crate::core::model::{RequestId, WorkflowState};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StateChanged { state: WorkflowState },
    Progress { request_id: RequestId, percent: u8, sent: u64, total: u64 },
    Saved { request_id: RequestId, path: PathBuf, bytes: u64 },
    Error { message: String },
}
