use crate::domain::value_objects::SubmissionId;
use crate::shared::error::SyncFailure;
use serde::{Deserialize, Serialize};

/// Outcome of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub success_ids: Vec<SubmissionId>,
    pub failed_ids: Vec<SubmissionId>,
    pub errors: Vec<SubmissionError>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionError {
    pub id: SubmissionId,
    pub failure: SyncFailure,
}

impl SyncReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: SubmissionId) {
        self.attempted += 1;
        self.succeeded += 1;
        self.success_ids.push(id);
    }

    pub fn record_failure(&mut self, id: SubmissionId, failure: SyncFailure) {
        self.attempted += 1;
        self.failed += 1;
        self.failed_ids.push(id);
        self.errors.push(SubmissionError { id, failure });
    }
}
