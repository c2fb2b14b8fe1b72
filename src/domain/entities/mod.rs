pub mod submission;
pub mod sync_report;

pub use submission::{Submission, SubmissionDraft, SubmissionRecord};
pub use sync_report::{SubmissionError, SyncReport};
