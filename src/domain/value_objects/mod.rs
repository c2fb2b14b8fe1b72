pub mod event_key;
pub mod match_key;
pub mod priority;
pub mod submission_data;
pub mod submission_id;
pub mod submission_type;
pub mod sync_status;
pub mod team_number;

pub use event_key::EventKey;
pub use match_key::MatchKey;
pub use priority::Priority;
pub use submission_data::SubmissionData;
pub use submission_id::SubmissionId;
pub use submission_type::SubmissionType;
pub use sync_status::{SyncStatus, SyncStatusKind};
pub use team_number::TeamNumber;
