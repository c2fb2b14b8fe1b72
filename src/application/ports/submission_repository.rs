use crate::domain::entities::Submission;
use crate::domain::value_objects::{
    EventKey, MatchKey, Priority, SubmissionId, SubmissionType, SyncStatusKind, TeamNumber,
};
use crate::shared::error::OfflineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub submission_type: Option<SubmissionType>,
    pub team_number: Option<TeamNumber>,
    pub event_key: Option<EventKey>,
    pub match_key: Option<MatchKey>,
    pub statuses: Option<Vec<SyncStatusKind>>,
    pub priority: Option<Priority>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SubmissionSort>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmissionSort {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Priority,
    RetryCount,
    TeamNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Durable keyed store for submissions. Implementations must never
/// swallow storage faults; every operation reports them as
/// `OfflineError::Database`.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn save(&self, submission: &Submission) -> Result<(), OfflineError>;
    async fn find_by_id(&self, id: SubmissionId) -> Result<Option<Submission>, OfflineError>;
    /// Submissions eligible to sync now: Pending, plus retryable
    /// failures whose backoff deadline has elapsed.
    async fn find_pending(&self) -> Result<Vec<Submission>, OfflineError>;
    async fn find_all(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, OfflineError>;
    /// Persist a transitioned entity. The write is conditional on the
    /// stored version being lower than the copy's; a stale in-memory
    /// copy fails with an invalid-transition error instead of silently
    /// overwriting.
    async fn update(&self, submission: &Submission) -> Result<(), OfflineError>;
    async fn delete(&self, id: SubmissionId) -> Result<(), OfflineError>;
    async fn count(&self, filter: &SubmissionFilter) -> Result<u64, OfflineError>;
    /// Retention cleanup: drop records created before the cutoff.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OfflineError>;
    async fn clear(&self) -> Result<(), OfflineError>;
}
