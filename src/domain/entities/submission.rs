use crate::domain::value_objects::{
    EventKey, MatchKey, Priority, SubmissionData, SubmissionId, SubmissionType, SyncStatus,
    SyncStatusKind, TeamNumber,
};
use crate::shared::config::RetryConfig;
use crate::shared::error::OfflineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Raw, unvalidated submission input as captured by the entry layer.
/// Field names mirror the collector wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDraft {
    #[serde(rename = "type")]
    pub submission_type: String,
    #[serde(rename = "teamNumber")]
    pub team_number: u32,
    #[serde(rename = "eventKey")]
    pub event_key: String,
    #[serde(rename = "matchKey", default)]
    pub match_key: Option<String>,
    pub data: Value,
}

/// One locally captured scouting record awaiting delivery.
///
/// The entity is a pure value: every transition consumes `self` and
/// returns a fresh instance (or a typed failure) with `version` bumped.
/// The repository owns the durable copies; in-memory holders discard and
/// replace their reference on each transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SubmissionRecord", into = "SubmissionRecord")]
pub struct Submission {
    id: SubmissionId,
    submission_type: SubmissionType,
    team_number: TeamNumber,
    event_key: EventKey,
    match_key: Option<MatchKey>,
    data: SubmissionData,
    priority: Priority,
    retry_count: u32,
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: SyncStatus,
}

/// Durable shape of a submission; the serde surface of the entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub submission_type: SubmissionType,
    pub team_number: TeamNumber,
    pub event_key: EventKey,
    pub match_key: Option<MatchKey>,
    pub data: SubmissionData,
    pub priority: Priority,
    pub retry_count: u32,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SyncStatus,
}

impl Submission {
    /// Validate a draft and mint a new Pending submission.
    ///
    /// All invalid fields are reported together, not just the first.
    pub fn create(draft: SubmissionDraft, priority: Priority) -> Result<Self, OfflineError> {
        let mut invalid_fields = Vec::new();

        let submission_type = SubmissionType::from_str(&draft.submission_type)
            .map_err(|_| invalid_fields.push("type".to_string()))
            .ok();
        let team_number = TeamNumber::new(draft.team_number)
            .map_err(|_| invalid_fields.push("teamNumber".to_string()))
            .ok();
        let event_key = EventKey::new(draft.event_key)
            .map_err(|_| invalid_fields.push("eventKey".to_string()))
            .ok();

        let match_key = match (&submission_type, draft.match_key) {
            (Some(t), None) if t.requires_match_key() => {
                invalid_fields.push("matchKey".to_string());
                None
            }
            (_, Some(raw)) => MatchKey::new(raw)
                .map_err(|_| invalid_fields.push("matchKey".to_string()))
                .ok(),
            (_, None) => None,
        };

        let data = SubmissionData::new(draft.data)
            .map_err(|_| invalid_fields.push("data".to_string()))
            .ok();

        if !invalid_fields.is_empty() {
            return Err(OfflineError::SchemaValidation { invalid_fields });
        }

        let now = now_millis();
        Ok(Self {
            id: SubmissionId::generate(),
            // unwraps cannot fail: invalid_fields was empty
            submission_type: submission_type.expect("validated"),
            team_number: team_number.expect("validated"),
            event_key: event_key.expect("validated"),
            match_key,
            data: data.expect("validated"),
            priority,
            retry_count: 0,
            version: 1,
            created_at: now,
            updated_at: now,
            status: SyncStatus::pending(now),
        })
    }

    /// Reconstruct an entity from a durable record, rejecting
    /// inconsistent rows instead of coercing them.
    pub fn from_record(record: SubmissionRecord) -> Result<Self, OfflineError> {
        let mut invalid_fields = Vec::new();
        if record.submission_type.requires_match_key() && record.match_key.is_none() {
            invalid_fields.push("matchKey".to_string());
        }
        if record.version == 0 {
            invalid_fields.push("version".to_string());
        }
        if record.updated_at < record.created_at {
            invalid_fields.push("updatedAt".to_string());
        }
        if !invalid_fields.is_empty() {
            return Err(OfflineError::SchemaValidation { invalid_fields });
        }
        Ok(Self {
            id: record.id,
            submission_type: record.submission_type,
            team_number: record.team_number,
            event_key: record.event_key,
            match_key: record.match_key,
            data: record.data,
            priority: record.priority,
            retry_count: record.retry_count,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            status: record.status,
        })
    }

    /// Begin a sync attempt. Fails with `MaxRetriesExceeded` when the
    /// next attempt would pass the ceiling, and with
    /// `InvalidStateTransition` when the current status does not permit
    /// starting a sync. Nothing is mutated on failure.
    pub fn mark_as_syncing(self, retry: &RetryConfig) -> Result<Self, OfflineError> {
        let next_attempt = self.retry_count + 1;
        if next_attempt > retry.max_retries {
            return Err(OfflineError::MaxRetriesExceeded {
                attempts: self.retry_count,
            });
        }
        let now = now_millis();
        let status = self
            .status
            .start_sync(now, next_attempt)
            .ok_or_else(|| self.invalid_transition(SyncStatusKind::Syncing))?;
        Ok(Self {
            status,
            retry_count: next_attempt,
            version: self.version + 1,
            updated_at: now,
            ..self
        })
    }

    /// Record a successful delivery. Legal only from Syncing.
    pub fn mark_as_success(self, response: Option<Value>) -> Result<Self, OfflineError> {
        let now = now_millis();
        let status = self
            .status
            .complete(now, response)
            .ok_or_else(|| self.invalid_transition(SyncStatusKind::Success))?;
        Ok(Self {
            status,
            version: self.version + 1,
            updated_at: now,
            ..self
        })
    }

    /// Record a failed delivery. Legal only from Syncing. Retryable
    /// failures get a backoff deadline; terminal ones do not.
    pub fn mark_as_failed(
        self,
        error: &OfflineError,
        retry: &RetryConfig,
    ) -> Result<Self, OfflineError> {
        let now = now_millis();
        let can_retry = error.is_recoverable() && self.retry_count < retry.max_retries;
        let next_retry_at = if can_retry {
            Some(now + retry.delay_for_attempt(self.retry_count.max(1)))
        } else {
            None
        };
        let status = self
            .status
            .fail(now, error.to_failure(), can_retry, next_retry_at)
            .ok_or_else(|| self.invalid_transition(SyncStatusKind::Failed))?;
        Ok(Self {
            status,
            version: self.version + 1,
            updated_at: now,
            ..self
        })
    }

    /// Merge a data patch into a still-Pending submission. Editing a
    /// record already in flight would diverge from the in-transit copy,
    /// so any other status is rejected.
    pub fn update_data(self, patch: &Value) -> Result<Self, OfflineError> {
        if self.status.kind() != SyncStatusKind::Pending {
            return Err(OfflineError::SchemaValidation {
                invalid_fields: vec!["data".to_string()],
            });
        }
        let data = self.data.merged_with(patch).map_err(|_| {
            OfflineError::SchemaValidation {
                invalid_fields: vec!["data".to_string()],
            }
        })?;
        Ok(Self {
            data,
            version: self.version + 1,
            updated_at: now_millis(),
            ..self
        })
    }

    pub fn can_sync_now(&self) -> bool {
        self.status.can_start_sync(Utc::now())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn invalid_transition(&self, attempted: SyncStatusKind) -> OfflineError {
        OfflineError::InvalidStateTransition {
            from: self.status.kind().to_string(),
            attempted: attempted.to_string(),
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn submission_type(&self) -> SubmissionType {
        self.submission_type
    }

    pub fn team_number(&self) -> TeamNumber {
        self.team_number
    }

    pub fn event_key(&self) -> &EventKey {
        &self.event_key
    }

    pub fn match_key(&self) -> Option<&MatchKey> {
        self.match_key.as_ref()
    }

    pub fn data(&self) -> &SubmissionData {
        &self.data
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Queue drain order: priority descending, then oldest first.
    pub fn cmp_priority_then_age(a: &Submission, b: &Submission) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
    }

    pub fn cmp_by_age(a: &Submission, b: &Submission) -> Ordering {
        a.created_at.cmp(&b.created_at)
    }

    pub fn cmp_by_retry_count(a: &Submission, b: &Submission) -> Ordering {
        a.retry_count.cmp(&b.retry_count)
    }

    /// Chronological grouping: event key, then match key.
    pub fn cmp_by_event_order(a: &Submission, b: &Submission) -> Ordering {
        a.event_key
            .cmp(&b.event_key)
            .then(a.match_key.cmp(&b.match_key))
    }
}

/// Wall clock truncated to millisecond precision, the resolution the
/// store keeps, so a persisted copy compares equal to the original.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

impl TryFrom<SubmissionRecord> for Submission {
    type Error = OfflineError;

    fn try_from(record: SubmissionRecord) -> Result<Self, Self::Error> {
        Submission::from_record(record)
    }
}

impl From<Submission> for SubmissionRecord {
    fn from(submission: Submission) -> Self {
        SubmissionRecord {
            id: submission.id,
            submission_type: submission.submission_type,
            team_number: submission.team_number,
            event_key: submission.event_key,
            match_key: submission.match_key,
            data: submission.data,
            priority: submission.priority,
            retry_count: submission.retry_count,
            version: submission.version,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
            status: submission.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn match_draft() -> SubmissionDraft {
        SubmissionDraft {
            submission_type: "match".to_string(),
            team_number: 930,
            event_key: "2025arc".to_string(),
            match_key: Some("2025arc_qm1".to_string()),
            data: json!({}),
        }
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            jitter_ratio: 0.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_create_valid_match_submission() {
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        assert_eq!(submission.status().kind(), SyncStatusKind::Pending);
        assert_eq!(submission.version(), 1);
        assert_eq!(submission.retry_count(), 0);
        assert_eq!(submission.team_number().value(), 930);
        assert_eq!(submission.event_key().as_str(), "2025arc");
    }

    #[test]
    fn test_create_without_match_key_reports_field() {
        let mut draft = match_draft();
        draft.match_key = None;
        let err = Submission::create(draft, Priority::Normal).unwrap_err();
        match err {
            OfflineError::SchemaValidation { invalid_fields } => {
                assert_eq!(invalid_fields, vec!["matchKey".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_reports_every_invalid_field() {
        let draft = SubmissionDraft {
            submission_type: "qualifier".to_string(),
            team_number: 0,
            event_key: "".to_string(),
            match_key: None,
            data: json!(null),
        };
        let err = Submission::create(draft, Priority::Normal).unwrap_err();
        match err {
            OfflineError::SchemaValidation { invalid_fields } => {
                assert!(invalid_fields.contains(&"type".to_string()));
                assert!(invalid_fields.contains(&"teamNumber".to_string()));
                assert!(invalid_fields.contains(&"eventKey".to_string()));
                assert!(invalid_fields.contains(&"data".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pit_submission_does_not_require_match_key() {
        let draft = SubmissionDraft {
            submission_type: "pit".to_string(),
            team_number: 254,
            event_key: "2025arc".to_string(),
            match_key: None,
            data: json!({"drivetrain": "swerve"}),
        };
        assert!(Submission::create(draft, Priority::Low).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Submission::create(match_draft(), Priority::Normal).unwrap();
        let b = Submission::create(match_draft(), Priority::Normal).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_full_success_cycle_bumps_version_each_step() {
        let retry = retry_config();
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let syncing = submission.mark_as_syncing(&retry).unwrap();
        assert_eq!(syncing.version(), 2);
        assert_eq!(syncing.retry_count(), 1);

        let success = syncing.mark_as_success(Some(json!({"id": "r-1"}))).unwrap();
        assert_eq!(success.version(), 3);
        assert!(success.is_terminal());
    }

    #[test]
    fn test_mark_as_success_from_pending_is_invalid() {
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let err = submission.mark_as_success(None).unwrap_err();
        assert_eq!(err.code(), "invalid_state_transition");
    }

    #[test]
    fn test_recoverable_failure_schedules_retry() {
        let retry = retry_config();
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let syncing = submission.mark_as_syncing(&retry).unwrap();
        let failed = syncing
            .mark_as_failed(
                &OfflineError::ServerRejection {
                    status: 503,
                    message: "unavailable".into(),
                },
                &retry,
            )
            .unwrap();
        match failed.status() {
            SyncStatus::Failed {
                can_retry,
                next_retry_at,
                ..
            } => {
                assert!(can_retry);
                assert!(next_retry_at.is_some());
            }
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(!failed.is_terminal());
    }

    #[test]
    fn test_client_fault_failure_is_terminal() {
        let retry = retry_config();
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let syncing = submission.mark_as_syncing(&retry).unwrap();
        let failed = syncing
            .mark_as_failed(
                &OfflineError::ServerRejection {
                    status: 409,
                    message: "duplicate".into(),
                },
                &retry,
            )
            .unwrap();
        assert!(failed.is_terminal());
        assert!(!failed.can_sync_now());
        // a later manual retry is an invalid transition
        let err = failed.mark_as_syncing(&retry).unwrap_err();
        assert_eq!(err.code(), "invalid_state_transition");
    }

    #[test]
    fn test_retry_count_never_exceeds_ceiling() {
        // zero-delay backoff keeps the retry window open immediately
        let retry = RetryConfig {
            max_retries: 2,
            base_retry_delay_ms: 0,
            max_retry_delay_ms: 0,
            exponential_backoff: true,
            jitter_ratio: 0.0,
        };
        let recoverable = OfflineError::SyncTimeout { timeout_ms: 10 };
        let mut submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        for _ in 0..2 {
            submission = submission.mark_as_syncing(&retry).unwrap();
            submission = submission.mark_as_failed(&recoverable, &retry).unwrap();
        }
        assert_eq!(submission.retry_count(), 2);
        // second failure already exhausted the budget
        assert!(submission.is_terminal());
        // the ceiling check fires before the state check
        let err = submission.mark_as_syncing(&retry).unwrap_err();
        assert_eq!(err.code(), "max_retries_exceeded");
    }

    #[test]
    fn test_max_retries_checked_before_state() {
        let retry = RetryConfig {
            max_retries: 0,
            ..retry_config()
        };
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let err = submission.mark_as_syncing(&retry).unwrap_err();
        assert_eq!(err.code(), "max_retries_exceeded");
    }

    #[test]
    fn test_update_data_only_while_pending() {
        let retry = retry_config();
        let submission = Submission::create(match_draft(), Priority::Normal).unwrap();
        let updated = submission.update_data(&json!({"auto": 4})).unwrap();
        assert_eq!(updated.version(), 2);
        assert_eq!(updated.data().as_json()["auto"], json!(4));

        let syncing = updated.mark_as_syncing(&retry).unwrap();
        assert!(syncing.update_data(&json!({"auto": 5})).is_err());
    }

    #[test]
    fn test_comparators_order_queue() {
        // explicit timestamps: two create() calls can land in the same
        // millisecond, which would make age ordering a coin flip
        fn submission_at(priority: Priority, created_at: DateTime<Utc>) -> Submission {
            let mut record =
                SubmissionRecord::from(Submission::create(match_draft(), priority).unwrap());
            record.created_at = created_at;
            record.updated_at = created_at;
            Submission::from_record(record).unwrap()
        }

        let base = Utc::now();
        let low = submission_at(Priority::Low, base);
        let critical = submission_at(Priority::Critical, base + chrono::Duration::seconds(1));

        let mut queue = vec![low.clone(), critical.clone()];
        queue.sort_by(Submission::cmp_priority_then_age);
        assert_eq!(queue[0].id(), critical.id());

        queue.sort_by(Submission::cmp_by_age);
        assert_eq!(queue[0].id(), low.id());
    }

    #[test]
    fn test_submission_round_trips_through_serde() {
        let retry = retry_config();
        let submission = Submission::create(match_draft(), Priority::High)
            .unwrap()
            .mark_as_syncing(&retry)
            .unwrap()
            .mark_as_failed(&OfflineError::SyncTimeout { timeout_ms: 100 }, &retry)
            .unwrap();
        let json = serde_json::to_string(&submission).unwrap();
        let back: Submission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, submission);
        assert_eq!(back.retry_count(), submission.retry_count());
        assert!(back.status().can_start_sync(Utc::now() + chrono::Duration::hours(1)));
    }

    #[test]
    fn test_inconsistent_record_is_rejected() {
        let valid = Submission::create(match_draft(), Priority::Normal).unwrap();
        let mut record = SubmissionRecord::from(valid);
        record.match_key = None;
        assert!(Submission::from_record(record).is_err());
    }
}
