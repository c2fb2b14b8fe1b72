use crate::domain::entities::{Submission, SubmissionRecord};
use crate::domain::value_objects::{
    EventKey, MatchKey, Priority, SubmissionData, SubmissionId, SubmissionType, SyncStatus,
    TeamNumber,
};
use crate::infrastructure::database::rows::SubmissionRow;
use crate::shared::error::OfflineError;
use chrono::{DateTime, Utc};

/// Rehydrate an entity from a stored row. Malformed rows are rejected,
/// not coerced.
pub fn submission_from_row(row: SubmissionRow) -> Result<Submission, OfflineError> {
    let record = SubmissionRecord {
        id: SubmissionId::parse(&row.id).map_err(|_| invalid("id"))?,
        submission_type: row
            .submission_type
            .parse::<SubmissionType>()
            .map_err(|_| invalid("submission_type"))?,
        team_number: u32::try_from(row.team_number)
            .ok()
            .and_then(|value| TeamNumber::new(value).ok())
            .ok_or_else(|| invalid("team_number"))?,
        event_key: EventKey::new(row.event_key).map_err(|_| invalid("event_key"))?,
        match_key: row
            .match_key
            .map(MatchKey::new)
            .transpose()
            .map_err(|_| invalid("match_key"))?,
        data: SubmissionData::from_json_str(&row.data).map_err(|_| invalid("data"))?,
        priority: row
            .priority
            .parse::<Priority>()
            .map_err(|_| invalid("priority"))?,
        retry_count: u32::try_from(row.retry_count).map_err(|_| invalid("retry_count"))?,
        version: u32::try_from(row.version).map_err(|_| invalid("version"))?,
        created_at: millis_to_datetime(row.created_at).ok_or_else(|| invalid("created_at"))?,
        updated_at: millis_to_datetime(row.updated_at).ok_or_else(|| invalid("updated_at"))?,
        status: serde_json::from_str::<SyncStatus>(&row.status)?,
    };
    Submission::from_record(record)
}

fn invalid(field: &str) -> OfflineError {
    OfflineError::SchemaValidation {
        invalid_fields: vec![field.to_string()],
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
