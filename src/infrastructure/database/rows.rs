use sqlx::FromRow;

/// Durable shape of one submission. Timestamps are epoch milliseconds;
/// `status` holds the full tagged status JSON while `status_kind`
/// duplicates the tag for indexed filtering.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub submission_type: String,
    pub team_number: i64,
    pub event_key: String,
    pub match_key: Option<String>,
    pub data: String,
    pub priority: String,
    pub retry_count: i64,
    pub version: i64,
    pub status_kind: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}
