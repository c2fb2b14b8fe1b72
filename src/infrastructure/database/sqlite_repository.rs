use crate::application::ports::submission_repository::{
    SortDirection, SortField, SubmissionFilter, SubmissionRepository,
};
use crate::domain::entities::Submission;
use crate::domain::value_objects::SubmissionId;
use crate::infrastructure::database::mappers::submission_from_row;
use crate::infrastructure::database::rows::SubmissionRow;
use crate::shared::error::OfflineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Priority is stored as text; ordering needs its rank, not its spelling.
const PRIORITY_RANK: &str =
    "CASE priority WHEN 'critical' THEN 3 WHEN 'high' THEN 2 WHEN 'normal' THEN 1 ELSE 0 END";

pub struct SqliteSubmissionRepository {
    pool: SqlitePool,
}

impl SqliteSubmissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &SubmissionFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(submission_type) = filter.submission_type {
            builder
                .push(" AND submission_type = ")
                .push_bind(submission_type.as_str());
        }
        if let Some(team_number) = filter.team_number {
            builder
                .push(" AND team_number = ")
                .push_bind(team_number.value() as i64);
        }
        if let Some(event_key) = &filter.event_key {
            builder
                .push(" AND event_key = ")
                .push_bind(event_key.as_str().to_string());
        }
        if let Some(match_key) = &filter.match_key {
            builder
                .push(" AND match_key = ")
                .push_bind(match_key.as_str().to_string());
        }
        if let Some(statuses) = &filter.statuses {
            builder.push(" AND status_kind IN (");
            let mut separated = builder.separated(", ");
            for status in statuses {
                separated.push_bind(status.as_str());
            }
            builder.push(")");
        }
        if let Some(priority) = filter.priority {
            builder.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(created_after) = filter.created_after {
            builder
                .push(" AND created_at >= ")
                .push_bind(created_after.timestamp_millis());
        }
        if let Some(created_before) = filter.created_before {
            builder
                .push(" AND created_at < ")
                .push_bind(created_before.timestamp_millis());
        }
        if let Some(updated_after) = filter.updated_after {
            builder
                .push(" AND updated_at >= ")
                .push_bind(updated_after.timestamp_millis());
        }
        if let Some(updated_before) = filter.updated_before {
            builder
                .push(" AND updated_at < ")
                .push_bind(updated_before.timestamp_millis());
        }
    }

    fn push_sort_and_page(builder: &mut QueryBuilder<'_, Sqlite>, filter: &SubmissionFilter) {
        if let Some(sort) = filter.sort {
            let column = match sort.field {
                SortField::CreatedAt => "created_at",
                SortField::UpdatedAt => "updated_at",
                SortField::Priority => PRIORITY_RANK,
                SortField::RetryCount => "retry_count",
                SortField::TeamNumber => "team_number",
            };
            let direction = match sort.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            builder.push(format!(" ORDER BY {column} {direction}"));
        } else {
            builder.push(" ORDER BY created_at ASC");
        }
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
            if let Some(offset) = filter.offset {
                builder.push(" OFFSET ").push_bind(offset as i64);
            }
        } else if let Some(offset) = filter.offset {
            builder.push(" LIMIT -1 OFFSET ").push_bind(offset as i64);
        }
    }
}

#[async_trait]
impl SubmissionRepository for SqliteSubmissionRepository {
    async fn save(&self, submission: &Submission) -> Result<(), OfflineError> {
        let status = serde_json::to_string(submission.status())?;
        let data = serde_json::to_string(submission.data().as_json())?;

        sqlx::query(
            r#"
            INSERT INTO submissions (
                id, submission_type, team_number, event_key, match_key,
                data, priority, retry_count, version, status_kind, status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(submission.id().to_string())
        .bind(submission.submission_type().as_str())
        .bind(submission.team_number().value() as i64)
        .bind(submission.event_key().as_str())
        .bind(submission.match_key().map(|key| key.as_str().to_string()))
        .bind(data)
        .bind(submission.priority().as_str())
        .bind(submission.retry_count() as i64)
        .bind(submission.version() as i64)
        .bind(submission.status().kind().as_str())
        .bind(status)
        .bind(submission.created_at().timestamp_millis())
        .bind(submission.updated_at().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: SubmissionId) -> Result<Option<Submission>, OfflineError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"SELECT * FROM submissions WHERE id = ?1"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(submission_from_row).transpose()
    }

    async fn find_pending(&self) -> Result<Vec<Submission>, OfflineError> {
        // retry eligibility lives inside the status payload, so fetch
        // both candidate kinds and filter on the rehydrated entity
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM submissions
            WHERE status_kind IN ('pending', 'failed')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut eligible = Vec::new();
        for row in rows {
            let submission = submission_from_row(row)?;
            if submission.can_sync_now() {
                eligible.push(submission);
            }
        }
        Ok(eligible)
    }

    async fn find_all(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, OfflineError> {
        let mut builder = QueryBuilder::new("SELECT * FROM submissions");
        Self::push_filter(&mut builder, filter);
        Self::push_sort_and_page(&mut builder, filter);

        let rows = builder
            .build_query_as::<SubmissionRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(submission_from_row).collect()
    }

    async fn update(&self, submission: &Submission) -> Result<(), OfflineError> {
        let status = serde_json::to_string(submission.status())?;
        let data = serde_json::to_string(submission.data().as_json())?;

        // last writer wins at version granularity: the write lands as
        // long as it moves the stored version forward, however many
        // in-memory transitions it carries
        let result = sqlx::query(
            r#"
            UPDATE submissions SET
                data = ?1,
                priority = ?2,
                retry_count = ?3,
                version = ?4,
                status_kind = ?5,
                status = ?6,
                updated_at = ?7
            WHERE id = ?8 AND version < ?9
            "#,
        )
        .bind(data)
        .bind(submission.priority().as_str())
        .bind(submission.retry_count() as i64)
        .bind(submission.version() as i64)
        .bind(submission.status().kind().as_str())
        .bind(status)
        .bind(submission.updated_at().timestamp_millis())
        .bind(submission.id().to_string())
        .bind(submission.version() as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>(
                r#"SELECT COUNT(*) FROM submissions WHERE id = ?1"#,
            )
            .bind(submission.id().to_string())
            .fetch_one(&self.pool)
            .await?;
            if exists == 0 {
                return Err(OfflineError::ItemNotFound {
                    id: submission.id().to_string(),
                });
            }
            // the stored row moved past this copy's version
            return Err(OfflineError::InvalidStateTransition {
                from: "stale_version".to_string(),
                attempted: format!("v{}", submission.version()),
            });
        }
        Ok(())
    }

    async fn delete(&self, id: SubmissionId) -> Result<(), OfflineError> {
        let result = sqlx::query(r#"DELETE FROM submissions WHERE id = ?1"#)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OfflineError::ItemNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn count(&self, filter: &SubmissionFilter) -> Result<u64, OfflineError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM submissions");
        Self::push_filter(&mut builder, filter);
        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OfflineError> {
        let result = sqlx::query(r#"DELETE FROM submissions WHERE created_at < ?1"#)
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), OfflineError> {
        sqlx::query(r#"DELETE FROM submissions"#)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::submission_repository::SubmissionSort;
    use crate::domain::entities::SubmissionDraft;
    use crate::domain::value_objects::{Priority, SyncStatusKind};
    use crate::infrastructure::database::ConnectionPool;
    use crate::shared::config::RetryConfig;
    use serde_json::json;

    async fn setup() -> SqliteSubmissionRepository {
        let pool = ConnectionPool::connect_in_memory().await.unwrap();
        pool.initialize().await.unwrap();
        SqliteSubmissionRepository::new(pool.pool().clone())
    }

    fn submission(team: u32, priority: Priority) -> Submission {
        Submission::create(
            SubmissionDraft {
                submission_type: "match".to_string(),
                team_number: team,
                event_key: "2025arc".to_string(),
                match_key: Some(format!("2025arc_qm{team}")),
                data: json!({"auto": 1}),
            },
            priority,
        )
        .unwrap()
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            base_retry_delay_ms: 1,
            max_retry_delay_ms: 1,
            jitter_ratio: 0.0,
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let repo = setup().await;
        let submission = submission(930, Priority::Normal);
        repo.save(&submission).await.unwrap();

        let stored = repo.find_by_id(submission.id()).await.unwrap().unwrap();
        assert_eq!(stored, submission);
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let repo = setup().await;
        let retry = retry_config();
        let original = submission(930, Priority::Normal);
        repo.save(&original).await.unwrap();

        let syncing = original.clone().mark_as_syncing(&retry).unwrap();
        repo.update(&syncing).await.unwrap();

        // writing from the stale original again must fail
        let stale = original.mark_as_syncing(&retry).unwrap();
        let err = repo.update(&stale).await.unwrap_err();
        assert_eq!(err.code(), "invalid_state_transition");
    }

    #[tokio::test]
    async fn test_update_accepts_multi_step_transition() {
        let repo = setup().await;
        let retry = retry_config();
        let original = submission(930, Priority::Normal);
        repo.save(&original).await.unwrap();

        // two legal transitions applied in memory before persisting:
        // the stored row is still at v1 while the copy is at v3
        let failed = original
            .mark_as_syncing(&retry)
            .unwrap()
            .mark_as_failed(&OfflineError::SyncTimeout { timeout_ms: 5 }, &retry)
            .unwrap();
        assert_eq!(failed.version(), 3);
        repo.update(&failed).await.unwrap();

        let stored = repo.find_by_id(failed.id()).await.unwrap().unwrap();
        assert_eq!(stored, failed);
    }

    #[tokio::test]
    async fn test_update_unknown_id_reports_not_found() {
        let repo = setup().await;
        let retry = retry_config();
        let unsaved = submission(930, Priority::Normal)
            .mark_as_syncing(&retry)
            .unwrap();
        let err = repo.update(&unsaved).await.unwrap_err();
        assert_eq!(err.code(), "item_not_found");
    }

    #[tokio::test]
    async fn test_find_pending_includes_elapsed_retryable_failures() {
        let repo = setup().await;
        let retry = retry_config();

        let pending = submission(1, Priority::Normal);
        repo.save(&pending).await.unwrap();

        // recoverable failure with a 1ms backoff, elapsed by query time
        let failed = submission(2, Priority::Normal);
        repo.save(&failed).await.unwrap();
        let failed = failed
            .mark_as_syncing(&retry)
            .unwrap()
            .mark_as_failed(&OfflineError::SyncTimeout { timeout_ms: 5 }, &retry)
            .unwrap();
        repo.update(&failed).await.unwrap();

        // terminal failure must never come back
        let rejected = submission(3, Priority::Normal);
        repo.save(&rejected).await.unwrap();
        let rejected = rejected
            .mark_as_syncing(&retry)
            .unwrap()
            .mark_as_failed(
                &OfflineError::ServerRejection {
                    status: 400,
                    message: "bad".into(),
                },
                &retry,
            )
            .unwrap();
        repo.update(&rejected).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let eligible = repo.find_pending().await.unwrap();
        let ids: Vec<_> = eligible.iter().map(Submission::id).collect();
        assert!(ids.contains(&pending.id()));
        assert!(ids.contains(&failed.id()));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_find_all_filters_by_status_and_priority() {
        let repo = setup().await;
        repo.save(&submission(1, Priority::Low)).await.unwrap();
        repo.save(&submission(2, Priority::Critical)).await.unwrap();

        let filter = SubmissionFilter {
            statuses: Some(vec![SyncStatusKind::Pending]),
            priority: Some(Priority::Critical),
            ..SubmissionFilter::default()
        };
        let found = repo.find_all(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].team_number().value(), 2);
    }

    #[tokio::test]
    async fn test_find_all_sorts_by_priority_rank() {
        let repo = setup().await;
        repo.save(&submission(1, Priority::Normal)).await.unwrap();
        repo.save(&submission(2, Priority::Critical)).await.unwrap();
        repo.save(&submission(3, Priority::Low)).await.unwrap();

        let filter = SubmissionFilter {
            sort: Some(SubmissionSort {
                field: SortField::Priority,
                direction: SortDirection::Desc,
            }),
            ..SubmissionFilter::default()
        };
        let found = repo.find_all(&filter).await.unwrap();
        let teams: Vec<_> = found.iter().map(|s| s.team_number().value()).collect();
        assert_eq!(teams, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_find_all_paginates() {
        let repo = setup().await;
        for team in 1..=5 {
            repo.save(&submission(team, Priority::Normal)).await.unwrap();
        }
        let filter = SubmissionFilter {
            limit: Some(2),
            offset: Some(2),
            sort: Some(SubmissionSort {
                field: SortField::TeamNumber,
                direction: SortDirection::Asc,
            }),
            ..SubmissionFilter::default()
        };
        let found = repo.find_all(&filter).await.unwrap();
        let teams: Vec<_> = found.iter().map(|s| s.team_number().value()).collect();
        assert_eq!(teams, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_count_delete_and_clear() {
        let repo = setup().await;
        let a = submission(1, Priority::Normal);
        repo.save(&a).await.unwrap();
        repo.save(&submission(2, Priority::Normal)).await.unwrap();

        assert_eq!(repo.count(&SubmissionFilter::default()).await.unwrap(), 2);

        repo.delete(a.id()).await.unwrap();
        assert_eq!(repo.count(&SubmissionFilter::default()).await.unwrap(), 1);
        assert_eq!(
            repo.delete(a.id()).await.unwrap_err().code(),
            "item_not_found"
        );

        repo.clear().await.unwrap();
        assert_eq!(repo.count(&SubmissionFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_older_than_cutoff() {
        let repo = setup().await;
        repo.save(&submission(1, Priority::Normal)).await.unwrap();

        let removed = repo
            .delete_older_than(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = repo
            .delete_older_than(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_failed_submission_survives_restart_with_retry_eligibility() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("scoutsync.db").display()
        );
        let config = crate::shared::config::DatabaseConfig {
            url: url.clone(),
            max_connections: 1,
            connection_timeout: 5,
        };

        let retry = retry_config();
        let failed = submission(930, Priority::High)
            .mark_as_syncing(&retry)
            .unwrap()
            .mark_as_failed(&OfflineError::SyncTimeout { timeout_ms: 5 }, &retry)
            .unwrap();

        {
            let pool = ConnectionPool::connect(&config).await.unwrap();
            pool.initialize().await.unwrap();
            let repo = SqliteSubmissionRepository::new(pool.pool().clone());
            repo.save(&failed).await.unwrap();
            pool.close().await;
        }

        let pool = ConnectionPool::connect(&config).await.unwrap();
        pool.initialize().await.unwrap();
        let repo = SqliteSubmissionRepository::new(pool.pool().clone());
        let stored = repo.find_by_id(failed.id()).await.unwrap().unwrap();
        assert_eq!(stored, failed);
        assert!(stored.can_sync_now());
    }
}
