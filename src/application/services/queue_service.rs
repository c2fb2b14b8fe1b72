use crate::application::ports::{
    EventBus, SubmissionFilter, SubmissionRepository, SyncEvent,
};
use crate::domain::entities::{Submission, SubmissionDraft};
use crate::domain::value_objects::{Priority, SubmissionId, SyncStatusKind};
use crate::shared::config::QueueConfig;
use crate::shared::error::OfflineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Aggregate view of the queue for status displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStateSnapshot {
    pub total: u64,
    pub pending: u64,
    pub syncing: u64,
    pub failed: u64,
    pub succeeded: u64,
}

/// Front door for producers and queue queries: validates and enqueues
/// new submissions, edits pending ones, and answers filtered queries.
/// Delivery itself is the sync service's job.
pub struct QueueService {
    repository: Arc<dyn SubmissionRepository>,
    events: Arc<dyn EventBus>,
    config: QueueConfig,
}

impl QueueService {
    pub fn new(
        repository: Arc<dyn SubmissionRepository>,
        events: Arc<dyn EventBus>,
        config: QueueConfig,
    ) -> Self {
        Self {
            repository,
            events,
            config,
        }
    }

    /// Validate a draft and persist it as Pending. Fails with
    /// `QueueFull` before anything touches the store when the backlog
    /// has reached capacity.
    pub async fn enqueue(
        &self,
        draft: SubmissionDraft,
        priority: Priority,
    ) -> Result<Submission, OfflineError> {
        let backlog = self.backlog_count().await?;
        if backlog >= self.config.max_queue_size as u64 {
            return Err(OfflineError::QueueFull {
                limit: self.config.max_queue_size,
            });
        }

        let submission = Submission::create(draft, priority)?;
        self.repository.save(&submission).await?;
        debug!(id = %submission.id(), "Submission queued");

        self.events
            .publish(SyncEvent::SubmissionQueued {
                id: submission.id(),
            })
            .await;
        self.publish_queue_state().await?;
        Ok(submission)
    }

    /// Merge a data patch into a still-Pending submission.
    pub async fn update_data(
        &self,
        id: SubmissionId,
        patch: &Value,
    ) -> Result<Submission, OfflineError> {
        let submission = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| OfflineError::ItemNotFound { id: id.to_string() })?;
        let updated = submission.update_data(patch)?;
        self.repository.update(&updated).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: SubmissionId) -> Result<(), OfflineError> {
        self.repository.delete(id).await?;
        self.events
            .publish(SyncEvent::SubmissionDeleted { id })
            .await;
        self.publish_queue_state().await?;
        Ok(())
    }

    pub async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, OfflineError> {
        self.repository.find_by_id(id).await
    }

    pub async fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, OfflineError> {
        self.repository.find_all(filter).await
    }

    pub async fn count(&self, filter: &SubmissionFilter) -> Result<u64, OfflineError> {
        self.repository.count(filter).await
    }

    pub async fn pending_count(&self) -> Result<u64, OfflineError> {
        self.count_by_status(SyncStatusKind::Pending).await
    }

    /// Drop records created before the cutoff. Intended for terminal
    /// records after an event ends.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OfflineError> {
        let removed = self.repository.delete_older_than(cutoff).await?;
        if removed > 0 {
            self.publish_queue_state().await?;
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), OfflineError> {
        self.repository.clear().await?;
        self.publish_queue_state().await?;
        Ok(())
    }

    pub async fn queue_state(&self) -> Result<QueueStateSnapshot, OfflineError> {
        Ok(QueueStateSnapshot {
            total: self.repository.count(&SubmissionFilter::default()).await?,
            pending: self.count_by_status(SyncStatusKind::Pending).await?,
            syncing: self.count_by_status(SyncStatusKind::Syncing).await?,
            failed: self.count_by_status(SyncStatusKind::Failed).await?,
            succeeded: self.count_by_status(SyncStatusKind::Success).await?,
        })
    }

    /// Undelivered records count toward the capacity limit; Success does not.
    async fn backlog_count(&self) -> Result<u64, OfflineError> {
        let filter = SubmissionFilter {
            statuses: Some(vec![
                SyncStatusKind::Pending,
                SyncStatusKind::Syncing,
                SyncStatusKind::Failed,
            ]),
            ..SubmissionFilter::default()
        };
        self.repository.count(&filter).await
    }

    async fn count_by_status(&self, kind: SyncStatusKind) -> Result<u64, OfflineError> {
        let filter = SubmissionFilter {
            statuses: Some(vec![kind]),
            ..SubmissionFilter::default()
        };
        self.repository.count(&filter).await
    }

    async fn publish_queue_state(&self) -> Result<(), OfflineError> {
        let pending = self.pending_count().await?;
        self.events
            .publish(SyncEvent::QueueStateChanged { pending })
            .await;
        Ok(())
    }
}
