use crate::domain::entities::SyncReport;
use crate::domain::value_objects::SubmissionId;
use crate::shared::error::SyncFailure;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle notifications. This is the only surface UI and telemetry
/// layers may depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    SubmissionQueued {
        id: SubmissionId,
    },
    SubmissionSuccess {
        id: SubmissionId,
    },
    SubmissionFailed {
        id: SubmissionId,
        failure: SyncFailure,
        will_retry: bool,
    },
    SubmissionRetrying {
        id: SubmissionId,
        attempt: u32,
        next_retry_at: Option<DateTime<Utc>>,
    },
    SubmissionDeleted {
        id: SubmissionId,
    },
    SyncStarted {
        pending: u32,
    },
    SyncCompleted {
        report: SyncReport,
    },
    SyncFailed {
        failure: SyncFailure,
    },
    QueueStateChanged {
        pending: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    SubmissionQueued,
    SubmissionSuccess,
    SubmissionFailed,
    SubmissionRetrying,
    SubmissionDeleted,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
    QueueStateChanged,
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::SubmissionQueued { .. } => SyncEventKind::SubmissionQueued,
            SyncEvent::SubmissionSuccess { .. } => SyncEventKind::SubmissionSuccess,
            SyncEvent::SubmissionFailed { .. } => SyncEventKind::SubmissionFailed,
            SyncEvent::SubmissionRetrying { .. } => SyncEventKind::SubmissionRetrying,
            SyncEvent::SubmissionDeleted { .. } => SyncEventKind::SubmissionDeleted,
            SyncEvent::SyncStarted { .. } => SyncEventKind::SyncStarted,
            SyncEvent::SyncCompleted { .. } => SyncEventKind::SyncCompleted,
            SyncEvent::SyncFailed { .. } => SyncEventKind::SyncFailed,
            SyncEvent::QueueStateChanged { .. } => SyncEventKind::QueueStateChanged,
        }
    }
}

pub type SyncEventHandler = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Handle returned by a subscription; pass it back to `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: Uuid,
}

impl Subscription {
    pub(crate) fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: SyncEvent);
    async fn subscribe(&self, kind: SyncEventKind, handler: SyncEventHandler) -> Subscription;
    async fn subscribe_all(&self, handler: SyncEventHandler) -> Subscription;
    async fn unsubscribe(&self, subscription: &Subscription);
    async fn clear_all(&self);
}
