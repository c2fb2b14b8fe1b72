use crate::domain::entities::Submission;
use crate::domain::value_objects::SubmissionId;
use crate::shared::config::RetryConfig;
use crate::shared::error::OfflineError;
use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;
use tokio::sync::watch;

/// Per-submission result of a batch delivery. Successful items carry the
/// optional collector response body.
#[derive(Debug, Clone)]
pub struct BatchItemOutcome {
    pub id: SubmissionId,
    pub result: Result<Option<Value>, OfflineError>,
}

/// Remote transport abstraction: connectivity plus delivery to the
/// collection API. Timeouts and concurrency bounds live behind this
/// port, not in the orchestrator.
#[async_trait]
pub trait SyncCoordinator: Send + Sync {
    async fn is_online(&self) -> bool;
    /// Connectivity transitions as a watch channel. The orchestrator
    /// subscribes during init and drops the receiver on shutdown.
    fn connectivity_changes(&self) -> watch::Receiver<bool>;
    /// Deliver one submission. 2xx maps to `Ok(response_body)`; 4xx to a
    /// non-recoverable `ServerRejection`; 5xx, transport failures and
    /// timeouts to recoverable errors.
    async fn sync(&self, submission: &Submission) -> Result<Option<Value>, OfflineError>;
    /// Deliver a batch, bounded by the configured concurrency. The
    /// orchestrator applies each outcome independently.
    async fn sync_batch(
        &self,
        submissions: &[Submission],
    ) -> Result<Vec<BatchItemOutcome>, OfflineError>;
    fn can_retry(&self, submission: &Submission) -> bool;
    fn retry_delay(&self, retry_count: u32) -> Duration;
    fn retry_config(&self) -> RetryConfig;
}
