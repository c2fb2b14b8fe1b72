use crate::application::ports::sync_coordinator::{BatchItemOutcome, SyncCoordinator};
use crate::domain::entities::Submission;
use crate::infrastructure::collector::client::{CollectorClient, CollectorRequest};
use crate::shared::config::{RetryConfig, SyncConfig};
use crate::shared::error::OfflineError;
use async_trait::async_trait;
use chrono::Duration;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

/// Delivery coordinator over a [`CollectorClient`], enforcing the sync
/// timeout and the batch concurrency bound, and classifying collector
/// responses into recoverable and terminal failures.
pub struct CollectorCoordinator {
    client: Arc<dyn CollectorClient>,
    retry: RetryConfig,
    sync: SyncConfig,
    semaphore: Arc<Semaphore>,
    online_tx: watch::Sender<bool>,
}

impl CollectorCoordinator {
    pub fn new(client: Arc<dyn CollectorClient>, retry: RetryConfig, sync: SyncConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(sync.max_concurrent_syncs.max(1) as usize));
        let (online_tx, _) = watch::channel(true);
        Self {
            client,
            retry,
            sync,
            semaphore,
            online_tx,
        }
    }

    /// Feed a connectivity observation into the coordinator. Watchers
    /// are only woken on actual transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.online_tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    async fn deliver(&self, submission: &Submission) -> Result<Option<serde_json::Value>, OfflineError> {
        let request = CollectorRequest::from_submission(submission);
        let timeout = StdDuration::from_millis(self.sync.sync_timeout_ms);

        let response = match tokio::time::timeout(timeout, self.client.submit(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    id = %submission.id(),
                    timeout_ms = self.sync.sync_timeout_ms,
                    "submission delivery timed out"
                );
                return Err(OfflineError::SyncTimeout {
                    timeout_ms: self.sync.sync_timeout_ms,
                });
            }
        };

        if response.is_success() {
            debug!(id = %submission.id(), status = response.status, "submission delivered");
            return Ok(response.body);
        }

        warn!(
            id = %submission.id(),
            status = response.status,
            "collector rejected submission"
        );
        Err(OfflineError::ServerRejection {
            status: response.status,
            message: response.message(),
        })
    }
}

#[async_trait]
impl SyncCoordinator for CollectorCoordinator {
    async fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    fn connectivity_changes(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    async fn sync(&self, submission: &Submission) -> Result<Option<serde_json::Value>, OfflineError> {
        if !self.is_online().await {
            return Err(OfflineError::DeviceOffline);
        }
        self.deliver(submission).await
    }

    async fn sync_batch(
        &self,
        submissions: &[Submission],
    ) -> Result<Vec<BatchItemOutcome>, OfflineError> {
        if !self.is_online().await {
            return Err(OfflineError::DeviceOffline);
        }

        let deliveries = submissions.iter().map(|submission| {
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                // closed only on drop, acquire cannot fail here
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| OfflineError::Unknown {
                        message: e.to_string(),
                    })?;
                self.deliver(submission).await
            }
        });

        let results = join_all(deliveries).await;
        Ok(submissions
            .iter()
            .zip(results)
            .map(|(submission, result)| BatchItemOutcome {
                id: submission.id(),
                result,
            })
            .collect())
    }

    fn can_retry(&self, submission: &Submission) -> bool {
        submission.retry_count() < self.retry.max_retries && !submission.is_terminal()
    }

    fn retry_delay(&self, retry_count: u32) -> Duration {
        self.retry.delay_for_attempt(retry_count)
    }

    fn retry_config(&self) -> RetryConfig {
        self.retry.clone()
    }
}
