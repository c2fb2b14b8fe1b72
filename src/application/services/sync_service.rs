use crate::application::ports::{
    BatchItemOutcome, EventBus, SubmissionRepository, SyncCoordinator, SyncEvent,
};
use crate::domain::entities::{Submission, SyncReport};
use crate::domain::value_objects::{SubmissionId, SyncStatus};
use crate::shared::config::RetryConfig;
use crate::shared::error::OfflineError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Orchestrator draining the submission queue: full-queue and targeted
/// sync, periodic background sync, and deferred retry timers.
///
/// A single in-progress flag serializes `sync_all` invocations; item
/// concurrency within a batch is the coordinator's concern.
#[derive(Clone)]
pub struct SyncService {
    repository: Arc<dyn SubmissionRepository>,
    coordinator: Arc<dyn SyncCoordinator>,
    events: Arc<dyn EventBus>,
    retry: RetryConfig,
    sync_in_progress: Arc<AtomicBool>,
    periodic: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncService {
    pub fn new(
        repository: Arc<dyn SubmissionRepository>,
        coordinator: Arc<dyn SyncCoordinator>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        let retry = coordinator.retry_config();
        Self {
            repository,
            coordinator,
            events,
            retry,
            sync_in_progress: Arc::new(AtomicBool::new(false)),
            periodic: Arc::new(Mutex::new(None)),
        }
    }

    /// Drain every submission eligible to sync now.
    ///
    /// Fails fast with `SyncInProgress` when a drain is already running
    /// and with `DeviceOffline` before touching the repository when the
    /// coordinator reports no connectivity.
    pub async fn sync_all(&self) -> Result<SyncReport, OfflineError> {
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OfflineError::SyncInProgress);
        }
        let result = self.drain_queue().await;
        self.sync_in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn drain_queue(&self) -> Result<SyncReport, OfflineError> {
        if !self.coordinator.is_online().await {
            return Err(OfflineError::DeviceOffline);
        }

        let mut pending = self.repository.find_pending().await?;
        if pending.is_empty() {
            return Ok(SyncReport::empty());
        }
        pending.sort_by(Submission::cmp_priority_then_age);

        let started = Instant::now();
        self.events
            .publish(SyncEvent::SyncStarted {
                pending: pending.len() as u32,
            })
            .await;

        let mut in_flight = Vec::with_capacity(pending.len());
        for submission in pending {
            let id = submission.id();
            match submission.mark_as_syncing(&self.retry) {
                Ok(syncing) => {
                    self.repository.update(&syncing).await?;
                    in_flight.push(syncing);
                }
                Err(err) => {
                    // concurrent transition since the query; skip the item
                    warn!(id = %id, error = %err, "Skipping submission that cannot start syncing");
                }
            }
        }

        let outcomes = match self.coordinator.sync_batch(&in_flight).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                // batch-level fault: every item gets the same failure so
                // retry eligibility is recorded rather than lost
                for submission in in_flight {
                    if let Err(apply_err) = self.apply_failure_silent(submission, &err).await {
                        error!(error = %apply_err, "Failed to record batch failure");
                    }
                }
                self.events
                    .publish(SyncEvent::SyncFailed {
                        failure: err.to_failure(),
                    })
                    .await;
                return Err(err);
            }
        };

        let mut by_id: HashMap<SubmissionId, Submission> = in_flight
            .into_iter()
            .map(|submission| (submission.id(), submission))
            .collect();

        let mut report = SyncReport::empty();
        for BatchItemOutcome { id, result } in outcomes {
            let Some(submission) = by_id.remove(&id) else {
                warn!(id = %id, "Coordinator reported an unknown submission");
                continue;
            };
            match result {
                Ok(response) => self.apply_success(submission, response, &mut report).await?,
                Err(err) => self.apply_failure(submission, &err, &mut report).await?,
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        self.events
            .publish(SyncEvent::SyncCompleted {
                report: report.clone(),
            })
            .await;
        debug!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Queue drain finished"
        );
        Ok(report)
    }

    /// Targeted sync of one submission, the manual-retry path.
    pub async fn sync_one(&self, id: SubmissionId) -> Result<(), OfflineError> {
        if !self.coordinator.is_online().await {
            return Err(OfflineError::DeviceOffline);
        }
        let submission = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| OfflineError::ItemNotFound { id: id.to_string() })?;

        let syncing = submission.mark_as_syncing(&self.retry)?;
        self.repository.update(&syncing).await?;

        let mut report = SyncReport::empty();
        match self.coordinator.sync(&syncing).await {
            Ok(response) => self.apply_success(syncing, response, &mut report).await?,
            Err(err) => self.apply_failure(syncing, &err, &mut report).await?,
        }
        Ok(())
    }

    async fn apply_success(
        &self,
        submission: Submission,
        response: Option<serde_json::Value>,
        report: &mut SyncReport,
    ) -> Result<(), OfflineError> {
        let id = submission.id();
        let succeeded = submission.mark_as_success(response)?;
        self.repository.update(&succeeded).await?;
        report.record_success(id);
        self.events
            .publish(SyncEvent::SubmissionSuccess { id })
            .await;
        Ok(())
    }

    async fn apply_failure(
        &self,
        submission: Submission,
        err: &OfflineError,
        report: &mut SyncReport,
    ) -> Result<(), OfflineError> {
        let id = submission.id();
        let failed = submission.mark_as_failed(err, &self.retry)?;
        self.repository.update(&failed).await?;
        report.record_failure(id, err.to_failure());

        match failed.status() {
            SyncStatus::Failed {
                can_retry: true,
                next_retry_at,
                ..
            } => {
                self.events
                    .publish(SyncEvent::SubmissionRetrying {
                        id,
                        attempt: failed.retry_count(),
                        next_retry_at: *next_retry_at,
                    })
                    .await;
                self.schedule_retry(id, *next_retry_at);
            }
            _ => {
                self.events
                    .publish(SyncEvent::SubmissionFailed {
                        id,
                        failure: err.to_failure(),
                        will_retry: false,
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Batch-fault variant of `apply_failure`: records the transition
    /// without publishing per-item events (the batch publishes one
    /// `SyncFailed`).
    async fn apply_failure_silent(
        &self,
        submission: Submission,
        err: &OfflineError,
    ) -> Result<(), OfflineError> {
        let failed = submission.mark_as_failed(err, &self.retry)?;
        self.repository.update(&failed).await
    }

    /// Deferred, non-blocking retry timer. The timer re-enters
    /// `sync_one`, which naturally terminates the chain once retries
    /// are exhausted or the submission turned terminal.
    fn schedule_retry(&self, id: SubmissionId, next_retry_at: Option<chrono::DateTime<Utc>>) {
        let delay = next_retry_at
            .map(|at| (at - Utc::now()).to_std().unwrap_or_default())
            .unwrap_or_default();
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = service.sync_one(id).await {
                debug!(id = %id, error = %err, "Deferred retry did not complete");
            }
        });
    }

    /// Start the background sync task. Idempotent: re-invocation while
    /// running is a no-op. The task drains the queue on each interval
    /// tick and on every offline-to-online connectivity transition.
    pub async fn start_periodic_sync(&self, interval_ms: u64) {
        let mut guard = self.periodic.lock().await;
        if guard.is_some() {
            return;
        }
        let service = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(1)));
            // the first tick completes immediately; consume it so the
            // cadence starts one interval from now
            interval.tick().await;

            let mut connectivity = service.coordinator.connectivity_changes();
            let mut was_online = *connectivity.borrow();

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if service.coordinator.is_online().await && !service.is_sync_in_progress() {
                            if let Err(err) = service.sync_all().await {
                                error!(error = %err, "Periodic sync failed");
                            }
                        }
                    }
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *connectivity.borrow();
                        if online && !was_online {
                            debug!("Connectivity restored, draining queue");
                            if let Err(err) = service.sync_all().await {
                                error!(error = %err, "Sync on reconnect failed");
                            }
                        }
                        was_online = online;
                    }
                }
            }
        });
        *guard = Some(handle);
    }

    pub async fn stop_periodic_sync(&self) {
        if let Some(handle) = self.periodic.lock().await.take() {
            handle.abort();
        }
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.sync_in_progress.load(Ordering::SeqCst)
    }

    pub async fn is_periodic_sync_running(&self) -> bool {
        self.periodic.lock().await.is_some()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }
}
