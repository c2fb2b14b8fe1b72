use crate::shared::error::SyncFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Delivery progress of a submission.
///
/// Legal transitions:
/// ```text
/// Pending --(start_sync)--> Syncing
/// Syncing --(complete)----> Success                       [terminal]
/// Syncing --(fail, can_retry=false)--> Failed             [terminal]
/// Syncing --(fail, can_retry=true)---> Failed             [retryable]
/// Failed(retryable, elapsed) --(start_sync)--> Syncing
/// ```
/// Transition functions return `None` when called from an illegal source
/// state; callers must surface that as an invalid-transition error, never
/// swallow it as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Pending {
        queued_at: DateTime<Utc>,
    },
    Syncing {
        started_at: DateTime<Utc>,
        attempt: u32,
    },
    Success {
        completed_at: DateTime<Utc>,
        response: Option<Value>,
    },
    Failed {
        failed_at: DateTime<Utc>,
        failure: SyncFailure,
        can_retry: bool,
        next_retry_at: Option<DateTime<Utc>>,
    },
}

/// Status tag without payload, used for persistence columns and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatusKind {
    Pending,
    Syncing,
    Success,
    Failed,
}

impl SyncStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatusKind::Pending => "pending",
            SyncStatusKind::Syncing => "syncing",
            SyncStatusKind::Success => "success",
            SyncStatusKind::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(SyncStatusKind::Pending),
            "syncing" => Ok(SyncStatusKind::Syncing),
            "success" => Ok(SyncStatusKind::Success),
            "failed" => Ok(SyncStatusKind::Failed),
            other => Err(format!("Unknown sync status: {other}")),
        }
    }
}

impl fmt::Display for SyncStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SyncStatus {
    pub fn pending(queued_at: DateTime<Utc>) -> Self {
        SyncStatus::Pending { queued_at }
    }

    pub fn kind(&self) -> SyncStatusKind {
        match self {
            SyncStatus::Pending { .. } => SyncStatusKind::Pending,
            SyncStatus::Syncing { .. } => SyncStatusKind::Syncing,
            SyncStatus::Success { .. } => SyncStatusKind::Success,
            SyncStatus::Failed { .. } => SyncStatusKind::Failed,
        }
    }

    /// True when a sync attempt may start from this state at `now`:
    /// Pending, or a retryable failure whose backoff window has elapsed.
    pub fn can_start_sync(&self, now: DateTime<Utc>) -> bool {
        match self {
            SyncStatus::Pending { .. } => true,
            SyncStatus::Failed {
                can_retry: true,
                next_retry_at,
                ..
            } => next_retry_at.map(|at| at <= now).unwrap_or(true),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Success { .. }
                | SyncStatus::Failed {
                    can_retry: false,
                    ..
                }
        )
    }

    pub fn start_sync(&self, now: DateTime<Utc>, attempt: u32) -> Option<SyncStatus> {
        if !self.can_start_sync(now) {
            return None;
        }
        Some(SyncStatus::Syncing {
            started_at: now,
            attempt,
        })
    }

    pub fn complete(&self, now: DateTime<Utc>, response: Option<Value>) -> Option<SyncStatus> {
        match self {
            SyncStatus::Syncing { .. } => Some(SyncStatus::Success {
                completed_at: now,
                response,
            }),
            _ => None,
        }
    }

    pub fn fail(
        &self,
        now: DateTime<Utc>,
        failure: SyncFailure,
        can_retry: bool,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Option<SyncStatus> {
        match self {
            SyncStatus::Syncing { .. } => Some(SyncStatus::Failed {
                failed_at: now,
                failure,
                can_retry,
                next_retry_at: if can_retry { next_retry_at } else { None },
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::OfflineError;
    use chrono::Duration;

    fn failure() -> SyncFailure {
        OfflineError::SyncTimeout { timeout_ms: 1000 }.to_failure()
    }

    #[test]
    fn test_pending_starts_sync() {
        let now = Utc::now();
        let status = SyncStatus::pending(now);
        let next = status.start_sync(now, 1).unwrap();
        assert_eq!(next.kind(), SyncStatusKind::Syncing);
    }

    #[test]
    fn test_success_and_terminal_failure_reject_start_sync() {
        let now = Utc::now();
        let success = SyncStatus::Success {
            completed_at: now,
            response: None,
        };
        assert!(success.start_sync(now, 1).is_none());

        let terminal = SyncStatus::Failed {
            failed_at: now,
            failure: failure(),
            can_retry: false,
            next_retry_at: None,
        };
        assert!(terminal.start_sync(now, 1).is_none());
        assert!(terminal.is_terminal());
    }

    #[test]
    fn test_retryable_failure_waits_for_backoff_window() {
        let now = Utc::now();
        let status = SyncStatus::Failed {
            failed_at: now,
            failure: failure(),
            can_retry: true,
            next_retry_at: Some(now + Duration::seconds(30)),
        };
        assert!(!status.can_start_sync(now));
        assert!(status.can_start_sync(now + Duration::seconds(31)));
    }

    #[test]
    fn test_complete_is_legal_only_from_syncing() {
        let now = Utc::now();
        let pending = SyncStatus::pending(now);
        assert!(pending.complete(now, None).is_none());

        let syncing = pending.start_sync(now, 1).unwrap();
        let success = syncing.complete(now, Some(serde_json::json!({"id": "r1"}))).unwrap();
        assert!(success.is_terminal());
    }

    #[test]
    fn test_non_retryable_failure_drops_next_retry_at() {
        let now = Utc::now();
        let syncing = SyncStatus::pending(now).start_sync(now, 1).unwrap();
        let failed = syncing
            .fail(now, failure(), false, Some(now + Duration::seconds(10)))
            .unwrap();
        match failed {
            SyncStatus::Failed { next_retry_at, .. } => assert!(next_retry_at.is_none()),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_every_variant_round_trips_through_serde() {
        let now = Utc::now();
        let variants = vec![
            SyncStatus::pending(now),
            SyncStatus::Syncing {
                started_at: now,
                attempt: 2,
            },
            SyncStatus::Success {
                completed_at: now,
                response: Some(serde_json::json!({"accepted": true})),
            },
            SyncStatus::Failed {
                failed_at: now,
                failure: failure(),
                can_retry: true,
                next_retry_at: Some(now + Duration::seconds(5)),
            },
        ];
        for status in variants {
            let json = serde_json::to_string(&status).unwrap();
            let back: SyncStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_unrecognized_state_tag_is_a_hard_error() {
        let json = r#"{"state":"paused","queued_at":"2025-03-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<SyncStatus>(json).is_err());
    }
}
