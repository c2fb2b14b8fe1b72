use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Crate-wide failure type. Every variant carries a stable machine code
/// (`code()`) and a recoverability classification (`is_recoverable()`)
/// that drives the retry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum OfflineError {
    /// The queue reached its configured capacity; the caller must wait or evict.
    QueueFull { limit: u32 },
    ItemNotFound { id: String },
    /// The remote collector rejected the submission. 5xx statuses are
    /// transient server faults; 4xx statuses are permanent client faults.
    ServerRejection { status: u16, message: String },
    SyncTimeout { timeout_ms: u64 },
    DeviceOffline,
    NetworkRequestFailure { message: String },
    SchemaValidation { invalid_fields: Vec<String> },
    MissingField { field: String },
    Database { message: String },
    StorageQuotaExceeded,
    MaxRetriesExceeded { attempts: u32 },
    OperationCancelled,
    SyncInProgress,
    InvalidStateTransition { from: String, attempted: String },
    Serialization { message: String },
    /// Normalized foreign error. Classified recoverable so transient
    /// unknowns are retried instead of silently dropped.
    Unknown { message: String },
}

impl OfflineError {
    pub fn code(&self) -> &'static str {
        match self {
            OfflineError::QueueFull { .. } => "queue_full",
            OfflineError::ItemNotFound { .. } => "item_not_found",
            OfflineError::ServerRejection { .. } => "server_rejection",
            OfflineError::SyncTimeout { .. } => "sync_timeout",
            OfflineError::DeviceOffline => "device_offline",
            OfflineError::NetworkRequestFailure { .. } => "network_request_failure",
            OfflineError::SchemaValidation { .. } => "schema_validation",
            OfflineError::MissingField { .. } => "missing_field",
            OfflineError::Database { .. } => "database",
            OfflineError::StorageQuotaExceeded => "storage_quota_exceeded",
            OfflineError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            OfflineError::OperationCancelled => "operation_cancelled",
            OfflineError::SyncInProgress => "sync_in_progress",
            OfflineError::InvalidStateTransition { .. } => "invalid_state_transition",
            OfflineError::Serialization { .. } => "serialization",
            OfflineError::Unknown { .. } => "unknown",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            OfflineError::ServerRejection { status, .. } => (500..600).contains(status),
            OfflineError::SyncTimeout { .. }
            | OfflineError::DeviceOffline
            | OfflineError::NetworkRequestFailure { .. }
            | OfflineError::Database { .. }
            | OfflineError::Unknown { .. } => true,
            OfflineError::QueueFull { .. }
            | OfflineError::ItemNotFound { .. }
            | OfflineError::SchemaValidation { .. }
            | OfflineError::MissingField { .. }
            | OfflineError::StorageQuotaExceeded
            | OfflineError::MaxRetriesExceeded { .. }
            | OfflineError::OperationCancelled
            | OfflineError::SyncInProgress
            | OfflineError::InvalidStateTransition { .. }
            | OfflineError::Serialization { .. } => false,
        }
    }

    /// Snapshot for persistence on a failed submission.
    pub fn to_failure(&self) -> SyncFailure {
        SyncFailure {
            code: self.code().to_string(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for OfflineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineError::QueueFull { limit } => {
                write!(f, "Queue full: capacity of {limit} reached")
            }
            OfflineError::ItemNotFound { id } => write!(f, "Submission not found: {id}"),
            OfflineError::ServerRejection { status, message } => {
                write!(f, "Server rejected submission ({status}): {message}")
            }
            OfflineError::SyncTimeout { timeout_ms } => {
                write!(f, "Sync timed out after {timeout_ms}ms")
            }
            OfflineError::DeviceOffline => write!(f, "Device is offline"),
            OfflineError::NetworkRequestFailure { message } => {
                write!(f, "Network request failed: {message}")
            }
            OfflineError::SchemaValidation { invalid_fields } => {
                write!(f, "Validation failed: {}", invalid_fields.join(", "))
            }
            OfflineError::MissingField { field } => write!(f, "Missing required field: {field}"),
            OfflineError::Database { message } => write!(f, "Database error: {message}"),
            OfflineError::StorageQuotaExceeded => write!(f, "Storage quota exceeded"),
            OfflineError::MaxRetriesExceeded { attempts } => {
                write!(f, "Max retries exceeded after {attempts} attempts")
            }
            OfflineError::OperationCancelled => write!(f, "Operation cancelled"),
            OfflineError::SyncInProgress => write!(f, "Sync already in progress"),
            OfflineError::InvalidStateTransition { from, attempted } => {
                write!(f, "Invalid state transition: {from} -> {attempted}")
            }
            OfflineError::Serialization { message } => {
                write!(f, "Serialization error: {message}")
            }
            OfflineError::Unknown { message } => write!(f, "Unknown error: {message}"),
        }
    }
}

impl std::error::Error for OfflineError {}

impl From<sqlx::Error> for OfflineError {
    fn from(err: sqlx::Error) -> Self {
        OfflineError::Database {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OfflineError {
    fn from(err: serde_json::Error) -> Self {
        OfflineError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for OfflineError {
    fn from(err: anyhow::Error) -> Self {
        OfflineError::Unknown {
            message: err.to_string(),
        }
    }
}

/// Serializable record of a sync failure, stored on the Failed status so
/// retry eligibility survives an application restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
    pub occurred_at: DateTime<Utc>,
}

pub type Result<T> = std::result::Result<T, OfflineError>;
