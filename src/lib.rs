//! Offline-first submission queue and synchronization engine for
//! competition scouting data.
//!
//! Records captured on a device are validated, queued durably in
//! SQLite, and delivered to the collection API when connectivity
//! allows, with bounded retries, exponential backoff and lifecycle
//! events for the UI layer.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::event_bus::{EventBus, SyncEvent, SyncEventKind};
pub use application::ports::submission_repository::{SubmissionFilter, SubmissionRepository};
pub use application::ports::sync_coordinator::SyncCoordinator;
pub use application::services::{QueueService, SyncService};
pub use domain::entities::{Submission, SubmissionDraft, SyncReport};
pub use domain::value_objects::{Priority, SubmissionId, SyncStatus, SyncStatusKind};
pub use infrastructure::collector::{CollectorClient, CollectorCoordinator};
pub use infrastructure::database::{ConnectionPool, SqliteSubmissionRepository};
pub use infrastructure::event_bus::InMemoryEventBus;
pub use shared::config::AppConfig;
pub use shared::error::{OfflineError, SyncFailure};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. Call once at process start;
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scoutsync=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
