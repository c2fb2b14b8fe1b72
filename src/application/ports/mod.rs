pub mod event_bus;
pub mod submission_repository;
pub mod sync_coordinator;

pub use event_bus::{EventBus, Subscription, SyncEvent, SyncEventHandler, SyncEventKind};
pub use submission_repository::{
    SortDirection, SortField, SubmissionFilter, SubmissionRepository, SubmissionSort,
};
pub use sync_coordinator::{BatchItemOutcome, SyncCoordinator};
