pub mod queue_service;
pub mod sync_service;

pub use queue_service::{QueueService, QueueStateSnapshot};
pub use sync_service::SyncService;
