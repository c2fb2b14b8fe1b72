pub mod client;
pub mod coordinator;

pub use client::{CollectorClient, CollectorRequest, CollectorResponse};
pub use coordinator::CollectorCoordinator;
