pub mod collector;
pub mod database;
pub mod event_bus;
