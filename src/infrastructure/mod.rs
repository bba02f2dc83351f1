pub mod adapters;
pub mod config;

pub use adapters::{InMemoryTicketingStore, MySqlTicketingStore};
pub use config::{AppConfig, StoreBackend};
