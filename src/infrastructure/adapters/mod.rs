pub mod in_memory_ticketing_store;
pub mod mysql_ticketing_store;

pub use in_memory_ticketing_store::InMemoryTicketingStore;
pub use mysql_ticketing_store::MySqlTicketingStore;
