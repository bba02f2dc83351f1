pub mod ticketing_store_port;

pub use ticketing_store_port::{TicketingStorePort, TicketingTx};
