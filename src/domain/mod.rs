pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::{EntryLog, Event, Order, RefundRequest, Seat, SupportCase, Ticket, Venue};
pub use value_objects::{
    EntryStatus, EventStatus, Money, OrderStatus, PaymentMode, RefundDecision, RefundStatus,
    SeatStatus, SupportStatus, TicketStatus,
};
