pub mod booking_service;
pub mod catalog_service;
pub mod dto;
pub mod gate_service;
pub mod refund_service;
pub mod seat_allocator;
pub mod support_service;

#[cfg(test)]
pub mod test_support;

pub use booking_service::BookingService;
pub use catalog_service::CatalogService;
pub use dto::*;
pub use gate_service::GateService;
pub use refund_service::RefundService;
pub use support_service::SupportService;
