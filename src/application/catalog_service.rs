use crate::application::dto::{
    BookingSummary, CreateEventRequest, CreateSeatsRequest, CreateVenueRequest, SeatsCreated,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Event, EventStatus, Money, Seat, SeatStatus, Venue};
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 目录服务：场馆、活动与座位的管理及只读查询
pub struct CatalogService<R: TicketingStorePort> {
    store: Arc<R>,
}

impl<R: TicketingStorePort> CatalogService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub async fn create_venue(&self, request: CreateVenueRequest) -> DomainResult<Venue> {
        let venue = Venue::new(
            request.name,
            request.city,
            request.address,
            request.total_capacity,
        )?;

        let mut tx = self.store.begin().await?;
        tx.insert_venue(&venue).await?;
        tx.commit().await?;

        info!("Venue created: {} ({})", venue.name, venue.id);
        Ok(venue)
    }

    pub async fn get_venue(&self, venue_id: Uuid) -> DomainResult<Venue> {
        self.store
            .find_venue(venue_id)
            .await?
            .ok_or(DomainError::VenueNotFound(venue_id))
    }

    pub async fn create_event(&self, request: CreateEventRequest) -> DomainResult<Event> {
        let mut tx = self.store.begin().await?;

        tx.find_venue(request.venue_id)
            .await?
            .ok_or(DomainError::VenueNotFound(request.venue_id))?;

        let event = Event::new(
            request.venue_id,
            request.name,
            request.category,
            request.event_date,
            request.ticket_price,
            request.max_tickets_per_user,
        )?;

        tx.insert_event(&event).await?;
        tx.commit().await?;

        info!(
            "Event created: {} ({}) at venue {}",
            event.name, event.id, event.venue_id
        );
        Ok(event)
    }

    /// 修改活动状态
    pub async fn update_event_status(
        &self,
        event_id: Uuid,
        status: EventStatus,
    ) -> DomainResult<Event> {
        let mut tx = self.store.begin().await?;

        let mut event = tx
            .lock_event(event_id)
            .await?
            .ok_or(DomainError::EventNotFound(event_id))?;
        let previous = event.status;
        event.status = status;

        tx.update_event(&event).await?;
        tx.commit().await?;

        info!(
            "Event {} status changed: {} -> {}",
            event.id, previous, event.status
        );
        Ok(event)
    }

    /// 停售
    pub async fn close_bookings(&self, event_id: Uuid) -> DomainResult<Event> {
        self.update_event_status(event_id, EventStatus::Closed).await
    }

    /// 批量创建座位，座位总数不得超过场馆容量
    pub async fn create_seats(
        &self,
        event_id: Uuid,
        request: CreateSeatsRequest,
    ) -> DomainResult<SeatsCreated> {
        if request.seat_count == 0 {
            return Err(DomainError::ValidationError(
                "Seat count must be at least 1".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        // 锁活动行，串行化同一活动的座位创建
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or(DomainError::EventNotFound(event_id))?;
        let venue = tx
            .find_venue(event.venue_id)
            .await?
            .ok_or(DomainError::VenueNotFound(event.venue_id))?;

        let existing = tx.count_seats(event.id).await?;
        let total_seats = existing
            .checked_add(request.seat_count)
            .filter(|total| *total <= venue.total_capacity)
            .ok_or(DomainError::CapacityExceeded {
                capacity: venue.total_capacity,
            })?;

        let seats: Vec<Seat> = (existing + 1..=total_seats)
            .map(|n| Seat::new(event.id, format!("S-{}", n)))
            .collect();

        tx.insert_seats(&seats).await?;
        tx.commit().await?;

        info!(
            "Created {} seats for event {} ({} total)",
            request.seat_count, event.id, total_seats
        );
        Ok(SeatsCreated {
            event_id: event.id,
            created: request.seat_count,
            total_seats,
        })
    }

    pub async fn get_event(&self, event_id: Uuid) -> DomainResult<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(DomainError::EventNotFound(event_id))
    }

    /// 即将开始且尚未举行的活动
    pub async fn list_upcoming_events(&self) -> DomainResult<Vec<Event>> {
        self.store.list_upcoming_events(Utc::now()).await
    }

    /// 可选座位（仅用于展示，不加锁）
    pub async fn list_available_seats(&self, event_id: Uuid) -> DomainResult<Vec<Seat>> {
        self.get_event(event_id).await?;

        let mut seats: Vec<Seat> = self
            .store
            .list_seats(event_id)
            .await?
            .into_iter()
            .filter(|seat| seat.status == SeatStatus::Available)
            .collect();
        seats.sort_by(|a, b| {
            seat_ordinal(&a.seat_number)
                .cmp(&seat_ordinal(&b.seat_number))
                .then_with(|| a.seat_number.cmp(&b.seat_number))
        });
        Ok(seats)
    }

    /// 售票汇总，收入只计已确认订单
    pub async fn booking_summary(&self, event_id: Uuid) -> DomainResult<BookingSummary> {
        let event = self.get_event(event_id).await?;
        let seats = self.store.list_seats(event_id).await?;
        let orders = self.store.list_orders_for_event(event_id).await?;

        let booked = seats
            .iter()
            .filter(|seat| seat.status == SeatStatus::Booked)
            .count();
        let total_revenue = orders
            .iter()
            .filter(|order| order.status.counts_toward_revenue())
            .try_fold(Money::ZERO, |sum, order| sum.checked_add(order.total_amount))
            .ok_or_else(|| DomainError::InternalError("Revenue overflow".to_string()))?;

        let total_seats = to_count(seats.len())?;
        let booked_seats = to_count(booked)?;

        Ok(BookingSummary {
            event_id: event.id,
            event_name: event.name,
            total_seats,
            booked_seats,
            available_seats: total_seats - booked_seats,
            total_revenue,
        })
    }
}

/// `S-<n>` 座位号的序号，用于自然排序
fn seat_ordinal(seat_number: &str) -> Option<u32> {
    seat_number
        .strip_prefix("S-")
        .and_then(|n| n.parse::<u32>().ok())
}

fn to_count(n: usize) -> DomainResult<u32> {
    u32::try_from(n).map_err(|_| DomainError::InternalError("Seat count overflow".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking_service::BookingService;
    use crate::application::dto::{
        BookTicketsRequest, CreateRefundRequest, ProcessRefundRequest,
    };
    use crate::application::refund_service::RefundService;
    use crate::domain::{PaymentMode, RefundDecision};
    use crate::infrastructure::InMemoryTicketingStore;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn catalog() -> (Arc<InMemoryTicketingStore>, CatalogService<InMemoryTicketingStore>) {
        let store = Arc::new(InMemoryTicketingStore::new(Duration::from_millis(500)));
        let service = CatalogService::new(store.clone());
        (store, service)
    }

    async fn venue_and_event(
        service: &CatalogService<InMemoryTicketingStore>,
        capacity: u32,
    ) -> (Venue, Event) {
        let venue = service
            .create_venue(CreateVenueRequest {
                name: "Open Grounds".to_string(),
                city: "Chennai".to_string(),
                address: "4 Beach Rd".to_string(),
                total_capacity: capacity,
            })
            .await
            .unwrap();
        let event = service
            .create_event(CreateEventRequest {
                venue_id: venue.id,
                name: "Comedy Live".to_string(),
                category: "comedy".to_string(),
                event_date: Utc::now() + ChronoDuration::days(14),
                ticket_price: Money::from_units(150),
                max_tickets_per_user: 5,
            })
            .await
            .unwrap();
        (venue, event)
    }

    #[tokio::test]
    async fn test_create_event_requires_venue() {
        let (_, service) = catalog();
        let missing = Uuid::new_v4();
        assert!(matches!(
            service.get_venue(missing).await,
            Err(DomainError::VenueNotFound(_))
        ));

        let result = service
            .create_event(CreateEventRequest {
                venue_id: missing,
                name: "Ghost Show".to_string(),
                category: "theatre".to_string(),
                event_date: Utc::now() + ChronoDuration::days(1),
                ticket_price: Money::from_units(10),
                max_tickets_per_user: 2,
            })
            .await;
        assert!(matches!(result, Err(DomainError::VenueNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_seats_are_numbered_and_capped_by_capacity() {
        let (_, service) = catalog();
        let (_, event) = venue_and_event(&service, 5).await;

        let first = service
            .create_seats(event.id, CreateSeatsRequest { seat_count: 3 })
            .await
            .unwrap();
        assert_eq!(first.total_seats, 3);

        let second = service
            .create_seats(event.id, CreateSeatsRequest { seat_count: 2 })
            .await
            .unwrap();
        assert_eq!(second.created, 2);
        assert_eq!(second.total_seats, 5);

        let numbers: Vec<String> = service
            .list_available_seats(event.id)
            .await
            .unwrap()
            .into_iter()
            .map(|seat| seat.seat_number)
            .collect();
        assert_eq!(numbers, vec!["S-1", "S-2", "S-3", "S-4", "S-5"]);

        let over = service
            .create_seats(event.id, CreateSeatsRequest { seat_count: 1 })
            .await;
        assert!(matches!(over, Err(DomainError::CapacityExceeded { capacity: 5 })));
    }

    #[tokio::test]
    async fn test_close_bookings_hides_event_from_upcoming() {
        let (_, service) = catalog();
        let (_, event) = venue_and_event(&service, 10).await;
        assert_eq!(service.list_upcoming_events().await.unwrap().len(), 1);

        let closed = service.close_bookings(event.id).await.unwrap();
        assert_eq!(closed.status, EventStatus::Closed);
        assert!(service.list_upcoming_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_counts_only_confirmed_revenue() {
        let (store, service) = catalog();
        let (_, event) = venue_and_event(&service, 10).await;
        service
            .create_seats(event.id, CreateSeatsRequest { seat_count: 4 })
            .await
            .unwrap();
        let seats = service.list_available_seats(event.id).await.unwrap();

        let booking = BookingService::new(store.clone());
        let refunds = RefundService::new(store.clone());
        let kept_user = Uuid::new_v4();
        let refunded_user = Uuid::new_v4();

        booking
            .book(
                kept_user,
                BookTicketsRequest {
                    event_id: event.id,
                    seat_ids: vec![seats[0].id],
                    payment_mode: PaymentMode::Wallet,
                },
            )
            .await
            .unwrap();
        let refunded = booking
            .book(
                refunded_user,
                BookTicketsRequest {
                    event_id: event.id,
                    seat_ids: vec![seats[1].id, seats[2].id],
                    payment_mode: PaymentMode::Card,
                },
            )
            .await
            .unwrap();

        let refund = refunds
            .request_refund(
                refunded_user,
                CreateRefundRequest {
                    order_id: refunded.order.id,
                    reason: "Plans changed".to_string(),
                },
            )
            .await
            .unwrap();
        refunds
            .process(
                refund.id,
                ProcessRefundRequest {
                    decision: RefundDecision::Approved,
                    resolution_note: None,
                },
            )
            .await
            .unwrap();

        let summary = service.booking_summary(event.id).await.unwrap();
        assert_eq!(summary.total_seats, 4);
        assert_eq!(summary.booked_seats, 1);
        assert_eq!(summary.available_seats, 3);
        assert_eq!(summary.total_revenue, Money::from_units(150));
    }

    #[test]
    fn test_seat_ordinal() {
        assert_eq!(seat_ordinal("S-12"), Some(12));
        assert_eq!(seat_ordinal("VIP-1"), None);
    }
}
