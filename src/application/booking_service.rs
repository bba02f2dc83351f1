use crate::application::dto::{BookTicketsRequest, OrderDetails};
use crate::application::seat_allocator::SeatAllocator;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Order, Ticket};
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 下单服务
pub struct BookingService<R: TicketingStorePort> {
    store: Arc<R>,
    allocator: SeatAllocator,
}

impl<R: TicketingStorePort> BookingService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self {
            store,
            allocator: SeatAllocator::new(),
        }
    }

    /// 下单：校验活动与配额，锁定座位，创建订单与票，整体一次提交
    pub async fn book(
        &self,
        user_id: Uuid,
        request: BookTicketsRequest,
    ) -> DomainResult<OrderDetails> {
        info!(
            "Booking {} seats for user {} on event {}",
            request.seat_ids.len(),
            user_id,
            request.event_id
        );

        let result = self.book_in_tx(user_id, &request).await;
        if let Err(e) = &result {
            warn!(
                "Booking failed for user {} on event {}: {} ({})",
                user_id,
                request.event_id,
                e,
                e.code()
            );
        }
        result
    }

    async fn book_in_tx(
        &self,
        user_id: Uuid,
        request: &BookTicketsRequest,
    ) -> DomainResult<OrderDetails> {
        if request.seat_ids.is_empty() {
            return Err(DomainError::ValidationError(
                "At least one seat must be requested".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        // 1. 活动必须存在
        let event = tx
            .find_event(request.event_id)
            .await?
            .ok_or(DomainError::EventNotFound(request.event_id))?;

        // 2-3. 活动可售且尚未举行
        event.ensure_bookable(now)?;

        // 4. 配额校验，按用户与活动加锁避免并发下单绕过上限
        let held = tx.lock_user_quota(user_id, event.id).await?;
        let requested = u32::try_from(request.seat_ids.len())
            .map_err(|_| DomainError::ValidationError("Too many seats requested".to_string()))?;
        if held.saturating_add(requested) > event.max_tickets_per_user {
            return Err(DomainError::QuotaExceeded {
                limit: event.max_tickets_per_user,
                held,
                requested,
            });
        }

        // 5. 锁定并占用座位
        let reservation = self
            .allocator
            .reserve(&mut tx, event.id, &request.seat_ids)
            .await?;
        debug!(
            "Seats reserved for event {}, creating order",
            reservation.event_id()
        );

        // 6-7. 计算金额并创建已确认订单
        let order = Order::confirmed(
            user_id,
            &event,
            reservation.seat_count(),
            request.payment_mode,
            now,
        )?;

        // 8. 每个座位出一张票
        let tickets: Vec<Ticket> = reservation
            .seats()
            .iter()
            .map(|seat| Ticket::issue(order.id, seat.id, now))
            .collect();

        tx.insert_order(&order).await?;
        tx.insert_tickets(&tickets).await?;

        // 9. 座位、订单、票一并提交
        tx.commit().await?;

        info!(
            "Order {} confirmed: {} tickets, total {}",
            order.id,
            tickets.len(),
            order.total_amount
        );

        Ok(OrderDetails { order, tickets })
    }

    /// 查询用户自己的订单
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> DomainResult<OrderDetails> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(DomainError::OrderNotFound(order_id))?;

        let tickets = self.store.list_tickets_for_order(order.id).await?;
        Ok(OrderDetails { order, tickets })
    }

    /// 查询用户的订单
    pub async fn list_orders(&self, user_id: Uuid) -> DomainResult<Vec<Order>> {
        self.store.list_orders_for_user(user_id).await
    }

    /// 查询用户的票
    pub async fn list_tickets(&self, user_id: Uuid) -> DomainResult<Vec<Ticket>> {
        self.store.list_tickets_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        fixture, fixture_with, set_event_date, set_event_status,
    };
    use crate::domain::{EventStatus, Money, OrderStatus, PaymentMode, SeatStatus, TicketStatus};
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;

    fn request(event_id: Uuid, seat_ids: &[Uuid]) -> BookTicketsRequest {
        BookTicketsRequest {
            event_id,
            seat_ids: seat_ids.to_vec(),
            payment_mode: PaymentMode::Card,
        }
    }

    #[tokio::test]
    async fn test_book_creates_confirmed_order_with_tickets() {
        let fx = fixture(5).await;
        let service = BookingService::new(fx.store.clone());
        let user = Uuid::new_v4();

        let details = service
            .book(user, request(fx.event.id, &fx.seat_ids[..2]))
            .await
            .unwrap();

        assert_eq!(details.order.total_amount, Money::from_units(300));
        assert_eq!(details.order.status, OrderStatus::Confirmed);
        assert_eq!(details.tickets.len(), 2);
        assert!(details
            .tickets
            .iter()
            .all(|ticket| ticket.status == TicketStatus::Active));

        let codes: HashSet<&str> = details
            .tickets
            .iter()
            .map(|ticket| ticket.ticket_code.as_str())
            .collect();
        assert_eq!(codes.len(), 2);

        for seat_id in &fx.seat_ids[..2] {
            let seat = fx.store.find_seat(*seat_id).await.unwrap().unwrap();
            assert_eq!(seat.status, SeatStatus::Booked);
        }
        let untouched = fx.store.find_seat(fx.seat_ids[2]).await.unwrap().unwrap();
        assert_eq!(untouched.status, SeatStatus::Available);

        let stored = service.get_order(user, details.order.id).await.unwrap();
        assert_eq!(stored.tickets.len(), 2);
    }

    #[tokio::test]
    async fn test_book_unknown_event() {
        let fx = fixture(1).await;
        let service = BookingService::new(fx.store.clone());
        let missing = Uuid::new_v4();

        let result = service
            .book(Uuid::new_v4(), request(missing, &fx.seat_ids))
            .await;
        assert!(matches!(result, Err(DomainError::EventNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_book_closed_event_is_rejected_even_with_free_seats() {
        let fx = fixture(3).await;
        set_event_status(&fx.store, fx.event.id, EventStatus::Closed).await;
        let service = BookingService::new(fx.store.clone());

        let result = service
            .book(Uuid::new_v4(), request(fx.event.id, &fx.seat_ids[..1]))
            .await;
        assert!(matches!(result, Err(DomainError::EventNotBookable { .. })));

        let seat = fx.store.find_seat(fx.seat_ids[0]).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_book_past_event() {
        let fx = fixture(2).await;
        set_event_date(&fx.store, fx.event.id, Utc::now() - ChronoDuration::minutes(5)).await;
        let service = BookingService::new(fx.store.clone());

        let result = service
            .book(Uuid::new_v4(), request(fx.event.id, &fx.seat_ids[..1]))
            .await;
        assert!(matches!(result, Err(DomainError::EventPassed(id)) if id == fx.event.id));
    }

    #[tokio::test]
    async fn test_quota_is_enforced_across_orders() {
        let fx = fixture_with(Money::from_units(10), 5, 8).await;
        let service = BookingService::new(fx.store.clone());
        let user = Uuid::new_v4();

        service
            .book(user, request(fx.event.id, &fx.seat_ids[0..3]))
            .await
            .unwrap();
        service
            .book(user, request(fx.event.id, &fx.seat_ids[3..5]))
            .await
            .unwrap();

        let result = service
            .book(user, request(fx.event.id, &fx.seat_ids[5..6]))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::QuotaExceeded {
                limit: 5,
                held: 5,
                requested: 1
            })
        ));

        // 配额按用户计算
        service
            .book(Uuid::new_v4(), request(fx.event.id, &fx.seat_ids[5..6]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_booking_leaves_no_partial_writes() {
        let fx = fixture(3).await;
        let service = BookingService::new(fx.store.clone());

        service
            .book(Uuid::new_v4(), request(fx.event.id, &fx.seat_ids[1..2]))
            .await
            .unwrap();

        let loser = Uuid::new_v4();
        let result = service
            .book(loser, request(fx.event.id, &fx.seat_ids[..2]))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::SeatAlreadyBooked { ref seat_number, .. }) if seat_number.starts_with("S-")
        ));

        let seat = fx.store.find_seat(fx.seat_ids[0]).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
        assert!(service.list_orders(loser).await.unwrap().is_empty());
        assert!(service.list_tickets(loser).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_seat_is_not_found() {
        let fx = fixture(2).await;
        let service = BookingService::new(fx.store.clone());
        let stranger = Uuid::new_v4();

        let result = service
            .book(
                Uuid::new_v4(),
                request(fx.event.id, &[fx.seat_ids[0], stranger]),
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::SeatNotFound { ref missing, .. }) if missing == &vec![stranger]
        ));

        let seat = fx.store.find_seat(fx.seat_ids[0]).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_other_users_order_is_hidden() {
        let fx = fixture(2).await;
        let service = BookingService::new(fx.store.clone());
        let details = service
            .book(Uuid::new_v4(), request(fx.event.id, &fx.seat_ids[..1]))
            .await
            .unwrap();

        let result = service.get_order(Uuid::new_v4(), details.order.id).await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_bookings_have_one_winner() {
        let fx = fixture(9).await;
        let service = Arc::new(BookingService::new(fx.store.clone()));
        let contested = fx.seat_ids[0];

        let mut handles = Vec::new();
        for own_seat in fx.seat_ids[1..].iter().copied() {
            let service = service.clone();
            let event_id = fx.event.id;
            handles.push(tokio::spawn(async move {
                service
                    .book(Uuid::new_v4(), request(event_id, &[own_seat, contested]))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(details) => {
                    winners += 1;
                    assert!(details.tickets.iter().any(|t| t.seat_id == contested));
                }
                Err(e) => assert!(
                    matches!(e, DomainError::SeatAlreadyBooked { seat_id, .. } if seat_id == contested),
                    "unexpected error: {}",
                    e
                ),
            }
        }
        assert_eq!(winners, 1);

        // 每个座位至多被一张有效票占用
        let mut holders = 0;
        for seat_id in &fx.seat_ids[1..] {
            let seat = fx.store.find_seat(*seat_id).await.unwrap().unwrap();
            if seat.status == SeatStatus::Booked {
                holders += 1;
            }
        }
        assert_eq!(holders, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_by_same_user_respect_quota() {
        let fx = fixture_with(Money::from_units(50), 2, 8).await;
        let service = Arc::new(BookingService::new(fx.store.clone()));
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for pair in fx.seat_ids.chunks(2) {
            let service = service.clone();
            let event_id = fx.event.id;
            let seats = pair.to_vec();
            handles.push(tokio::spawn(async move {
                service.book(user, request(event_id, &seats)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(
                    matches!(e, DomainError::QuotaExceeded { limit: 2, held: 2, requested: 2 }),
                    "unexpected error: {}",
                    e
                ),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(service.list_tickets(user).await.unwrap().len(), 2);
        assert_eq!(service.list_orders(user).await.unwrap().len(), 1);
    }
}
