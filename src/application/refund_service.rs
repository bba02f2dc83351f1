use crate::application::dto::{CreateRefundRequest, ProcessRefundRequest};
use crate::application::seat_allocator::SeatAllocator;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{OrderStatus, RefundDecision, RefundRequest, TicketStatus};
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 退款服务
///
/// 负责退款申请的创建与审核。审核通过时在同一事务内回滚订单、票与座位状态；
/// 活动已举行时强制拒绝，先提交拒绝结果再向调用方返回错误。
pub struct RefundService<R: TicketingStorePort> {
    store: Arc<R>,
    allocator: SeatAllocator,
}

impl<R: TicketingStorePort> RefundService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self {
            store,
            allocator: SeatAllocator::new(),
        }
    }

    /// 用户为自己的订单提交退款申请
    pub async fn request_refund(
        &self,
        user_id: Uuid,
        request: CreateRefundRequest,
    ) -> DomainResult<RefundRequest> {
        info!(
            "Refund requested by user {} for order {}",
            user_id, request.order_id
        );

        let mut tx = self.store.begin().await?;

        // 锁订单行，防止并发重复申请
        let order = tx
            .lock_order(request.order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(DomainError::OrderNotFound(request.order_id))?;

        match order.status {
            OrderStatus::Confirmed => {}
            OrderStatus::Pending | OrderStatus::Cancelled | OrderStatus::Refunded => {
                return Err(DomainError::InvalidState {
                    expected: OrderStatus::Confirmed.to_string(),
                    actual: order.status.to_string(),
                });
            }
        }

        if tx.find_refund_request_for_order(order.id).await?.is_some() {
            return Err(DomainError::RefundAlreadyRequested(order.id));
        }

        let refund = RefundRequest::new(order.id, request.reason, Utc::now())?;
        tx.insert_refund_request(&refund).await?;
        tx.commit().await?;

        info!("Refund request {} created for order {}", refund.id, order.id);
        Ok(refund)
    }

    /// 审核退款申请
    pub async fn process(
        &self,
        refund_id: Uuid,
        request: ProcessRefundRequest,
    ) -> DomainResult<RefundRequest> {
        info!(
            "Processing refund request {}: decision={:?}",
            refund_id, request.decision
        );

        let result = self.process_in_tx(refund_id, request).await;
        if let Err(e) = &result {
            warn!(
                "Refund request {} not applied: {} ({})",
                refund_id,
                e,
                e.code()
            );
        }
        result
    }

    async fn process_in_tx(
        &self,
        refund_id: Uuid,
        request: ProcessRefundRequest,
    ) -> DomainResult<RefundRequest> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        // 1. 锁定退款申请
        let mut refund = tx
            .lock_refund_request(refund_id)
            .await?
            .ok_or(DomainError::RefundNotFound(refund_id))?;

        // 2. 只能处理一次
        refund.ensure_pending()?;

        // 3. 锁定订单并检查活动时间
        let mut order = tx.lock_order(refund.order_id).await?.ok_or_else(|| {
            DomainError::InternalError(format!(
                "Refund request {} references missing order {}",
                refund.id, refund.order_id
            ))
        })?;
        let event = tx.find_event(order.event_id).await?.ok_or_else(|| {
            DomainError::InternalError(format!(
                "Order {} references missing event {}",
                order.id, order.event_id
            ))
        })?;

        if event.has_occurred(now) {
            // 强制拒绝：先落库，再报错
            refund.force_reject()?;
            tx.update_refund_request(&refund).await?;
            tx.commit().await?;

            warn!(
                "Refund request {} force-rejected: event {} already occurred",
                refund.id, event.id
            );
            return Err(DomainError::EventAlreadyOccurred(event.id));
        }

        // 4-5. 审核通过时回滚订单、票与座位
        if request.decision == RefundDecision::Approved {
            let mut tickets = tx.lock_order_tickets(order.id).await?;
            if let Some(used) = tickets
                .iter()
                .find(|ticket| ticket.status == TicketStatus::Used)
            {
                return Err(DomainError::TicketAlreadyUsed(used.id));
            }

            order.mark_as_refunded()?;

            let mut freed_seats = Vec::with_capacity(tickets.len());
            for ticket in tickets.iter_mut() {
                if ticket.status.holds_seat() {
                    ticket.cancel()?;
                    freed_seats.push(ticket.seat_id);
                }
            }

            if !freed_seats.is_empty() {
                self.allocator
                    .release(&mut tx, event.id, &freed_seats)
                    .await?;
            }

            tx.update_order(&order).await?;
            tx.update_tickets(&tickets).await?;
            info!(
                "Order {} refunded: {} tickets cancelled, {} seats released",
                order.id,
                tickets.len(),
                freed_seats.len()
            );
        }

        // 6. 写入审核结论
        refund.resolve(request.decision, request.resolution_note)?;
        tx.update_refund_request(&refund).await?;
        tx.commit().await?;

        info!("Refund request {} resolved as {}", refund.id, refund.status);
        Ok(refund)
    }

    /// 查询全部退款申请
    pub async fn list_refund_requests(&self) -> DomainResult<Vec<RefundRequest>> {
        self.store.list_refund_requests().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking_service::BookingService;
    use crate::application::dto::{BookTicketsRequest, OrderDetails};
    use crate::application::test_support::{fixture, set_event_date, Fixture};
    use crate::domain::entities::EVENT_PASSED_NOTE;
    use crate::domain::{Money, PaymentMode, RefundStatus, SeatStatus};
    use crate::infrastructure::InMemoryTicketingStore;
    use chrono::Duration as ChronoDuration;

    struct Scenario {
        fx: Fixture,
        user: Uuid,
        booking: BookingService<InMemoryTicketingStore>,
        refunds: RefundService<InMemoryTicketingStore>,
        details: OrderDetails,
    }

    /// 用户预订前两个座位
    async fn booked_scenario() -> Scenario {
        let fx = fixture(4).await;
        let user = Uuid::new_v4();
        let booking = BookingService::new(fx.store.clone());
        let refunds = RefundService::new(fx.store.clone());
        let details = booking
            .book(
                user,
                BookTicketsRequest {
                    event_id: fx.event.id,
                    seat_ids: fx.seat_ids[..2].to_vec(),
                    payment_mode: PaymentMode::Upi,
                },
            )
            .await
            .unwrap();

        Scenario {
            fx,
            user,
            booking,
            refunds,
            details,
        }
    }

    async fn request_refund(s: &Scenario) -> RefundRequest {
        s.refunds
            .request_refund(
                s.user,
                CreateRefundRequest {
                    order_id: s.details.order.id,
                    reason: "Cannot attend".to_string(),
                },
            )
            .await
            .unwrap()
    }

    fn decide(decision: RefundDecision) -> ProcessRefundRequest {
        ProcessRefundRequest {
            decision,
            resolution_note: Some("checked by support".to_string()),
        }
    }

    #[tokio::test]
    async fn test_approved_refund_reverses_booking() {
        let s = booked_scenario().await;
        let refund = request_refund(&s).await;

        let resolved = s
            .refunds
            .process(refund.id, decide(RefundDecision::Approved))
            .await
            .unwrap();
        assert_eq!(resolved.status, RefundStatus::Approved);
        assert_eq!(resolved.resolution_note.as_deref(), Some("checked by support"));

        let after = s.booking.get_order(s.user, s.details.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Refunded);
        assert_eq!(after.order.total_amount, Money::from_units(300));
        assert!(after
            .tickets
            .iter()
            .all(|ticket| ticket.status == TicketStatus::Cancelled));
        for seat_id in &s.fx.seat_ids[..2] {
            let seat = s.fx.store.find_seat(*seat_id).await.unwrap().unwrap();
            assert_eq!(seat.status, SeatStatus::Available);
        }

        // 释放的座位可被其他用户重新预订
        let rebooked = s
            .booking
            .book(
                Uuid::new_v4(),
                BookTicketsRequest {
                    event_id: s.fx.event.id,
                    seat_ids: s.fx.seat_ids[..2].to_vec(),
                    payment_mode: PaymentMode::Card,
                },
            )
            .await
            .unwrap();
        assert_eq!(rebooked.tickets.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_refund_leaves_booking_untouched() {
        let s = booked_scenario().await;
        let refund = request_refund(&s).await;

        let resolved = s
            .refunds
            .process(refund.id, decide(RefundDecision::Rejected))
            .await
            .unwrap();
        assert_eq!(resolved.status, RefundStatus::Rejected);

        let after = s.booking.get_order(s.user, s.details.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Confirmed);
        assert!(after
            .tickets
            .iter()
            .all(|ticket| ticket.status == TicketStatus::Active));
    }

    #[tokio::test]
    async fn test_refund_is_processed_only_once() {
        let s = booked_scenario().await;
        let refund = request_refund(&s).await;

        s.refunds
            .process(refund.id, decide(RefundDecision::Approved))
            .await
            .unwrap();
        let second = s
            .refunds
            .process(refund.id, decide(RefundDecision::Rejected))
            .await;
        assert!(matches!(
            second,
            Err(DomainError::RefundAlreadyProcessed {
                status: RefundStatus::Approved,
                ..
            })
        ));

        let stored = s.fx.store.find_refund_request(refund.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RefundStatus::Approved);
        let after = s.booking.get_order(s.user, s.details.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_after_event_is_force_rejected_and_persisted() {
        let s = booked_scenario().await;
        assert_eq!(s.details.order.total_amount, Money::from_units(300));
        let refund = request_refund(&s).await;

        set_event_date(
            &s.fx.store,
            s.fx.event.id,
            Utc::now() - ChronoDuration::days(1),
        )
        .await;

        let result = s
            .refunds
            .process(refund.id, decide(RefundDecision::Approved))
            .await;
        assert!(matches!(result, Err(DomainError::EventAlreadyOccurred(id)) if id == s.fx.event.id));

        let stored = s.fx.store.find_refund_request(refund.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RefundStatus::Rejected);
        assert_eq!(stored.resolution_note.as_deref(), Some(EVENT_PASSED_NOTE));

        let after = s.booking.get_order(s.user, s.details.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Confirmed);
        assert!(after
            .tickets
            .iter()
            .all(|ticket| ticket.status == TicketStatus::Active));
    }

    #[tokio::test]
    async fn test_unknown_refund_request() {
        let s = booked_scenario().await;
        let missing = Uuid::new_v4();
        let result = s
            .refunds
            .process(missing, decide(RefundDecision::Approved))
            .await;
        assert!(matches!(result, Err(DomainError::RefundNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_second_refund_request_is_rejected() {
        let s = booked_scenario().await;
        request_refund(&s).await;

        let result = s
            .refunds
            .request_refund(
                s.user,
                CreateRefundRequest {
                    order_id: s.details.order.id,
                    reason: "Asking again".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::RefundAlreadyRequested(_))));
        assert_eq!(s.refunds.list_refund_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refund_request_requires_order_owner() {
        let s = booked_scenario().await;
        let result = s
            .refunds
            .request_refund(
                Uuid::new_v4(),
                CreateRefundRequest {
                    order_id: s.details.order.id,
                    reason: "Not mine".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_refund_with_used_ticket_is_refused_without_writes() {
        let s = booked_scenario().await;
        let refund = request_refund(&s).await;

        let used_id = s.details.tickets[0].id;
        let mut tx = s.fx.store.begin().await.unwrap();
        let mut ticket = tx.lock_ticket(used_id).await.unwrap().unwrap();
        ticket.mark_as_used().unwrap();
        tx.update_tickets(&[ticket]).await.unwrap();
        tx.commit().await.unwrap();

        let result = s
            .refunds
            .process(refund.id, decide(RefundDecision::Approved))
            .await;
        assert!(matches!(result, Err(DomainError::TicketAlreadyUsed(id)) if id == used_id));

        let stored = s.fx.store.find_refund_request(refund.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RefundStatus::Pending);
        let after = s.booking.get_order(s.user, s.details.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Confirmed);
    }
}
