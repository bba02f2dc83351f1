use crate::application::dto::TicketValidation;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{EntryLog, Ticket, TicketStatus};
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 入场检票服务
pub struct GateService<R: TicketingStorePort> {
    store: Arc<R>,
}

impl<R: TicketingStorePort> GateService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// 按票码校验（仅用于展示，不写库）
    pub async fn validate_ticket(&self, ticket_code: &str) -> DomainResult<TicketValidation> {
        let Some(ticket) = self.store.find_ticket_by_code(ticket_code).await? else {
            return Ok(TicketValidation::invalid("Ticket not found"));
        };

        match ticket.status {
            TicketStatus::Active => {}
            TicketStatus::Used => return Ok(TicketValidation::invalid("Ticket already used")),
            TicketStatus::Cancelled => return Ok(TicketValidation::invalid("Ticket is cancelled")),
        }

        let order = self.store.find_order(ticket.order_id).await?.ok_or_else(|| {
            DomainError::InternalError(format!(
                "Ticket {} references missing order {}",
                ticket.id, ticket.order_id
            ))
        })?;
        let event = self.store.find_event(order.event_id).await?.ok_or_else(|| {
            DomainError::InternalError(format!(
                "Order {} references missing event {}",
                order.id, order.event_id
            ))
        })?;

        if event.has_occurred(Utc::now()) {
            return Ok(TicketValidation::invalid("Event is over"));
        }

        let seat = self.store.find_seat(ticket.seat_id).await?.ok_or_else(|| {
            DomainError::InternalError(format!(
                "Ticket {} references missing seat {}",
                ticket.id, ticket.seat_id
            ))
        })?;

        Ok(TicketValidation {
            is_valid: true,
            message: "Ticket is valid".to_string(),
            ticket_id: Some(ticket.id),
            event_name: Some(event.name),
            seat_number: Some(seat.seat_number),
        })
    }

    /// 入场：ACTIVE → USED，同一事务内写入入场记录
    pub async fn mark_used(&self, ticket_id: Uuid, validated_by: Uuid) -> DomainResult<Ticket> {
        let mut tx = self.store.begin().await?;

        let mut ticket = tx
            .lock_ticket(ticket_id)
            .await?
            .ok_or_else(|| DomainError::TicketNotFound(ticket_id.to_string()))?;

        if let Err(e) = ticket.mark_as_used() {
            warn!("Ticket {} rejected at gate: {}", ticket_id, e);
            return Err(e);
        }

        tx.update_tickets(std::slice::from_ref(&ticket)).await?;
        let entry = EntryLog::admitted(ticket.id, validated_by, Utc::now());
        tx.insert_entry_log(&entry).await?;
        tx.commit().await?;

        info!("Ticket {} marked as used by {}", ticket.id, validated_by);
        Ok(ticket)
    }

    /// 票的入场记录
    pub async fn entry_logs(&self, ticket_id: Uuid) -> DomainResult<Vec<EntryLog>> {
        self.store.list_entry_logs_for_ticket(ticket_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking_service::BookingService;
    use crate::application::dto::{BookTicketsRequest, OrderDetails};
    use crate::application::test_support::{fixture, set_event_date, Fixture};
    use crate::domain::{EntryStatus, PaymentMode};
    use chrono::Duration as ChronoDuration;

    async fn booked() -> (Fixture, OrderDetails) {
        let fx = fixture(2).await;
        let details = BookingService::new(fx.store.clone())
            .book(
                Uuid::new_v4(),
                BookTicketsRequest {
                    event_id: fx.event.id,
                    seat_ids: vec![fx.seat_ids[0]],
                    payment_mode: PaymentMode::NetBanking,
                },
            )
            .await
            .unwrap();
        (fx, details)
    }

    #[tokio::test]
    async fn test_validate_then_mark_used() {
        let (fx, details) = booked().await;
        let gate = GateService::new(fx.store.clone());
        let ticket = &details.tickets[0];

        let verdict = gate.validate_ticket(&ticket.ticket_code).await.unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.ticket_id, Some(ticket.id));
        assert_eq!(verdict.event_name.as_deref(), Some("Rock Night"));
        assert!(verdict.seat_number.is_some());

        let staff = Uuid::new_v4();
        let used = gate.mark_used(ticket.id, staff).await.unwrap();
        assert_eq!(used.status, TicketStatus::Used);

        let logs = gate.entry_logs(ticket.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].validated_by, staff);
        assert_eq!(logs[0].status, EntryStatus::Valid);

        let again = gate.validate_ticket(&ticket.ticket_code).await.unwrap();
        assert_eq!(again, TicketValidation::invalid("Ticket already used"));

        // 重复入场被拒绝，不会多写入场记录
        assert!(matches!(
            gate.mark_used(ticket.id, Uuid::new_v4()).await,
            Err(DomainError::InvalidState { .. })
        ));
        assert_eq!(gate.entry_logs(ticket.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let (fx, _) = booked().await;
        let gate = GateService::new(fx.store.clone());

        let verdict = gate.validate_ticket("NO-SUCH-CODE").await.unwrap();
        assert!(!verdict.is_valid);
        assert!(matches!(
            gate.mark_used(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(DomainError::TicketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ticket_invalid_after_event() {
        let (fx, details) = booked().await;
        set_event_date(&fx.store, fx.event.id, Utc::now() - ChronoDuration::hours(2)).await;
        let gate = GateService::new(fx.store.clone());

        let verdict = gate
            .validate_ticket(&details.tickets[0].ticket_code)
            .await
            .unwrap();
        assert_eq!(verdict, TicketValidation::invalid("Event is over"));
    }
}
