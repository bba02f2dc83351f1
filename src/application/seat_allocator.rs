use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::Seat;
use crate::ports::TicketingTx;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// 座位预留结果
///
/// 座位已在事务内标记为已订，但尚未提交；只能由下单流程随订单一并提交。
#[derive(Debug)]
pub struct SeatReservation {
    event_id: Uuid,
    seats: Vec<Seat>,
}

impl SeatReservation {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// 按座位ID升序排列
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }
}

/// 座位分配器：先加锁再校验，保证同一座位只会被一个并发请求占用
#[derive(Debug, Clone, Copy, Default)]
pub struct SeatAllocator;

impl SeatAllocator {
    pub fn new() -> Self {
        Self
    }

    /// 在调用方的事务内锁定并占用座位
    pub async fn reserve<T: TicketingTx>(
        &self,
        tx: &mut T,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> DomainResult<SeatReservation> {
        let mut seats = Self::lock_exact(tx, event_id, seat_ids).await?;

        // 锁内重新校验并占用
        for seat in seats.iter_mut() {
            seat.book()?;
        }

        tx.update_seats(&seats).await?;
        debug!("Reserved {} seats for event {}", seats.len(), event_id);

        Ok(SeatReservation { event_id, seats })
    }

    /// 在调用方的事务内释放座位
    pub async fn release<T: TicketingTx>(
        &self,
        tx: &mut T,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> DomainResult<Vec<Seat>> {
        let mut seats = Self::lock_exact(tx, event_id, seat_ids).await?;
        for seat in seats.iter_mut() {
            seat.release();
        }

        tx.update_seats(&seats).await?;
        debug!("Released {} seats for event {}", seats.len(), event_id);

        Ok(seats)
    }

    /// 按ID升序锁定恰好所请求的座位
    async fn lock_exact<T: TicketingTx>(
        tx: &mut T,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> DomainResult<Vec<Seat>> {
        let requested = Self::requested_set(seat_ids)?;
        let ordered: Vec<Uuid> = requested.iter().copied().collect();

        let seats = tx.lock_seats(event_id, &ordered).await?;

        // 锁定数量与请求数量不一致，说明有座位不属于该活动
        if seats.len() != requested.len() {
            let found: BTreeSet<Uuid> = seats.iter().map(|seat| seat.id).collect();
            let missing: Vec<Uuid> = requested.difference(&found).copied().collect();
            return Err(DomainError::SeatNotFound { event_id, missing });
        }

        Ok(seats)
    }

    fn requested_set(seat_ids: &[Uuid]) -> DomainResult<BTreeSet<Uuid>> {
        if seat_ids.is_empty() {
            return Err(DomainError::ValidationError(
                "At least one seat must be requested".to_string(),
            ));
        }

        let requested: BTreeSet<Uuid> = seat_ids.iter().copied().collect();
        if requested.len() != seat_ids.len() {
            return Err(DomainError::ValidationError(
                "Seat ids must not contain duplicates".to_string(),
            ));
        }

        Ok(requested)
    }
}
