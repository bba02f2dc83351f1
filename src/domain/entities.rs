use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    EntryStatus, EventStatus, Money, OrderStatus, PaymentMode, RefundDecision, RefundStatus,
    SeatStatus, SupportStatus, TicketStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 活动已举行时强制拒绝退款的处理备注
pub const EVENT_PASSED_NOTE: &str = "Event date passed. Refund not allowed.";

/// 场馆实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub address: String,
    /// 场馆容量，限制每场活动的座位总数
    pub total_capacity: u32,
}

impl Venue {
    pub fn new(
        name: String,
        city: String,
        address: String,
        total_capacity: u32,
    ) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Venue name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            city,
            address,
            total_capacity,
        })
    }
}

/// 活动实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub category: String,
    pub event_date: DateTime<Utc>,
    /// 单张票价
    pub ticket_price: Money,
    /// 每位用户在本活动的购票上限
    pub max_tickets_per_user: u32,
    pub status: EventStatus,
}

impl Event {
    /// 创建新活动，初始状态为即将开始
    pub fn new(
        venue_id: Uuid,
        name: String,
        category: String,
        event_date: DateTime<Utc>,
        ticket_price: Money,
        max_tickets_per_user: u32,
    ) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Event name must not be empty".to_string(),
            ));
        }

        if ticket_price.to_cents() < 0 {
            return Err(DomainError::ValidationError(
                "Ticket price must not be negative".to_string(),
            ));
        }

        if max_tickets_per_user < 1 {
            return Err(DomainError::ValidationError(
                "Max tickets per user must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            venue_id,
            name,
            category,
            event_date,
            ticket_price,
            max_tickets_per_user,
            status: EventStatus::Upcoming,
        })
    }

    /// 检查活动是否可以下单：状态为即将开始，且活动时间严格晚于当前时间
    pub fn ensure_bookable(&self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            EventStatus::Upcoming => {}
            EventStatus::Closed | EventStatus::Cancelled => {
                return Err(DomainError::EventNotBookable {
                    event_id: self.id,
                    status: self.status,
                });
            }
        }

        if self.event_date <= now {
            return Err(DomainError::EventPassed(self.id));
        }

        Ok(())
    }

    /// 活动时间是否已过
    pub fn has_occurred(&self, now: DateTime<Utc>) -> bool {
        self.event_date < now
    }
}

/// 座位实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    /// 座位号，同一活动内唯一
    pub seat_number: String,
    pub status: SeatStatus,
}

impl Seat {
    pub fn new(event_id: Uuid, seat_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            seat_number,
            status: SeatStatus::Available,
        }
    }

    /// 占用座位
    pub fn book(&mut self) -> DomainResult<()> {
        match self.status {
            SeatStatus::Available => {
                self.status = SeatStatus::Booked;
                Ok(())
            }
            SeatStatus::Booked => Err(DomainError::SeatAlreadyBooked {
                seat_id: self.id,
                seat_number: self.seat_number.clone(),
            }),
        }
    }

    /// 释放座位
    pub fn release(&mut self) {
        self.status = SeatStatus::Available;
    }
}

/// 订单实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    /// 下单时计算的总金额，之后不再重算
    pub total_amount: Money,
    pub payment_mode: PaymentMode,
    pub status: OrderStatus,
    pub booking_time: DateTime<Utc>,
}

impl Order {
    /// 创建已确认订单（支付为同步模拟，始终成功）
    pub fn confirmed(
        user_id: Uuid,
        event: &Event,
        seat_count: usize,
        payment_mode: PaymentMode,
        booking_time: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if seat_count == 0 {
            return Err(DomainError::ValidationError(
                "An order must contain at least one seat".to_string(),
            ));
        }

        let total_amount = event.ticket_price.checked_mul(seat_count).ok_or_else(|| {
            DomainError::ValidationError("Order total amount overflows".to_string())
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            event_id: event.id,
            total_amount,
            payment_mode,
            status: OrderStatus::Confirmed,
            booking_time,
        })
    }

    /// 标记为已退款
    pub fn mark_as_refunded(&mut self) -> DomainResult<()> {
        match self.status {
            OrderStatus::Confirmed => {
                self.status = OrderStatus::Refunded;
                Ok(())
            }
            OrderStatus::Pending | OrderStatus::Cancelled | OrderStatus::Refunded => {
                Err(DomainError::InvalidState {
                    expected: OrderStatus::Confirmed.to_string(),
                    actual: self.status.to_string(),
                })
            }
        }
    }
}

/// 票实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seat_id: Uuid,
    /// 全局唯一的票码
    pub ticket_code: String,
    pub status: TicketStatus,
    pub generated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(order_id: Uuid, seat_id: Uuid, generated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            seat_id,
            ticket_code: Uuid::new_v4().simple().to_string().to_uppercase(),
            status: TicketStatus::Active,
            generated_at,
        }
    }

    /// 入场核验：ACTIVE → USED
    pub fn mark_as_used(&mut self) -> DomainResult<()> {
        match self.status {
            TicketStatus::Active => {
                self.status = TicketStatus::Used;
                Ok(())
            }
            TicketStatus::Used | TicketStatus::Cancelled => Err(DomainError::InvalidState {
                expected: TicketStatus::Active.to_string(),
                actual: self.status.to_string(),
            }),
        }
    }

    /// 退款作废：ACTIVE → CANCELLED
    pub fn cancel(&mut self) -> DomainResult<()> {
        match self.status {
            TicketStatus::Active => {
                self.status = TicketStatus::Cancelled;
                Ok(())
            }
            TicketStatus::Used => Err(DomainError::TicketAlreadyUsed(self.id)),
            TicketStatus::Cancelled => Err(DomainError::InvalidState {
                expected: TicketStatus::Active.to_string(),
                actual: self.status.to_string(),
            }),
        }
    }
}

/// 退款申请实体，每个订单至多一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reason: String,
    pub status: RefundStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefundRequest {
    pub fn new(order_id: Uuid, reason: String, created_at: DateTime<Utc>) -> DomainResult<Self> {
        if reason.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Refund reason must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            reason,
            status: RefundStatus::Pending,
            resolution_note: None,
            created_at,
        })
    }

    /// 只能处理一次
    pub fn ensure_pending(&self) -> DomainResult<()> {
        match self.status {
            RefundStatus::Pending => Ok(()),
            RefundStatus::Approved | RefundStatus::Rejected => {
                Err(DomainError::RefundAlreadyProcessed {
                    refund_id: self.id,
                    status: self.status,
                })
            }
        }
    }

    /// 按审核结论结案
    pub fn resolve(&mut self, decision: RefundDecision, note: Option<String>) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = decision.into();
        self.resolution_note = note;
        Ok(())
    }

    /// 活动已举行，无论审核结论如何都拒绝
    pub fn force_reject(&mut self) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = RefundStatus::Rejected;
        self.resolution_note = Some(EVENT_PASSED_NOTE.to_string());
        Ok(())
    }
}

/// 客服工单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportCase {
    pub id: Uuid,
    /// 提交工单的用户
    pub user_id: Uuid,
    pub subject: String,
    pub description: String,
    pub status: SupportStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SupportCase {
    pub fn open(
        user_id: Uuid,
        subject: String,
        description: String,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if subject.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Support case subject must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            subject,
            description,
            status: SupportStatus::Open,
            resolution_note: None,
            created_at,
        })
    }

    /// 更新处理进度，未提供备注时保留原备注
    pub fn update(&mut self, status: SupportStatus, note: Option<String>) {
        self.status = status;
        if let Some(note) = note {
            self.resolution_note = Some(note);
        }
    }
}

/// 入场记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLog {
    pub id: Uuid,
    pub ticket_id: Uuid,
    /// 执行检票的工作人员
    pub validated_by: Uuid,
    pub validation_time: DateTime<Utc>,
    pub status: EntryStatus,
}

impl EntryLog {
    pub fn admitted(ticket_id: Uuid, validated_by: Uuid, validation_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            validated_by,
            validation_time,
            status: EntryStatus::Valid,
        }
    }
}
