use crate::domain::{EventStatus, RefundStatus};
use thiserror::Error;
use uuid::Uuid;

/// 领域层错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 活动未找到
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    /// 活动不可售
    #[error("Event {event_id} is not open for booking (status: {status})")]
    EventNotBookable { event_id: Uuid, status: EventStatus },

    /// 活动已开始
    #[error("Event {0} has already passed")]
    EventPassed(Uuid),

    /// 超出每人限购数量
    #[error("Exceeds max tickets per user ({limit}): {held} already held, {requested} requested")]
    QuotaExceeded {
        limit: u32,
        held: u32,
        requested: u32,
    },

    /// 座位不属于该活动
    #[error("Some seats not found for event {event_id}: {missing:?}")]
    SeatNotFound { event_id: Uuid, missing: Vec<Uuid> },

    /// 座位已被预订
    #[error("Seat {seat_number} is already booked")]
    SeatAlreadyBooked { seat_id: Uuid, seat_number: String },

    /// 座位锁等待超时（可重试）
    #[error("Timed out waiting for seat locks, retry the booking")]
    SeatLockTimeout,

    /// 其他行锁等待超时（可重试）
    #[error("Timed out waiting for lock on {0}")]
    RowLockTimeout(String),

    /// 退款申请未找到
    #[error("Refund request not found: {0}")]
    RefundNotFound(Uuid),

    /// 退款申请已处理
    #[error("Refund request {refund_id} already processed (status: {status})")]
    RefundAlreadyProcessed { refund_id: Uuid, status: RefundStatus },

    /// 活动已举行，强制拒绝退款
    #[error("Refund not allowed after event date (event {0})")]
    EventAlreadyOccurred(Uuid),

    /// 订单已申请过退款
    #[error("Refund already requested for order {0}")]
    RefundAlreadyRequested(Uuid),

    /// 订单中有已入场的票
    #[error("Ticket {0} has already been used")]
    TicketAlreadyUsed(Uuid),

    /// 场馆未找到
    #[error("Venue not found: {0}")]
    VenueNotFound(Uuid),

    /// 订单未找到
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    /// 票未找到
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// 客服工单未找到
    #[error("Support case not found: {0}")]
    SupportCaseNotFound(Uuid),

    /// 超出场馆容量
    #[error("Cannot exceed venue capacity ({capacity})")]
    CapacityExceeded { capacity: u32 },

    /// 状态错误
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// 数据库错误
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// 数据库迁移错误
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// 稳定的错误类型代码，供调用方渲染提示
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::ValidationError(_) => "VALIDATION_ERROR",
            DomainError::EventNotFound(_) => "EVENT_NOT_FOUND",
            DomainError::EventNotBookable { .. } => "EVENT_NOT_BOOKABLE",
            DomainError::EventPassed(_) => "EVENT_PASSED",
            DomainError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            DomainError::SeatNotFound { .. } => "SEAT_NOT_FOUND",
            DomainError::SeatAlreadyBooked { .. } => "SEAT_ALREADY_BOOKED",
            DomainError::SeatLockTimeout => "SEAT_LOCK_TIMEOUT",
            DomainError::RowLockTimeout(_) => "LOCK_TIMEOUT",
            DomainError::RefundNotFound(_) => "REFUND_NOT_FOUND",
            DomainError::RefundAlreadyProcessed { .. } => "REFUND_ALREADY_PROCESSED",
            DomainError::EventAlreadyOccurred(_) => "EVENT_ALREADY_OCCURRED",
            DomainError::RefundAlreadyRequested(_) => "REFUND_ALREADY_REQUESTED",
            DomainError::TicketAlreadyUsed(_) => "TICKET_ALREADY_USED",
            DomainError::VenueNotFound(_) => "VENUE_NOT_FOUND",
            DomainError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            DomainError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            DomainError::SupportCaseNotFound(_) => "SUPPORT_CASE_NOT_FOUND",
            DomainError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            DomainError::InvalidState { .. } => "INVALID_STATE",
            DomainError::DatabaseError(_) => "DATABASE_ERROR",
            DomainError::MigrationError(_) => "MIGRATION_ERROR",
            DomainError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            DomainError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// 调用方可安全重试（引擎内部不重试）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::SeatLockTimeout | DomainError::RowLockTimeout(_)
        )
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
