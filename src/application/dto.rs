use crate::domain::{
    EventStatus, Money, Order, PaymentMode, RefundDecision, SupportStatus, Ticket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 下单请求
#[derive(Debug, Clone, Deserialize)]
pub struct BookTicketsRequest {
    /// 活动ID
    pub event_id: Uuid,

    /// 选择的座位
    pub seat_ids: Vec<Uuid>,

    /// 支付方式
    pub payment_mode: PaymentMode,
}

/// 订单及其票
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

/// 创建场馆请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVenueRequest {
    pub name: String,
    pub city: String,
    pub address: String,
    pub total_capacity: u32,
}

/// 创建活动请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub venue_id: Uuid,
    pub name: String,
    pub category: String,
    pub event_date: DateTime<Utc>,

    /// 票价（分）
    pub ticket_price: Money,

    pub max_tickets_per_user: u32,
}

/// 修改活动状态请求
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
}

/// 批量创建座位请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSeatsRequest {
    pub seat_count: u32,
}

/// 批量创建座位结果
#[derive(Debug, Clone, Serialize)]
pub struct SeatsCreated {
    pub event_id: Uuid,
    pub created: u32,
    pub total_seats: u32,
}

/// 活动售票汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSummary {
    pub event_id: Uuid,
    pub event_name: String,
    pub total_seats: u32,
    pub booked_seats: u32,
    pub available_seats: u32,

    /// 仅统计已确认订单
    pub total_revenue: Money,
}

/// 申请退款请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRefundRequest {
    pub order_id: Uuid,
    pub reason: String,
}

/// 处理退款请求
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRefundRequest {
    pub decision: RefundDecision,
    pub resolution_note: Option<String>,
}

/// 提交客服工单请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSupportCaseRequest {
    pub subject: String,
    pub description: String,
}

/// 更新客服工单请求
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSupportCaseRequest {
    pub status: SupportStatus,

    /// 为空时保留原备注
    pub resolution_note: Option<String>,
}

/// 检票结果（仅用于展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketValidation {
    pub is_valid: bool,
    pub message: String,
    pub ticket_id: Option<Uuid>,
    pub event_name: Option<String>,
    pub seat_number: Option<String>,
}

impl TicketValidation {
    pub fn invalid(message: &str) -> Self {
        Self {
            is_valid: false,
            message: message.to_string(),
            ticket_id: None,
            event_name: None,
            seat_number: None,
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: String, message: String) -> Self {
        Self { error, message }
    }
}
