use crate::application::{
    BookTicketsRequest, BookingService, CatalogService, CreateEventRequest, CreateRefundRequest,
    CreateSeatsRequest, CreateSupportCaseRequest, CreateVenueRequest, ErrorResponse, GateService,
    ProcessRefundRequest, RefundService, SupportService, UpdateEventStatusRequest,
    UpdateSupportCaseRequest,
};
use crate::domain::errors::DomainError;
use crate::ports::TicketingStorePort;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 调用方身份请求头，由上游网关完成认证后注入
pub const USER_ID_HEADER: &str = "x-user-id";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// 应用状态
pub struct AppState<R: TicketingStorePort> {
    pub booking_service: Arc<BookingService<R>>,
    pub refund_service: Arc<RefundService<R>>,
    pub catalog_service: Arc<CatalogService<R>>,
    pub gate_service: Arc<GateService<R>>,
    pub support_service: Arc<SupportService<R>>,
}

impl<R: TicketingStorePort> AppState<R> {
    /// 所有服务共享同一个存储
    pub fn new(store: Arc<R>) -> Self {
        Self {
            booking_service: Arc::new(BookingService::new(store.clone())),
            refund_service: Arc::new(RefundService::new(store.clone())),
            catalog_service: Arc::new(CatalogService::new(store.clone())),
            gate_service: Arc::new(GateService::new(store.clone())),
            support_service: Arc::new(SupportService::new(store)),
        }
    }
}

impl<R: TicketingStorePort> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            booking_service: self.booking_service.clone(),
            refund_service: self.refund_service.clone(),
            catalog_service: self.catalog_service.clone(),
            gate_service: self.gate_service.clone(),
            support_service: self.support_service.clone(),
        }
    }
}

/// 已认证的调用方
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        "UNAUTHENTICATED".to_string(),
                        "Missing X-User-Id".to_string(),
                    )),
                )
            })?;

        Uuid::parse_str(value).map(Caller).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "UNAUTHENTICATED".to_string(),
                    "Invalid X-User-Id".to_string(),
                )),
            )
        })
    }
}

/// 错误类型到HTTP状态码的映射
pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DomainError::EventNotFound(_)
        | DomainError::SeatNotFound { .. }
        | DomainError::RefundNotFound(_)
        | DomainError::VenueNotFound(_)
        | DomainError::OrderNotFound(_)
        | DomainError::TicketNotFound(_)
        | DomainError::SupportCaseNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::EventNotBookable { .. }
        | DomainError::EventPassed(_)
        | DomainError::QuotaExceeded { .. }
        | DomainError::SeatAlreadyBooked { .. }
        | DomainError::RefundAlreadyProcessed { .. }
        | DomainError::EventAlreadyOccurred(_)
        | DomainError::RefundAlreadyRequested(_)
        | DomainError::TicketAlreadyUsed(_)
        | DomainError::CapacityExceeded { .. }
        | DomainError::InvalidState { .. } => StatusCode::CONFLICT,
        DomainError::SeatLockTimeout | DomainError::RowLockTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::DatabaseError(_)
        | DomainError::MigrationError(_)
        | DomainError::ConfigurationError(_)
        | DomainError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_api_error(operation: &str, e: DomainError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() && !e.is_retryable() {
        error!("{} error: {}", operation, e);
    } else {
        warn!("{} rejected: {}", operation, e);
    }

    (
        status,
        Json(ErrorResponse::new(e.code().to_string(), e.to_string())),
    )
}

/// 下单
pub async fn book_tickets<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
    Json(request): Json<BookTicketsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Received booking request for event {}", request.event_id);

    state
        .booking_service
        .book(user_id, request)
        .await
        .map(|details| (StatusCode::CREATED, Json(details)))
        .map_err(|e| into_api_error("Booking", e))
}

/// 查询订单
pub async fn get_order<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .booking_service
        .get_order(user_id, order_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Order query", e))
}

/// 查询我的订单
pub async fn list_orders<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ApiError> {
    state
        .booking_service
        .list_orders(user_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Order listing", e))
}

/// 查询我的票
pub async fn list_tickets<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ApiError> {
    state
        .booking_service
        .list_tickets(user_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Ticket listing", e))
}

/// 申请退款
pub async fn request_refund<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
    Json(request): Json<CreateRefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Received refund request for order {}", request.order_id);

    state
        .refund_service
        .request_refund(user_id, request)
        .await
        .map(|refund| (StatusCode::CREATED, Json(refund)))
        .map_err(|e| into_api_error("Refund request", e))
}

/// 审核退款
pub async fn process_refund<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(refund_id): Path<Uuid>,
    Json(request): Json<ProcessRefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .refund_service
        .process(refund_id, request)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Refund processing", e))
}

pub async fn list_refunds<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .refund_service
        .list_refund_requests()
        .await
        .map(Json)
        .map_err(|e| into_api_error("Refund listing", e))
}

/// 创建场馆
pub async fn create_venue<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Json(request): Json<CreateVenueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .create_venue(request)
        .await
        .map(|venue| (StatusCode::CREATED, Json(venue)))
        .map_err(|e| into_api_error("Venue creation", e))
}

pub async fn get_venue<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(venue_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .get_venue(venue_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Venue query", e))
}

/// 创建活动
pub async fn create_event<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Json(request): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .create_event(request)
        .await
        .map(|event| (StatusCode::CREATED, Json(event)))
        .map_err(|e| into_api_error("Event creation", e))
}

pub async fn get_event<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .get_event(event_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Event query", e))
}

pub async fn list_upcoming_events<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .list_upcoming_events()
        .await
        .map(Json)
        .map_err(|e| into_api_error("Event listing", e))
}

pub async fn update_event_status<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .update_event_status(event_id, request.status)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Event status update", e))
}

/// 停售
pub async fn close_bookings<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .close_bookings(event_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Closing bookings", e))
}

/// 批量创建座位
pub async fn create_seats<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CreateSeatsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .create_seats(event_id, request)
        .await
        .map(|created| (StatusCode::CREATED, Json(created)))
        .map_err(|e| into_api_error("Seat creation", e))
}

pub async fn list_available_seats<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .list_available_seats(event_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Seat listing", e))
}

/// 售票汇总
pub async fn booking_summary<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog_service
        .booking_summary(event_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Booking summary", e))
}

/// 检票
pub async fn validate_ticket<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(ticket_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .gate_service
        .validate_ticket(&ticket_code)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Ticket validation", e))
}

/// 标记入场，检票人取自调用方身份
pub async fn mark_ticket_used<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(validated_by): Caller,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .gate_service
        .mark_used(ticket_id, validated_by)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Marking ticket used", e))
}

pub async fn list_entry_logs<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .gate_service
        .entry_logs(ticket_id)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Entry log listing", e))
}

/// 提交客服工单
pub async fn open_support_case<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Caller(user_id): Caller,
    Json(request): Json<CreateSupportCaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .support_service
        .open_case(user_id, request)
        .await
        .map(|case| (StatusCode::CREATED, Json(case)))
        .map_err(|e| into_api_error("Support case creation", e))
}

pub async fn list_support_cases<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .support_service
        .list_cases()
        .await
        .map(Json)
        .map_err(|e| into_api_error("Support case listing", e))
}

/// 更新客服工单
pub async fn update_support_case<R: TicketingStorePort>(
    State(state): State<AppState<R>>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<UpdateSupportCaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .support_service
        .update_case(case_id, request)
        .await
        .map(Json)
        .map_err(|e| into_api_error("Support case update", e))
}

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
