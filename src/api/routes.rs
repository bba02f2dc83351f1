use super::handlers::*;
use crate::ports::TicketingStorePort;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_router<R: TicketingStorePort>(state: AppState<R>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 目录管理
        .route("/api/venues", post(create_venue::<R>))
        .route("/api/venues/:venue_id", get(get_venue::<R>))
        .route(
            "/api/events",
            get(list_upcoming_events::<R>).post(create_event::<R>),
        )
        .route("/api/events/:event_id", get(get_event::<R>))
        .route("/api/events/:event_id/status", put(update_event_status::<R>))
        .route("/api/events/:event_id/close", post(close_bookings::<R>))
        .route(
            "/api/events/:event_id/seats",
            get(list_available_seats::<R>).post(create_seats::<R>),
        )
        .route("/api/events/:event_id/summary", get(booking_summary::<R>))
        // 下单与查询
        .route("/api/bookings", post(book_tickets::<R>))
        .route("/api/orders", get(list_orders::<R>))
        .route("/api/orders/:order_id", get(get_order::<R>))
        .route("/api/tickets", get(list_tickets::<R>))
        // 退款
        .route(
            "/api/refunds",
            get(list_refunds::<R>).post(request_refund::<R>),
        )
        .route(
            "/api/refunds/:refund_id/process",
            post(process_refund::<R>),
        )
        // 检票
        .route(
            "/api/gate/validate/:ticket_code",
            post(validate_ticket::<R>),
        )
        .route(
            "/api/gate/tickets/:ticket_id/mark-used",
            post(mark_ticket_used::<R>),
        )
        .route(
            "/api/gate/tickets/:ticket_id/entries",
            get(list_entry_logs::<R>),
        )
        // 客服工单
        .route(
            "/api/support/cases",
            get(list_support_cases::<R>).post(open_support_case::<R>),
        )
        .route(
            "/api/support/cases/:case_id",
            patch(update_support_case::<R>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::fixture;
    use crate::application::ErrorResponse;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, user: Option<Uuid>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let fx = fixture(1).await;
        let router = create_router(AppState::new(fx.store.clone()));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_booking_over_http() {
        let fx = fixture(3).await;
        let router = create_router(AppState::new(fx.store.clone()));
        let user = Uuid::new_v4();
        let payload = json!({
            "event_id": fx.event.id,
            "seat_ids": [fx.seat_ids[0], fx.seat_ids[1]],
            "payment_mode": "card",
        });

        let (status, body) = send(
            router.clone(),
            json_request("POST", "/api/bookings", Some(user), payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["order"]["status"], "confirmed");
        assert_eq!(body["order"]["total_amount"]["amount_cents"], 30000);
        assert_eq!(body["tickets"].as_array().map(Vec::len), Some(2));

        // 同样的座位再订一次
        let (status, body) = send(
            router,
            json_request("POST", "/api/bookings", Some(Uuid::new_v4()), payload),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.error, "SEAT_ALREADY_BOOKED");
    }

    #[tokio::test]
    async fn test_booking_requires_caller() {
        let fx = fixture(1).await;
        let router = create_router(AppState::new(fx.store.clone()));
        let payload = json!({
            "event_id": fx.event.id,
            "seat_ids": [fx.seat_ids[0]],
            "payment_mode": "upi",
        });

        let (status, body) =
            send(router, json_request("POST", "/api/bookings", None, payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_support_case_over_http() {
        let fx = fixture(1).await;
        let router = create_router(AppState::new(fx.store.clone()));
        let user = Uuid::new_v4();

        let (status, body) = send(
            router.clone(),
            json_request(
                "POST",
                "/api/support/cases",
                Some(user),
                json!({ "subject": "Lost ticket", "description": "Email never arrived" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "open");
        assert_eq!(body["user_id"], user.to_string());
        let case_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            router.clone(),
            json_request(
                "PATCH",
                &format!("/api/support/cases/{}", case_id),
                None,
                json!({ "status": "in_progress", "resolution_note": "Resending" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");
        assert_eq!(body["resolution_note"], "Resending");

        let (status, body) = send(
            router,
            json_request(
                "PATCH",
                &format!("/api/support/cases/{}", Uuid::new_v4()),
                None,
                json!({ "status": "closed" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "SUPPORT_CASE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_mark_used_records_gate_staff() {
        let fx = fixture(1).await;
        let router = create_router(AppState::new(fx.store.clone()));
        let (_, booked) = send(
            router.clone(),
            json_request(
                "POST",
                "/api/bookings",
                Some(Uuid::new_v4()),
                json!({
                    "event_id": fx.event.id,
                    "seat_ids": [fx.seat_ids[0]],
                    "payment_mode": "wallet",
                }),
            ),
        )
        .await;
        let ticket_id = booked["tickets"][0]["id"].as_str().unwrap().to_string();
        let mark_used = format!("/api/gate/tickets/{}/mark-used", ticket_id);

        let (status, _) = send(
            router.clone(),
            json_request("POST", &mark_used, None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let staff = Uuid::new_v4();
        let (status, body) = send(
            router.clone(),
            json_request("POST", &mark_used, Some(staff), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "used");

        let request = Request::builder()
            .uri(format!("/api/gate/tickets/{}/entries", ticket_id))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["validated_by"], staff.to_string());
        assert_eq!(body[0]["status"], "valid");
    }

    #[tokio::test]
    async fn test_unknown_event_summary_is_not_found() {
        let fx = fixture(1).await;
        let router = create_router(AppState::new(fx.store.clone()));

        let request = Request::builder()
            .uri(format!("/api/events/{}/summary", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "EVENT_NOT_FOUND");
    }
}
