use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    EntryLog, Event, EventStatus, Money, Order, OrderStatus, RefundRequest, Seat, SupportCase,
    Ticket, Venue,
};
use crate::ports::ticketing_store_port::{TicketingStorePort, TicketingTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySql, Pool, QueryBuilder, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// InnoDB 锁等待超时
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// InnoDB 死锁回滚
const ER_LOCK_DEADLOCK: u16 = 1213;
/// 唯一键冲突
const ER_DUP_ENTRY: u16 = 1062;

const VENUE_COLUMNS: &str = "id, name, city, address, total_capacity";
const EVENT_COLUMNS: &str =
    "id, venue_id, name, category, event_date, ticket_price_cents, max_tickets_per_user, status";
const SEAT_COLUMNS: &str = "id, event_id, seat_number, status";
const ORDER_COLUMNS: &str =
    "id, user_id, event_id, total_amount_cents, payment_mode, status, booking_time";
const TICKET_COLUMNS: &str = "id, order_id, seat_id, ticket_code, status, generated_at";
const REFUND_COLUMNS: &str = "id, order_id, reason, status, resolution_note, created_at";
const SUPPORT_CASE_COLUMNS: &str =
    "id, user_id, subject, description, status, resolution_note, created_at";
const ENTRY_LOG_COLUMNS: &str = "id, ticket_id, validated_by, validation_time, status";

/// 用户在活动中持有的票数
///
/// 必须是加锁读：可重复读隔离级别下快照读看不到刚释放配额锁的事务写入的票
const HELD_TICKETS_QUERY: &str = r#"
    SELECT COUNT(t.id)
    FROM tickets t
    JOIN orders o ON t.order_id = o.id
    WHERE o.user_id = ? AND o.event_id = ? AND o.status <> ?
    LOCK IN SHARE MODE
"#;

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// 将锁等待超时与死锁映射为可重试错误
fn lock_error(err: sqlx::Error, on_timeout: impl FnOnce() -> DomainError) -> DomainError {
    match mysql_error_number(&err) {
        Some(ER_LOCK_WAIT_TIMEOUT) | Some(ER_LOCK_DEADLOCK) => {
            warn!("Lock acquisition failed: {}", err);
            on_timeout()
        }
        _ => DomainError::DatabaseError(err),
    }
}

/// MySQL票务存储实现
#[derive(Clone)]
pub struct MySqlTicketingStore {
    pool: Arc<Pool<MySql>>,
    lock_timeout: Duration,
}

impl MySqlTicketingStore {
    pub fn new(pool: Arc<Pool<MySql>>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// 执行数据库迁移
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl TicketingStorePort for MySqlTicketingStore {
    type Tx = MySqlTx;

    async fn begin(&self) -> DomainResult<MySqlTx> {
        let mut tx = self.pool.begin().await?;

        // innodb_lock_wait_timeout 最小为1秒
        let seconds = self.lock_timeout.as_secs().max(1);
        sqlx::query(&format!("SET SESSION innodb_lock_wait_timeout = {}", seconds))
            .execute(&mut *tx)
            .await?;

        Ok(MySqlTx { tx })
    }

    async fn find_venue(&self, id: Uuid) -> DomainResult<Option<Venue>> {
        let query = format!("SELECT {} FROM venues WHERE id = ?", VENUE_COLUMNS);
        let row = sqlx::query_as::<_, VenueRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(VenueRow::into_venue))
    }

    async fn find_event(&self, id: Uuid) -> DomainResult<Option<Event>> {
        let query = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(EventRow::into_event)
            .transpose()
    }

    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> DomainResult<Vec<Event>> {
        let query = format!(
            "SELECT {} FROM events WHERE status = ? AND event_date > ? ORDER BY event_date",
            EVENT_COLUMNS
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(EventStatus::Upcoming.as_str())
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(EventRow::into_event)
            .collect()
    }

    async fn list_seats(&self, event_id: Uuid) -> DomainResult<Vec<Seat>> {
        let query = format!(
            "SELECT {} FROM seats WHERE event_id = ? ORDER BY id",
            SEAT_COLUMNS
        );
        sqlx::query_as::<_, SeatRow>(&query)
            .bind(event_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(SeatRow::into_seat)
            .collect()
    }

    async fn find_seat(&self, id: Uuid) -> DomainResult<Option<Seat>> {
        let query = format!("SELECT {} FROM seats WHERE id = ?", SEAT_COLUMNS);
        sqlx::query_as::<_, SeatRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(SeatRow::into_seat)
            .transpose()
    }

    async fn find_order(&self, id: Uuid) -> DomainResult<Option<Order>> {
        let query = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(OrderRow::into_order)
            .transpose()
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Order>> {
        let query = format!(
            "SELECT {} FROM orders WHERE user_id = ? ORDER BY booking_time",
            ORDER_COLUMNS
        );
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(OrderRow::into_order)
            .collect()
    }

    async fn list_orders_for_event(&self, event_id: Uuid) -> DomainResult<Vec<Order>> {
        let query = format!("SELECT {} FROM orders WHERE event_id = ?", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(event_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(OrderRow::into_order)
            .collect()
    }

    async fn list_tickets_for_order(&self, order_id: Uuid) -> DomainResult<Vec<Ticket>> {
        let query = format!(
            "SELECT {} FROM tickets WHERE order_id = ? ORDER BY id",
            TICKET_COLUMNS
        );
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(order_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(TicketRow::into_ticket)
            .collect()
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Ticket>> {
        let query = r#"
            SELECT t.id, t.order_id, t.seat_id, t.ticket_code, t.status, t.generated_at
            FROM tickets t
            JOIN orders o ON t.order_id = o.id
            WHERE o.user_id = ?
            ORDER BY t.generated_at
        "#;
        sqlx::query_as::<_, TicketRow>(query)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(TicketRow::into_ticket)
            .collect()
    }

    async fn find_ticket_by_code(&self, ticket_code: &str) -> DomainResult<Option<Ticket>> {
        let query = format!("SELECT {} FROM tickets WHERE ticket_code = ?", TICKET_COLUMNS);
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(ticket_code)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(TicketRow::into_ticket)
            .transpose()
    }

    async fn find_refund_request(&self, id: Uuid) -> DomainResult<Option<RefundRequest>> {
        let query = format!("SELECT {} FROM refund_requests WHERE id = ?", REFUND_COLUMNS);
        sqlx::query_as::<_, RefundRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(RefundRow::into_refund)
            .transpose()
    }

    async fn list_refund_requests(&self) -> DomainResult<Vec<RefundRequest>> {
        let query = format!(
            "SELECT {} FROM refund_requests ORDER BY created_at",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&query)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(RefundRow::into_refund)
            .collect()
    }

    async fn find_support_case(&self, id: Uuid) -> DomainResult<Option<SupportCase>> {
        let query = format!(
            "SELECT {} FROM support_cases WHERE id = ?",
            SUPPORT_CASE_COLUMNS
        );
        sqlx::query_as::<_, SupportCaseRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(SupportCaseRow::into_support_case)
            .transpose()
    }

    async fn list_support_cases(&self) -> DomainResult<Vec<SupportCase>> {
        let query = format!(
            "SELECT {} FROM support_cases ORDER BY created_at",
            SUPPORT_CASE_COLUMNS
        );
        sqlx::query_as::<_, SupportCaseRow>(&query)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(SupportCaseRow::into_support_case)
            .collect()
    }

    async fn list_entry_logs_for_ticket(&self, ticket_id: Uuid) -> DomainResult<Vec<EntryLog>> {
        let query = format!(
            "SELECT {} FROM entry_logs WHERE ticket_id = ? ORDER BY validation_time",
            ENTRY_LOG_COLUMNS
        );
        sqlx::query_as::<_, EntryLogRow>(&query)
            .bind(ticket_id)
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(EntryLogRow::into_entry_log)
            .collect()
    }
}

/// MySQL事务，丢弃时由 sqlx 自动回滚
pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl TicketingTx for MySqlTx {
    async fn find_venue(&mut self, id: Uuid) -> DomainResult<Option<Venue>> {
        let query = format!("SELECT {} FROM venues WHERE id = ?", VENUE_COLUMNS);
        let row = sqlx::query_as::<_, VenueRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(VenueRow::into_venue))
    }

    async fn find_event(&mut self, id: Uuid) -> DomainResult<Option<Event>> {
        let query = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(EventRow::into_event)
            .transpose()
    }

    async fn lock_event(&mut self, id: Uuid) -> DomainResult<Option<Event>> {
        let query = format!("SELECT {} FROM events WHERE id = ? FOR UPDATE", EVENT_COLUMNS);
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, || DomainError::RowLockTimeout(format!("event {}", id))))?
            .map(EventRow::into_event)
            .transpose()
    }

    async fn count_seats(&mut self, event_id: Uuid) -> DomainResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE event_id = ?")
            .bind(event_id)
            .fetch_one(&mut *self.tx)
            .await?;
        u32::try_from(count).map_err(|_| DomainError::InternalError("Seat count overflow".into()))
    }

    async fn lock_user_quota(&mut self, user_id: Uuid, event_id: Uuid) -> DomainResult<u32> {
        let on_timeout = || {
            DomainError::RowLockTimeout(format!(
                "booking quota of user {} for event {}",
                user_id, event_id
            ))
        };

        sqlx::query("INSERT IGNORE INTO booking_quota_locks (user_id, event_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(event_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, on_timeout))?;

        sqlx::query(
            "SELECT user_id FROM booking_quota_locks WHERE user_id = ? AND event_id = ? FOR UPDATE",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, on_timeout))?;

        let held: i64 = sqlx::query_scalar(HELD_TICKETS_QUERY)
            .bind(user_id)
            .bind(event_id)
            .bind(OrderStatus::Cancelled.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, on_timeout))?;

        u32::try_from(held).map_err(|_| DomainError::InternalError("Ticket count overflow".into()))
    }

    async fn lock_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> DomainResult<Vec<Seat>> {
        if seat_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM seats WHERE event_id = ",
            SEAT_COLUMNS
        ));
        builder.push_bind(event_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in seat_ids {
            separated.push_bind(*id);
        }
        builder.push(") ORDER BY id FOR UPDATE");

        let rows = builder
            .build_query_as::<SeatRow>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, || DomainError::SeatLockTimeout))?;

        debug!("Locked {} seat rows for event {}", rows.len(), event_id);
        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn lock_order(&mut self, id: Uuid) -> DomainResult<Option<Order>> {
        let query = format!("SELECT {} FROM orders WHERE id = ? FOR UPDATE", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, || DomainError::RowLockTimeout(format!("order {}", id))))?
            .map(OrderRow::into_order)
            .transpose()
    }

    async fn find_refund_request_for_order(
        &mut self,
        order_id: Uuid,
    ) -> DomainResult<Option<RefundRequest>> {
        let query = format!(
            "SELECT {} FROM refund_requests WHERE order_id = ?",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&query)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(RefundRow::into_refund)
            .transpose()
    }

    async fn lock_refund_request(&mut self, id: Uuid) -> DomainResult<Option<RefundRequest>> {
        let query = format!(
            "SELECT {} FROM refund_requests WHERE id = ? FOR UPDATE",
            REFUND_COLUMNS
        );
        sqlx::query_as::<_, RefundRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                lock_error(e, || DomainError::RowLockTimeout(format!("refund request {}", id)))
            })?
            .map(RefundRow::into_refund)
            .transpose()
    }

    async fn lock_ticket(&mut self, id: Uuid) -> DomainResult<Option<Ticket>> {
        let query = format!("SELECT {} FROM tickets WHERE id = ? FOR UPDATE", TICKET_COLUMNS);
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, || DomainError::RowLockTimeout(format!("ticket {}", id))))?
            .map(TicketRow::into_ticket)
            .transpose()
    }

    async fn lock_order_tickets(&mut self, order_id: Uuid) -> DomainResult<Vec<Ticket>> {
        let query = format!(
            "SELECT {} FROM tickets WHERE order_id = ? ORDER BY id FOR UPDATE",
            TICKET_COLUMNS
        );
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                lock_error(e, || {
                    DomainError::RowLockTimeout(format!("tickets of order {}", order_id))
                })
            })?
            .into_iter()
            .map(TicketRow::into_ticket)
            .collect()
    }

    async fn lock_support_case(&mut self, id: Uuid) -> DomainResult<Option<SupportCase>> {
        let query = format!(
            "SELECT {} FROM support_cases WHERE id = ? FOR UPDATE",
            SUPPORT_CASE_COLUMNS
        );
        sqlx::query_as::<_, SupportCaseRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                lock_error(e, || DomainError::RowLockTimeout(format!("support case {}", id)))
            })?
            .map(SupportCaseRow::into_support_case)
            .transpose()
    }

    async fn insert_venue(&mut self, venue: &Venue) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO venues (id, name, city, address, total_capacity) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(venue.id)
        .bind(&venue.name)
        .bind(&venue.city)
        .bind(&venue.address)
        .bind(venue.total_capacity)
        .execute(&mut *self.tx)
        .await?;

        debug!("Venue saved: {}", venue.id);
        Ok(())
    }

    async fn insert_event(&mut self, event: &Event) -> DomainResult<()> {
        let query = format!(
            "INSERT INTO events ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            EVENT_COLUMNS
        );
        sqlx::query(&query)
            .bind(event.id)
            .bind(event.venue_id)
            .bind(&event.name)
            .bind(&event.category)
            .bind(event.event_date)
            .bind(event.ticket_price.to_cents())
            .bind(event.max_tickets_per_user)
            .bind(event.status.as_str())
            .execute(&mut *self.tx)
            .await?;

        debug!("Event saved: {}", event.id);
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> DomainResult<()> {
        let query = r#"
            UPDATE events
            SET name = ?, category = ?, event_date = ?, ticket_price_cents = ?,
                max_tickets_per_user = ?, status = ?
            WHERE id = ?
        "#;

        let rows_affected = sqlx::query(query)
            .bind(&event.name)
            .bind(&event.category)
            .bind(event.event_date)
            .bind(event.ticket_price.to_cents())
            .bind(event.max_tickets_per_user)
            .bind(event.status.as_str())
            .bind(event.id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            error!("No event found to update: {}", event.id);
            return Err(DomainError::EventNotFound(event.id));
        }

        Ok(())
    }

    async fn insert_seats(&mut self, seats: &[Seat]) -> DomainResult<()> {
        if seats.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new(format!("INSERT INTO seats ({}) ", SEAT_COLUMNS));
        builder.push_values(seats, |mut row, seat| {
            row.push_bind(seat.id)
                .push_bind(seat.event_id)
                .push_bind(seat.seat_number.clone())
                .push_bind(seat.status.as_str());
        });
        builder.build().execute(&mut *self.tx).await?;

        debug!("{} seats saved", seats.len());
        Ok(())
    }

    async fn update_seats(&mut self, seats: &[Seat]) -> DomainResult<()> {
        for seat in seats {
            let rows_affected = sqlx::query("UPDATE seats SET status = ? WHERE id = ?")
                .bind(seat.status.as_str())
                .bind(seat.id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

            if rows_affected == 0 {
                error!("No seat found to update: {}", seat.id);
                return Err(DomainError::InternalError(format!(
                    "No seat found to update: {}",
                    seat.id
                )));
            }
        }

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> DomainResult<()> {
        let query = format!(
            "INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            ORDER_COLUMNS
        );
        sqlx::query(&query)
            .bind(order.id)
            .bind(order.user_id)
            .bind(order.event_id)
            .bind(order.total_amount.to_cents())
            .bind(order.payment_mode.as_str())
            .bind(order.status.as_str())
            .bind(order.booking_time)
            .execute(&mut *self.tx)
            .await?;

        debug!("Order saved: {}", order.id);
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> DomainResult<()> {
        let rows_affected = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(order.status.as_str())
            .bind(order.id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                lock_error(e, || DomainError::RowLockTimeout(format!("order {}", order.id)))
            })?
            .rows_affected();

        if rows_affected == 0 {
            error!("No order found to update: {}", order.id);
            return Err(DomainError::OrderNotFound(order.id));
        }

        Ok(())
    }

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()> {
        if tickets.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new(format!("INSERT INTO tickets ({}) ", TICKET_COLUMNS));
        builder.push_values(tickets, |mut row, ticket| {
            row.push_bind(ticket.id)
                .push_bind(ticket.order_id)
                .push_bind(ticket.seat_id)
                .push_bind(ticket.ticket_code.clone())
                .push_bind(ticket.status.as_str())
                .push_bind(ticket.generated_at);
        });
        builder.build().execute(&mut *self.tx).await?;

        debug!("{} tickets saved", tickets.len());
        Ok(())
    }

    async fn update_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()> {
        for ticket in tickets {
            let rows_affected = sqlx::query("UPDATE tickets SET status = ? WHERE id = ?")
                .bind(ticket.status.as_str())
                .bind(ticket.id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

            if rows_affected == 0 {
                error!("No ticket found to update: {}", ticket.id);
                return Err(DomainError::TicketNotFound(ticket.id.to_string()));
            }
        }

        Ok(())
    }

    async fn insert_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()> {
        let query = format!(
            "INSERT INTO refund_requests ({}) VALUES (?, ?, ?, ?, ?, ?)",
            REFUND_COLUMNS
        );
        sqlx::query(&query)
            .bind(refund.id)
            .bind(refund.order_id)
            .bind(&refund.reason)
            .bind(refund.status.as_str())
            .bind(&refund.resolution_note)
            .bind(refund.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match mysql_error_number(&e) {
                Some(ER_DUP_ENTRY) => DomainError::RefundAlreadyRequested(refund.order_id),
                _ => DomainError::DatabaseError(e),
            })?;

        debug!("Refund request saved: {}", refund.id);
        Ok(())
    }

    async fn update_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()> {
        let rows_affected =
            sqlx::query("UPDATE refund_requests SET status = ?, resolution_note = ? WHERE id = ?")
                .bind(refund.status.as_str())
                .bind(&refund.resolution_note)
                .bind(refund.id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

        if rows_affected == 0 {
            error!("No refund request found to update: {}", refund.id);
            return Err(DomainError::RefundNotFound(refund.id));
        }

        Ok(())
    }

    async fn insert_support_case(&mut self, case: &SupportCase) -> DomainResult<()> {
        let query = format!(
            "INSERT INTO support_cases ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            SUPPORT_CASE_COLUMNS
        );
        sqlx::query(&query)
            .bind(case.id)
            .bind(case.user_id)
            .bind(&case.subject)
            .bind(&case.description)
            .bind(case.status.as_str())
            .bind(&case.resolution_note)
            .bind(case.created_at)
            .execute(&mut *self.tx)
            .await?;

        debug!("Support case saved: {}", case.id);
        Ok(())
    }

    async fn update_support_case(&mut self, case: &SupportCase) -> DomainResult<()> {
        let rows_affected =
            sqlx::query("UPDATE support_cases SET status = ?, resolution_note = ? WHERE id = ?")
                .bind(case.status.as_str())
                .bind(&case.resolution_note)
                .bind(case.id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

        if rows_affected == 0 {
            error!("No support case found to update: {}", case.id);
            return Err(DomainError::SupportCaseNotFound(case.id));
        }

        Ok(())
    }

    async fn insert_entry_log(&mut self, log: &EntryLog) -> DomainResult<()> {
        let query = format!(
            "INSERT INTO entry_logs ({}) VALUES (?, ?, ?, ?, ?)",
            ENTRY_LOG_COLUMNS
        );
        sqlx::query(&query)
            .bind(log.id)
            .bind(log.ticket_id)
            .bind(log.validated_by)
            .bind(log.validation_time)
            .bind(log.status.as_str())
            .execute(&mut *self.tx)
            .await?;

        debug!("Entry log saved for ticket {}", log.ticket_id);
        Ok(())
    }

    async fn commit(self) -> DomainResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// 数据库行结构体
#[derive(Debug, sqlx::FromRow)]
struct VenueRow {
    id: Uuid,
    name: String,
    city: String,
    address: String,
    total_capacity: u32,
}

impl VenueRow {
    fn into_venue(self) -> Venue {
        Venue {
            id: self.id,
            name: self.name,
            city: self.city,
            address: self.address,
            total_capacity: self.total_capacity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    venue_id: Uuid,
    name: String,
    category: String,
    event_date: DateTime<Utc>,
    ticket_price_cents: i64,
    max_tickets_per_user: u32,
    status: String,
}

impl EventRow {
    fn into_event(self) -> DomainResult<Event> {
        Ok(Event {
            id: self.id,
            venue_id: self.venue_id,
            name: self.name,
            category: self.category,
            event_date: self.event_date,
            ticket_price: Money::from_cents(self.ticket_price_cents),
            max_tickets_per_user: self.max_tickets_per_user,
            status: self.status.parse()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    event_id: Uuid,
    seat_number: String,
    status: String,
}

impl SeatRow {
    fn into_seat(self) -> DomainResult<Seat> {
        Ok(Seat {
            id: self.id,
            event_id: self.event_id,
            seat_number: self.seat_number,
            status: self.status.parse()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    total_amount_cents: i64,
    payment_mode: String,
    status: String,
    booking_time: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> DomainResult<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            event_id: self.event_id,
            total_amount: Money::from_cents(self.total_amount_cents),
            payment_mode: self.payment_mode.parse()?,
            status: self.status.parse()?,
            booking_time: self.booking_time,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    order_id: Uuid,
    seat_id: Uuid,
    ticket_code: String,
    status: String,
    generated_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_ticket(self) -> DomainResult<Ticket> {
        Ok(Ticket {
            id: self.id,
            order_id: self.order_id,
            seat_id: self.seat_id,
            ticket_code: self.ticket_code,
            status: self.status.parse()?,
            generated_at: self.generated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    order_id: Uuid,
    reason: String,
    status: String,
    resolution_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl RefundRow {
    fn into_refund(self) -> DomainResult<RefundRequest> {
        Ok(RefundRequest {
            id: self.id,
            order_id: self.order_id,
            reason: self.reason,
            status: self.status.parse()?,
            resolution_note: self.resolution_note,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SupportCaseRow {
    id: Uuid,
    user_id: Uuid,
    subject: String,
    description: String,
    status: String,
    resolution_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl SupportCaseRow {
    fn into_support_case(self) -> DomainResult<SupportCase> {
        Ok(SupportCase {
            id: self.id,
            user_id: self.user_id,
            subject: self.subject,
            description: self.description,
            status: self.status.parse()?,
            resolution_note: self.resolution_note,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryLogRow {
    id: Uuid,
    ticket_id: Uuid,
    validated_by: Uuid,
    validation_time: DateTime<Utc>,
    status: String,
}

impl EntryLogRow {
    fn into_entry_log(self) -> DomainResult<EntryLog> {
        Ok(EntryLog {
            id: self.id,
            ticket_id: self.ticket_id,
            validated_by: self.validated_by,
            validation_time: self.validation_time,
            status: self.status.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_ticket_count_is_a_locking_read() {
        let normalized = HELD_TICKETS_QUERY.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(normalized.ends_with("LOCK IN SHARE MODE"));
        assert!(normalized.contains("o.status <> ?"));
    }
}
