use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{
    EntryLog, Event, EventStatus, Order, RefundRequest, Seat, SupportCase, Ticket, Venue,
};
use crate::ports::ticketing_store_port::{TicketingStorePort, TicketingTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// 行锁键，派生的排序即全局加锁顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum RowKey {
    Quota { user_id: Uuid, event_id: Uuid },
    Event(Uuid),
    Refund(Uuid),
    Order(Uuid),
    Ticket(Uuid),
    Seat(Uuid),
    SupportCase(Uuid),
}

impl RowKey {
    fn timeout_error(&self) -> DomainError {
        match self {
            RowKey::Seat(_) => DomainError::SeatLockTimeout,
            RowKey::Quota { user_id, event_id } => DomainError::RowLockTimeout(format!(
                "booking quota of user {} for event {}",
                user_id, event_id
            )),
            RowKey::Event(id) => DomainError::RowLockTimeout(format!("event {}", id)),
            RowKey::Refund(id) => DomainError::RowLockTimeout(format!("refund request {}", id)),
            RowKey::Order(id) => DomainError::RowLockTimeout(format!("order {}", id)),
            RowKey::Ticket(id) => DomainError::RowLockTimeout(format!("ticket {}", id)),
            RowKey::SupportCase(id) => DomainError::RowLockTimeout(format!("support case {}", id)),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    venues: HashMap<Uuid, Venue>,
    events: HashMap<Uuid, Event>,
    seats: BTreeMap<Uuid, Seat>,
    orders: HashMap<Uuid, Order>,
    tickets: BTreeMap<Uuid, Ticket>,
    refund_requests: HashMap<Uuid, RefundRequest>,
    support_cases: HashMap<Uuid, SupportCase>,
    entry_logs: Vec<EntryLog>,
}

impl Tables {
    fn tickets_of_order(&self, order_id: Uuid) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|ticket| ticket.order_id == order_id)
            .cloned()
            .collect()
    }
}

/// 待提交的写操作
#[derive(Debug)]
enum PendingWrite {
    Venue(Venue),
    Event(Event),
    Seat(Seat),
    Order(Order),
    Ticket(Ticket),
    Refund(RefundRequest),
    SupportCase(SupportCase),
    EntryLog(EntryLog),
}

struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

/// 内存票务存储
///
/// 每行一把异步互斥锁，等待超过 `lock_timeout` 即失败。事务内的写操作先缓存，
/// 提交时一次性写入；事务内的读取只看到已提交的数据。
#[derive(Clone)]
pub struct InMemoryTicketingStore {
    inner: Arc<Inner>,
}

impl InMemoryTicketingStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }
}

#[async_trait]
impl TicketingStorePort for InMemoryTicketingStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> DomainResult<InMemoryTx> {
        Ok(InMemoryTx {
            inner: self.inner.clone(),
            held: HashMap::new(),
            pending: Vec::new(),
        })
    }

    async fn find_venue(&self, id: Uuid) -> DomainResult<Option<Venue>> {
        Ok(self.inner.tables.lock().await.venues.get(&id).cloned())
    }

    async fn find_event(&self, id: Uuid) -> DomainResult<Option<Event>> {
        Ok(self.inner.tables.lock().await.events.get(&id).cloned())
    }

    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> DomainResult<Vec<Event>> {
        let tables = self.inner.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|event| event.status == EventStatus::Upcoming && event.event_date > now)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.event_date);
        Ok(events)
    }

    async fn list_seats(&self, event_id: Uuid) -> DomainResult<Vec<Seat>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .seats
            .values()
            .filter(|seat| seat.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn find_seat(&self, id: Uuid) -> DomainResult<Option<Seat>> {
        Ok(self.inner.tables.lock().await.seats.get(&id).cloned())
    }

    async fn find_order(&self, id: Uuid) -> DomainResult<Option<Order>> {
        Ok(self.inner.tables.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Order>> {
        let tables = self.inner.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.booking_time);
        Ok(orders)
    }

    async fn list_orders_for_event(&self, event_id: Uuid) -> DomainResult<Vec<Order>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter(|order| order.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn list_tickets_for_order(&self, order_id: Uuid) -> DomainResult<Vec<Ticket>> {
        Ok(self.inner.tables.lock().await.tickets_of_order(order_id))
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Ticket>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .tickets
            .values()
            .filter(|ticket| {
                tables
                    .orders
                    .get(&ticket.order_id)
                    .is_some_and(|order| order.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn find_ticket_by_code(&self, ticket_code: &str) -> DomainResult<Option<Ticket>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .tickets
            .values()
            .find(|ticket| ticket.ticket_code == ticket_code)
            .cloned())
    }

    async fn find_refund_request(&self, id: Uuid) -> DomainResult<Option<RefundRequest>> {
        Ok(self.inner.tables.lock().await.refund_requests.get(&id).cloned())
    }

    async fn list_refund_requests(&self) -> DomainResult<Vec<RefundRequest>> {
        let tables = self.inner.tables.lock().await;
        let mut refunds: Vec<RefundRequest> = tables.refund_requests.values().cloned().collect();
        refunds.sort_by_key(|refund| refund.created_at);
        Ok(refunds)
    }

    async fn find_support_case(&self, id: Uuid) -> DomainResult<Option<SupportCase>> {
        Ok(self.inner.tables.lock().await.support_cases.get(&id).cloned())
    }

    async fn list_support_cases(&self) -> DomainResult<Vec<SupportCase>> {
        let tables = self.inner.tables.lock().await;
        let mut cases: Vec<SupportCase> = tables.support_cases.values().cloned().collect();
        cases.sort_by_key(|case| case.created_at);
        Ok(cases)
    }

    async fn list_entry_logs_for_ticket(&self, ticket_id: Uuid) -> DomainResult<Vec<EntryLog>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .entry_logs
            .iter()
            .filter(|log| log.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

/// 内存事务
pub struct InMemoryTx {
    inner: Arc<Inner>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    pending: Vec<PendingWrite>,
}

impl InMemoryTx {
    /// 按全局顺序获取一组行锁，已持有的锁直接跳过
    async fn acquire(&mut self, keys: impl IntoIterator<Item = RowKey>) -> DomainResult<()> {
        let keys: BTreeSet<RowKey> = keys
            .into_iter()
            .filter(|key| !self.held.contains_key(key))
            .collect();

        for key in keys {
            let lock = {
                let mut row_locks = self.inner.row_locks.lock().await;
                row_locks.entry(key).or_default().clone()
            };

            match tokio::time::timeout(self.inner.lock_timeout, lock.lock_owned()).await {
                Ok(guard) => {
                    self.held.insert(key, guard);
                }
                Err(_) => {
                    warn!("Lock wait timed out: {:?}", key);
                    return Err(key.timeout_error());
                }
            }
        }

        Ok(())
    }

    /// 待更新的行必须已提交或在本事务中插入
    async fn ensure_exists(
        &self,
        exists: impl Fn(&Tables) -> bool,
        pending: impl Fn(&PendingWrite) -> bool,
        missing: impl FnOnce() -> DomainError,
    ) -> DomainResult<()> {
        if exists(&*self.inner.tables.lock().await) || self.pending.iter().any(pending) {
            Ok(())
        } else {
            Err(missing())
        }
    }

    /// 模拟数据库唯一约束：票码全局唯一，每个订单至多一条退款申请
    fn check_unique(tables: &Tables, pending: &[PendingWrite]) -> DomainResult<()> {
        let mut codes = HashSet::new();
        let mut refund_orders = HashSet::new();

        for write in pending {
            match write {
                PendingWrite::Ticket(ticket) => {
                    let taken = tables.tickets.values().any(|existing| {
                        existing.id != ticket.id && existing.ticket_code == ticket.ticket_code
                    });
                    if taken || !codes.insert(ticket.ticket_code.as_str()) {
                        return Err(DomainError::InternalError(format!(
                            "Duplicate ticket code: {}",
                            ticket.ticket_code
                        )));
                    }
                }
                PendingWrite::Refund(refund) => {
                    let taken = tables.refund_requests.values().any(|existing| {
                        existing.id != refund.id && existing.order_id == refund.order_id
                    });
                    if taken || !refund_orders.insert(refund.order_id) {
                        return Err(DomainError::RefundAlreadyRequested(refund.order_id));
                    }
                }
                PendingWrite::Venue(_)
                | PendingWrite::Event(_)
                | PendingWrite::Seat(_)
                | PendingWrite::Order(_)
                | PendingWrite::SupportCase(_)
                | PendingWrite::EntryLog(_) => {}
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TicketingTx for InMemoryTx {
    async fn find_venue(&mut self, id: Uuid) -> DomainResult<Option<Venue>> {
        Ok(self.inner.tables.lock().await.venues.get(&id).cloned())
    }

    async fn find_event(&mut self, id: Uuid) -> DomainResult<Option<Event>> {
        Ok(self.inner.tables.lock().await.events.get(&id).cloned())
    }

    async fn lock_event(&mut self, id: Uuid) -> DomainResult<Option<Event>> {
        self.acquire([RowKey::Event(id)]).await?;
        Ok(self.inner.tables.lock().await.events.get(&id).cloned())
    }

    async fn count_seats(&mut self, event_id: Uuid) -> DomainResult<u32> {
        let tables = self.inner.tables.lock().await;
        let count = tables
            .seats
            .values()
            .filter(|seat| seat.event_id == event_id)
            .count();
        u32::try_from(count).map_err(|_| DomainError::InternalError("Seat count overflow".into()))
    }

    async fn lock_user_quota(&mut self, user_id: Uuid, event_id: Uuid) -> DomainResult<u32> {
        self.acquire([RowKey::Quota { user_id, event_id }]).await?;

        let tables = self.inner.tables.lock().await;
        let held = tables
            .orders
            .values()
            .filter(|order| {
                order.user_id == user_id
                    && order.event_id == event_id
                    && order.status.counts_toward_quota()
            })
            .map(|order| tables.tickets_of_order(order.id).len())
            .sum::<usize>();

        u32::try_from(held).map_err(|_| DomainError::InternalError("Ticket count overflow".into()))
    }

    async fn lock_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> DomainResult<Vec<Seat>> {
        self.acquire(seat_ids.iter().copied().map(RowKey::Seat)).await?;

        let requested: BTreeSet<Uuid> = seat_ids.iter().copied().collect();
        let tables = self.inner.tables.lock().await;
        Ok(requested
            .iter()
            .filter_map(|id| tables.seats.get(id))
            .filter(|seat| seat.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn lock_order(&mut self, id: Uuid) -> DomainResult<Option<Order>> {
        self.acquire([RowKey::Order(id)]).await?;
        Ok(self.inner.tables.lock().await.orders.get(&id).cloned())
    }

    async fn find_refund_request_for_order(
        &mut self,
        order_id: Uuid,
    ) -> DomainResult<Option<RefundRequest>> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .refund_requests
            .values()
            .find(|refund| refund.order_id == order_id)
            .cloned())
    }

    async fn lock_refund_request(&mut self, id: Uuid) -> DomainResult<Option<RefundRequest>> {
        self.acquire([RowKey::Refund(id)]).await?;
        Ok(self.inner.tables.lock().await.refund_requests.get(&id).cloned())
    }

    async fn lock_ticket(&mut self, id: Uuid) -> DomainResult<Option<Ticket>> {
        self.acquire([RowKey::Ticket(id)]).await?;
        Ok(self.inner.tables.lock().await.tickets.get(&id).cloned())
    }

    async fn lock_order_tickets(&mut self, order_id: Uuid) -> DomainResult<Vec<Ticket>> {
        // 票与订单的归属关系创建后不再变化，先读ID再加锁是安全的
        let ids: Vec<Uuid> = {
            let tables = self.inner.tables.lock().await;
            tables
                .tickets_of_order(order_id)
                .into_iter()
                .map(|ticket| ticket.id)
                .collect()
        };

        self.acquire(ids.iter().copied().map(RowKey::Ticket)).await?;

        let tables = self.inner.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.tickets.get(id))
            .cloned()
            .collect())
    }

    async fn lock_support_case(&mut self, id: Uuid) -> DomainResult<Option<SupportCase>> {
        self.acquire([RowKey::SupportCase(id)]).await?;
        Ok(self.inner.tables.lock().await.support_cases.get(&id).cloned())
    }

    async fn insert_venue(&mut self, venue: &Venue) -> DomainResult<()> {
        self.pending.push(PendingWrite::Venue(venue.clone()));
        Ok(())
    }

    async fn insert_event(&mut self, event: &Event) -> DomainResult<()> {
        self.pending.push(PendingWrite::Event(event.clone()));
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> DomainResult<()> {
        let id = event.id;
        self.ensure_exists(
            |tables| tables.events.contains_key(&id),
            |write| matches!(write, PendingWrite::Event(e) if e.id == id),
            || DomainError::EventNotFound(id),
        )
        .await?;
        self.pending.push(PendingWrite::Event(event.clone()));
        Ok(())
    }

    async fn insert_seats(&mut self, seats: &[Seat]) -> DomainResult<()> {
        self.pending
            .extend(seats.iter().cloned().map(PendingWrite::Seat));
        Ok(())
    }

    async fn update_seats(&mut self, seats: &[Seat]) -> DomainResult<()> {
        for seat in seats {
            let id = seat.id;
            self.ensure_exists(
                |tables| tables.seats.contains_key(&id),
                |write| matches!(write, PendingWrite::Seat(s) if s.id == id),
                || DomainError::InternalError(format!("No seat found to update: {}", id)),
            )
            .await?;
        }
        self.pending
            .extend(seats.iter().cloned().map(PendingWrite::Seat));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> DomainResult<()> {
        self.pending.push(PendingWrite::Order(order.clone()));
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> DomainResult<()> {
        let id = order.id;
        self.ensure_exists(
            |tables| tables.orders.contains_key(&id),
            |write| matches!(write, PendingWrite::Order(o) if o.id == id),
            || DomainError::OrderNotFound(id),
        )
        .await?;
        self.pending.push(PendingWrite::Order(order.clone()));
        Ok(())
    }

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()> {
        self.pending
            .extend(tickets.iter().cloned().map(PendingWrite::Ticket));
        Ok(())
    }

    async fn update_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()> {
        for ticket in tickets {
            let id = ticket.id;
            self.ensure_exists(
                |tables| tables.tickets.contains_key(&id),
                |write| matches!(write, PendingWrite::Ticket(t) if t.id == id),
                || DomainError::TicketNotFound(id.to_string()),
            )
            .await?;
        }
        self.pending
            .extend(tickets.iter().cloned().map(PendingWrite::Ticket));
        Ok(())
    }

    async fn insert_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()> {
        self.pending.push(PendingWrite::Refund(refund.clone()));
        Ok(())
    }

    async fn update_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()> {
        let id = refund.id;
        self.ensure_exists(
            |tables| tables.refund_requests.contains_key(&id),
            |write| matches!(write, PendingWrite::Refund(r) if r.id == id),
            || DomainError::RefundNotFound(id),
        )
        .await?;
        self.pending.push(PendingWrite::Refund(refund.clone()));
        Ok(())
    }

    async fn insert_support_case(&mut self, case: &SupportCase) -> DomainResult<()> {
        self.pending.push(PendingWrite::SupportCase(case.clone()));
        Ok(())
    }

    async fn update_support_case(&mut self, case: &SupportCase) -> DomainResult<()> {
        let id = case.id;
        self.ensure_exists(
            |tables| tables.support_cases.contains_key(&id),
            |write| matches!(write, PendingWrite::SupportCase(c) if c.id == id),
            || DomainError::SupportCaseNotFound(id),
        )
        .await?;
        self.pending.push(PendingWrite::SupportCase(case.clone()));
        Ok(())
    }

    async fn insert_entry_log(&mut self, log: &EntryLog) -> DomainResult<()> {
        self.pending.push(PendingWrite::EntryLog(log.clone()));
        Ok(())
    }

    async fn commit(self) -> DomainResult<()> {
        let InMemoryTx {
            inner,
            held,
            pending,
        } = self;

        {
            let mut tables = inner.tables.lock().await;
            Self::check_unique(&tables, &pending)?;

            let writes = pending.len();
            for write in pending {
                match write {
                    PendingWrite::Venue(venue) => {
                        tables.venues.insert(venue.id, venue);
                    }
                    PendingWrite::Event(event) => {
                        tables.events.insert(event.id, event);
                    }
                    PendingWrite::Seat(seat) => {
                        tables.seats.insert(seat.id, seat);
                    }
                    PendingWrite::Order(order) => {
                        tables.orders.insert(order.id, order);
                    }
                    PendingWrite::Ticket(ticket) => {
                        tables.tickets.insert(ticket.id, ticket);
                    }
                    PendingWrite::Refund(refund) => {
                        tables.refund_requests.insert(refund.id, refund);
                    }
                    PendingWrite::SupportCase(case) => {
                        tables.support_cases.insert(case.id, case);
                    }
                    PendingWrite::EntryLog(log) => {
                        tables.entry_logs.push(log);
                    }
                }
            }
            debug!("In-memory transaction committed: {} writes", writes);
        }

        // 数据写入后才释放行锁
        drop(held);
        Ok(())
    }
}
