use crate::domain::errors::DomainResult;
use crate::domain::{EntryLog, Event, Order, RefundRequest, Seat, SupportCase, Ticket, Venue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 票务存储端口接口
///
/// 只读查询不加锁，仅用于展示；所有写操作都必须在 `begin()` 打开的事务中完成。
#[async_trait]
pub trait TicketingStorePort: Send + Sync + 'static {
    /// 事务类型
    type Tx: TicketingTx;

    /// 开启事务
    async fn begin(&self) -> DomainResult<Self::Tx>;

    /// 根据ID查找场馆
    async fn find_venue(&self, id: Uuid) -> DomainResult<Option<Venue>>;

    /// 根据ID查找活动
    async fn find_event(&self, id: Uuid) -> DomainResult<Option<Event>>;

    /// 查询即将开始且尚未举行的活动
    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> DomainResult<Vec<Event>>;

    /// 查询活动的全部座位
    async fn list_seats(&self, event_id: Uuid) -> DomainResult<Vec<Seat>>;

    /// 根据ID查找座位
    async fn find_seat(&self, id: Uuid) -> DomainResult<Option<Seat>>;

    /// 根据ID查找订单
    async fn find_order(&self, id: Uuid) -> DomainResult<Option<Order>>;

    /// 查询用户的全部订单
    async fn list_orders_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Order>>;

    /// 查询活动的全部订单
    async fn list_orders_for_event(&self, event_id: Uuid) -> DomainResult<Vec<Order>>;

    /// 查询订单下的票
    async fn list_tickets_for_order(&self, order_id: Uuid) -> DomainResult<Vec<Ticket>>;

    /// 查询用户持有的票
    async fn list_tickets_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Ticket>>;

    /// 根据票码查找
    async fn find_ticket_by_code(&self, ticket_code: &str) -> DomainResult<Option<Ticket>>;

    /// 根据ID查找退款申请
    async fn find_refund_request(&self, id: Uuid) -> DomainResult<Option<RefundRequest>>;

    /// 查询全部退款申请
    async fn list_refund_requests(&self) -> DomainResult<Vec<RefundRequest>>;

    /// 根据ID查找客服工单
    async fn find_support_case(&self, id: Uuid) -> DomainResult<Option<SupportCase>>;

    /// 查询全部客服工单
    async fn list_support_cases(&self) -> DomainResult<Vec<SupportCase>>;

    /// 查询票的入场记录
    async fn list_entry_logs_for_ticket(&self, ticket_id: Uuid) -> DomainResult<Vec<EntryLog>>;
}

/// 存储事务（工作单元）
///
/// `lock_*` 方法获取排他行锁并持有到提交或回滚；返回的多行按ID升序排列。
/// 同一事务内加锁顺序固定为：配额 → 活动 → 退款申请 → 订单 → 票 → 座位 → 客服工单。
/// 未调用 `commit()` 即被丢弃的事务会回滚。
#[async_trait]
pub trait TicketingTx: Send {
    /// 读取场馆（不加锁）
    async fn find_venue(&mut self, id: Uuid) -> DomainResult<Option<Venue>>;

    /// 读取活动（不加锁）
    async fn find_event(&mut self, id: Uuid) -> DomainResult<Option<Event>>;

    /// 锁定活动行
    async fn lock_event(&mut self, id: Uuid) -> DomainResult<Option<Event>>;

    /// 统计活动已创建的座位数
    async fn count_seats(&mut self, event_id: Uuid) -> DomainResult<u32>;

    /// 锁定用户在该活动的配额，并返回其未取消订单中的票数
    ///
    /// 票数必须读取最新提交的数据，而不是事务开始时的快照：
    /// 等待配额锁的事务要能看到上一个持锁事务刚提交的订单。
    async fn lock_user_quota(&mut self, user_id: Uuid, event_id: Uuid) -> DomainResult<u32>;

    /// 锁定属于该活动的指定座位，不属于该活动的ID不会出现在结果中
    async fn lock_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid]) -> DomainResult<Vec<Seat>>;

    /// 锁定订单行
    async fn lock_order(&mut self, id: Uuid) -> DomainResult<Option<Order>>;

    /// 读取订单对应的退款申请
    async fn find_refund_request_for_order(
        &mut self,
        order_id: Uuid,
    ) -> DomainResult<Option<RefundRequest>>;

    /// 锁定退款申请行
    async fn lock_refund_request(&mut self, id: Uuid) -> DomainResult<Option<RefundRequest>>;

    /// 锁定单张票
    async fn lock_ticket(&mut self, id: Uuid) -> DomainResult<Option<Ticket>>;

    /// 锁定订单下的全部票
    async fn lock_order_tickets(&mut self, order_id: Uuid) -> DomainResult<Vec<Ticket>>;

    /// 锁定客服工单行
    async fn lock_support_case(&mut self, id: Uuid) -> DomainResult<Option<SupportCase>>;

    async fn insert_venue(&mut self, venue: &Venue) -> DomainResult<()>;

    async fn insert_event(&mut self, event: &Event) -> DomainResult<()>;

    /// 更新活动（状态、时间、票价等）
    async fn update_event(&mut self, event: &Event) -> DomainResult<()>;

    async fn insert_seats(&mut self, seats: &[Seat]) -> DomainResult<()>;

    /// 更新座位状态
    async fn update_seats(&mut self, seats: &[Seat]) -> DomainResult<()>;

    async fn insert_order(&mut self, order: &Order) -> DomainResult<()>;

    /// 更新订单状态
    async fn update_order(&mut self, order: &Order) -> DomainResult<()>;

    async fn insert_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()>;

    /// 更新票状态
    async fn update_tickets(&mut self, tickets: &[Ticket]) -> DomainResult<()>;

    async fn insert_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()>;

    /// 更新退款申请状态与处理备注
    async fn update_refund_request(&mut self, refund: &RefundRequest) -> DomainResult<()>;

    async fn insert_support_case(&mut self, case: &SupportCase) -> DomainResult<()>;

    /// 更新客服工单状态与处理备注
    async fn update_support_case(&mut self, case: &SupportCase) -> DomainResult<()>;

    /// 写入入场记录
    async fn insert_entry_log(&mut self, log: &EntryLog) -> DomainResult<()>;

    /// 提交事务并释放所有锁
    async fn commit(self) -> DomainResult<()>;
}
