use crate::application::dto::{CreateSupportCaseRequest, UpdateSupportCaseRequest};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::SupportCase;
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 客服工单服务
pub struct SupportService<R: TicketingStorePort> {
    store: Arc<R>,
}

impl<R: TicketingStorePort> SupportService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// 用户提交工单
    pub async fn open_case(
        &self,
        user_id: Uuid,
        request: CreateSupportCaseRequest,
    ) -> DomainResult<SupportCase> {
        let case = SupportCase::open(user_id, request.subject, request.description, Utc::now())?;

        let mut tx = self.store.begin().await?;
        tx.insert_support_case(&case).await?;
        tx.commit().await?;

        info!("Support case {} opened by user {}", case.id, user_id);
        Ok(case)
    }

    pub async fn list_cases(&self) -> DomainResult<Vec<SupportCase>> {
        self.store.list_support_cases().await
    }

    /// 客服更新工单状态
    pub async fn update_case(
        &self,
        case_id: Uuid,
        request: UpdateSupportCaseRequest,
    ) -> DomainResult<SupportCase> {
        let mut tx = self.store.begin().await?;

        let mut case = tx
            .lock_support_case(case_id)
            .await?
            .ok_or(DomainError::SupportCaseNotFound(case_id))?;
        let previous = case.status;
        case.update(request.status, request.resolution_note);

        tx.update_support_case(&case).await?;
        tx.commit().await?;

        info!(
            "Support case {} status changed: {} -> {}",
            case.id, previous, case.status
        );
        Ok(case)
    }
}
