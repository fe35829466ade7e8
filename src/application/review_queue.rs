use super::withdrawal::WithdrawalLifecycle;
use crate::domain::query::{RequestPage, RequestQuery};
use crate::domain::session::Session;
use crate::domain::withdrawal::{WithdrawalId, WithdrawalRequest, WithdrawalStatus};
use crate::error::{PayoutError, Result};
use std::sync::Arc;
use tracing::warn;

/// An admin's working view over withdrawal requests.
///
/// Holds the current filter, search term and page. Changing the filter, the search
/// term or the page size goes back to page 1. Settlement actions never patch the
/// cached page: the page is re-fetched after every action that reached the store,
/// successful or not, since a failure such as `NotPending` means someone else
/// already moved the request.
pub struct AdminReviewQueue {
    lifecycle: Arc<WithdrawalLifecycle>,
    query: RequestQuery,
    current: Option<RequestPage>,
}

impl AdminReviewQueue {
    pub fn new(lifecycle: Arc<WithdrawalLifecycle>, page_size: u32) -> Self {
        let mut query = RequestQuery::new(page_size);
        query.status = Some(WithdrawalStatus::Pending);
        Self {
            lifecycle,
            query,
            current: None,
        }
    }

    pub fn query(&self) -> &RequestQuery {
        &self.query
    }

    /// The last fetched page, if it is still considered fresh.
    pub fn current(&self) -> Option<&RequestPage> {
        self.current.as_ref()
    }

    pub fn set_status(&mut self, status: Option<WithdrawalStatus>) {
        self.query.status = status;
        self.query.page = 1;
        self.current = None;
    }

    pub fn set_search(&mut self, search: Option<String>) {
        self.query.search = search;
        self.query.page = 1;
        self.current = None;
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        if !self.lifecycle.page_sizes().contains(&page_size) {
            return Err(PayoutError::ValidationError(format!(
                "page size must be one of {:?}",
                self.lifecycle.page_sizes()
            )));
        }
        self.query.page_size = page_size;
        self.query.page = 1;
        self.current = None;
        Ok(())
    }

    pub fn go_to_page(&mut self, page: u32) -> Result<()> {
        if page == 0 {
            return Err(PayoutError::ValidationError(
                "page numbers start at 1".to_string(),
            ));
        }
        self.query.page = page;
        self.current = None;
        Ok(())
    }

    /// Fetches the page selected by the current query.
    ///
    /// When settlements emptied the selected page, steps back to the new last page.
    pub async fn refresh(&mut self, session: &Session) -> Result<&RequestPage> {
        let mut page = self.lifecycle.review(session, &self.query).await?;
        if page.requests.is_empty() && page.total_pages > 0 && u64::from(self.query.page) > page.total_pages {
            self.query.page = u32::try_from(page.total_pages).unwrap_or(u32::MAX);
            page = self.lifecycle.review(session, &self.query).await?;
        }
        Ok(&*self.current.insert(page))
    }

    pub async fn approve(
        &mut self,
        session: &Session,
        id: WithdrawalId,
        transaction_id: &str,
        transaction_phone_no: &str,
        remarks: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let result = self
            .lifecycle
            .approve(session, id, transaction_id, transaction_phone_no, remarks)
            .await;
        self.reconcile(session, &result).await;
        result
    }

    pub async fn reject(&mut self, session: &Session, id: WithdrawalId, remarks: &str) -> Result<WithdrawalRequest> {
        let result = self.lifecycle.reject(session, id, remarks).await;
        self.reconcile(session, &result).await;
        result
    }

    async fn reconcile(&mut self, session: &Session, result: &Result<WithdrawalRequest>) {
        let reached_store = match result {
            Ok(_) => true,
            Err(PayoutError::NotPending { .. } | PayoutError::NotFound(_)) => true,
            Err(e) => !e.is_client_error(),
        };
        if !reached_store {
            return;
        }

        self.current = None;
        if let Err(e) = self.refresh(session).await {
            warn!(error = %e, "review queue refresh failed");
        }
    }
}
