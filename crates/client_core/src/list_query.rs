use std::{sync::Arc, time::Duration};

use shared::domain::Partner;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    api::{PartnerApi, PartnerListQuery},
    config::ClientSettings,
    error::ClientResult,
    events::{DashboardEvent, EventHub, NotificationKind},
};

/// Query inputs of the partner listing. `search_text` follows keystrokes;
/// `debounced_search_text` is what the backend is asked for.
/// Partner listing carries no sort key or direction; rows keep the backend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQueryState {
    pub page: u32,
    pub page_size: u32,
    pub search_text: String,
    pub debounced_search_text: String,
}

impl ListQueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size,
            search_text: String::new(),
            debounced_search_text: String::new(),
        }
    }

    /// The settled tuple sent to the listing endpoint.
    pub fn effective_query(&self) -> PartnerListQuery {
        PartnerListQuery {
            page: self.page,
            size: self.page_size,
            query: self.debounced_search_text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { seq: u64 },
    /// A newer request was issued while this one was in flight.
    Stale { seq: u64 },
    /// The settled query did not change, so nothing was sent.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub query: ListQueryState,
    pub items: Vec<Partner>,
    pub total_elements: u64,
    pub loading: bool,
    pub error: Option<String>,
}

struct ListInner {
    query: ListQueryState,
    issued_seq: u64,
    search_generation: u64,
    last_requested: Option<PartnerListQuery>,
    debounce_task: Option<JoinHandle<()>>,
    items: Vec<Partner>,
    total_elements: u64,
    loading: bool,
    error: Option<String>,
}

pub struct PartnerListController {
    api: Arc<dyn PartnerApi>,
    hub: Arc<EventHub>,
    debounce: Duration,
    inner: Mutex<ListInner>,
}

impl PartnerListController {
    pub fn new(api: Arc<dyn PartnerApi>, hub: Arc<EventHub>, settings: &ClientSettings) -> Arc<Self> {
        Arc::new(Self {
            api,
            hub,
            debounce: settings.search_debounce,
            inner: Mutex::new(ListInner {
                query: ListQueryState::new(settings.default_page_size),
                issued_seq: 0,
                search_generation: 0,
                last_requested: None,
                debounce_task: None,
                items: Vec::new(),
                total_elements: 0,
                loading: false,
                error: None,
            }),
        })
    }

    pub async fn snapshot(&self) -> ListSnapshot {
        let guard = self.inner.lock().await;
        ListSnapshot {
            query: guard.query.clone(),
            items: guard.items.clone(),
            total_elements: guard.total_elements,
            loading: guard.loading,
            error: guard.error.clone(),
        }
    }

    pub async fn items(&self) -> Vec<Partner> {
        self.inner.lock().await.items.clone()
    }

    pub async fn query_state(&self) -> ListQueryState {
        self.inner.lock().await.query.clone()
    }

    /// Re-issues the current settled query even if it was already requested.
    pub async fn refresh(&self) -> ClientResult<FetchOutcome> {
        self.fetch().await
    }

    pub async fn set_page(&self, page: u32) -> ClientResult<FetchOutcome> {
        {
            let mut guard = self.inner.lock().await;
            guard.query.page = page;
        }
        self.fetch_if_changed().await
    }

    /// Changing the page size always returns to the first page.
    pub async fn set_page_size(&self, page_size: u32) -> ClientResult<FetchOutcome> {
        {
            let mut guard = self.inner.lock().await;
            guard.query.page_size = page_size.max(1);
            guard.query.page = 0;
        }
        self.fetch_if_changed().await
    }

    /// Records the typed text and (re)starts the debounce timer. Only the last
    /// timer fires; earlier ones are aborted before they can settle.
    pub async fn set_search_text(self: &Arc<Self>, text: impl Into<String>) {
        let text = text.into();
        let mut guard = self.inner.lock().await;
        guard.query.search_text = text;
        guard.search_generation += 1;
        if let Some(pending) = guard.debounce_task.take() {
            pending.abort();
        }

        let generation = guard.search_generation;
        let controller = Arc::clone(self);
        let debounce = self.debounce;
        guard.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(err) = controller.settle_generation(generation).await {
                warn!(error = %err, "partners: debounced search fetch failed");
            }
        }));
    }

    /// Applies the pending search text immediately, as if the debounce window
    /// had elapsed.
    pub async fn settle_search(&self) -> ClientResult<FetchOutcome> {
        let generation = {
            let mut guard = self.inner.lock().await;
            if let Some(pending) = guard.debounce_task.take() {
                pending.abort();
            }
            guard.search_generation += 1;
            guard.search_generation
        };
        self.settle_generation(generation).await
    }

    async fn settle_generation(&self, generation: u64) -> ClientResult<FetchOutcome> {
        {
            let mut guard = self.inner.lock().await;
            // A newer keystroke owns the timer now.
            if guard.search_generation != generation {
                return Ok(FetchOutcome::Unchanged);
            }
            guard.debounce_task = None;
            guard.query.debounced_search_text = guard.query.search_text.clone();
            guard.query.page = 0;
        }
        self.fetch_if_changed().await
    }

    /// Swaps a saved record into the loaded page. Returns false when the
    /// partner is not on the current page.
    pub async fn replace_partner(&self, updated: Partner) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.items.iter_mut().find(|p| p.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    async fn fetch_if_changed(&self) -> ClientResult<FetchOutcome> {
        let issued = {
            let mut guard = self.inner.lock().await;
            if guard.last_requested.as_ref() == Some(&guard.query.effective_query()) {
                return Ok(FetchOutcome::Unchanged);
            }
            Self::issue(&mut guard)
        };
        self.run(issued).await
    }

    async fn fetch(&self) -> ClientResult<FetchOutcome> {
        let issued = Self::issue(&mut *self.inner.lock().await);
        self.run(issued).await
    }

    /// Claims the next sequence number for the current settled query. Callers
    /// hold the lock across the dedupe check and this claim.
    fn issue(inner: &mut ListInner) -> (u64, PartnerListQuery) {
        inner.issued_seq += 1;
        inner.loading = true;
        let query = inner.query.effective_query();
        inner.last_requested = Some(query.clone());
        (inner.issued_seq, query)
    }

    async fn run(&self, (seq, query): (u64, PartnerListQuery)) -> ClientResult<FetchOutcome> {
        debug!(seq, page = query.page, size = query.size, query = %query.query, "partners: fetching page");

        let result = self.api.list_partners(&query).await;

        let mut guard = self.inner.lock().await;
        if seq != guard.issued_seq {
            debug!(seq, latest = guard.issued_seq, "partners: discarding stale page response");
            self.hub.emit(DashboardEvent::StaleResponseDiscarded { seq });
            return Ok(FetchOutcome::Stale { seq });
        }
        guard.loading = false;

        match result {
            Ok(page) => {
                guard.items = page.content;
                guard.total_elements = page.total_elements;
                guard.error = None;
                info!(seq, page = query.page, total = page.total_elements, "partners: page loaded");
                self.hub.emit(DashboardEvent::PartnersLoaded {
                    seq,
                    page: query.page,
                    total_elements: page.total_elements,
                });
                Ok(FetchOutcome::Applied { seq })
            }
            Err(err) => {
                let message = err.notification_text();
                guard.error = Some(message.clone());
                // A failed fetch may be retried with the same query.
                guard.last_requested = None;
                drop(guard);
                warn!(seq, error = %err, "partners: page fetch failed");
                self.hub.emit(DashboardEvent::PartnersFailed {
                    seq,
                    message: message.clone(),
                });
                self.hub.notify(NotificationKind::Error, message).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/list_query_tests.rs"]
mod tests;
