//! Client-side grid state and grid lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::query::{ListRequest, ListResponse};

/// Where list pages come from.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_list(&self, entity: &str, request: &ListRequest) -> Result<ListResponse>;
}

#[derive(Debug)]
struct GridInner {
    /// Page, sort and search state; its draw is replaced on every fetch
    request: ListRequest,
    next_draw: u64,
    latest_draw: u64,
    response: Option<ListResponse>,
}

struct GridShared {
    entity: String,
    source: Arc<dyn ListSource>,
    inner: Mutex<GridInner>,
}

/// One rendered grid on the page.
///
/// Every fetch carries a fresh draw token; a response whose token is not the
/// latest issued is discarded.
#[derive(Clone)]
pub struct GridClient {
    shared: Arc<GridShared>,
}

impl GridClient {
    pub fn new(entity: impl Into<String>, source: Arc<dyn ListSource>) -> Self {
        Self {
            shared: Arc::new(GridShared {
                entity: entity.into(),
                source,
                inner: Mutex::new(GridInner {
                    request: ListRequest::default(),
                    next_draw: 1,
                    latest_draw: 0,
                    response: None,
                }),
            }),
        }
    }

    pub fn entity(&self) -> &str {
        &self.shared.entity
    }

    /// Current page/sort/search state.
    pub fn current_request(&self) -> ListRequest {
        self.lock().request.clone()
    }

    /// Replace the page/sort/search state without fetching.
    pub fn set_request(&self, request: ListRequest) {
        self.lock().request = request;
    }

    /// The last response that was accepted.
    pub fn last_response(&self) -> Option<ListResponse> {
        self.lock().response.clone()
    }

    /// Draw token of the most recently issued fetch.
    pub fn latest_draw(&self) -> u64 {
        self.lock().latest_draw
    }

    /// Switch to `request` and fetch it.
    pub async fn load(&self, request: ListRequest) -> Result<Option<ListResponse>> {
        self.set_request(request);
        self.reload().await
    }

    /// Re-issue the current request with a new draw token.
    ///
    /// Returns `Ok(None)` when a newer fetch was issued while this one was
    /// in flight.
    pub async fn reload(&self) -> Result<Option<ListResponse>> {
        let request = {
            let mut inner = self.lock();
            let draw = inner.next_draw;
            inner.next_draw += 1;
            inner.latest_draw = draw;
            ListRequest {
                draw,
                ..inner.request.clone()
            }
        };
        debug!(entity = %self.shared.entity, draw = request.draw, "fetching grid page");

        let response = self
            .shared
            .source
            .fetch_list(&self.shared.entity, &request)
            .await?;

        let mut inner = self.lock();
        if response.draw != inner.latest_draw {
            warn!(
                entity = %self.shared.entity,
                draw = response.draw,
                latest = inner.latest_draw,
                "discarding stale grid response"
            );
            return Ok(None);
        }
        inner.response = Some(response.clone());
        Ok(Some(response))
    }

    fn lock(&self) -> MutexGuard<'_, GridInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether a grid is on the page, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPresence {
    Present,
    /// Deferred or never rendered
    Absent,
    /// Rendered inside a detail panel tab
    NestedInDetail,
}

/// Finds grids by selector.
pub trait GridLocator: Send + Sync {
    fn locate(&self, selector: &str) -> GridPresence;
}

/// Registry of mounted grids.
#[derive(Debug, Default)]
pub struct GridDirectory {
    grids: RwLock<HashMap<String, GridPresence>>,
}

impl GridDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a top-level grid.
    pub fn mount(&self, selector: impl Into<String>) {
        self.set(selector.into(), GridPresence::Present);
    }

    /// Record a grid rendered inside a detail tab.
    pub fn mount_in_detail(&self, selector: impl Into<String>) {
        self.set(selector.into(), GridPresence::NestedInDetail);
    }

    pub fn unmount(&self, selector: &str) {
        self.grids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(selector);
    }

    fn set(&self, selector: String, presence: GridPresence) {
        self.grids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(selector, presence);
    }
}

impl GridLocator for GridDirectory {
    fn locate(&self, selector: &str) -> GridPresence {
        self.grids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(selector)
            .copied()
            .unwrap_or(GridPresence::Absent)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::SortDirection;
    use std::time::Duration;

    /// Answers with an empty page echoing the draw; records requests.
    #[derive(Default)]
    pub(crate) struct RecordingSource {
        pub(crate) requests: Mutex<Vec<ListRequest>>,
        /// Delay per draw token, in milliseconds
        pub(crate) delays: Mutex<HashMap<u64, u64>>,
    }

    impl RecordingSource {
        pub(crate) fn requests(&self) -> Vec<ListRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListSource for RecordingSource {
        async fn fetch_list(&self, _entity: &str, request: &ListRequest) -> Result<ListResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let delay = self
                .delays
                .lock()
                .unwrap()
                .get(&request.draw)
                .copied()
                .unwrap_or(10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ListResponse {
                draw: request.draw,
                records_total: 5,
                records_filtered: 5,
                data: Vec::new(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_state_and_bumps_draw() {
        let source = Arc::new(RecordingSource::default());
        let grid = GridClient::new("order", source.clone());
        grid.load(
            ListRequest::new(0)
                .page(2, 10)
                .sort_by(1, SortDirection::Asc)
                .search("acme"),
        )
        .await
        .unwrap();
        let response = grid.reload().await.unwrap().unwrap();
        assert_eq!(response.draw, 2);

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].draw, 1);
        assert_eq!(requests[1].draw, 2);
        assert_eq!(requests[1].start, 20);
        assert_eq!(requests[1].search.value, "acme");
        assert_eq!(requests[1].order, requests[0].order);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        let source = Arc::new(RecordingSource::default());
        source.delays.lock().unwrap().insert(1, 200);
        source.delays.lock().unwrap().insert(2, 20);
        let grid = GridClient::new("order", source.clone());

        let slow = grid.clone();
        let first = tokio::spawn(async move { slow.reload().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = grid.reload().await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(second.map(|r| r.draw), Some(2));
        assert_eq!(first, None);
        assert_eq!(grid.last_response().map(|r| r.draw), Some(2));
    }

    #[test]
    fn test_directory_presence() {
        let directory = GridDirectory::new();
        directory.mount("#orders");
        directory.mount_in_detail("#customer-orders");
        assert_eq!(directory.locate("#orders"), GridPresence::Present);
        assert_eq!(directory.locate("#customer-orders"), GridPresence::NestedInDetail);
        assert_eq!(directory.locate("#missing"), GridPresence::Absent);
        directory.unmount("#orders");
        assert_eq!(directory.locate("#orders"), GridPresence::Absent);
    }
}
