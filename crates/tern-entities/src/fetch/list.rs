//! Paginated list queries.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::EntityError;
use crate::config::StaleTime;
use crate::entity::{Entity, EntityRecord};
use crate::links::{next_link, parse_total_count, prev_link};
use crate::path::EntitiesPath;
use crate::reducer::EntityAction;
use crate::schema::{Schema, SerdeSchema, parse_filtered};
use crate::state::{ListState, PageInfo, Position};
use crate::store::EntityStore;
use crate::transport::{Headers, Request};

/// A list of entities fetched from one endpoint.
///
/// Construction does not fetch. Call [`ListQuery::ensure_fresh`] whenever
/// the list is about to be shown (or on a timer) and it will fetch only if
/// the cached list is missing, invalid, or stale.
pub struct ListQuery<T: Entity> {
    store: EntityStore,
    path: EntitiesPath,
    list_key: String,
    request: Request,
    schema: Arc<dyn Schema<T>>,
    enabled: bool,
    stale_time: StaleTime,
}

impl<T: Entity + DeserializeOwned> ListQuery<T> {
    pub fn new(store: &EntityStore, path: impl Into<EntitiesPath>, request: Request) -> Self {
        let path = path.into();
        Self {
            list_key: path.list_key(),
            path,
            request,
            schema: Arc::new(SerdeSchema::<T>::new()),
            enabled: true,
            stale_time: store.config().stale_time,
            store: store.clone(),
        }
    }
}

impl<T: Entity> ListQuery<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// Disabled queries never fetch on [`ListQuery::ensure_fresh`].
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: StaleTime) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn path(&self) -> &EntitiesPath {
        &self.path
    }

    /// Fetch the first page if the cached list needs it.
    ///
    /// Skips if a fetch is in flight. Otherwise fetches when the list is
    /// invalid, has never been fetched, or is older than the stale time.
    /// Returns whether a fetch was attempted.
    pub async fn ensure_fresh(&self) -> bool {
        if !self.enabled {
            return false;
        }

        let state = self.list_state();
        if state.fetching {
            return false;
        }

        let needs_fetch = match state.last_fetched_at {
            None => true,
            Some(_) if state.invalid => true,
            Some(at) => self.stale_time.is_stale(at, Instant::now()),
        };
        if !needs_fetch {
            debug!(path = %self.path, "list is fresh");
            return false;
        }

        self.fetch_entities().await;
        true
    }

    /// Refetch the first page, replacing the whole list.
    pub async fn fetch_entities(&self) {
        self.fetch_page(self.request.clone(), Position::End, true).await;
    }

    /// Fetch the page after the last one loaded and append it.
    pub async fn fetch_next_page(&self) {
        if let Some(next) = self.list_state().next {
            self.fetch_page(Request::get(next), Position::End, false).await;
        }
    }

    /// Fetch the page before the first one loaded and prepend it.
    pub async fn fetch_previous_page(&self) {
        if let Some(prev) = self.list_state().prev {
            self.fetch_page(Request::get(prev), Position::Start, false).await;
        }
    }

    pub fn invalidate(&self) {
        self.store.invalidate(&self.path);
    }

    async fn fetch_page(&self, request: Request, pos: Position, overwrite: bool) {
        let entity_type = self.path.entity_type();

        // Re-check against live state right before the network call.
        if !self.store.begin_fetch(entity_type, &self.list_key) {
            return;
        }

        match self.load(request).await {
            Ok((entities, headers)) => {
                let total_count = headers
                    .get(&self.store.config().total_count_header)
                    .and_then(parse_total_count)
                    .and_then(|n| i64::try_from(n).ok())
                    .filter(|n| *n >= entities.len() as i64);
                let page = PageInfo {
                    next: next_link(&headers),
                    prev: prev_link(&headers),
                    total_count,
                    fetched_at: Instant::now(),
                };
                debug!(
                    path = %self.path,
                    count = entities.len(),
                    has_next = page.next.is_some(),
                    overwrite,
                    "list page fetched"
                );
                self.store.dispatch(EntityAction::FetchSuccess {
                    entity_type: entity_type.to_string(),
                    entities: entities.into_iter().map(EntityRecord::new).collect(),
                    list_key: self.list_key.clone(),
                    pos,
                    page,
                    overwrite,
                });
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "list fetch failed");
                self.store.dispatch(EntityAction::FetchFail {
                    entity_type: entity_type.to_string(),
                    list_key: self.list_key.clone(),
                    error: Arc::new(e),
                });
            }
        }
    }

    async fn load(&self, request: Request) -> Result<(Vec<T>, Headers), EntityError> {
        let response = self.store.request(request).await?;
        let entities =
            parse_filtered(self.schema.as_ref(), self.path.entity_type(), response.data)?;
        Ok((entities, response.headers))
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Entities in list order. Listed ids missing from the store are skipped.
    pub fn entities(&self) -> Vec<Arc<T>> {
        self.store.entities::<T>(&self.path)
    }

    /// State of the list, or the default state if it was never touched.
    pub fn list_state(&self) -> ListState {
        self.store.list_state(&self.path).unwrap_or_default()
    }

    pub fn is_fetching(&self) -> bool {
        self.list_state().fetching
    }

    /// Fetching with nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.is_fetching() && self.entities().is_empty()
    }

    pub fn is_fetched(&self) -> bool {
        self.list_state().fetched
    }

    pub fn is_error(&self) -> bool {
        self.list_state().error.is_some()
    }

    pub fn error(&self) -> Option<Arc<EntityError>> {
        self.list_state().error
    }

    pub fn is_invalid(&self) -> bool {
        self.list_state().invalid
    }

    pub fn has_next_page(&self) -> bool {
        self.list_state().next.is_some()
    }

    pub fn has_previous_page(&self) -> bool {
        self.list_state().prev.is_some()
    }

    /// Number of listed entities present in the store.
    pub fn count(&self) -> usize {
        self.entities().len()
    }

    /// Server-reported size of the full result set.
    pub fn total_count(&self) -> Option<i64> {
        self.list_state().total_count
    }
}
