//! Single-entity queries by id.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::EntityError;
use crate::entity::{Entity, EntityRecord};
use crate::fetch::{RequestStatus, RequestTracker};
use crate::schema::{Schema, SerdeSchema};
use crate::state::Position;
use crate::store::EntityStore;
use crate::transport::Request;

/// One entity, read from the cache and fetched when absent.
pub struct EntityQuery<T: Entity> {
    store: EntityStore,
    entity_type: String,
    id: String,
    request: Request,
    schema: Arc<dyn Schema<T>>,
    enabled: bool,
    refetch: bool,
    tracker: RequestTracker,
}

impl<T: Entity + DeserializeOwned> EntityQuery<T> {
    pub fn new(
        store: &EntityStore,
        entity_type: impl Into<String>,
        id: impl Into<String>,
        request: Request,
    ) -> Self {
        Self {
            store: store.clone(),
            entity_type: entity_type.into(),
            id: id.into(),
            request,
            schema: Arc::new(SerdeSchema::<T>::new()),
            enabled: true,
            refetch: false,
            tracker: RequestTracker::new(),
        }
    }
}

impl<T: Entity> EntityQuery<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Fetch on [`EntityQuery::ensure_fresh`] even when the entity is cached.
    pub fn refetch(mut self, refetch: bool) -> Self {
        self.refetch = refetch;
        self
    }

    /// Fetch the entity if it is not cached (or `refetch` is set).
    ///
    /// Returns whether a fetch was attempted.
    pub async fn ensure_fresh(&self) -> bool {
        if !self.enabled || self.tracker.is_fetching() {
            return false;
        }
        if self.entity().is_some() && !self.refetch {
            return false;
        }
        self.fetch_entity().await;
        true
    }

    /// Fetch the entity and import it into the store.
    pub async fn fetch_entity(&self) {
        if !self.tracker.begin() {
            debug!(
                entity_type = %self.entity_type,
                id = %self.id,
                "entity fetch already in flight"
            );
            return;
        }

        let result = self.load().await;
        match result {
            Ok(entity) => {
                self.store.import_records(
                    &self.entity_type,
                    vec![EntityRecord::new(entity)],
                    None,
                    Position::End,
                );
                self.tracker.finish(Ok(()));
            }
            Err(e) => {
                warn!(
                    entity_type = %self.entity_type,
                    id = %self.id,
                    error = %e,
                    "entity fetch failed"
                );
                self.tracker.finish(Err(e));
            }
        }
    }

    async fn load(&self) -> Result<T, EntityError> {
        let response = self.store.request(self.request.clone()).await?;
        Ok(self.schema.parse(&self.entity_type, response.data)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity(&self) -> Option<Arc<T>> {
        self.store.entity::<T>(&self.entity_type, &self.id)
    }

    pub fn status(&self) -> RequestStatus {
        self.tracker.status()
    }

    /// Watch this query's request state.
    pub fn subscribe(&self) -> watch::Receiver<RequestStatus> {
        self.tracker.subscribe()
    }

    pub fn is_fetching(&self) -> bool {
        self.tracker.is_fetching()
    }

    /// Fetching with nothing cached yet.
    pub fn is_loading(&self) -> bool {
        self.is_fetching() && self.entity().is_none()
    }

    pub fn is_error(&self) -> bool {
        self.tracker.error().is_some()
    }

    pub fn error(&self) -> Option<Arc<EntityError>> {
        self.tracker.error()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.tracker.error_status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.tracker.error_status() == Some(403)
    }

    pub fn is_not_found(&self) -> bool {
        self.tracker.error_status() == Some(404)
    }
}
