//! Single-entity queries by predicate, for entities addressed by something
//! other than their id (a group slug, an account handle).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::EntityError;
use crate::entity::{Entity, EntityRecord};
use crate::fetch::{RequestStatus, RequestTracker};
use crate::schema::{Schema, SerdeSchema};
use crate::state::Position;
use crate::store::EntityStore;
use crate::transport::Request;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// The first cached entity matching a predicate, fetched when none does.
pub struct LookupQuery<T: Entity> {
    store: EntityStore,
    entity_type: String,
    predicate: Predicate<T>,
    request: Request,
    schema: Arc<dyn Schema<T>>,
    enabled: bool,
    refetch: bool,
    tracker: RequestTracker,
}

impl<T: Entity + DeserializeOwned> LookupQuery<T> {
    pub fn new<F>(
        store: &EntityStore,
        entity_type: impl Into<String>,
        predicate: F,
        request: Request,
    ) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            store: store.clone(),
            entity_type: entity_type.into(),
            predicate: Arc::new(predicate),
            request,
            schema: Arc::new(SerdeSchema::<T>::new()),
            enabled: true,
            refetch: false,
            tracker: RequestTracker::new(),
        }
    }
}

impl<T: Entity> LookupQuery<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn refetch(mut self, refetch: bool) -> Self {
        self.refetch = refetch;
        self
    }

    /// Fetch if nothing matches (or `refetch` is set). Returns whether a
    /// fetch was attempted.
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

    pub async fn fetch_entity(&self) {
        if !self.tracker.begin() {
            debug!(entity_type = %self.entity_type, "lookup already in flight");
            return;
        }

        match self.load().await {
            Ok(entity) => {
                if !(self.predicate)(&entity) {
                    debug!(
                        entity_type = %self.entity_type,
                        id = entity.id(),
                        "fetched entity does not match lookup"
                    );
                }
                self.store.import_records(
                    &self.entity_type,
                    vec![EntityRecord::new(entity)],
                    None,
                    Position::End,
                );
                self.tracker.finish(Ok(()));
            }
            Err(e) => {
                warn!(entity_type = %self.entity_type, error = %e, "lookup fetch failed");
                self.tracker.finish(Err(e));
            }
        }
    }

    async fn load(&self) -> Result<T, EntityError> {
        let response = self.store.request(self.request.clone()).await?;
        Ok(self.schema.parse(&self.entity_type, response.data)?)
    }

    /// Re-resolves the predicate against the current snapshot.
    ///
    /// The predicate runs on a cloned snapshot, outside the store's lock.
    pub fn entity(&self) -> Option<Arc<T>> {
        let state = self.store.state();
        state.find::<T, _>(&self.entity_type, |e| (self.predicate)(e))
    }

    pub fn status(&self) -> RequestStatus {
        self.tracker.status()
    }

    pub fn is_fetching(&self) -> bool {
        self.tracker.is_fetching()
    }

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
