//! Batched fetches: many ids, one round trip, only for what is missing.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::EntityError;
use crate::entity::{Entity, EntityRecord};
use crate::fetch::RequestTracker;
use crate::schema::{Schema, SerdeSchema, parse_strict};
use crate::state::Position;
use crate::store::EntityStore;
use crate::transport::Request;

type RequestFn = Arc<dyn Fn(&[String]) -> Request + Send + Sync>;

/// A set of entities addressed by id.
///
/// # Examples
///
/// ```no_run
/// # async fn demo(store: tern_entities::EntityStore) {
/// use tern_entities::{BatchQuery, Request};
///
/// let relationships = BatchQuery::<serde_json::Value>::new(
///     &store,
///     "Relationships",
///     ["1", "2", "3"],
///     |ids| {
///         ids.iter().fold(Request::get("/api/v1/accounts/relationships"), |req, id| {
///             req.query("id[]", id.as_str())
///         })
///     },
/// );
/// relationships.ensure_fresh().await;
/// let by_id = relationships.entity_map();
/// # }
/// ```
pub struct BatchQuery<T: Entity> {
    store: EntityStore,
    entity_type: String,
    ids: Vec<String>,
    request_fn: RequestFn,
    schema: Arc<dyn Schema<T>>,
    enabled: bool,
    tracker: RequestTracker,
}

impl<T: Entity + DeserializeOwned> BatchQuery<T> {
    /// Repeated ids are dropped; the first occurrence keeps its position.
    pub fn new<I, S, F>(
        store: &EntityStore,
        entity_type: impl Into<String>,
        ids: I,
        request_fn: F,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[String]) -> Request + Send + Sync + 'static,
    {
        let ids: IndexSet<String> = ids.into_iter().map(Into::into).collect();
        Self {
            store: store.clone(),
            entity_type: entity_type.into(),
            ids: ids.into_iter().collect(),
            request_fn: Arc::new(request_fn),
            schema: Arc::new(SerdeSchema::<T>::new()),
            enabled: true,
            tracker: RequestTracker::new(),
        }
    }
}

impl<T: Entity> BatchQuery<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Requested ids with no cached value, in request order.
    pub fn missing_ids(&self) -> Vec<String> {
        self.store.select(|s| {
            self.ids
                .iter()
                .filter(|id| !s.contains(&self.entity_type, id))
                .cloned()
                .collect()
        })
    }

    /// Fetch the missing ids in one request. Nothing is sent when every id
    /// is cached or the query is disabled. Returns whether a fetch was
    /// attempted.
    pub async fn ensure_fresh(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let missing = self.missing_ids();
        if missing.is_empty() {
            return false;
        }
        if !self.tracker.begin() {
            debug!(entity_type = %self.entity_type, "batch fetch already in flight");
            return false;
        }

        debug!(entity_type = %self.entity_type, missing = missing.len(), "fetching batch");
        match self.load(&missing).await {
            Ok(entities) => {
                self.store.import_records(
                    &self.entity_type,
                    entities.into_iter().map(EntityRecord::new).collect(),
                    None,
                    Position::End,
                );
                self.tracker.finish(Ok(()));
            }
            Err(e) => {
                warn!(entity_type = %self.entity_type, error = %e, "batch fetch failed");
                self.tracker.finish(Err(e));
            }
        }
        true
    }

    async fn load(&self, missing: &[String]) -> Result<Vec<T>, EntityError> {
        let request = (self.request_fn)(missing);
        let response = self.store.request(request).await?;
        Ok(parse_strict(self.schema.as_ref(), &self.entity_type, response.data)?)
    }

    /// Requested ids projected onto the store. Ids still missing after a
    /// fetch are absent.
    pub fn entity_map(&self) -> HashMap<String, Arc<T>> {
        self.store
            .select(|s| s.entity_map::<T, _, _>(&self.entity_type, &self.ids))
    }

    pub fn is_fetching(&self) -> bool {
        self.tracker.is_fetching()
    }

    pub fn is_error(&self) -> bool {
        self.tracker.error().is_some()
    }

    pub fn error(&self) -> Option<Arc<EntityError>> {
        self.tracker.error()
    }
}
