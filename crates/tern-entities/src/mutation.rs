//! Mutation controllers.
//!
//! Each mutation returns the request's outcome *and* forwards it to the
//! optional [`EntityCallbacks`]. Optimistic edits are dispatched before the
//! request is sent and compensated if it fails, so the cache is never left
//! half-applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::EntityError;
use crate::entity::{Entity, EntityRecord};
use crate::path::EntitiesPath;
use crate::schema::{Schema, SerdeSchema};
use crate::state::Position;
use crate::store::EntityStore;
use crate::transport::{Request, Response};

type IdRequestFn = Arc<dyn Fn(&str) -> Request + Send + Sync>;

/// Success and error hooks for a single mutation.
pub struct EntityCallbacks<T: ?Sized> {
    on_success: Option<Box<dyn FnOnce(&T) + Send>>,
    on_error: Option<Box<dyn FnOnce(&EntityError) + Send>>,
}

impl<T: ?Sized> Default for EntityCallbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T: ?Sized> EntityCallbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&EntityError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn succeed(self, value: &T) {
        if let Some(f) = self.on_success {
            f(value);
        }
    }

    pub(crate) fn fail(self, error: &EntityError) {
        if let Some(f) = self.on_error {
            f(error);
        }
    }
}

/// Number of mutations of one controller still awaiting the server.
#[derive(Clone, Default)]
struct Submitting(Arc<AtomicUsize>);

impl Submitting {
    fn begin(&self) -> SubmittingGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        SubmittingGuard(Arc::clone(&self.0))
    }

    fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

struct SubmittingGuard(Arc<AtomicUsize>);

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Create
// =============================================================================

/// Creates entities on the server and imports the result.
///
/// There is no optimistic write: the server assigns the id.
pub struct CreateEntity<T: Entity> {
    store: EntityStore,
    path: EntitiesPath,
    schema: Arc<dyn Schema<T>>,
    submitting: Submitting,
}

impl<T: Entity + DeserializeOwned> CreateEntity<T> {
    pub fn new(store: &EntityStore, path: impl Into<EntitiesPath>) -> Self {
        Self {
            store: store.clone(),
            path: path.into(),
            schema: Arc::new(SerdeSchema::<T>::new()),
            submitting: Submitting::default(),
        }
    }
}

impl<T: Entity> CreateEntity<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }

    /// Send `request` and import the created entity at the start of the
    /// addressed list. Nothing is written to the cache on failure.
    pub async fn create(
        &self,
        request: Request,
        callbacks: EntityCallbacks<T>,
    ) -> Result<Arc<T>, EntityError> {
        let _submitting = self.submitting.begin();
        let entity_type = self.path.entity_type();

        let result = async {
            let response = self.store.request(request).await?;
            Ok::<_, EntityError>(self.schema.parse(entity_type, response.data)?)
        }
        .await;

        match result {
            Ok(entity) => {
                let entity = Arc::new(entity);
                debug!(path = %self.path, id = entity.id(), "entity created");
                self.store.import_records(
                    entity_type,
                    vec![EntityRecord::from_arc(Arc::clone(&entity))],
                    Some(self.path.list_key()),
                    Position::Start,
                );
                callbacks.succeed(&entity);
                Ok(entity)
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "create failed");
                callbacks.fail(&e);
                Err(e)
            }
        }
    }
}

// =============================================================================
// Delete
// =============================================================================

/// Deletes entities optimistically, restoring them if the server refuses.
pub struct DeleteEntity {
    store: EntityStore,
    entity_type: String,
    request_fn: IdRequestFn,
    submitting: Submitting,
}

impl DeleteEntity {
    pub fn new<F>(store: &EntityStore, entity_type: impl Into<String>, request_fn: F) -> Self
    where
        F: Fn(&str) -> Request + Send + Sync + 'static,
    {
        Self {
            store: store.clone(),
            entity_type: entity_type.into(),
            request_fn: Arc::new(request_fn),
            submitting: Submitting::default(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }

    /// Remove `id` from the store (lists keep it), send the request, then
    /// either finish the removal or put the saved value back.
    pub async fn delete(
        &self,
        id: &str,
        callbacks: EntityCallbacks<Response>,
    ) -> Result<Response, EntityError> {
        let _submitting = self.submitting.begin();

        let saved = self
            .store
            .select(|s| s.record(&self.entity_type, id).cloned());
        self.store
            .delete_entities(&self.entity_type, vec![id.to_string()], true);

        match self.store.request((self.request_fn)(id)).await {
            Ok(response) => {
                debug!(entity_type = %self.entity_type, id, "entity deleted");
                self.store
                    .delete_entities(&self.entity_type, vec![id.to_string()], false);
                callbacks.succeed(&response);
                Ok(response)
            }
            Err(e) => {
                warn!(
                    entity_type = %self.entity_type,
                    id,
                    error = %e,
                    "delete failed, restoring entity"
                );
                if let Some(record) = saved {
                    self.store
                        .import_records(&self.entity_type, vec![record], None, Position::End);
                }
                callbacks.fail(&e);
                Err(e)
            }
        }
    }
}

// =============================================================================
// Increment
// =============================================================================

/// Bumps a list's total count ahead of a request that returns no entity.
pub struct IncrementEntity {
    store: EntityStore,
    path: EntitiesPath,
    diff: i64,
    request_fn: IdRequestFn,
    submitting: Submitting,
}

impl IncrementEntity {
    pub fn new<F>(
        store: &EntityStore,
        path: impl Into<EntitiesPath>,
        diff: i64,
        request_fn: F,
    ) -> Self
    where
        F: Fn(&str) -> Request + Send + Sync + 'static,
    {
        Self {
            store: store.clone(),
            path: path.into(),
            diff,
            request_fn: Arc::new(request_fn),
            submitting: Submitting::default(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }

    pub async fn increment(
        &self,
        id: &str,
        callbacks: EntityCallbacks<Response>,
    ) -> Result<Response, EntityError> {
        let _submitting = self.submitting.begin();
        self.store.increment(&self.path, self.diff);

        match self.store.request((self.request_fn)(id)).await {
            Ok(response) => {
                callbacks.succeed(&response);
                Ok(response)
            }
            Err(e) => {
                warn!(path = %self.path, id, error = %e, "increment failed, reverting count");
                self.store.increment(&self.path, -self.diff);
                callbacks.fail(&e);
                Err(e)
            }
        }
    }
}

// =============================================================================
// Dismiss
// =============================================================================

/// Removes an entity from one list once the server confirms. The cached
/// value and every other list are untouched.
pub struct DismissEntity {
    store: EntityStore,
    path: EntitiesPath,
    request_fn: IdRequestFn,
    submitting: Submitting,
}

impl DismissEntity {
    pub fn new<F>(store: &EntityStore, path: impl Into<EntitiesPath>, request_fn: F) -> Self
    where
        F: Fn(&str) -> Request + Send + Sync + 'static,
    {
        Self {
            store: store.clone(),
            path: path.into(),
            request_fn: Arc::new(request_fn),
            submitting: Submitting::default(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }

    pub async fn dismiss(
        &self,
        id: &str,
        callbacks: EntityCallbacks<Response>,
    ) -> Result<Response, EntityError> {
        let _submitting = self.submitting.begin();

        match self.store.request((self.request_fn)(id)).await {
            Ok(response) => {
                self.store.dismiss_entities(&self.path, vec![id.to_string()]);
                callbacks.succeed(&response);
                Ok(response)
            }
            Err(e) => {
                warn!(path = %self.path, id, error = %e, "dismiss failed");
                callbacks.fail(&e);
                Err(e)
            }
        }
    }
}
