//! The entity store handle.
//!
//! An [`EntityStore`] owns one session's cache. It is cheap to clone; all
//! clones share the same snapshot, transport, and configuration. Only
//! [`EntityStore::dispatch`] (through the reducer) writes to the cache.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

use crate::EntityError;
use crate::config::StoreConfig;
use crate::entity::{Entity, EntityRecord};
use crate::path::EntitiesPath;
use crate::reducer::{self, EntityAction, StoreUpdate};
use crate::state::{EntitiesState, ListState, Position};
use crate::transaction::Transaction;
use crate::transport::{Request, Response, Transport};

struct StoreInner {
    /// Current snapshot. Dispatch replaces it; readers borrow or clone it.
    state_tx: watch::Sender<Arc<EntitiesState>>,
    /// Broadcast channel for action summaries.
    updates_tx: broadcast::Sender<StoreUpdate>,
    transport: Arc<dyn Transport>,
    config: StoreConfig,
}

/// Shared handle to a session's entity cache.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<StoreInner>,
}

impl EntityStore {
    /// Create a store with the default configuration.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::build(Arc::new(transport), StoreConfig::default())
    }

    /// Create a store with a custom configuration.
    pub fn with_config(
        transport: Arc<dyn Transport>,
        config: StoreConfig,
    ) -> Result<Self, EntityError> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<dyn Transport>, config: StoreConfig) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(EntitiesState::new()));
        let (updates_tx, _) = broadcast::channel(config.update_channel_capacity);
        Self {
            inner: Arc::new(StoreInner {
                state_tx,
                updates_tx,
                transport,
                config,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<EntitiesState> {
        Arc::clone(&self.inner.state_tx.borrow())
    }

    /// Run a selector against the current snapshot without cloning it.
    ///
    /// The snapshot stays borrowed while `selector` runs, so it must not
    /// dispatch. Use [`EntityStore::state`] to hold a snapshot across calls
    /// that might.
    pub fn select<R>(&self, selector: impl FnOnce(&EntitiesState) -> R) -> R {
        selector(&self.inner.state_tx.borrow())
    }

    /// Watch snapshots. The receiver is notified after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitiesState>> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to a summary of every dispatched action.
    pub fn updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.inner.updates_tx.subscribe()
    }

    /// Apply an action through the reducer and publish the new snapshot.
    ///
    /// Transaction updaters run against the current snapshot before the
    /// write, never under the store's lock.
    pub fn dispatch(&self, action: EntityAction) {
        let action = match action {
            EntityAction::Transaction(tx) => tx.into_commit(&self.state()),
            action => action,
        };
        let update = action.to_update();
        debug!(?update, "dispatch");
        self.inner.state_tx.send_modify(|state| {
            *state = Arc::new(reducer::reduce(state, action));
        });
        self.publish(update);
    }

    fn publish(&self, update: StoreUpdate) {
        if self.inner.updates_tx.send(update).is_err() {
            trace!("no subscribers for store update");
        }
    }

    /// Mark a list as fetching unless a fetch is already in flight.
    ///
    /// The check and the write happen under the same lock, so of two racing
    /// callers exactly one gets `true`.
    pub(crate) fn begin_fetch(&self, entity_type: &str, list_key: &str) -> bool {
        let started = self.inner.state_tx.send_if_modified(|state| {
            if state
                .list_state(entity_type, list_key)
                .is_some_and(|s| s.fetching)
            {
                return false;
            }
            let action = EntityAction::FetchRequest {
                entity_type: entity_type.to_string(),
                list_key: list_key.to_string(),
            };
            *state = Arc::new(reducer::reduce(state, action));
            true
        });

        if started {
            self.publish(StoreUpdate::FetchStarted {
                entity_type: entity_type.to_string(),
                list_key: list_key.to_string(),
            });
        } else {
            debug!(entity_type, list_key, "fetch already in flight, skipping");
        }
        started
    }

    /// Send a request through the transport.
    pub(crate) async fn request(&self, request: Request) -> Result<Response, EntityError> {
        debug!(method = %request.method, url = %request.url, "request");
        self.inner.transport.request(request).await
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    pub fn entity<T: Entity>(&self, entity_type: &str, id: &str) -> Option<Arc<T>> {
        self.select(|s| s.entity::<T>(entity_type, id))
    }

    /// Entities of the addressed list, in list order.
    pub fn entities<T: Entity>(&self, path: &EntitiesPath) -> Vec<Arc<T>> {
        self.select(|s| s.list_entities::<T>(path.entity_type(), &path.list_key()))
    }

    pub fn list_state(&self, path: &EntitiesPath) -> Option<ListState> {
        self.select(|s| s.list_state(path.entity_type(), &path.list_key()).cloned())
    }

    // =========================================================================
    // Action creators
    // =========================================================================

    /// Import validated entities into the store, and into a list if `path`
    /// names one.
    pub fn import_entities<T: Entity>(
        &self,
        entities: Vec<T>,
        path: &EntitiesPath,
        pos: Position,
    ) {
        let list_key = path.list_key();
        self.dispatch(EntityAction::Import {
            entity_type: path.entity_type().to_string(),
            entities: entities.into_iter().map(EntityRecord::new).collect(),
            list_key: (!path.segments().is_empty()).then_some(list_key),
            pos,
        });
    }

    /// Import validated entities into a specific list key (including the
    /// root list `""`).
    pub(crate) fn import_records(
        &self,
        entity_type: &str,
        entities: Vec<EntityRecord>,
        list_key: Option<String>,
        pos: Position,
    ) {
        self.dispatch(EntityAction::Import {
            entity_type: entity_type.to_string(),
            entities,
            list_key,
            pos,
        });
    }

    pub fn delete_entities(&self, entity_type: &str, ids: Vec<String>, preserve_lists: bool) {
        self.dispatch(EntityAction::Delete {
            entity_type: entity_type.to_string(),
            ids,
            preserve_lists,
        });
    }

    pub fn dismiss_entities(&self, path: &EntitiesPath, ids: Vec<String>) {
        self.dispatch(EntityAction::Dismiss {
            entity_type: path.entity_type().to_string(),
            ids,
            list_key: path.list_key(),
        });
    }

    /// Mark a list stale so the next freshness check refetches it.
    pub fn invalidate(&self, path: &EntitiesPath) {
        self.dispatch(EntityAction::Invalidate {
            entity_type: path.entity_type().to_string(),
            list_key: path.list_key(),
        });
    }

    pub fn increment(&self, path: &EntitiesPath, diff: i64) {
        self.dispatch(EntityAction::Increment {
            entity_type: path.entity_type().to_string(),
            list_key: path.list_key(),
            diff,
        });
    }

    /// Apply a batch of updaters in one step.
    ///
    /// Updaters see the snapshot taken when the transaction is dispatched
    /// and may read the store. Entities deleted before the results are
    /// written stay deleted.
    pub fn transaction(&self, transaction: Transaction) {
        if transaction.is_empty() {
            return;
        }
        self.dispatch(EntityAction::Transaction(transaction));
    }

    /// Replace one cached entity with the result of `f`.
    pub fn change_entity<T, F>(&self, entity_type: &str, id: &str, f: F)
    where
        T: Entity,
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.transaction(Transaction::new().update(entity_type, id, f));
    }

    /// Drop every cache, e.g. on logout.
    pub fn reset(&self) {
        self.dispatch(EntityAction::Reset);
    }
}
