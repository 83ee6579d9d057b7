//! Pure state transitions for the entity cache.
//!
//! [`reduce`] takes a snapshot and an action and returns the next snapshot.
//! The input snapshot is never modified. Actions addressing an entity type
//! or list that does not exist yet create the minimal structure instead of
//! failing.

use std::sync::Arc;

use crate::EntityError;
use crate::entity::EntityRecord;
use crate::state::{EntitiesState, EntityList, PageInfo, Position};
use crate::transaction::Transaction;

/// A state transition request.
#[derive(Debug)]
pub enum EntityAction {
    /// Upsert entities, optionally merging their ids into a list.
    Import {
        entity_type: String,
        entities: Vec<EntityRecord>,
        list_key: Option<String>,
        pos: Position,
    },
    /// Remove entities from the store, and from every list of the type
    /// unless `preserve_lists` is set.
    Delete {
        entity_type: String,
        ids: Vec<String>,
        preserve_lists: bool,
    },
    /// Remove ids from a single list, leaving the store untouched.
    Dismiss {
        entity_type: String,
        ids: Vec<String>,
        list_key: String,
    },
    FetchRequest {
        entity_type: String,
        list_key: String,
    },
    /// Import a fetched page. With `overwrite`, the page replaces the list.
    FetchSuccess {
        entity_type: String,
        entities: Vec<EntityRecord>,
        list_key: String,
        pos: Position,
        page: PageInfo,
        overwrite: bool,
    },
    FetchFail {
        entity_type: String,
        list_key: String,
        error: Arc<EntityError>,
    },
    /// Mark a list stale without clearing it.
    Invalidate {
        entity_type: String,
        list_key: String,
    },
    /// Adjust a known `total_count` without touching ids.
    Increment {
        entity_type: String,
        list_key: String,
        diff: i64,
    },
    /// Run a transaction's updaters and write their results.
    Transaction(Transaction),
    /// Write records already produced by a transaction. Records whose id is
    /// no longer cached are dropped.
    Commit {
        entity_types: Vec<String>,
        records: Vec<(String, EntityRecord)>,
    },
    /// Drop every cache.
    Reset,
}

impl EntityAction {
    /// Summary of the action for update subscribers.
    pub fn to_update(&self) -> StoreUpdate {
        match self {
            EntityAction::Import {
                entity_type,
                entities,
                list_key,
                ..
            } => StoreUpdate::Imported {
                entity_type: entity_type.clone(),
                ids: record_ids(entities),
                list_key: list_key.clone(),
            },
            EntityAction::Delete {
                entity_type,
                ids,
                preserve_lists,
            } => StoreUpdate::Deleted {
                entity_type: entity_type.clone(),
                ids: ids.clone(),
                preserve_lists: *preserve_lists,
            },
            EntityAction::Dismiss {
                entity_type,
                ids,
                list_key,
            } => StoreUpdate::Dismissed {
                entity_type: entity_type.clone(),
                ids: ids.clone(),
                list_key: list_key.clone(),
            },
            EntityAction::FetchRequest {
                entity_type,
                list_key,
            } => StoreUpdate::FetchStarted {
                entity_type: entity_type.clone(),
                list_key: list_key.clone(),
            },
            EntityAction::FetchSuccess {
                entity_type,
                entities,
                list_key,
                ..
            } => StoreUpdate::FetchSucceeded {
                entity_type: entity_type.clone(),
                list_key: list_key.clone(),
                ids: record_ids(entities),
            },
            EntityAction::FetchFail {
                entity_type,
                list_key,
                error,
            } => StoreUpdate::FetchFailed {
                entity_type: entity_type.clone(),
                list_key: list_key.clone(),
                error: error.to_string(),
            },
            EntityAction::Invalidate {
                entity_type,
                list_key,
            } => StoreUpdate::Invalidated {
                entity_type: entity_type.clone(),
                list_key: list_key.clone(),
            },
            EntityAction::Increment {
                entity_type,
                list_key,
                diff,
            } => StoreUpdate::Incremented {
                entity_type: entity_type.clone(),
                list_key: list_key.clone(),
                diff: *diff,
            },
            EntityAction::Transaction(tx) => StoreUpdate::Transacted {
                entity_types: tx.entity_types(),
            },
            EntityAction::Commit { entity_types, .. } => StoreUpdate::Transacted {
                entity_types: entity_types.clone(),
            },
            EntityAction::Reset => StoreUpdate::Reset,
        }
    }
}

/// Update event for store subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUpdate {
    Imported {
        entity_type: String,
        ids: Vec<String>,
        list_key: Option<String>,
    },
    Deleted {
        entity_type: String,
        ids: Vec<String>,
        preserve_lists: bool,
    },
    Dismissed {
        entity_type: String,
        ids: Vec<String>,
        list_key: String,
    },
    FetchStarted {
        entity_type: String,
        list_key: String,
    },
    FetchSucceeded {
        entity_type: String,
        list_key: String,
        ids: Vec<String>,
    },
    FetchFailed {
        entity_type: String,
        list_key: String,
        error: String,
    },
    Invalidated {
        entity_type: String,
        list_key: String,
    },
    Incremented {
        entity_type: String,
        list_key: String,
        diff: i64,
    },
    Transacted {
        entity_types: Vec<String>,
    },
    Reset,
}

fn record_ids(entities: &[EntityRecord]) -> Vec<String> {
    entities.iter().map(|e| e.id().to_string()).collect()
}

/// Apply `action` to `state`, returning the next snapshot.
pub fn reduce(state: &EntitiesState, action: EntityAction) -> EntitiesState {
    let mut next = state.clone();
    apply(&mut next, action);
    next
}

fn apply(state: &mut EntitiesState, action: EntityAction) {
    match action {
        EntityAction::Import {
            entity_type,
            entities,
            list_key,
            pos,
        } => import(state, &entity_type, entities, list_key, pos),

        EntityAction::Delete {
            entity_type,
            ids,
            preserve_lists,
        } => {
            let cache = state.cache_mut(&entity_type);
            for id in &ids {
                cache.store.remove(id);
                if !preserve_lists {
                    for list in cache.lists.values_mut() {
                        list.remove_id(id);
                    }
                }
            }
        }

        EntityAction::Dismiss {
            entity_type,
            ids,
            list_key,
        } => {
            let list = list_mut(state, &entity_type, list_key);
            for id in &ids {
                list.remove_id(id);
            }
        }

        EntityAction::FetchRequest {
            entity_type,
            list_key,
        } => {
            list_mut(state, &entity_type, list_key).state.fetching = true;
        }

        EntityAction::FetchSuccess {
            entity_type,
            entities,
            list_key,
            pos,
            page,
            overwrite,
        } => {
            let cache = state.cache_mut(&entity_type);
            let ids = record_ids(&entities);
            for entity in entities {
                cache.store.insert(entity.id().to_string(), entity);
            }

            let mut list = if overwrite {
                EntityList::default()
            } else {
                cache.lists.remove(&list_key).unwrap_or_default()
            };
            list.add_ids(ids, pos);

            let list_state = &mut list.state;
            list_state.next = page.next;
            list_state.prev = page.prev;
            list_state.total_count = page.total_count;
            list_state.fetching = false;
            list_state.fetched = true;
            list_state.error = None;
            list_state.last_fetched_at = Some(page.fetched_at);
            list_state.invalid = false;

            cache.lists.insert(list_key, list);
        }

        EntityAction::FetchFail {
            entity_type,
            list_key,
            error,
        } => {
            let list_state = &mut list_mut(state, &entity_type, list_key).state;
            list_state.fetching = false;
            list_state.error = Some(error);
        }

        EntityAction::Invalidate {
            entity_type,
            list_key,
        } => {
            list_mut(state, &entity_type, list_key).state.invalid = true;
        }

        EntityAction::Increment {
            entity_type,
            list_key,
            diff,
        } => {
            if let Some(count) = list_mut(state, &entity_type, list_key)
                .state
                .total_count
                .as_mut()
            {
                *count += diff;
            }
        }

        EntityAction::Transaction(tx) => {
            let records = tx.resolve(state);
            commit(state, records);
        }

        EntityAction::Commit { records, .. } => commit(state, records),

        EntityAction::Reset => state.clear(),
    }
}

fn import(
    state: &mut EntitiesState,
    entity_type: &str,
    entities: Vec<EntityRecord>,
    list_key: Option<String>,
    pos: Position,
) {
    let cache = state.cache_mut(entity_type);
    let ids = record_ids(&entities);
    for entity in entities {
        cache.store.insert(entity.id().to_string(), entity);
    }
    if let Some(list_key) = list_key {
        cache.lists.entry(list_key).or_default().add_ids(ids, pos);
    }
}

fn commit(state: &mut EntitiesState, records: Vec<(String, EntityRecord)>) {
    for (entity_type, record) in records {
        if state.contains(&entity_type, record.id()) {
            let id = record.id().to_string();
            state.cache_mut(&entity_type).store.insert(id, record);
        }
    }
}

fn list_mut<'a>(
    state: &'a mut EntitiesState,
    entity_type: &str,
    list_key: String,
) -> &'a mut EntityList {
    state.cache_mut(entity_type).lists.entry(list_key).or_default()
}
