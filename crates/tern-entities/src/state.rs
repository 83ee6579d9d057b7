//! Cache data model: entity caches, lists, and list state.
//!
//! Snapshots are immutable once published. The reducer clones what it
//! touches (copy-on-write through `Arc::make_mut`) and returns a new
//! [`EntitiesState`], so readers holding an old snapshot never observe a
//! partial update.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use tokio::time::Instant;

use crate::EntityError;
use crate::entity::{Entity, EntityRecord};

/// Where new ids land in a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Position {
    /// Prepend (previous page, freshly created entities).
    Start,
    /// Append (first page, next page).
    #[default]
    End,
}

/// Request lifecycle and pagination bookkeeping for one list.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    /// Cursor URL for the next page.
    pub next: Option<String>,
    /// Cursor URL for the previous page.
    pub prev: Option<String>,
    /// Size of the full server-side result set, when the server reports it.
    pub total_count: Option<i64>,
    pub fetching: bool,
    pub fetched: bool,
    /// Marked stale; refetch on next read.
    pub invalid: bool,
    pub error: Option<Arc<EntityError>>,
    pub last_fetched_at: Option<Instant>,
}

/// Pagination data captured from a successful fetch.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub next: Option<String>,
    pub prev: Option<String>,
    pub total_count: Option<i64>,
    pub fetched_at: Instant,
}

/// An ordered, de-duplicated result set of entity ids.
#[derive(Debug, Clone, Default)]
pub struct EntityList {
    pub ids: IndexSet<String>,
    pub state: ListState,
}

impl EntityList {
    /// Merge ids into the list at `pos`, keeping the first occurrence.
    ///
    /// A known `total_count` moves by the actual change in list size, so
    /// re-importing ids that are already listed leaves it untouched.
    pub fn add_ids<I>(&mut self, ids: I, pos: Position)
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.ids.len();
        match pos {
            Position::End => self.ids.extend(ids),
            Position::Start => {
                let mut merged: IndexSet<String> = ids.into_iter().collect();
                merged.extend(std::mem::take(&mut self.ids));
                self.ids = merged;
            }
        }
        let diff = self.ids.len() as i64 - before as i64;
        if let Some(count) = self.state.total_count.as_mut() {
            *count += diff;
        }
    }

    /// Remove an id, decrementing a known `total_count`. Returns whether the
    /// id was listed.
    pub fn remove_id(&mut self, id: &str) -> bool {
        let removed = self.ids.shift_remove(id);
        if removed {
            if let Some(count) = self.state.total_count.as_mut() {
                *count -= 1;
            }
        }
        removed
    }
}

/// Storage for one entity type.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    /// Latest imported value per id.
    pub store: HashMap<String, EntityRecord>,
    /// Lists by list key.
    pub lists: HashMap<String, EntityList>,
}

/// A snapshot of every entity cache, keyed by entity type.
#[derive(Debug, Clone, Default)]
pub struct EntitiesState {
    caches: HashMap<String, Arc<EntityCache>>,
}

impl EntitiesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self, entity_type: &str) -> Option<&EntityCache> {
        self.caches.get(entity_type).map(Arc::as_ref)
    }

    /// Mutable access to a cache, creating it on first use.
    pub(crate) fn cache_mut(&mut self, entity_type: &str) -> &mut EntityCache {
        let cache = self.caches.entry(entity_type.to_string()).or_default();
        Arc::make_mut(cache)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }

    pub fn record(&self, entity_type: &str, id: &str) -> Option<&EntityRecord> {
        self.cache(entity_type)?.store.get(id)
    }

    /// Typed read of a single entity.
    pub fn entity<T: Entity>(&self, entity_type: &str, id: &str) -> Option<Arc<T>> {
        self.record(entity_type, id)?.get::<T>()
    }

    pub fn contains(&self, entity_type: &str, id: &str) -> bool {
        self.record(entity_type, id).is_some()
    }

    pub fn list(&self, entity_type: &str, list_key: &str) -> Option<&EntityList> {
        self.cache(entity_type)?.lists.get(list_key)
    }

    pub fn list_state(&self, entity_type: &str, list_key: &str) -> Option<&ListState> {
        self.list(entity_type, list_key).map(|l| &l.state)
    }

    /// Entities of a list in list order, skipping ids missing from the store.
    pub fn list_entities<T: Entity>(&self, entity_type: &str, list_key: &str) -> Vec<Arc<T>> {
        let Some(cache) = self.cache(entity_type) else {
            return Vec::new();
        };
        let Some(list) = cache.lists.get(list_key) else {
            return Vec::new();
        };
        list.ids
            .iter()
            .filter_map(|id| cache.store.get(id)?.get::<T>())
            .collect()
    }

    /// Project the requested ids onto the store. Ids without a cached value
    /// are absent from the result.
    pub fn entity_map<T, I, S>(&self, entity_type: &str, ids: I) -> HashMap<String, Arc<T>>
    where
        T: Entity,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter_map(|id| {
                let id = id.as_ref();
                self.entity::<T>(entity_type, id).map(|e| (id.to_string(), e))
            })
            .collect()
    }

    /// First cached entity of the type matching `predicate`.
    pub fn find<T, F>(&self, entity_type: &str, mut predicate: F) -> Option<Arc<T>>
    where
        T: Entity,
        F: FnMut(&T) -> bool,
    {
        self.cache(entity_type)?
            .store
            .values()
            .filter_map(EntityRecord::get::<T>)
            .find(|e| predicate(e))
    }

    /// Drop every cache.
    pub(crate) fn clear(&mut self) {
        self.caches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(list: &EntityList) -> Vec<&str> {
        list.ids.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_add_ids_end_keeps_existing_positions() {
        let mut list = EntityList::default();
        list.add_ids(["1", "2"].map(String::from), Position::End);
        list.add_ids(["2", "3"].map(String::from), Position::End);
        assert_eq!(ids(&list), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_add_ids_start_prepends() {
        let mut list = EntityList::default();
        list.add_ids(["2", "3"].map(String::from), Position::End);
        list.add_ids(["1", "3"].map(String::from), Position::Start);
        assert_eq!(ids(&list), vec!["1", "3", "2"]);
    }

    #[test]
    fn test_total_count_tracks_size_delta() {
        let mut list = EntityList::default();
        list.state.total_count = Some(10);
        list.add_ids(["1", "2"].map(String::from), Position::End);
        assert_eq!(list.state.total_count, Some(12));
        list.add_ids(["2", "3"].map(String::from), Position::End);
        assert_eq!(list.state.total_count, Some(13));
        assert!(list.remove_id("1"));
        assert!(!list.remove_id("1"));
        assert_eq!(list.state.total_count, Some(12));
    }

    #[test]
    fn test_unknown_total_count_stays_unknown() {
        let mut list = EntityList::default();
        list.add_ids(["1"].map(String::from), Position::End);
        list.remove_id("1");
        assert_eq!(list.state.total_count, None);
    }

    #[test]
    fn test_list_entities_skips_missing() {
        let mut state = EntitiesState::new();
        let cache = state.cache_mut("Statuses");
        cache
            .store
            .insert("1".into(), EntityRecord::new(json!({"id": "1"})));
        let list = cache.lists.entry(String::new()).or_default();
        list.add_ids(["1", "2"].map(String::from), Position::End);

        let entities = state.list_entities::<serde_json::Value>("Statuses", "");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0]["id"], "1");
        assert!(state.list_entities::<serde_json::Value>("Groups", "").is_empty());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut before = EntitiesState::new();
        before
            .cache_mut("Accounts")
            .store
            .insert("1".into(), EntityRecord::new(json!({"id": "1"})));

        let mut after = before.clone();
        after.cache_mut("Accounts").store.remove("1");

        assert!(before.contains("Accounts", "1"));
        assert!(!after.contains("Accounts", "1"));
    }

    #[test]
    fn test_find_and_entity_map() {
        let mut state = EntitiesState::new();
        let store = &mut state.cache_mut("Groups").store;
        store.insert("1".into(), EntityRecord::new(json!({"id": "1", "slug": "rust"})));
        store.insert("2".into(), EntityRecord::new(json!({"id": "2", "slug": "go"})));

        let found = state
            .find::<serde_json::Value, _>("Groups", |g| g["slug"] == "go")
            .unwrap();
        assert_eq!(found["id"], "2");

        let map = state.entity_map::<serde_json::Value, _, _>("Groups", ["1", "3"]);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("1"));
    }
}
