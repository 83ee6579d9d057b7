//! Multi-entity optimistic edits.
//!
//! A [`Transaction`] is a batch of per-type, per-id updater functions whose
//! results are committed to the store in one step. It has no network call of
//! its own;
//! [`OptimisticUpdate`] pairs a forward transaction with its inverse around a
//! request and applies the inverse if the request fails.

use std::fmt;
use std::future::Future;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::entity::{Entity, EntityRecord};
use crate::reducer::EntityAction;
use crate::state::EntitiesState;
use crate::store::EntityStore;

type Updater = Box<dyn FnOnce(&EntityRecord) -> Option<EntityRecord> + Send>;

struct Change {
    entity_type: String,
    id: String,
    updater: Updater,
}

/// A batch of entity updates applied atomically.
///
/// Updates run in the order they were added. Updates targeting ids that are
/// not cached, or cached under a different Rust type, are skipped, as are
/// updates that return an entity with a different id.
///
/// Updaters run against a snapshot outside the store's lock, so they may
/// read the store.
///
/// # Examples
///
/// ```
/// use serde_json::{Value, json};
/// use tern_entities::Transaction;
///
/// let follow = Transaction::new()
///     .update::<Value, _>("Accounts", "42", |account| {
///         let mut account = account.clone();
///         let count = account["followers_count"].as_i64().unwrap_or(0);
///         account["followers_count"] = json!(count + 1);
///         account
///     })
///     .update::<Value, _>("Relationships", "42", |rel| {
///         let mut rel = rel.clone();
///         rel["following"] = json!(true);
///         rel
///     });
/// assert_eq!(follow.len(), 2);
/// ```
#[derive(Default)]
pub struct Transaction {
    changes: Vec<Change>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an updater for one cached entity.
    pub fn update<T, F>(
        mut self,
        entity_type: impl Into<String>,
        id: impl Into<String>,
        f: F,
    ) -> Self
    where
        T: Entity,
        F: FnOnce(&T) -> T + Send + 'static,
    {
        let entity_type = entity_type.into();
        let id = id.into();
        let updater: Updater = Box::new(move |record: &EntityRecord| {
            let current = record.get::<T>()?;
            Some(EntityRecord::new(f(&*current)))
        });
        self.changes.push(Change {
            entity_type,
            id,
            updater,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Entity types touched by this transaction, in first-use order.
    pub fn entity_types(&self) -> Vec<String> {
        let types: IndexSet<&str> = self.changes.iter().map(|c| c.entity_type.as_str()).collect();
        types.into_iter().map(String::from).collect()
    }

    /// Run the updaters against `state` and collect what they produce as
    /// `(entity_type, record)` pairs, one per touched entity.
    ///
    /// Later updaters for the same entity see the output of earlier ones.
    pub(crate) fn resolve(self, state: &EntitiesState) -> Vec<(String, EntityRecord)> {
        let mut staged: IndexMap<(String, String), EntityRecord> = IndexMap::new();
        for Change {
            entity_type,
            id,
            updater,
        } in self.changes
        {
            let key = (entity_type, id);
            let current = match staged.get(&key) {
                Some(record) => record.clone(),
                None => match state.record(&key.0, &key.1) {
                    Some(record) => record.clone(),
                    None => continue,
                },
            };
            let Some(next) = updater(&current) else {
                continue;
            };
            if next.id() != key.1 {
                warn!(
                    entity_type = %key.0,
                    id = %key.1,
                    new_id = next.id(),
                    "updater changed the entity id, skipping"
                );
                continue;
            }
            staged.insert(key, next);
        }
        staged
            .into_iter()
            .map(|((entity_type, _), record)| (entity_type, record))
            .collect()
    }

    /// Resolve against `state` into an action that only writes records.
    pub(crate) fn into_commit(self, state: &EntitiesState) -> EntityAction {
        let entity_types = self.entity_types();
        EntityAction::Commit {
            entity_types,
            records: self.resolve(state),
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<String> = self
            .changes
            .iter()
            .map(|c| format!("{}/{}", c.entity_type, c.id))
            .collect();
        f.debug_struct("Transaction")
            .field("targets", &targets)
            .finish()
    }
}

/// A forward transaction paired with the transaction that undoes it.
pub struct OptimisticUpdate {
    forward: Transaction,
    inverse: Transaction,
}

impl OptimisticUpdate {
    pub fn new(forward: Transaction, inverse: Transaction) -> Self {
        Self { forward, inverse }
    }

    /// Apply `forward`, await `request`, and apply `inverse` if it fails.
    ///
    /// The forward edit is visible to readers before `request` is first
    /// polled. The request's result is returned unchanged.
    pub async fn run<R, E, Fut>(self, store: &EntityStore, request: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: fmt::Display,
    {
        debug!(changes = self.forward.len(), "applying optimistic transaction");
        store.transaction(self.forward);

        let result = request.await;
        if let Err(ref e) = result {
            warn!(error = %e, "request failed, reverting optimistic transaction");
            store.transaction(self.inverse);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::reduce;
    use crate::state::Position;
    use serde_json::{Value, json};

    #[test]
    fn test_entity_types_deduplicated() {
        let tx = Transaction::new()
            .update::<Value, _>("Accounts", "1", |a| a.clone())
            .update::<Value, _>("Relationships", "1", |r| r.clone())
            .update::<Value, _>("Accounts", "2", |a| a.clone());
        assert_eq!(tx.len(), 3);
        assert_eq!(tx.entity_types(), vec!["Accounts", "Relationships"]);
    }

    #[test]
    fn test_updater_skips_wrong_type() {
        #[derive(Clone)]
        struct Other(String);
        impl Entity for Other {
            fn id(&self) -> &str {
                &self.0
            }
        }

        let state = reduce(
            &EntitiesState::new(),
            EntityAction::Import {
                entity_type: "Accounts".into(),
                entities: vec![EntityRecord::new(json!({"id": "1"}))],
                list_key: None,
                pos: Position::End,
            },
        );
        let tx = Transaction::new().update::<Other, _>("Accounts", "1", |o| o.clone());
        assert!(tx.resolve(&state).is_empty());
    }

    #[test]
    fn test_updater_changing_id_is_skipped() {
        let state = reduce(
            &EntitiesState::new(),
            EntityAction::Import {
                entity_type: "Accounts".into(),
                entities: vec![EntityRecord::new(json!({"id": "1", "note": "old"}))],
                list_key: None,
                pos: Position::End,
            },
        );
        let tx = Transaction::new()
            .update::<Value, _>("Accounts", "1", |_| json!({"id": "2", "note": "new"}));
        assert!(tx.resolve(&state).is_empty());

        let tx = Transaction::new()
            .update::<Value, _>("Accounts", "1", |_| json!({"id": "2"}))
            .update::<Value, _>("Accounts", "1", |a| {
                let mut a = a.clone();
                a["note"] = json!("kept");
                a
            });
        let state = reduce(&state, EntityAction::Transaction(tx));
        assert!(!state.contains("Accounts", "2"));
        let account = state.entity::<Value>("Accounts", "1").unwrap();
        assert_eq!(account["id"], "1");
        assert_eq!(account["note"], "kept");
    }

    #[test]
    fn test_resolve_collapses_repeated_targets() {
        let state = reduce(
            &EntitiesState::new(),
            EntityAction::Import {
                entity_type: "Accounts".into(),
                entities: vec![EntityRecord::new(json!({"id": "1", "n": 1}))],
                list_key: None,
                pos: Position::End,
            },
        );
        let bump = |a: &Value| json!({"id": "1", "n": a["n"].as_i64().unwrap() + 1});
        let tx = Transaction::new()
            .update::<Value, _>("Accounts", "1", bump)
            .update::<Value, _>("Accounts", "1", bump);

        let records = tx.resolve(&state);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.get::<Value>().unwrap()["n"], 3);
        assert_eq!(state.entity::<Value>("Accounts", "1").unwrap()["n"], 1);
    }

    #[test]
    fn test_debug_lists_targets() {
        let tx = Transaction::new().update::<Value, _>("Accounts", "1", |a| a.clone());
        assert_eq!(format!("{tx:?}"), r#"Transaction { targets: ["Accounts/1"] }"#);
    }
}
