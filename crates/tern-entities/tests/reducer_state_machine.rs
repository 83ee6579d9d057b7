//! Stateful property testing for the reducer.
//!
//! Drives random import/delete/dismiss sequences through `reduce` and
//! compares the resulting cache with a plain reference model.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};
use serde_json::json;

use tern_entities::{EntitiesState, EntityAction, EntityRecord, Position, reduce};

const ENTITY_TYPE: &str = "Accounts";
const LIST_KEYS: [&str; 3] = ["", "followers:1", "following:1"];

/// Operations applied to the cache.
#[derive(Debug, Clone)]
pub enum ReducerOperation {
    Import {
        ids: Vec<String>,
        list_key: Option<String>,
        pos: Position,
        version: u32,
    },
    Delete {
        ids: Vec<String>,
        preserve_lists: bool,
    },
    Dismiss {
        ids: Vec<String>,
        list_key: String,
    },
}

/// Reference model: cached values by id and list contents in order.
#[derive(Clone, Debug, Default)]
pub struct ReducerModel {
    pub store: BTreeMap<String, u32>,
    pub lists: BTreeMap<String, Vec<String>>,
}

fn merge(existing: &[String], incoming: &[String], pos: Position) -> Vec<String> {
    let (first, second) = match pos {
        Position::Start => (incoming, existing),
        Position::End => (existing, incoming),
    };
    let mut seen = BTreeSet::new();
    first
        .iter()
        .chain(second)
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

fn id_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((0u8..8).prop_map(|n| n.to_string()), 0..5)
}

impl ReferenceStateMachine for ReducerModel {
    type State = Self;
    type Transition = ReducerOperation;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(Self::default()).boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        let list_key = proptest::sample::select(LIST_KEYS.to_vec()).prop_map(String::from);
        let pos = prop_oneof![Just(Position::Start), Just(Position::End)];

        prop_oneof![
            4 => (id_strategy(), proptest::option::of(list_key.clone()), pos, any::<u32>())
                .prop_map(|(ids, list_key, pos, version)| ReducerOperation::Import {
                    ids,
                    list_key,
                    pos,
                    version,
                }),
            2 => (id_strategy(), any::<bool>()).prop_map(|(ids, preserve_lists)| {
                ReducerOperation::Delete { ids, preserve_lists }
            }),
            1 => (id_strategy(), list_key).prop_map(|(ids, list_key)| {
                ReducerOperation::Dismiss { ids, list_key }
            }),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            ReducerOperation::Import {
                ids,
                list_key,
                pos,
                version,
            } => {
                for id in ids {
                    state.store.insert(id.clone(), *version);
                }
                if let Some(key) = list_key {
                    let list = state.lists.entry(key.clone()).or_default();
                    *list = merge(list, ids, *pos);
                }
            }
            ReducerOperation::Delete {
                ids,
                preserve_lists,
            } => {
                for id in ids {
                    state.store.remove(id);
                }
                if !preserve_lists {
                    for list in state.lists.values_mut() {
                        list.retain(|id| !ids.contains(id));
                    }
                }
            }
            ReducerOperation::Dismiss { ids, list_key } => {
                let list = state.lists.entry(list_key.clone()).or_default();
                list.retain(|id| !ids.contains(id));
            }
        }
        state
    }

    fn preconditions(_state: &Self::State, _transition: &Self::Transition) -> bool {
        true
    }
}

/// The system under test is just a snapshot; `reduce` is pure.
pub struct ReducerHarness {
    state: Arc<EntitiesState>,
}

impl ReducerHarness {
    fn action(op: &ReducerOperation) -> EntityAction {
        match op {
            ReducerOperation::Import {
                ids,
                list_key,
                pos,
                version,
            } => EntityAction::Import {
                entity_type: ENTITY_TYPE.into(),
                entities: ids
                    .iter()
                    .map(|id| EntityRecord::new(json!({"id": id, "version": version})))
                    .collect(),
                list_key: list_key.clone(),
                pos: *pos,
            },
            ReducerOperation::Delete {
                ids,
                preserve_lists,
            } => EntityAction::Delete {
                entity_type: ENTITY_TYPE.into(),
                ids: ids.clone(),
                preserve_lists: *preserve_lists,
            },
            ReducerOperation::Dismiss { ids, list_key } => EntityAction::Dismiss {
                entity_type: ENTITY_TYPE.into(),
                ids: ids.clone(),
                list_key: list_key.clone(),
            },
        }
    }
}

impl StateMachineTest for ReducerHarness {
    type SystemUnderTest = Self;
    type Reference = ReducerModel;

    fn init_test(
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        Self {
            state: Arc::new(EntitiesState::new()),
        }
    }

    fn apply(
        state: Self::SystemUnderTest,
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        let previous = Arc::clone(&state.state);
        let before: Vec<String> = previous
            .cache(ENTITY_TYPE)
            .map(|c| c.store.keys().cloned().collect())
            .unwrap_or_default();

        let next = reduce(&previous, Self::action(&transition));

        // The input snapshot is never modified.
        let after: Vec<String> = previous
            .cache(ENTITY_TYPE)
            .map(|c| c.store.keys().cloned().collect())
            .unwrap_or_default();
        assert_eq!(before, after);

        Self {
            state: Arc::new(next),
        }
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        let Some(cache) = state.state.cache(ENTITY_TYPE) else {
            assert!(ref_state.store.is_empty());
            return;
        };

        // Invariant: cached ids and the latest imported value per id match
        let cached: BTreeMap<String, u32> = cache
            .store
            .iter()
            .map(|(id, record)| {
                let value = record.get::<serde_json::Value>().expect("stored as JSON");
                (id.clone(), value["version"].as_u64().expect("version") as u32)
            })
            .collect();
        assert_eq!(cached, ref_state.store);

        // Invariant: list order matches the model and never repeats an id
        for (key, expected) in &ref_state.lists {
            let actual: Vec<String> = cache
                .lists
                .get(key)
                .map(|l| l.ids.iter().cloned().collect())
                .unwrap_or_default();
            assert_eq!(&actual, expected, "list {key:?}");
        }
    }
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 5000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn reducer_state_machine_test(sequential 1..40 => ReducerHarness);
}

#[test]
fn test_merge_first_occurrence_wins() {
    let existing = vec!["1".to_string(), "2".to_string()];
    let incoming = vec!["2".to_string(), "3".to_string()];
    assert_eq!(merge(&existing, &incoming, Position::End), vec!["1", "2", "3"]);
    assert_eq!(merge(&existing, &incoming, Position::Start), vec!["2", "3", "1"]);
}
