//! Normalized client-side entity store for Tern's REST API.
//!
//! Server resources (accounts, groups, relationships, statuses) are cached
//! once per `(entity type, id)` and referenced by id from any number of
//! lists. Every write goes through a pure reducer that returns a new
//! snapshot, so readers always see a consistent cache.
//!
//! ## Features
//!
//! - **Store**: immutable snapshots published over a watch channel, with
//!   action summaries on a broadcast channel
//! - **Queries**: paginated lists with staleness and request de-duplication,
//!   single-entity fetches, predicate lookups, batched fetches
//! - **Mutations**: create, optimistic delete with rollback, counter
//!   increments, per-list dismissal
//! - **Transactions**: multi-entity optimistic edits with an inverse
//! - **Transport**: pluggable network layer, with a reqwest implementation

mod actions;
mod client;
pub mod config;
mod entity;
mod error;
pub mod fetch;
pub mod links;
mod mutation;
mod path;
pub mod reducer;
mod schema;
pub mod state;
mod store;
mod transaction;
pub mod transport;

pub use actions::{EntityActions, EntityEndpoints, ID_PLACEHOLDER};
pub use client::HttpTransport;
pub use config::{StaleTime, StoreConfig, StoreConfigBuilder};
pub use entity::{Entity, EntityRecord};
pub use error::EntityError;
pub use fetch::{BatchQuery, EntityQuery, ListQuery, LookupQuery, RequestStatus};
pub use links::{next_link, parse_total_count, prev_link};
pub use mutation::{CreateEntity, DeleteEntity, DismissEntity, EntityCallbacks, IncrementEntity};
pub use path::{EntitiesPath, LIST_KEY_SEPARATOR};
pub use reducer::{EntityAction, StoreUpdate, reduce};
pub use schema::{FnSchema, Schema, SerdeSchema, ValidationError};
pub use state::{EntitiesState, EntityCache, EntityList, ListState, PageInfo, Position};
pub use store::EntityStore;
pub use transaction::{OptimisticUpdate, Transaction};
pub use transport::{Headers, Method, Request, Response, Transport};
