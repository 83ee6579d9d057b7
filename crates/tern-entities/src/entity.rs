//! Entities and their type-erased cache representation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A record mirrored from the server, identified by a stable string id.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The entity's id. Unique within its entity type.
    fn id(&self) -> &str;
}

/// Untyped JSON entities are identified by their `id` field.
///
/// Values without a string `id` report an empty id; [`crate::SerdeSchema`]
/// rejects those before they reach the cache.
impl Entity for serde_json::Value {
    fn id(&self) -> &str {
        self.get("id").and_then(serde_json::Value::as_str).unwrap_or("")
    }
}

/// A cached entity value with its id, stored without its concrete type.
///
/// Cloning is cheap: the value is shared.
#[derive(Clone)]
pub struct EntityRecord {
    id: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl EntityRecord {
    /// Wrap a validated entity for storage.
    pub fn new<T: Entity>(entity: T) -> Self {
        Self {
            id: entity.id().to_string(),
            value: Arc::new(entity),
        }
    }

    /// Wrap an already shared entity without cloning it.
    pub fn from_arc<T: Entity>(entity: Arc<T>) -> Self {
        Self {
            id: entity.id().to_string(),
            value: entity,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Typed view of the stored value, or `None` if it is not a `T`.
    pub fn get<T: Entity>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Whether both records share the same stored value.
    pub fn ptr_eq(&self, other: &EntityRecord) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord").field("id", &self.id).finish()
    }
}
