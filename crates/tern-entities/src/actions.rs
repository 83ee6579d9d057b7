//! Create/delete pairs bound to REST endpoints.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::EntityError;
use crate::entity::Entity;
use crate::mutation::{CreateEntity, DeleteEntity, EntityCallbacks};
use crate::path::EntitiesPath;
use crate::schema::Schema;
use crate::store::EntityStore;
use crate::transport::{Request, Response};

/// Placeholder replaced by the entity id in delete endpoint templates.
pub const ID_PLACEHOLDER: &str = ":id";

/// Endpoints for [`EntityActions`]. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct EntityEndpoints {
    pub post: Option<String>,
    /// URL template; every `:id` is replaced with the entity id.
    pub delete: Option<String>,
}

impl EntityEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(mut self, url: impl Into<String>) -> Self {
        self.post = Some(url.into());
        self
    }

    pub fn delete(mut self, template: impl Into<String>) -> Self {
        self.delete = Some(template.into());
        self
    }
}

/// Create and delete for one entity type, with the same optimistic
/// semantics as [`CreateEntity`] and [`DeleteEntity`].
///
/// # Examples
///
/// ```no_run
/// # async fn demo(store: tern_entities::EntityStore) -> Result<(), tern_entities::EntityError> {
/// use serde_json::json;
/// use tern_entities::{EntityActions, EntityCallbacks, EntityEndpoints};
///
/// let lists = EntityActions::<serde_json::Value>::new(
///     &store,
///     ("Lists", ["mine"]),
///     EntityEndpoints::new()
///         .post("/api/v1/lists")
///         .delete("/api/v1/lists/:id"),
/// );
/// let list = lists
///     .create_entity(json!({"title": "Friends"}), EntityCallbacks::new())
///     .await?;
/// lists.delete_entity(tern_entities::Entity::id(&*list), EntityCallbacks::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct EntityActions<T: Entity> {
    endpoints: EntityEndpoints,
    create: CreateEntity<T>,
    delete: Option<DeleteEntity>,
}

impl<T: Entity + DeserializeOwned> EntityActions<T> {
    pub fn new(
        store: &EntityStore,
        path: impl Into<EntitiesPath>,
        endpoints: EntityEndpoints,
    ) -> Self {
        let path = path.into();
        let delete = endpoints.delete.clone().map(|template| {
            DeleteEntity::new(store, path.entity_type(), move |id| {
                Request::delete(delete_url(&template, id))
            })
        });
        Self {
            create: CreateEntity::new(store, path),
            delete,
            endpoints,
        }
    }
}

impl<T: Entity> EntityActions<T> {
    pub fn with_schema(mut self, schema: impl Schema<T> + 'static) -> Self {
        self.create = self.create.with_schema(schema);
        self
    }

    pub fn endpoints(&self) -> &EntityEndpoints {
        &self.endpoints
    }

    /// POST `body` to the create endpoint.
    pub async fn create_entity(
        &self,
        body: serde_json::Value,
        callbacks: EntityCallbacks<T>,
    ) -> Result<Arc<T>, EntityError> {
        let Some(url) = &self.endpoints.post else {
            let e = EntityError::MissingEndpoint("post");
            callbacks.fail(&e);
            return Err(e);
        };
        self.create.create(Request::post(url, body), callbacks).await
    }

    /// DELETE the entity at the templated endpoint.
    pub async fn delete_entity(
        &self,
        id: &str,
        callbacks: EntityCallbacks<Response>,
    ) -> Result<Response, EntityError> {
        let Some(delete) = &self.delete else {
            let e = EntityError::MissingEndpoint("delete");
            callbacks.fail(&e);
            return Err(e);
        };
        delete.delete(id, callbacks).await
    }

    pub fn is_submitting(&self) -> bool {
        self.create.is_submitting() || self.delete.as_ref().is_some_and(DeleteEntity::is_submitting)
    }
}

fn delete_url(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_url_substitutes_every_placeholder() {
        assert_eq!(delete_url("/api/v1/lists/:id", "7"), "/api/v1/lists/7");
        assert_eq!(
            delete_url("/api/v1/groups/:id/blocks?account_ids[]=:id", "9"),
            "/api/v1/groups/9/blocks?account_ids[]=9"
        );
        assert_eq!(delete_url("/api/v1/lists", "7"), "/api/v1/lists");
    }
}
