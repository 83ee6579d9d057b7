//! Validation of server payloads before they enter the cache.
//!
//! Every import boundary parses raw JSON through a [`Schema`]. Values that
//! fail are rejected and reported, never coerced.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::entity::Entity;

/// A payload did not match the expected entity shape.
#[derive(Debug, Clone, Error)]
#[error("invalid {entity_type} payload: {reason}")]
pub struct ValidationError {
    pub entity_type: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(entity_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            reason: reason.into(),
        }
    }
}

/// Parses raw JSON into a validated entity.
pub trait Schema<T: Entity>: Send + Sync {
    fn parse(&self, entity_type: &str, value: serde_json::Value) -> Result<T, ValidationError>;
}

/// Schema backed by the entity's `Deserialize` impl.
///
/// Also rejects entities whose id is empty. `SerdeSchema<serde_json::Value>`
/// accepts any object with a non-empty string `id`.
pub struct SerdeSchema<T>(PhantomData<fn() -> T>);

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity + DeserializeOwned> Schema<T> for SerdeSchema<T> {
    fn parse(&self, entity_type: &str, value: serde_json::Value) -> Result<T, ValidationError> {
        let entity: T = serde_json::from_value(value)
            .map_err(|e| ValidationError::new(entity_type, e.to_string()))?;
        if entity.id().is_empty() {
            return Err(ValidationError::new(entity_type, "missing id"));
        }
        Ok(entity)
    }
}

/// Schema defined by a closure, for validators that serde cannot express.
pub struct FnSchema<F>(F);

impl<F> FnSchema<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> Schema<T> for FnSchema<F>
where
    T: Entity,
    F: Fn(serde_json::Value) -> Result<T, String> + Send + Sync,
{
    fn parse(&self, entity_type: &str, value: serde_json::Value) -> Result<T, ValidationError> {
        (self.0)(value).map_err(|reason| ValidationError::new(entity_type, reason))
    }
}

/// Parse a list response, dropping items that fail validation.
///
/// The payload itself must be an array.
pub(crate) fn parse_filtered<T: Entity>(
    schema: &dyn Schema<T>,
    entity_type: &str,
    data: serde_json::Value,
) -> Result<Vec<T>, ValidationError> {
    let serde_json::Value::Array(items) = data else {
        return Err(ValidationError::new(entity_type, "expected an array"));
    };

    let mut entities = Vec::with_capacity(items.len());
    for item in items {
        match schema.parse(entity_type, item) {
            Ok(entity) => entities.push(entity),
            Err(e) => warn!(entity_type, error = %e, "rejected list item"),
        }
    }
    Ok(entities)
}

/// Parse an array response where every item must validate.
pub(crate) fn parse_strict<T: Entity>(
    schema: &dyn Schema<T>,
    entity_type: &str,
    data: serde_json::Value,
) -> Result<Vec<T>, ValidationError> {
    let serde_json::Value::Array(items) = data else {
        return Err(ValidationError::new(entity_type, "expected an array"));
    };
    items
        .into_iter()
        .map(|item| schema.parse(entity_type, item))
        .collect()
}
