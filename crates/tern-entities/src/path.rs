//! Cache addressing.
//!
//! Every cache location is an entity type plus zero or more list-key
//! segments, e.g. `("Accounts", ["followers", "42"])`. Segments are joined
//! with [`LIST_KEY_SEPARATOR`] into the list key, so followers of different
//! accounts live side by side under the same entity type.

use std::fmt;

/// Separator between list-key segments.
pub const LIST_KEY_SEPARATOR: &str = ":";

/// Address of a list within the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntitiesPath {
    entity_type: String,
    segments: Vec<String>,
}

impl EntitiesPath {
    /// Address the root list of an entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            segments: Vec::new(),
        }
    }

    /// Append a list-key segment.
    pub fn with_key(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The joined list key. Empty for the root list.
    pub fn list_key(&self) -> String {
        self.segments.join(LIST_KEY_SEPARATOR)
    }
}

impl From<&str> for EntitiesPath {
    fn from(entity_type: &str) -> Self {
        Self::new(entity_type)
    }
}

impl From<String> for EntitiesPath {
    fn from(entity_type: String) -> Self {
        Self::new(entity_type)
    }
}

impl<S: Into<String>, const N: usize> From<(&str, [S; N])> for EntitiesPath {
    fn from((entity_type, segments): (&str, [S; N])) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for EntitiesPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "{}", self.entity_type)
        } else {
            write!(f, "{}[{}]", self.entity_type, self.list_key())
        }
    }
}
