//! Store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::EntityError;
use crate::links::DEFAULT_TOTAL_COUNT_HEADER;

/// Default time a fetched list stays fresh.
pub const DEFAULT_STALE_TIME_MS: u64 = 60_000;

/// Default capacity of the store update broadcast channel.
pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// How long fetched data is trusted before an automatic refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleTime {
    /// Stale this many milliseconds after the last successful fetch.
    Millis(u64),
    /// Never stale. Data is fetched once and only refetched on demand or
    /// after invalidation.
    Never,
}

impl StaleTime {
    pub fn from_duration(duration: Duration) -> Self {
        StaleTime::Millis(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            StaleTime::Millis(ms) => Some(Duration::from_millis(*ms)),
            StaleTime::Never => None,
        }
    }

    /// Whether data fetched at `fetched_at` is stale at `now`.
    pub fn is_stale(&self, fetched_at: Instant, now: Instant) -> bool {
        match self.duration() {
            Some(ttl) => now >= fetched_at + ttl,
            None => false,
        }
    }
}

impl Default for StaleTime {
    fn default() -> Self {
        StaleTime::Millis(DEFAULT_STALE_TIME_MS)
    }
}

/// Configuration for an [`crate::EntityStore`].
///
/// # Examples
///
/// ```
/// use tern_entities::{StaleTime, StoreConfig};
///
/// let config = StoreConfig::builder()
///     .stale_time(StaleTime::Never)
///     .total_count_header("x-count")
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Default staleness policy for list queries.
    pub stale_time: StaleTime,
    /// Response header carrying the total size of a list.
    pub total_count_header: String,
    /// Capacity of the [`crate::StoreUpdate`] broadcast channel.
    pub update_channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stale_time: StaleTime::default(),
            total_count_header: DEFAULT_TOTAL_COUNT_HEADER.to_string(),
            update_channel_capacity: DEFAULT_UPDATE_CHANNEL_CAPACITY,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Check the configuration for values the store cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `EntityError::InvalidConfig` if the header name is empty or
    /// the update channel capacity is zero.
    pub fn validate(&self) -> Result<(), EntityError> {
        if self.total_count_header.trim().is_empty() {
            return Err(EntityError::InvalidConfig(
                "total count header name cannot be empty".to_string(),
            ));
        }

        if self.update_channel_capacity == 0 {
            return Err(EntityError::InvalidConfig(
                "update channel capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_time(mut self, stale_time: StaleTime) -> Self {
        self.config.stale_time = stale_time;
        self
    }

    pub fn total_count_header(mut self, header: impl Into<String>) -> Self {
        self.config.total_count_header = header.into();
        self
    }

    pub fn update_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.update_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
