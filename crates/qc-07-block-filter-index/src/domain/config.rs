//! Filter index configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use qc_07_block_filter_index::domain::{FilterIndexConfigBuilder, FilterType};
//!
//! let config = FilterIndexConfigBuilder::new()
//!     .filter_types(vec![FilterType::Basic])
//!     .query_cache_size(2048)
//!     .build()
//!     .expect("Valid config");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::filter_type::FilterType;
use crate::error::ConfigError;

/// Filter index configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterIndexConfig {
    /// Filter types to build and serve
    pub filter_types: Vec<FilterType>,
    /// Query cache entries (0 disables the cache)
    pub query_cache_size: usize,
    /// Interval between retries of stalled indexing, in milliseconds
    pub retry_interval_ms: u64,
    /// Bound on queued chain events
    pub event_channel_capacity: usize,
}

impl Default for FilterIndexConfig {
    fn default() -> Self {
        Self {
            filter_types: FilterType::ALL.to_vec(),
            query_cache_size: 1_000,
            retry_interval_ms: 5_000,
            event_channel_capacity: 256,
        }
    }
}

impl FilterIndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_types.is_empty() {
            return Err(ConfigError::NoFilterTypes);
        }

        let mut seen = HashSet::new();
        for filter_type in &self.filter_types {
            if !seen.insert(*filter_type) {
                return Err(ConfigError::DuplicateFilterType(*filter_type));
            }
        }

        if self.retry_interval_ms == 0 {
            return Err(ConfigError::InvalidParameter(
                "retry_interval_ms cannot be 0".to_string(),
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidParameter(
                "event_channel_capacity cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_enabled(&self, filter_type: FilterType) -> bool {
        self.filter_types.contains(&filter_type)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Builder-style method to set the enabled filter types
    pub fn with_filter_types(mut self, filter_types: Vec<FilterType>) -> Self {
        self.filter_types = filter_types;
        self
    }

    /// Builder-style method to set the query cache size
    pub fn with_query_cache_size(mut self, entries: usize) -> Self {
        self.query_cache_size = entries;
        self
    }
}

/// Builder for FilterIndexConfig with validation
#[derive(Default)]
pub struct FilterIndexConfigBuilder {
    filter_types: Option<Vec<FilterType>>,
    query_cache_size: Option<usize>,
    retry_interval_ms: Option<u64>,
    event_channel_capacity: Option<usize>,
}

impl FilterIndexConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter types to build and serve
    pub fn filter_types(mut self, filter_types: Vec<FilterType>) -> Self {
        self.filter_types = Some(filter_types);
        self
    }

    /// Set the query cache size in entries (0 disables)
    pub fn query_cache_size(mut self, entries: usize) -> Self {
        self.query_cache_size = Some(entries);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<FilterIndexConfig, ConfigError> {
        let defaults = FilterIndexConfig::default();

        let config = FilterIndexConfig {
            filter_types: self.filter_types.unwrap_or(defaults.filter_types),
            query_cache_size: self.query_cache_size.unwrap_or(defaults.query_cache_size),
            retry_interval_ms: self.retry_interval_ms.unwrap_or(defaults.retry_interval_ms),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
        };

        config.validate()?;
        Ok(config)
    }
}
