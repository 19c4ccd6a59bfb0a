use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::services::Service;
use crate::error::SoftLayerError;

/// Namespace every canonical resource name starts with.
pub const SERVICE_PREFIX: &str = "SoftLayer_";

/// Trims `name` and adds [`SERVICE_PREFIX`] when it is missing.
///
/// Names that are empty or only whitespace fail with `InvalidArgument`.
pub fn canonical_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SoftLayerError::InvalidArgument(
            "Service name must not be empty".to_string(),
        )
        .into());
    }

    if trimmed.starts_with(SERVICE_PREFIX) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}{}", SERVICE_PREFIX, trimmed))
    }
}

/// Lazily built service handles keyed by canonical name.
///
/// A handle is constructed at most once per key, even when several callers
/// ask for the same key concurrently, and is never replaced afterwards.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `name`, or builds one with `create`.
    ///
    /// `create` only runs on a miss, so anything it captures (such as
    /// per-call options) is ignored once the key is cached.
    pub fn get_or_create<F>(&self, name: &str, create: F) -> Result<Arc<Service>>
    where
        F: FnOnce(String) -> Service,
    {
        let key = canonical_name(name)?;

        if let Some(service) = self.services.get(&key) {
            debug!(service = %key, "Service cache hit");
            return Ok(service.value().clone());
        }

        // The entry holds its shard lock while `create` runs.
        let service = self
            .services
            .entry(key.clone())
            .or_insert_with(|| Arc::new(create(key)))
            .value()
            .clone();

        Ok(service)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        canonical_name(name)
            .map(|key| self.services.contains_key(&key))
            .unwrap_or(false)
    }
}
