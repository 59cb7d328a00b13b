use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheMeta, DEFAULT_CACHE_SIZE, RegionCache};
use crate::config::AdapterConfig;
use crate::domain::Region;
use crate::error::LocusError;
use crate::record::{Record, limit_records, namespace_records};

use super::AdapterRequest;

/// Cache and output shaping shared by every adapter.
pub struct AdapterCore {
    config: AdapterConfig,
    prefix_namespace: bool,
    contract: BTreeSet<String>,
    cache: Mutex<RegionCache>,
}

impl AdapterCore {
    pub fn new(config: AdapterConfig, default_fields: &[&str]) -> Self {
        let contract = match &config.fields {
            Some(fields) => fields.iter().cloned().collect(),
            None => default_fields.iter().map(|field| field.to_string()).collect(),
        };
        let prefix_namespace = config.prefix_namespace.unwrap_or(true);
        let cache = RegionCache::new(config.cache_size.unwrap_or(DEFAULT_CACHE_SIZE));
        Self {
            config,
            prefix_namespace,
            contract,
            cache: Mutex::new(cache),
        }
    }

    /// For payloads that renderers consume in their native shape.
    pub fn without_namespace(mut self) -> Self {
        self.prefix_namespace = false;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn prefix_namespace(&self) -> bool {
        self.prefix_namespace
    }

    pub fn require_url(&self) -> Result<&str, LocusError> {
        self.config
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                LocusError::Configuration("source not initialized with required URL".to_string())
            })
    }

    pub fn output_name(&self, namespace: &str, field: &str) -> String {
        if self.prefix_namespace {
            format!("{namespace}.{field}")
        } else {
            field.to_string()
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    /// A cached superset of the view region is served without I/O.
    pub fn fetch_region<F>(
        &self,
        request: &AdapterRequest<'_>,
        discriminants: Vec<String>,
        fetch: F,
    ) -> Result<Vec<Record>, LocusError>
    where
        F: FnOnce(&Region) -> Result<Vec<Record>, LocusError>,
    {
        let query = CacheMeta::region(request.state.region(), discriminants);
        self.fetch_cached(request, query, |meta| match &meta.region {
            Some(region) => fetch(region),
            None => Err(LocusError::Configuration(
                "region query without a region".to_string(),
            )),
        })
    }

    pub fn fetch_exact<F>(
        &self,
        request: &AdapterRequest<'_>,
        discriminants: Vec<String>,
        fetch: F,
    ) -> Result<Vec<Record>, LocusError>
    where
        F: FnOnce() -> Result<Vec<Record>, LocusError>,
    {
        self.fetch_cached(request, CacheMeta::exact(discriminants), |_| fetch())
    }

    fn fetch_cached<F>(
        &self,
        request: &AdapterRequest<'_>,
        query: CacheMeta,
        fetch: F,
    ) -> Result<Vec<Record>, LocusError>
    where
        F: FnOnce(&CacheMeta) -> Result<Vec<Record>, LocusError>,
    {
        // Held for the whole check-fetch-insert sequence.
        let mut cache = self.cache.lock();
        let effective = cache.resolve(&query);
        if let Some(entry) = cache.get(&effective) {
            debug!(namespace = request.namespace, key = %effective.key(), "cache hit");
            return Ok(self.finish(request, entry.data.clone()));
        }

        request.deadline.check()?;
        debug!(namespace = request.namespace, key = %effective.key(), "cache miss");
        let records = fetch(&effective)?;
        cache.insert(effective, records.clone());
        Ok(self.finish(request, records))
    }

    /// Applies the fields contract and namespacing to normalized records.
    pub fn finish(&self, request: &AdapterRequest<'_>, records: Vec<Record>) -> Vec<Record> {
        let limit = self.config.limit_fields.unwrap_or(false);
        let allowed = limit.then(|| {
            let mut allowed = self.contract.clone();
            allowed.extend(request.fields.fields.iter().cloned());
            allowed
        });

        match (self.prefix_namespace, allowed) {
            (true, allowed) => namespace_records(records, request.namespace, allowed.as_ref()),
            (false, Some(allowed)) => limit_records(records, &allowed),
            (false, None) => records,
        }
    }
}
