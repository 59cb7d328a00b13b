use std::collections::VecDeque;

use crate::domain::Region;
use crate::record::Record;

pub const DEFAULT_CACHE_SIZE: usize = 3;

/// What a cached payload was fetched for: an optional region plus any
/// adapter-specific discriminants (LD panel, reference variant, URL...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMeta {
    pub region: Option<Region>,
    pub discriminants: Vec<String>,
}

impl CacheMeta {
    pub fn region(region: Region, discriminants: Vec<String>) -> Self {
        Self {
            region: Some(region),
            discriminants,
        }
    }

    pub fn exact(discriminants: Vec<String>) -> Self {
        Self {
            region: None,
            discriminants,
        }
    }

    /// Whether a payload stored under `self` can answer a request for `query`.
    fn covers(&self, query: &CacheMeta) -> bool {
        if self.discriminants != query.discriminants {
            return false;
        }
        match (&self.region, &query.region) {
            (Some(stored), Some(requested)) => stored.contains(requested),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn key(&self) -> String {
        let mut parts = Vec::with_capacity(self.discriminants.len() + 3);
        if let Some(region) = &self.region {
            parts.push(region.chr.clone());
            parts.push(region.start.to_string());
            parts.push(region.end.to_string());
        }
        parts.extend(self.discriminants.iter().cloned());
        parts.join("_")
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub metadata: CacheMeta,
    pub data: Vec<Record>,
}

/// Superset-aware cache of normalized records with LRU eviction.
///
/// The most recently used entry is kept at the front.
#[derive(Debug)]
pub struct RegionCache {
    capacity: usize,
    entries: VecDeque<CacheEntry>,
}

impl RegionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the effective metadata for `query`: the covering entry's
    /// metadata when one exists, otherwise `query` itself.
    pub fn resolve(&self, query: &CacheMeta) -> CacheMeta {
        self.entries
            .iter()
            .find(|entry| entry.metadata.covers(query))
            .map(|entry| entry.metadata.clone())
            .unwrap_or_else(|| query.clone())
    }

    pub fn get(&mut self, metadata: &CacheMeta) -> Option<&CacheEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.metadata == metadata)?;
        if index != 0 {
            let entry = self.entries.remove(index)?;
            self.entries.push_front(entry);
        }
        self.entries.front()
    }

    pub fn insert(&mut self, metadata: CacheMeta, data: Vec<Record>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|entry| entry.metadata != metadata);
        self.entries.push_front(CacheEntry { metadata, data });
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for RegionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}
