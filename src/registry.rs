use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::adapters::{Adapter, AdapterKind};
use crate::config::{AdapterConfig, AdapterSpec};
use crate::error::LocusError;

/// Namespace to adapter lookup shared by every request.
#[derive(Clone, Default)]
pub struct DataSources {
    sources: BTreeMap<String, Arc<dyn Adapter>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<A: Adapter + 'static>(&mut self, namespace: &str, adapter: A) -> &mut Self {
        self.add_arc(namespace, Arc::new(adapter))
    }

    /// Registers an adapter, replacing any earlier one under `namespace`.
    pub fn add_arc(&mut self, namespace: &str, adapter: Arc<dyn Adapter>) -> &mut Self {
        self.sources.insert(namespace.to_string(), adapter);
        self
    }

    /// Builds an adapter from its `[type_name, config]` description.
    pub fn add_spec(&mut self, namespace: &str, spec: AdapterSpec) -> Result<&mut Self, LocusError> {
        let kind: AdapterKind = spec.type_name().parse()?;
        let config: AdapterConfig = spec.1.into_config();
        let adapter = kind.build(config)?;
        Ok(self.add_arc(namespace, adapter))
    }

    /// Adds every `namespace -> [type_name, config]` entry of a JSON object.
    pub fn set_sources_json(&mut self, sources: &Value) -> Result<&mut Self, LocusError> {
        let Value::Object(entries) = sources else {
            return Err(LocusError::Configuration(
                "sources must be a JSON object of namespace to [type, config]".to_string(),
            ));
        };
        for (namespace, entry) in entries {
            let spec: AdapterSpec = serde_json::from_value(entry.clone()).map_err(|err| {
                LocusError::Configuration(format!("invalid source {namespace}: {err}"))
            })?;
            self.add_spec(namespace, spec)?;
        }
        Ok(self)
    }

    pub fn from_json(sources: &Value) -> Result<Self, LocusError> {
        let mut registry = Self::new();
        registry.set_sources_json(sources)?;
        Ok(registry)
    }

    pub fn get_source(&self, namespace: &str) -> Result<Arc<dyn Adapter>, LocusError> {
        self.sources
            .get(namespace)
            .cloned()
            .ok_or_else(|| LocusError::MissingSource(namespace.to_string()))
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.sources.contains_key(namespace)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Drops cached payloads of every adapter.
    pub fn clear_caches(&self) {
        for adapter in self.sources.values() {
            adapter.clear_cache();
        }
    }

    pub fn to_specs(&self) -> BTreeMap<String, AdapterSpec> {
        self.sources
            .iter()
            .map(|(namespace, adapter)| (namespace.clone(), adapter.to_spec()))
            .collect()
    }

    pub fn to_json(&self) -> Result<Value, LocusError> {
        serde_json::to_value(self.to_specs())
            .map_err(|err| LocusError::Format(format!("cannot serialize sources: {err}")))
    }
}

impl std::fmt::Debug for DataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.sources
                    .iter()
                    .map(|(namespace, adapter)| (namespace, adapter.kind())),
            )
            .finish()
    }
}
