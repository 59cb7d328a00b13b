use std::collections::BTreeMap;
use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LocusError;
use crate::registry::DataSources;

pub const DEFAULT_CONFIG_FILE: &str = "locus-data.json";

/// A `build` option: one genome build name, or several (PheWAS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildParam {
    One(String),
    Many(Vec<String>),
}

impl BuildParam {
    pub fn single(&self) -> Option<&str> {
        match self {
            BuildParam::One(build) => Some(build.as_str()),
            BuildParam::Many(builds) => builds.first().map(String::as_str),
        }
    }

    pub fn all(&self) -> Vec<String> {
        match self {
            BuildParam::One(build) => vec![build.clone()],
            BuildParam::Many(builds) => builds.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdapterParams {
    pub fn is_empty(&self) -> bool {
        self == &AdapterParams::default()
    }

    /// `source` as text; numeric dataset IDs are rendered as-is.
    pub fn source_text(&self) -> Option<String> {
        match self.source.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "AdapterParams::is_empty")]
    pub params: AdapterParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_namespace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_fields: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
}

impl AdapterConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdapterEntry {
    Shorthand(String),
    Detailed(AdapterConfig),
}

impl AdapterEntry {
    pub fn into_config(self) -> AdapterConfig {
        match self {
            AdapterEntry::Shorthand(url) => AdapterConfig::with_url(url),
            AdapterEntry::Detailed(config) => config,
        }
    }
}

/// Declarative `[type_name, config]` description of one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSpec(pub String, pub AdapterEntry);

impl AdapterSpec {
    pub fn new(type_name: impl Into<String>, config: AdapterConfig) -> Self {
        Self(type_name.into(), AdapterEntry::Detailed(config))
    }

    pub fn type_name(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub sources: BTreeMap<String, AdapterSpec>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<DataSources, LocusError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(LocusError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| LocusError::ConfigRead(config_path.clone()))?;
        Self::resolve_str(&content)
    }

    pub fn resolve_str(content: &str) -> Result<DataSources, LocusError> {
        let config: Config =
            serde_json::from_str(content).map_err(|err| LocusError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<DataSources, LocusError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(LocusError::Configuration(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let mut sources = DataSources::new();
        for (namespace, spec) in config.sources {
            sources.add_spec(&namespace, spec)?;
        }
        Ok(sources)
    }
}
