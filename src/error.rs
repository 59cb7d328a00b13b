use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LocusError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unable to resolve {0} data source")]
    UnknownAdapterType(String),

    #[error("data source for namespace {0} not found")]
    MissingSource(String),

    #[error("request to {url} failed with status {status}")]
    Network { status: u16, url: String },

    #[error("HTTP transport failed: {0}")]
    Http(String),

    #[error("unexpected response shape: {0}")]
    ResponseShape(String),

    #[error("dependency error: {0}")]
    Dependency(String),

    #[error("invalid format: {0}")]
    Format(String),

    #[error("missing config file locus-data.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0} ms")]
    TimedOut(u128),
}

impl LocusError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LocusError::Configuration(_)
                | LocusError::UnknownAdapterType(_)
                | LocusError::MissingSource(_)
                | LocusError::MissingConfig
                | LocusError::ConfigRead(_)
                | LocusError::ConfigParse(_)
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(self, LocusError::Network { .. } | LocusError::Http(_))
    }
}
