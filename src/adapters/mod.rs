//! Data adapters: one per kind of remote (or static) dataset.
//!
//! Every adapter owns an [`AdapterCore`], which provides the shared
//! cache/normalize/namespace behaviour, and implements [`Adapter`] on top of
//! it. Adapters are usually built declaratively from a `[type_name, config]`
//! pair through [`AdapterKind`].

mod association;
mod base;
mod catalog;
mod constraint;
mod gene;
mod ld;
mod phewas;
mod recomb;
mod static_source;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::chain::Chain;
use crate::config::{AdapterConfig, AdapterEntry, AdapterSpec};
use crate::control::Deadline;
use crate::domain::{GenomeBuild, ViewState};
use crate::error::LocusError;
use crate::fields::FieldGroup;
use crate::record::{Record, normalize_response};
use crate::transport::Transport;

pub use association::AssociationLZ;
pub use base::AdapterCore;
pub use catalog::GwasCatalogLZ;
pub use constraint::{ConstraintRequest, GeneConstraintLZ, MAX_CONSTRAINT_GENES};
pub use gene::GeneLZ;
pub use ld::{LdRequest, LDServer};
pub use phewas::PheWASLZ;
pub use recomb::RecombLZ;
pub use static_source::StaticSource;

/// How an adapter relates to the steps requested before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// Produces a fresh body from its own data.
    Independent,
    /// Cannot build a request without upstream records.
    Required,
    /// Annotates upstream records when there are any.
    Optional,
}

/// Everything an adapter needs for one invocation.
pub struct AdapterRequest<'a> {
    pub namespace: &'a str,
    pub state: &'a ViewState,
    pub fields: &'a FieldGroup,
    pub transport: &'a dyn Transport,
    pub deadline: &'a Deadline,
}

pub trait Adapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    fn config(&self) -> &AdapterConfig;

    fn dependency(&self) -> Dependency {
        Dependency::Independent
    }

    /// Fetches this adapter's records and folds them into `chain`.
    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError>;

    fn clear_cache(&self);

    fn to_spec(&self) -> AdapterSpec {
        AdapterSpec(
            self.kind().type_name().to_string(),
            AdapterEntry::Detailed(self.config().clone()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Association,
    Ld,
    Gene,
    GeneConstraint,
    GwasCatalog,
    Recomb,
    Phewas,
    Static,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 8] = [
        AdapterKind::Association,
        AdapterKind::Ld,
        AdapterKind::Gene,
        AdapterKind::GeneConstraint,
        AdapterKind::GwasCatalog,
        AdapterKind::Recomb,
        AdapterKind::Phewas,
        AdapterKind::Static,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            AdapterKind::Association => "AssociationLZ",
            AdapterKind::Ld => "LDServer",
            AdapterKind::Gene => "GeneLZ",
            AdapterKind::GeneConstraint => "GeneConstraintLZ",
            AdapterKind::GwasCatalog => "GwasCatalogLZ",
            AdapterKind::Recomb => "RecombLZ",
            AdapterKind::Phewas => "PheWASLZ",
            AdapterKind::Static => "StaticSource",
        }
    }

    pub fn build(&self, config: AdapterConfig) -> Result<Arc<dyn Adapter>, LocusError> {
        Ok(match self {
            AdapterKind::Association => Arc::new(AssociationLZ::new(config)?),
            AdapterKind::Ld => Arc::new(LDServer::new(config)?),
            AdapterKind::Gene => Arc::new(GeneLZ::new(config)?),
            AdapterKind::GeneConstraint => Arc::new(GeneConstraintLZ::new(config)?),
            AdapterKind::GwasCatalog => Arc::new(GwasCatalogLZ::new(config)?),
            AdapterKind::Recomb => Arc::new(RecombLZ::new(config)?),
            AdapterKind::Phewas => Arc::new(PheWASLZ::new(config)?),
            AdapterKind::Static => Arc::new(StaticSource::new(config)?),
        })
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for AdapterKind {
    type Err = LocusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "AssociationLZ" => Ok(AdapterKind::Association),
            "LDServer" | "LDLZ" => Ok(AdapterKind::Ld),
            "GeneLZ" => Ok(AdapterKind::Gene),
            "GeneConstraintLZ" => Ok(AdapterKind::GeneConstraint),
            "GwasCatalogLZ" => Ok(AdapterKind::GwasCatalog),
            "RecombLZ" => Ok(AdapterKind::Recomb),
            "PheWASLZ" => Ok(AdapterKind::Phewas),
            "StaticSource" | "StaticJSON" => Ok(AdapterKind::Static),
            other => Err(LocusError::UnknownAdapterType(other.to_string())),
        }
    }
}

/// Resolves the effective build from view state or config, then enforces
/// that exactly one of build and source is set.
pub(crate) fn validate_build_source(
    adapter: &str,
    state: &ViewState,
    config: &AdapterConfig,
) -> Result<BuildOrSource, LocusError> {
    let build = match state.genome_build {
        Some(build) => Some(build.as_str().to_string()),
        None => config
            .params
            .build
            .as_ref()
            .and_then(|build| build.single())
            .map(str::to_string),
    };
    let source = config.params.source_text();

    match (build, source) {
        (Some(build), None) => Ok(BuildOrSource::Build(build.parse().map_err(|_| {
            LocusError::Configuration(format!("{adapter} must specify a valid 'genome_build'"))
        })?)),
        (None, Some(source)) => Ok(BuildOrSource::Source(source)),
        _ => Err(LocusError::Configuration(format!(
            "{adapter} must provide a parameter specifying either \"build\" or \"source\". It should not specify both."
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BuildOrSource {
    Build(GenomeBuild),
    Source(String),
}

impl BuildOrSource {
    pub(crate) fn discriminant(&self) -> String {
        match self {
            BuildOrSource::Build(build) => format!("build={build}"),
            BuildOrSource::Source(source) => format!("source={source}"),
        }
    }
}

/// GET `url`, fail on a non-2xx status, and normalize the payload to rows.
pub(crate) fn fetch_rows(transport: &dyn Transport, url: &str) -> Result<Vec<Record>, LocusError> {
    let response = transport.get(url)?.error_for_status(url)?;
    normalize_response(response.json()?)
}

pub(crate) fn parse_base_url(base: &str, path: &str) -> Result<reqwest::Url, LocusError> {
    reqwest::Url::parse(&format!("{base}{path}"))
        .map_err(|err| LocusError::Configuration(format!("invalid url {base}{path}: {err}")))
}
