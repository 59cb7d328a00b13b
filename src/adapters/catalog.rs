use tracing::debug;

use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::{Region, ViewState};
use crate::error::LocusError;
use crate::join::{CATALOG_MATCH_COUNT, combine_chain_body};

use super::{
    Adapter, AdapterCore, AdapterKind, AdapterRequest, BuildOrSource, Dependency, fetch_rows,
    validate_build_source,
};

const CATALOG_FIELDS: &[&str] = &["rsid", "trait", "log_pvalue", "chrom", "pos"];
const CATALOG_ANNOTATIONS: &[&str] = &["rsid", "trait", "log_pvalue"];

/// GWAS catalog hits, aligned to earlier association rows by position.
///
/// The catalog may use rsIDs that match several alt alleles, so rows are
/// joined on position alone and each association row carries its single most
/// significant catalog hit.
pub struct GwasCatalogLZ {
    core: AdapterCore,
}

impl GwasCatalogLZ {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, CATALOG_FIELDS);
        core.require_url()?;
        if let Some(match_type) = core.config().params.match_type.as_deref() {
            if match_type != "loose" {
                return Err(LocusError::Configuration(format!(
                    "GwasCatalogLZ does not support match_type {match_type:?}"
                )));
            }
        }
        Ok(Self { core })
    }

    pub fn url(&self, state: &ViewState, region: &Region) -> Result<String, LocusError> {
        let selector = validate_build_source("GwasCatalogLZ", state, self.core.config())?;
        self.url_for(&selector, region)
    }

    fn url_for(&self, selector: &BuildOrSource, region: &Region) -> Result<String, LocusError> {
        let base = self.core.require_url()?;
        let source_query = match selector {
            BuildOrSource::Build(build) => format!("&build={build}"),
            BuildOrSource::Source(source) => format!(" and id eq {source}"),
        };
        Ok(format!(
            "{base}?format=objects&sort=pos&filter=chrom eq '{}' and pos ge {} and pos le {}{source_query}",
            region.chr, region.start, region.end
        ))
    }

    /// Annotation fields to copy: the requested ones, or the default set.
    fn annotation_fields(&self, request: &AdapterRequest<'_>) -> Vec<String> {
        if request.fields.fields.is_empty() {
            CATALOG_ANNOTATIONS.iter().map(|field| field.to_string()).collect()
        } else {
            request.fields.fields.clone()
        }
    }
}

impl Adapter for GwasCatalogLZ {
    fn kind(&self) -> AdapterKind {
        AdapterKind::GwasCatalog
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn dependency(&self) -> Dependency {
        Dependency::Optional
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let selector = validate_build_source("GwasCatalogLZ", request.state, self.core.config())?;
        let records = self
            .core
            .fetch_region(request, vec![selector.discriminant()], |region| {
                let url = self.url_for(&selector, region)?;
                fetch_rows(request.transport, &url)
            })?;

        if chain.upstream().is_none() {
            return Ok(chain.replace_body(request.namespace, records));
        }

        let src_fields = self.annotation_fields(request);
        let dest_fields: Vec<String> = src_fields
            .iter()
            .map(|field| self.core.output_name(request.namespace, field))
            .collect();
        debug!(
            namespace = request.namespace,
            hits = records.len(),
            "annotating chain with catalog hits"
        );

        let mut chain = chain;
        let body = std::mem::take(&mut chain.body);
        chain.body = combine_chain_body(
            &records,
            body,
            &src_fields,
            &dest_fields,
            CATALOG_MATCH_COUNT,
        )?;
        chain.record_discrete(request.namespace, records);
        Ok(chain)
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}
