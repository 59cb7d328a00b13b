use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::{Region, ViewState};
use crate::error::LocusError;

use super::{
    Adapter, AdapterCore, AdapterKind, AdapterRequest, BuildOrSource, fetch_rows,
    validate_build_source,
};

/// Gene models. The payload is nested (transcripts, exons) and is passed on
/// without namespacing.
pub struct GeneLZ {
    core: AdapterCore,
}

impl GeneLZ {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, &[]).without_namespace();
        core.require_url()?;
        Ok(Self { core })
    }

    pub fn url(&self, state: &ViewState, region: &Region) -> Result<String, LocusError> {
        let selector = validate_build_source("GeneLZ", state, self.core.config())?;
        self.url_for(&selector, region)
    }

    fn url_for(&self, selector: &BuildOrSource, region: &Region) -> Result<String, LocusError> {
        let base = self.core.require_url()?;
        let source_query = match selector {
            BuildOrSource::Build(build) => format!("&build={build}"),
            BuildOrSource::Source(source) => format!(" and source in {source}"),
        };
        Ok(format!(
            "{base}?filter=chrom eq '{}' and start le {} and end ge {}{source_query}",
            region.chr, region.end, region.start
        ))
    }
}

impl Adapter for GeneLZ {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Gene
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let selector = validate_build_source("GeneLZ", request.state, self.core.config())?;
        let records = self
            .core
            .fetch_region(request, vec![selector.discriminant()], |region| {
                let url = self.url_for(&selector, region)?;
                fetch_rows(request.transport, &url)
            })?;
        Ok(chain.replace_body(request.namespace, records))
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}
