use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::Region;
use crate::error::LocusError;

use super::{Adapter, AdapterCore, AdapterKind, AdapterRequest, fetch_rows};

const ASSOCIATION_FIELDS: &[&str] = &["variant", "position", "log_pvalue", "ref_allele"];

/// Association summary statistics from a PortalDev-compatible API.
pub struct AssociationLZ {
    core: AdapterCore,
    source: String,
}

impl AssociationLZ {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, ASSOCIATION_FIELDS);
        core.require_url()?;
        let source = core.config().params.source_text().ok_or_else(|| {
            LocusError::Configuration(
                "Association adapter must specify dataset ID via \"source\" option".to_string(),
            )
        })?;
        Ok(Self { core, source })
    }

    pub fn url(&self, region: &Region) -> Result<String, LocusError> {
        let base = self.core.require_url()?;
        Ok(format!(
            "{base}results/?filter=analysis in {} and chromosome in  '{}' and position ge {} and position le {}",
            self.source, region.chr, region.start, region.end
        ))
    }

    pub fn core(&self) -> &AdapterCore {
        &self.core
    }
}

impl Adapter for AssociationLZ {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Association
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let records = self.core.fetch_region(request, Vec::new(), |region| {
            let url = self.url(region)?;
            fetch_rows(request.transport, &url)
        })?;
        Ok(chain.replace_body(request.namespace, records))
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}
