use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::error::LocusError;
use crate::record::{Record, normalize_response};

use super::{Adapter, AdapterCore, AdapterKind, AdapterRequest};

/// Fixed in-memory records, returned for every region.
pub struct StaticSource {
    core: AdapterCore,
    records: Vec<Record>,
}

impl StaticSource {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let data = config.data.clone().ok_or_else(|| {
            LocusError::Configuration("StaticSource must provide data to return".to_string())
        })?;
        let records = normalize_response(data)?;
        let core = AdapterCore::new(config, &[]);
        Ok(Self { core, records })
    }
}

impl Adapter for StaticSource {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Static
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let records = self.core.finish(request, self.records.clone());
        Ok(chain.replace_body(request.namespace, records))
    }

    fn clear_cache(&self) {}
}
