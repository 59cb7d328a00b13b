use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::ViewState;
use crate::error::LocusError;

use super::{Adapter, AdapterCore, AdapterKind, AdapterRequest, fetch_rows, parse_base_url};

const PHEWAS_FIELDS: &[&str] = &["id", "trait_label", "trait_group", "log_pvalue"];

/// Phenome-wide results for a single variant. The cache is keyed by the
/// request URL, not by region.
pub struct PheWASLZ {
    core: AdapterCore,
}

impl PheWASLZ {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, PHEWAS_FIELDS);
        core.require_url()?;
        Ok(Self { core })
    }

    fn builds(&self, state: &ViewState) -> Result<Vec<String>, LocusError> {
        let builds = match state.genome_build {
            Some(build) => vec![build.to_string()],
            None => self
                .core
                .config()
                .params
                .build
                .as_ref()
                .map(|build| build.all())
                .unwrap_or_default(),
        };
        if builds.is_empty() {
            return Err(LocusError::Configuration(
                "Adapter PheWASLZ requires that you specify array of one or more desired genome build names"
                    .to_string(),
            ));
        }
        Ok(builds)
    }

    pub fn url(&self, state: &ViewState) -> Result<String, LocusError> {
        let builds = self.builds(state)?;
        let variant = state.variant.as_deref().ok_or_else(|| {
            LocusError::Configuration("PheWASLZ requires a variant in the view state".to_string())
        })?;
        let base = self.core.require_url()?;

        let mut url = parse_base_url(base, "")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("filter", &format!("variant eq '{variant}'"))
                .append_pair("format", "objects");
            for build in &builds {
                query.append_pair("build", build);
            }
        }
        Ok(url.to_string())
    }
}

impl Adapter for PheWASLZ {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Phewas
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let url = self.url(request.state)?;
        let records = self
            .core
            .fetch_exact(request, vec![url.clone()], || fetch_rows(request.transport, &url))?;
        Ok(chain.replace_body(request.namespace, records))
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}
