use std::collections::BTreeSet;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::{GenomeBuild, ViewState};
use crate::error::LocusError;
use crate::join::{constraint_alias, merge_gene_constraint};
use crate::record::{Record, find_prefixed_key};

use super::{Adapter, AdapterCore, AdapterKind, AdapterRequest, Dependency};

/// Larger batches are not sent; the gnomAD API rejects very long queries.
pub const MAX_CONSTRAINT_GENES: usize = 25;

const CONSTRAINT_METRICS: &str = "exp_syn obs_syn syn_z oe_syn oe_syn_lower oe_syn_upper \
exp_mis obs_mis mis_z oe_mis oe_mis_lower oe_mis_upper \
exp_lof obs_lof pLI oe_lof oe_lof_lower oe_lof_upper";

/// One batched GraphQL lookup for every distinct gene symbol upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRequest {
    pub build: GenomeBuild,
    /// Distinct symbols, in the order they first appear.
    pub genes: Vec<String>,
    pub query: Vec<String>,
}

impl ConstraintRequest {
    /// gnomAD only serves constraint metrics against GRCh37.
    pub fn should_skip(&self) -> bool {
        self.genes.is_empty()
            || self.genes.len() > MAX_CONSTRAINT_GENES
            || self.build != GenomeBuild::Grch37
    }

    pub fn body(&self) -> Value {
        json!({ "query": format!("{{{} }}", self.query.join(" ")) })
    }
}

/// gnomAD gene constraint metrics, merged into the gene records already in
/// the chain.
pub struct GeneConstraintLZ {
    core: AdapterCore,
}

impl GeneConstraintLZ {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, &[]).without_namespace();
        core.require_url()?;
        Ok(Self { core })
    }

    pub fn build_request_options(
        &self,
        state: &ViewState,
        upstream: Option<&[Record]>,
    ) -> Result<ConstraintRequest, LocusError> {
        let build = match state.genome_build {
            Some(build) => build,
            None => self
                .core
                .config()
                .params
                .build
                .as_ref()
                .and_then(|build| build.single())
                .ok_or_else(|| {
                    LocusError::Configuration(
                        "Adapter GeneConstraintLZ must specify a 'genome_build' option".to_string(),
                    )
                })?
                .parse()?,
        };

        let upstream = upstream.ok_or_else(|| {
            LocusError::Dependency("gene constraint request must depend on gene data".to_string())
        })?;
        let mut seen = BTreeSet::new();
        let mut genes = Vec::new();
        if let Some(first) = upstream.first() {
            let name_key = find_prefixed_key(first, "gene_name")?;
            for gene in upstream {
                let Some(symbol) = gene.get(name_key).and_then(Value::as_str) else {
                    continue;
                };
                if seen.insert(symbol.to_string()) {
                    genes.push(symbol.to_string());
                }
            }
        }

        let query = genes
            .iter()
            .map(|symbol| {
                format!(
                    "{}: gene(gene_symbol: \"{symbol}\", reference_genome: {build}) {{ gnomad_constraint {{ {CONSTRAINT_METRICS} }} }} ",
                    constraint_alias(symbol)
                )
            })
            .collect();

        Ok(ConstraintRequest { build, genes, query })
    }

    /// Posts the batched query. Any failure yields no constraint data.
    fn fetch_constraint(
        &self,
        request: &AdapterRequest<'_>,
        options: &ConstraintRequest,
    ) -> Result<Vec<Record>, LocusError> {
        let url = self.core.require_url()?;
        let response = match request.transport.post_json(url, &options.body()) {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, url, "gene constraint lookup failed");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(error = %err, url, "gene constraint lookup failed");
                return Ok(Vec::new());
            }
        };
        match response.json() {
            Ok(mut payload) => match payload.get_mut("data").map(Value::take) {
                Some(Value::Object(data)) => Ok(vec![data]),
                _ => Ok(Vec::new()),
            },
            Err(err) => {
                warn!(error = %err, url, "gene constraint response was not JSON");
                Ok(Vec::new())
            }
        }
    }
}

impl Adapter for GeneConstraintLZ {
    fn kind(&self) -> AdapterKind {
        AdapterKind::GeneConstraint
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn dependency(&self) -> Dependency {
        Dependency::Required
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let mut chain = chain;
        let options = self.build_request_options(request.state, chain.upstream())?;
        if options.should_skip() {
            debug!(
                namespace = request.namespace,
                genes = options.genes.len(),
                build = %options.build,
                "skipping gene constraint lookup"
            );
            chain.record_discrete(request.namespace, Vec::new());
            return Ok(chain);
        }

        let discriminants = vec![options.build.to_string(), options.genes.join(",")];
        let records = self.core.fetch_region(request, discriminants, |_| {
            self.fetch_constraint(request, &options)
        })?;

        if let Some(constraint) = records.first() {
            merge_gene_constraint(&mut chain.body, constraint)?;
        }
        chain.record_discrete(request.namespace, records);
        Ok(chain)
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}
