use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::chain::Chain;
use crate::config::AdapterConfig;
use crate::domain::{GenomeBuild, Region, Variant, ViewState};
use crate::error::LocusError;
use crate::join::{ordered_merge, position_key};
use crate::record::{Record, find_prefixed_key, find_prefixed_key_opt, normalize_response, numeric};

use super::{Adapter, AdapterCore, AdapterKind, AdapterRequest, Dependency, parse_base_url};

// item1 = refvar, item2 = othervar
const LD_FIELDS: &[&str] = &["chromosome2", "position2", "variant2", "correlation"];

pub const REFVAR_FLAG: &str = "lz_is_ld_refvar";
const DEFAULT_PANEL: &str = "1000G";
const GRCH38_PANEL: &str = "1000G-FRZ09";
const DEFAULT_POPULATION: &str = "ALL";
const DEFAULT_METHOD: &str = "rsquare";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdRequest {
    pub genome_build: GenomeBuild,
    pub ld_source: String,
    pub ld_population: String,
    /// Normalized reference variant; `None` when the request is skipped.
    pub ld_refvar: Option<String>,
    pub skip_request: bool,
}

/// Linkage disequilibrium relative to one reference variant, from the UM
/// LDServer. Must follow an association step.
pub struct LDServer {
    core: AdapterCore,
}

impl LDServer {
    pub fn new(config: AdapterConfig) -> Result<Self, LocusError> {
        let core = AdapterCore::new(config, LD_FIELDS);
        core.require_url()?;
        Ok(Self { core })
    }

    /// Picks the reference variant and flags the chosen association row.
    ///
    /// An explicit `state.ldrefvar` wins; otherwise the row with the largest
    /// `log_pvalue` is used, the earliest one on ties.
    pub fn find_ld_refvar(
        &self,
        state: &ViewState,
        assoc_data: &mut [Record],
    ) -> Result<String, LocusError> {
        let first = assoc_data.first().ok_or_else(|| {
            LocusError::Dependency("no association data to pick a reference variant".to_string())
        })?;
        let variant_key = find_prefixed_key(first, "variant")?.to_string();
        let logp_key = find_prefixed_key(first, "log_pvalue")?.to_string();

        let (refvar, best_hit) = match &state.ldrefvar {
            Some(refvar) => {
                let hit = assoc_data.iter().position(|item| {
                    item.get(&variant_key).and_then(Value::as_str) == Some(refvar.as_str())
                });
                (Some(refvar.clone()), hit)
            }
            None => {
                let mut best_logp = f64::NEG_INFINITY;
                let mut best_hit = None;
                for (index, item) in assoc_data.iter().enumerate() {
                    let Some(log_pvalue) = item.get(&logp_key).and_then(numeric) else {
                        continue;
                    };
                    if log_pvalue > best_logp {
                        best_logp = log_pvalue;
                        best_hit = Some(index);
                    }
                }
                let refvar = best_hit.and_then(|index| {
                    assoc_data[index]
                        .get(&variant_key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
                (refvar, best_hit)
            }
        };

        if let Some(index) = best_hit {
            assoc_data[index].insert(REFVAR_FLAG.to_string(), Value::Bool(true));
        }

        let refvar = refvar.ok_or_else(|| {
            LocusError::Format(
                "could not request LD for a missing or incomplete marker format".to_string(),
            )
        })?;
        let variant: Variant = refvar.parse()?;
        Ok(variant.canonical())
    }

    pub fn build_request_options(
        &self,
        state: &ViewState,
        assoc_data: Option<&mut Vec<Record>>,
    ) -> Result<LdRequest, LocusError> {
        let assoc_data = assoc_data.ok_or_else(|| {
            LocusError::Dependency("LD request must depend on association data".to_string())
        })?;
        let params = &self.core.config().params;
        let mut ld_source = state
            .ld_source
            .clone()
            .or_else(|| params.source_text())
            .unwrap_or_else(|| DEFAULT_PANEL.to_string());
        let ld_population = state
            .ld_pop
            .clone()
            .or_else(|| params.population.clone())
            .unwrap_or_else(|| DEFAULT_POPULATION.to_string());

        if assoc_data.is_empty() {
            return Ok(LdRequest {
                genome_build: state.genome_build.unwrap_or(GenomeBuild::Grch37),
                ld_source,
                ld_population,
                ld_refvar: None,
                skip_request: true,
            });
        }

        let genome_build = match state.genome_build {
            Some(build) => build,
            None => match params.build.as_ref().and_then(|build| build.single()) {
                Some(build) => build.parse().map_err(|_| {
                    LocusError::Configuration(
                        "LDServer must specify a valid 'genome_build'".to_string(),
                    )
                })?,
                None => GenomeBuild::Grch37,
            },
        };

        // A newer whole-genome 1000G panel exists for build 38 only.
        if ld_source == DEFAULT_PANEL && genome_build == GenomeBuild::Grch38 {
            ld_source = GRCH38_PANEL.to_string();
        }

        let ld_refvar = self.find_ld_refvar(state, assoc_data)?;
        Ok(LdRequest {
            genome_build,
            ld_source,
            ld_population,
            ld_refvar: Some(ld_refvar),
            skip_request: false,
        })
    }

    pub fn url(&self, options: &LdRequest, region: &Region) -> Result<String, LocusError> {
        let base = self.core.require_url()?;
        let method = self
            .core
            .config()
            .params
            .method
            .as_deref()
            .unwrap_or(DEFAULT_METHOD);
        let refvar = options.ld_refvar.as_deref().unwrap_or_default();

        let path = format!(
            "genome_builds/{}/references/{}/populations/{}/variants",
            options.genome_build, options.ld_source, options.ld_population
        );
        let mut url = parse_base_url(base, &path)?;
        url.query_pairs_mut()
            .append_pair("correlation", method)
            .append_pair("variant", refvar)
            .append_pair("chrom", &region.chr)
            .append_pair("start", &region.start.to_string())
            .append_pair("stop", &region.end.to_string());
        Ok(url.to_string())
    }

    /// Follows `next` links, concatenating each page's columns.
    fn fetch_pages(&self, request: &AdapterRequest<'_>, url: String) -> Result<Vec<Record>, LocusError> {
        let mut combined = Map::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            request.deadline.check()?;
            let response = request.transport.get(&url)?.error_for_status(&url)?;
            let mut payload = response.json()?;
            next = payload
                .get("next")
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);

            let Some(Value::Object(page)) = payload.get_mut("data").map(Value::take) else {
                return Err(LocusError::ResponseShape(format!(
                    "LD response from {url} has no data object"
                )));
            };
            for (key, column) in page {
                let Value::Array(values) = column else {
                    return Err(LocusError::ResponseShape(format!(
                        "LD column {key} is not an array"
                    )));
                };
                if let Value::Array(existing) =
                    combined.entry(key).or_insert_with(|| Value::Array(Vec::new()))
                {
                    existing.extend(values);
                }
            }
            if next.is_some() {
                debug!(namespace = request.namespace, "following LD continuation link");
            }
        }
        normalize_response(Value::Object(combined))
    }
}

impl Adapter for LDServer {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Ld
    }

    fn config(&self) -> &AdapterConfig {
        self.core.config()
    }

    fn dependency(&self) -> Dependency {
        Dependency::Required
    }

    fn get_data(&self, request: &AdapterRequest<'_>, chain: Chain) -> Result<Chain, LocusError> {
        let mut chain = chain;
        let options = self.build_request_options(request.state, chain.upstream_mut())?;
        let Some(refvar) = options.ld_refvar.clone().filter(|_| !options.skip_request) else {
            debug!(namespace = request.namespace, "no association data; skipping LD request");
            chain.record_discrete(request.namespace, Vec::new());
            return Ok(chain);
        };
        self.core.require_url()?;
        info!(namespace = request.namespace, refvar = %refvar, panel = %options.ld_source, "requesting LD");
        chain
            .header
            .insert("ldrefvar".to_string(), Value::String(refvar.clone()));

        let discriminants = vec![
            refvar,
            options.ld_source.clone(),
            options.ld_population.clone(),
        ];
        let records = self.core.fetch_region(request, discriminants, |region| {
            let url = self.url(&options, region)?;
            self.fetch_pages(request, url)
        })?;

        if let (Some(first_body), Some(first_ld)) = (chain.body.first(), records.first()) {
            let left_key = position_key(first_body)?;
            let right_key = find_prefixed_key_opt(first_ld, "position2")
                .map(str::to_string)
                .ok_or_else(|| {
                    LocusError::ResponseShape("LD payload has no position2 field".to_string())
                })?;
            ordered_merge(&mut chain.body, &records, &left_key, &right_key);
        }
        chain.record_discrete(request.namespace, records);
        Ok(chain)
    }

    fn clear_cache(&self) {
        self.core.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::adapters::testing::ScriptedTransport;
    use crate::control::Deadline;
    use crate::fields::FieldGroup;

    fn assoc_data() -> Vec<Record> {
        // Several marker spellings on purpose.
        [
            json!({"assoc.variant": "1:23_A/C", "assoc.log_pvalue": 0.2, "assoc.position": 23}),
            json!({"assoc.variant": "1:24:A:C", "assoc.log_pvalue": 125, "assoc.position": 24}),
            json!({"assoc.variant": "1-25-A-C", "assoc.log_pvalue": 72, "assoc.position": 25}),
        ]
        .into_iter()
        .map(|row| row.as_object().cloned().unwrap())
        .collect()
    }

    fn adapter(config: serde_json::Value) -> LDServer {
        LDServer::new(serde_json::from_value(config).unwrap()).unwrap()
    }

    #[test]
    fn finds_the_best_variant_if_none_is_provided() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let mut data = assoc_data();
        let refvar = provider.find_ld_refvar(&ViewState::default(), &mut data).unwrap();
        assert_eq!(refvar, "1:24_A/C");
        assert_eq!(data[1][REFVAR_FLAG], json!(true));
        assert!(!data[0].contains_key(REFVAR_FLAG));
    }

    #[test]
    fn prefers_a_refvar_from_state() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let mut data = assoc_data();
        let state = ViewState {
            ldrefvar: Some("1-25-A-C".to_string()),
            ..ViewState::default()
        };
        let refvar = provider.find_ld_refvar(&state, &mut data).unwrap();
        assert_eq!(refvar, "1:25_A/C");
        assert_eq!(data[2][REFVAR_FLAG], json!(true));
        assert!(!data[1].contains_key(REFVAR_FLAG));
    }

    #[test]
    fn ties_keep_the_earliest_record() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let mut data: Vec<Record> = [
            json!({"assoc.variant": "2:10_G/T", "assoc.log_pvalue": 3.0}),
            json!({"assoc.variant": "2:11_G/T", "assoc.log_pvalue": 3.0}),
        ]
        .into_iter()
        .map(|row| row.as_object().cloned().unwrap())
        .collect();
        let refvar = provider.find_ld_refvar(&ViewState::default(), &mut data).unwrap();
        assert_eq!(refvar, "2:10_G/T");
    }

    #[test]
    fn skips_the_request_if_no_assoc_data_was_present() {
        let source37 = adapter(json!({"url": "https://ld.test/", "params": {"source": "1000G", "build": "GRCh37"}}));
        let state = ViewState {
            ldrefvar: Some("1:2_A/B".to_string()),
            ..ViewState::default()
        };

        let options = source37.build_request_options(&state, Some(&mut Vec::new())).unwrap();
        assert!(options.skip_request);

        assert_matches!(
            source37.build_request_options(&state, None),
            Err(LocusError::Dependency(message)) if message.contains("must depend on")
        );

        let mut unrelated = vec![json!({"some_other_data": true}).as_object().cloned().unwrap()];
        assert_matches!(
            source37.build_request_options(&state, Some(&mut unrelated)),
            Err(LocusError::Dependency(message)) if message.contains("required key name")
        );
    }

    #[test]
    fn chooses_best_1000g_panel_for_the_build() {
        let state = ViewState {
            ldrefvar: Some("1:2_A/B".to_string()),
            ..ViewState::default()
        };
        let source37 = adapter(json!({"url": "https://ld.test/", "params": {"source": "1000G", "build": "GRCh37"}}));
        let options = source37.build_request_options(&state, Some(&mut assoc_data())).unwrap();
        assert_eq!(options.genome_build, GenomeBuild::Grch37);
        assert_eq!(options.ld_source, "1000G");

        let source38 = adapter(json!({"url": "https://ld.test/", "params": {"source": "1000G", "build": "GRCh38"}}));
        let options = source38.build_request_options(&state, Some(&mut assoc_data())).unwrap();
        assert_eq!(options.genome_build, GenomeBuild::Grch38);
        assert_eq!(options.ld_source, "1000G-FRZ09");
        assert_eq!(options.ld_population, "ALL");
    }

    #[test]
    fn validates_the_selected_build_name() {
        let source = adapter(json!({"url": "https://ld.test/", "params": {"build": "99"}}));
        assert_matches!(
            source.build_request_options(&ViewState::default(), Some(&mut assoc_data())),
            Err(LocusError::Configuration(message)) if message.contains("valid 'genome_build'")
        );
    }

    #[test]
    fn empty_upstream_skips_before_the_build_is_checked() {
        let source = adapter(json!({"url": "https://ld.test/", "params": {"build": "99"}}));
        let options = source
            .build_request_options(&ViewState::default(), Some(&mut Vec::new()))
            .unwrap();
        assert!(options.skip_request);
        assert_eq!(options.ld_refvar, None);
    }

    #[test]
    fn unparseable_refvar_is_a_format_error() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let state = ViewState {
            ldrefvar: Some("rs7903146".to_string()),
            ..ViewState::default()
        };
        assert_matches!(
            provider.find_ld_refvar(&state, &mut assoc_data()),
            Err(LocusError::Format(_))
        );
    }

    #[test]
    fn encodes_the_ldserver_query() {
        let provider = adapter(json!({"url": "https://ld.test/api/"}));
        let options = LdRequest {
            genome_build: GenomeBuild::Grch37,
            ld_source: "1000G".to_string(),
            ld_population: "EUR".to_string(),
            ld_refvar: Some("1:24_A/C".to_string()),
            skip_request: false,
        };
        let url = provider.url(&options, &Region::new("1", 10, 40)).unwrap();
        assert_eq!(
            url,
            "https://ld.test/api/genome_builds/GRCh37/references/1000G/populations/EUR/variants?correlation=rsquare&variant=1%3A24_A%2FC&chrom=1&start=10&stop=40"
        );
    }

    #[test]
    fn follows_pages_and_merges_onto_association_rows() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let transport = ScriptedTransport::json(vec![
            json!({
                "data": {"chromosome2": ["1"], "position2": [23], "variant2": ["1:23_A/C"], "correlation": [0.4]},
                "next": "https://ld.test/page2"
            }),
            json!({
                "data": {"chromosome2": ["1"], "position2": [25], "variant2": ["1:25_A/C"], "correlation": [0.8]},
                "next": null
            }),
        ]);
        let chain = Chain::default().replace_body("assoc", assoc_data());
        let state = ViewState::for_region(&Region::new("1", 1, 100));
        let fields = FieldGroup::default();
        let deadline = Deadline::unbounded();
        let request = AdapterRequest {
            namespace: "ld",
            state: &state,
            fields: &fields,
            transport: &transport,
            deadline: &deadline,
        };

        let chain = provider.get_data(&request, chain).unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.urls()[1], "https://ld.test/page2");
        assert_eq!(chain.header["ldrefvar"], json!("1:24_A/C"));
        assert_eq!(chain.body[0]["ld.correlation"], json!(0.4));
        assert!(!chain.body[1].contains_key("ld.correlation"));
        assert_eq!(chain.body[1][REFVAR_FLAG], json!(true));
        assert_eq!(chain.body[2]["ld.correlation"], json!(0.8));
        assert_eq!(chain.discrete["ld"].len(), 2);

        // Same refvar, narrower view: served from cache.
        let narrow = ViewState::for_region(&Region::new("1", 20, 30));
        let request = AdapterRequest {
            state: &narrow,
            ..request
        };
        let again = provider
            .get_data(&request, Chain::default().replace_body("assoc", assoc_data()))
            .unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(again.body[2]["ld.correlation"], json!(0.8));
    }

    #[test]
    fn failed_page_is_a_network_error() {
        let provider = adapter(json!({"url": "https://ld.test/"}));
        let transport = ScriptedTransport::new(vec![crate::transport::HttpResponse {
            status: 500,
            body: String::new(),
        }]);
        let chain = Chain::default().replace_body("assoc", assoc_data());
        let state = ViewState::for_region(&Region::new("1", 1, 100));
        let fields = FieldGroup::default();
        let deadline = Deadline::unbounded();
        let request = AdapterRequest {
            namespace: "ld",
            state: &state,
            fields: &fields,
            transport: &transport,
            deadline: &deadline,
        };
        assert_matches!(
            provider.get_data(&request, chain),
            Err(LocusError::Network { status: 500, .. })
        );
    }
}
