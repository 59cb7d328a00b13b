use std::collections::BTreeMap;
use std::sync::Mutex;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use locus_data::control::{CancelToken, FetchOptions};
use locus_data::domain::{GenomeBuild, Region, ViewState};
use locus_data::error::LocusError;
use locus_data::registry::DataSources;
use locus_data::requester::Requester;
use locus_data::transport::{HttpResponse, Transport};

/// Answers by URL prefix and counts calls per prefix.
#[derive(Default)]
struct MockTransport {
    routes: Vec<(String, Value)>,
    calls: Mutex<BTreeMap<String, usize>>,
    posted: Mutex<Vec<Value>>,
}

impl MockTransport {
    fn route(mut self, prefix: &str, payload: Value) -> Self {
        self.routes.push((prefix.to_string(), payload));
        self
    }

    fn calls_to(&self, prefix: &str) -> usize {
        self.calls.lock().unwrap().get(prefix).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn answer(&self, url: &str) -> Result<HttpResponse, LocusError> {
        let (prefix, payload) = self
            .routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .ok_or_else(|| LocusError::Http(format!("no route for {url}")))?;
        *self.calls.lock().unwrap().entry(prefix.clone()).or_default() += 1;
        Ok(HttpResponse::ok(payload.to_string()))
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, LocusError> {
        self.answer(url)
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, LocusError> {
        self.posted.lock().unwrap().push(body.clone());
        self.answer(url)
    }
}

fn sources() -> DataSources {
    DataSources::from_json(&json!({
        "assoc": ["AssociationLZ", {"url": "https://assoc.test/", "params": {"source": 45}}],
        "ld": ["LDServer", {"url": "https://ld.test/", "params": {"source": "1000G", "population": "ALL"}}],
        "catalog": ["GwasCatalogLZ", {"url": "https://catalog.test/", "params": {"build": "GRCh37"}}],
        "gene": ["GeneLZ", {"url": "https://gene.test/", "params": {"build": "GRCh37"}}],
        "constraint": ["GeneConstraintLZ", {"url": "https://gnomad.test/", "params": {"build": "GRCh37"}}],
    }))
    .unwrap()
}

fn transport() -> MockTransport {
    MockTransport::default()
        .route(
            "https://assoc.test/",
            json!({"data": {
                "variant": ["1:2_A/G", "1:4_C/T", "1:6_G/A"],
                "position": [2, 4, 6],
                "log_pvalue": [1.5, 9.0, 3.0],
                "ref_allele": ["A", "C", "G"]
            }}),
        )
        .route(
            "https://ld.test/",
            json!({"data": {
                "chromosome2": ["1", "1"],
                "position2": [4, 6],
                "variant2": ["1:4_C/T", "1:6_G/A"],
                "correlation": [1.0, 0.35]
            }, "next": null}),
        )
        .route(
            "https://catalog.test/",
            json!({"data": [
                {"chrom": "1", "pos": 4, "rsid": "rs4", "trait": "height", "log_pvalue": 12.0},
                {"chrom": "1", "pos": 6, "rsid": "rs6", "trait": "bmi", "log_pvalue": 4.0},
                {"chrom": "1", "pos": 6, "rsid": "rs6", "trait": "t2d", "log_pvalue": 8.0}
            ]}),
        )
        .route(
            "https://gene.test/",
            json!({"data": [
                {"gene_name": "ABC1", "start": 1, "end": 50},
                {"gene_name": "XYZ", "start": 60, "end": 90},
                {"gene_name": "ABC1", "start": 3000, "end": 3100}
            ]}),
        )
        .route(
            "https://gnomad.test/",
            json!({"data": {
                "_ABC1": {"gnomad_constraint": {"pLI": 0.123456, "obs_lof": 4}},
                "_XYZ": {"gnomad_constraint": {"pLI": 1.0}}
            }}),
        )
}

fn state(start: u64, end: u64) -> ViewState {
    ViewState::for_region(&Region::new("1", start, end))
}

#[test]
fn ld_annotates_association_rows() {
    let requester = Requester::new(sources(), transport());
    let chain = requester
        .get_data(&state(1, 100), ["assoc:position", "assoc:log_pvalue", "ld:correlation"])
        .unwrap();

    assert_eq!(chain.header["ldrefvar"], json!("1:4_C/T"));
    assert_eq!(chain.body.len(), 3);
    assert!(!chain.body[0].contains_key("ld.correlation"));
    assert_eq!(chain.body[1]["lz_is_ld_refvar"], json!(true));
    assert_eq!(chain.body[1]["ld.correlation"], json!(1.0));
    assert_eq!(chain.body[2]["ld.correlation"], json!(0.35));
    assert_eq!(chain.discrete["ld"].len(), 2);
}

#[test]
fn catalog_annotates_matching_positions_only() {
    let requester = Requester::new(sources(), transport());
    let chain = requester
        .get_data(&state(1, 100), ["assoc:position", "catalog:rsid", "catalog:trait"])
        .unwrap();

    let row2 = &chain.body[0];
    assert!(!row2.contains_key("catalog.rsid"));
    assert!(!row2.contains_key("n_catalog_matches"));

    assert_eq!(chain.body[1]["catalog.rsid"], json!("rs4"));
    assert_eq!(chain.body[1]["n_catalog_matches"], json!(1));
    assert_eq!(chain.body[2]["catalog.trait"], json!("t2d"));
    assert_eq!(chain.body[2]["n_catalog_matches"], json!(2));
}

#[test]
fn zooming_in_serves_every_step_from_cache() {
    let requester = Requester::new(sources(), transport());
    let fields = ["assoc:position", "ld:correlation", "catalog:rsid"];

    let wide = requester.get_data(&state(1, 100), fields).unwrap();
    let narrow = requester.get_data(&state(1, 50), fields).unwrap();
    let edge = requester.get_data(&state(1, 100), fields).unwrap();

    assert_eq!(wide, narrow);
    assert_eq!(wide, edge);
    assert_eq!(requester.transport().total_calls(), 3);
    assert_eq!(requester.transport().calls_to("https://ld.test/"), 1);

    requester.sources().clear_caches();
    requester.get_data(&state(1, 50), fields).unwrap();
    assert_eq!(requester.transport().total_calls(), 6);
}

#[test]
fn gene_constraint_is_merged_once_per_symbol() {
    let requester = Requester::new(sources(), transport());
    let chain = requester
        .get_data(&state(1, 5000), ["gene:gene_name", "constraint:pLI"])
        .unwrap();

    let posted = requester.transport().posted.lock().unwrap().clone();
    assert_eq!(posted.len(), 1);
    let query = posted[0]["query"].as_str().unwrap();
    assert_eq!(query.matches("gene_symbol: \"ABC1\"").count(), 1);
    assert_eq!(query.matches("gnomad_constraint").count(), 2);

    assert_eq!(chain.body.len(), 3);
    assert_eq!(chain.body[0]["pLI"], json!(0.12));
    assert_eq!(chain.body[0]["obs_lof"], json!(4));
    assert_eq!(chain.body[1]["pLI"], json!(1.0));
    assert_eq!(chain.body[2]["pLI"], json!(0.12));
}

#[test]
fn gene_constraint_is_skipped_for_grch38() {
    let requester = Requester::new(sources(), transport());
    let state38 = ViewState {
        genome_build: Some(GenomeBuild::Grch38),
        ..state(1, 5000)
    };
    let chain = requester
        .get_data(&state38, ["gene:gene_name", "constraint:pLI"])
        .unwrap();
    assert!(chain.body.iter().all(|gene| !gene.contains_key("pLI")));
    assert!(chain.discrete["constraint"].is_empty());
    assert_eq!(requester.transport().calls_to("https://gnomad.test/"), 0);
}

#[test]
fn missing_namespace_fails_before_network() {
    let requester = Requester::new(sources(), transport());
    assert_matches!(
        requester.get_data(&state(1, 100), ["assoc:position", "unknown:field"]),
        Err(error) if error.is_configuration()
    );
    assert_eq!(requester.transport().total_calls(), 0);
}

#[test]
fn timed_out_request_stops_before_first_step() {
    let requester = Requester::new(sources(), transport());
    let options = FetchOptions {
        timeout: Some(std::time::Duration::ZERO),
        cancel: CancelToken::new(),
    };
    assert_matches!(
        requester.get_data_with(&state(1, 100), ["assoc:position"], &options),
        Err(LocusError::TimedOut(0))
    );
}
