use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use locus_data::adapters::AdapterKind;
use locus_data::config::{AdapterSpec, Config, ConfigLoader};
use locus_data::error::LocusError;

fn write_config(content: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("locus-data.json")).unwrap();
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn load_sources_from_file() {
    let (_dir, path) = write_config(
        &json!({
            "schema_version": 1,
            "sources": {
                "assoc": ["AssociationLZ", {"url": "https://portal.test/", "params": {"source": 45}}],
                "ld": ["LDLZ", "https://ld.test/"],
                "recomb": ["RecombLZ", {"url": "https://recomb.test/", "params": {"build": "GRCh37"}}],
                "static": ["StaticJSON", {"data": {"x": [1, 2]}}]
            }
        })
        .to_string(),
    );

    let sources = ConfigLoader::resolve(Some(path.as_str())).unwrap();
    assert_eq!(
        sources.keys().collect::<Vec<_>>(),
        vec!["assoc", "ld", "recomb", "static"]
    );
    assert_eq!(sources.get_source("ld").unwrap().kind(), AdapterKind::Ld);
    assert_eq!(sources.get_source("static").unwrap().kind(), AdapterKind::Static);
}

#[test]
fn unreadable_file_is_a_config_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let err = ConfigLoader::resolve(missing.to_str()).unwrap_err();
    assert_matches!(err, LocusError::ConfigRead(_));
    assert!(err.is_configuration());
}

#[test]
fn malformed_json_is_a_parse_error() {
    let (_dir, path) = write_config("{\"sources\": ");
    assert_matches!(
        ConfigLoader::resolve(Some(path.as_str())),
        Err(LocusError::ConfigParse(_))
    );
}

#[test]
fn rejects_unknown_types_and_versions() {
    assert_matches!(
        ConfigLoader::resolve_str(r#"{"sources": {"x": ["MysteryLZ", "https://x.test/"]}}"#),
        Err(LocusError::UnknownAdapterType(name)) if name == "MysteryLZ"
    );
    assert_matches!(
        ConfigLoader::resolve_str(r#"{"schema_version": 2, "sources": {}}"#),
        Err(LocusError::Configuration(_))
    );
}

#[test]
fn construction_errors_surface_at_load_time() {
    let config = Config {
        schema_version: None,
        sources: [(
            "assoc".to_string(),
            serde_json::from_value::<AdapterSpec>(json!(["AssociationLZ", "https://portal.test/"]))
                .unwrap(),
        )]
        .into_iter()
        .collect(),
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(LocusError::Configuration(message)) if message.contains("source")
    );

    assert_matches!(
        ConfigLoader::resolve_str(r#"{"sources": {"s": ["StaticSource", {}]}}"#),
        Err(LocusError::Configuration(_))
    );
    assert_matches!(
        ConfigLoader::resolve_str(r#"{"sources": {"g": ["GeneLZ", {"params": {"build": "GRCh37"}}]}}"#),
        Err(LocusError::Configuration(message)) if message.contains("URL")
    );

    for source in [
        r#"["LDServer", {"params": {"source": "1000G"}}]"#,
        r#"["PheWASLZ", {"params": {"build": ["GRCh37"]}}]"#,
        r#"["GeneConstraintLZ", {"params": {"build": "GRCh37"}}]"#,
    ] {
        let text = format!(r#"{{"sources": {{"x": {source}}}}}"#);
        assert_matches!(
            ConfigLoader::resolve_str(&text),
            Err(LocusError::Configuration(message)) if message.contains("URL")
        );
    }
}
