use std::collections::HashMap;

use serde_json::Value;

use crate::error::LocusError;
use crate::record::{Record, find_prefixed_key, find_prefixed_key_opt, numeric};

pub const CATALOG_MATCH_COUNT: &str = "n_catalog_matches";

fn position_of(record: &Record, key: &str) -> Option<i64> {
    record
        .get(key)
        .and_then(numeric)
        .filter(|value| value.fract() == 0.0)
        .map(|value| value as i64)
}

pub fn position_key(record: &Record) -> Result<String, LocusError> {
    find_prefixed_key_opt(record, "position")
        .or_else(|| find_prefixed_key_opt(record, "pos"))
        .map(str::to_string)
        .ok_or_else(|| {
            LocusError::Dependency("could not locate a position field in dependent data".to_string())
        })
}

/// Copies each `foreign` row onto the `body` row at the same position.
pub fn ordered_merge(
    body: &mut [Record],
    foreign: &[Record],
    left_key: &str,
    right_key: &str,
) {
    let mut left: Vec<(i64, usize)> = body
        .iter()
        .enumerate()
        .filter_map(|(index, record)| position_of(record, left_key).map(|pos| (pos, index)))
        .collect();
    let mut right: Vec<(i64, usize)> = foreign
        .iter()
        .enumerate()
        .filter_map(|(index, record)| position_of(record, right_key).map(|pos| (pos, index)))
        .collect();
    left.sort_by_key(|&(pos, _)| pos);
    right.sort_by_key(|&(pos, _)| pos);

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (left_pos, left_index) = left[i];
        let (right_pos, right_index) = right[j];
        if left_pos == right_pos {
            for (field, value) in &foreign[right_index] {
                body[left_index].insert(field.clone(), value.clone());
            }
            i += 1;
            j += 1;
        } else if left_pos < right_pos {
            i += 1;
        } else {
            j += 1;
        }
    }
}

pub fn combine_chain_body(
    foreign: &[Record],
    body: Vec<Record>,
    src_fields: &[String],
    dest_fields: &[String],
    count_field: &str,
) -> Result<Vec<Record>, LocusError> {
    if src_fields.len() != dest_fields.len() {
        return Err(LocusError::Configuration(
            "source and destination field lists must have the same length".to_string(),
        ));
    }
    let (Some(first_body), Some(first_foreign)) = (body.first(), foreign.first()) else {
        return Ok(body);
    };
    let body_pos = position_key(first_body)?;
    let foreign_pos = position_key(first_foreign)?;
    let logp = find_prefixed_key_opt(first_foreign, "log_pvalue").map(str::to_string);

    let mut by_position: HashMap<i64, Vec<&Record>> = HashMap::new();
    for record in foreign {
        if let Some(pos) = position_of(record, &foreign_pos) {
            by_position.entry(pos).or_default().push(record);
        }
    }

    Ok(body
        .into_iter()
        .map(|mut row| {
            let Some(matches) = position_of(&row, &body_pos).and_then(|pos| by_position.get(&pos))
            else {
                return row;
            };
            let best = most_significant(matches, logp.as_deref());
            for (src, dest) in src_fields.iter().zip(dest_fields) {
                let value = find_prefixed_key_opt(best, src).and_then(|key| best.get(key));
                if let Some(value) = value {
                    row.insert(dest.clone(), value.clone());
                }
            }
            row.insert(count_field.to_string(), Value::from(matches.len()));
            row
        })
        .collect())
}

fn most_significant<'a>(candidates: &[&'a Record], logp_key: Option<&str>) -> &'a Record {
    let score = |record: &Record| {
        logp_key
            .and_then(|key| record.get(key))
            .and_then(numeric)
            .unwrap_or(f64::NEG_INFINITY)
    };
    let mut best = candidates[0];
    let mut best_score = score(best);
    for candidate in &candidates[1..] {
        let candidate_score = score(candidate);
        if candidate_score > best_score {
            best = candidate;
            best_score = candidate_score;
        }
    }
    best
}

// Existing gene fields are never overwritten.
pub fn merge_gene_constraint(genes: &mut [Record], constraint: &Record) -> Result<(), LocusError> {
    let Some(first) = genes.first() else {
        return Ok(());
    };
    let name_key = find_prefixed_key(first, "gene_name")?.to_string();

    for gene in genes.iter_mut() {
        let Some(symbol) = gene.get(&name_key).and_then(Value::as_str) else {
            continue;
        };
        let alias = constraint_alias(symbol);
        let Some(metrics) = constraint
            .get(&alias)
            .and_then(|entry| entry.get("gnomad_constraint"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for (key, value) in metrics {
            if !gene.contains_key(key) {
                gene.insert(key.clone(), round_metric(value));
            }
        }
    }
    Ok(())
}

/// GraphQL aliases allow only `[A-Za-z0-9_]` and may not start with a digit.
pub fn constraint_alias(symbol: &str) -> String {
    let sanitized: String = symbol
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    format!("_{sanitized}")
}

fn round_metric(value: &Value) -> Value {
    match value.as_f64() {
        Some(number) if value.is_f64() && number.fract() != 0.0 => {
            Value::from((number * 100.0).round() / 100.0)
        }
        _ => value.clone(),
    }
}
