use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::LocusError;

pub type Record = Map<String, Value>;

/// Unwraps a `data` envelope and transposes columnar payloads into rows.
pub fn normalize_response(payload: Value) -> Result<Vec<Record>, LocusError> {
    let data = match payload {
        Value::Object(mut object) if object.contains_key("data") => object
            .remove("data")
            .unwrap_or(Value::Null),
        other => other,
    };

    match data {
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::Object(record) => Ok(record),
                other => Err(LocusError::ResponseShape(format!(
                    "expected row objects, found {other}"
                ))),
            })
            .collect(),
        Value::Object(columns) => transpose_columns(columns),
        Value::Null => Ok(Vec::new()),
        other => Err(LocusError::ResponseShape(format!(
            "expected an array of records or an object of columns, found {other}"
        ))),
    }
}

fn transpose_columns(columns: Map<String, Value>) -> Result<Vec<Record>, LocusError> {
    let mut arrays = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        match column {
            Value::Array(values) => arrays.push((name, values)),
            _ => {
                return Err(LocusError::ResponseShape(format!(
                    "column {name} is not an array"
                )));
            }
        }
    }

    let Some(rows) = arrays.first().map(|(_, values)| values.len()) else {
        return Ok(Vec::new());
    };
    if arrays.iter().any(|(_, values)| values.len() != rows) {
        return Err(LocusError::ResponseShape(
            "expects a response in which all arrays of data are the same length".to_string(),
        ));
    }

    let mut records = vec![Record::new(); rows];
    for (name, values) in arrays {
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
    }
    Ok(records)
}

pub fn namespace_records(
    records: Vec<Record>,
    namespace: &str,
    allowed: Option<&BTreeSet<String>>,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .filter(|(label, _)| allowed.is_none_or(|fields| fields.contains(label)))
                .map(|(label, value)| (format!("{namespace}.{label}"), value))
                .collect()
        })
        .collect()
}

pub fn limit_records(records: Vec<Record>, allowed: &BTreeSet<String>) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .filter(|(label, _)| allowed.contains(label))
                .collect()
        })
        .collect()
}

/// Key that is exactly `fieldname` or ends in `.fieldname`.
pub fn find_prefixed_key<'a>(record: &'a Record, fieldname: &str) -> Result<&'a str, LocusError> {
    find_prefixed_key_opt(record, fieldname).ok_or_else(|| {
        LocusError::Dependency(format!(
            "could not locate the required key name: {fieldname} in dependent data"
        ))
    })
}

pub fn find_prefixed_key_opt<'a>(record: &'a Record, fieldname: &str) -> Option<&'a str> {
    let suffix = format!(".{fieldname}");
    record
        .keys()
        .find(|key| key.as_str() == fieldname || key.ends_with(&suffix))
        .map(String::as_str)
}

pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
