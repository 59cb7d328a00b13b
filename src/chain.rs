use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::record::Record;

/// The payload threaded through every adapter of one request.
///
/// `body` is the joined record set handed to renderers. `discrete` keeps each
/// namespace's own records, in case a later step replaced the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Chain {
    pub header: Map<String, Value>,
    pub body: Vec<Record>,
    pub discrete: BTreeMap<String, Vec<Record>>,
}

impl Chain {
    /// Upstream rows for a dependent step, or `None` when no step ran yet.
    pub fn upstream(&self) -> Option<&[Record]> {
        if self.discrete.is_empty() {
            None
        } else {
            Some(&self.body)
        }
    }

    pub fn upstream_mut(&mut self) -> Option<&mut Vec<Record>> {
        if self.discrete.is_empty() {
            None
        } else {
            Some(&mut self.body)
        }
    }

    /// Makes `records` the new body, as independent adapters do.
    pub fn replace_body(mut self, namespace: &str, records: Vec<Record>) -> Self {
        self.discrete.insert(namespace.to_string(), records.clone());
        self.body = records;
        self
    }

    pub fn record_discrete(&mut self, namespace: &str, records: Vec<Record>) {
        self.discrete.insert(namespace.to_string(), records);
    }
}
