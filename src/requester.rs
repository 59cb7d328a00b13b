use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::{Adapter, AdapterRequest, Dependency};
use crate::chain::Chain;
use crate::control::{Deadline, FetchOptions};
use crate::domain::ViewState;
use crate::error::LocusError;
use crate::fields::{FieldGroup, FieldRouter};
use crate::registry::DataSources;
use crate::transport::Transport;

/// One resolved step of a request.
pub struct PlanStep {
    pub namespace: String,
    pub fields: FieldGroup,
    pub adapter: Arc<dyn Adapter>,
    /// Namespaces whose output this step reads.
    pub depends_on: Vec<String>,
}

/// Every step of a request, resolved and validated before any I/O.
///
/// Steps run in request order. A dependent step reads the chain produced by
/// every step before it.
pub struct RequestPlan {
    steps: Vec<PlanStep>,
}

impl RequestPlan {
    pub fn build<I, S>(sources: &DataSources, fields: I) -> Result<Self, LocusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let routed = FieldRouter::split(fields);
        let mut steps: Vec<PlanStep> = Vec::with_capacity(routed.len());

        for (namespace, group) in routed.iter() {
            let adapter = sources.get_source(namespace)?;
            let dependency = adapter.dependency();
            let depends_on = match dependency {
                Dependency::Independent => Vec::new(),
                Dependency::Required | Dependency::Optional => {
                    steps.iter().map(|step| step.namespace.clone()).collect()
                }
            };
            if dependency == Dependency::Required && depends_on.is_empty() {
                return Err(LocusError::Dependency(format!(
                    "{namespace} ({}) needs an earlier step to depend on",
                    adapter.kind()
                )));
            }
            steps.push(PlanStep {
                namespace: namespace.to_string(),
                fields: group.clone(),
                adapter,
                depends_on,
            });
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Runs field requests against a registry.
pub struct Requester<T: Transport> {
    sources: DataSources,
    transport: T,
}

impl<T: Transport> Requester<T> {
    pub fn new(sources: DataSources, transport: T) -> Self {
        Self { sources, transport }
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_data<I, S>(&self, state: &ViewState, fields: I) -> Result<Chain, LocusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_data_with(state, fields, &FetchOptions::default())
    }

    pub fn get_data_with<I, S>(
        &self,
        state: &ViewState,
        fields: I,
        options: &FetchOptions,
    ) -> Result<Chain, LocusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let plan = RequestPlan::build(&self.sources, fields)?;
        let deadline = Deadline::new(options);
        info!(
            region = %state.region(),
            steps = plan.len(),
            "requesting data"
        );

        let mut chain = Chain::default();
        for step in plan.steps() {
            deadline.check()?;
            debug!(
                namespace = %step.namespace,
                adapter = %step.adapter.kind(),
                depends_on = ?step.depends_on,
                "running step"
            );
            let request = AdapterRequest {
                namespace: &step.namespace,
                state,
                fields: &step.fields,
                transport: &self.transport,
                deadline: &deadline,
            };
            chain = step.adapter.get_data(&request, chain)?;
            info!(
                namespace = %step.namespace,
                records = chain.body.len(),
                "step finished"
            );
        }
        Ok(chain)
    }
}
