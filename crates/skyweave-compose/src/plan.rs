//! Deployment plan: the ordered, fully resolved output of one composition pass.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use skyweave_common::error::Result;
use skyweave_core::construct::App;
use skyweave_core::descriptor::Outputs;
use skyweave_core::value::ExportRef;

use crate::graph::CompositionGraph;
use crate::resolver;

/// One resource in deployment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedResource {
    /// Path-qualified address, e.g. `Api/Firewall/WebAcl`.
    pub address: String,
    /// Template id derived from the address.
    pub template_id: String,
    /// Provider kind.
    pub kind: String,
    /// Logical id within the owner.
    pub logical_id: String,
    /// Owning stack.
    pub stack: String,
    /// Longest dependency chain below this resource; equal levels may deploy in parallel.
    pub level: usize,
    /// Addresses of the direct dependencies.
    pub depends_on: Vec<String>,
    /// Configuration with every reference resolved.
    pub config: serde_json::Value,
    /// Output tokens minted for this resource.
    pub outputs: Outputs,
}

/// A stack output published for other stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedExport {
    /// Name importing stacks use.
    pub export_name: String,
    /// Token the export resolves to in the producing stack.
    pub value: serde_json::Value,
}

/// One stack with its derived inter-stack dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStack {
    /// Stack name.
    pub name: String,
    /// Stacks that must be deployed first, in creation order.
    pub depends_on: Vec<String>,
    /// Exposed outputs by name.
    pub exports: BTreeMap<String, PlannedExport>,
}

/// Result of a successful composition pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    /// Stacks in creation order.
    pub stacks: Vec<PlannedStack>,
    /// Resources in topological order, ties broken by tree pre-order.
    pub resources: Vec<PlannedResource>,
    /// SHA-256 of the canonical JSON of `stacks` and `resources`.
    pub digest: String,
}

impl DeploymentPlan {
    /// Resource addresses in deployment order.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.address.as_str()).collect()
    }

    /// Looks up a planned resource by address.
    #[must_use]
    pub fn resource(&self, address: &str) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| r.address == address)
    }

    /// Looks up a planned stack by name.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&PlannedStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Resources belonging to `stack`, in deployment order.
    pub fn resources_in<'a>(&'a self, stack: &'a str) -> impl Iterator<Item = &'a PlannedResource> {
        self.resources.iter().filter(move |r| r.stack == stack)
    }

    /// Pretty-printed JSON of the whole plan.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs one composition pass over `app`.
///
/// Refuses an app on which any construction operation failed. Otherwise
/// builds the composition graph, rejects cycles, orders resources, realizes
/// each one's outputs in that order, and resolves every configuration. The
/// app is consumed: realized outputs cannot be populated twice, so a new pass
/// needs a freshly built app.
///
/// # Errors
///
/// Returns [`SkyweaveError::Abandoned`](skyweave_common::error::SkyweaveError::Abandoned)
/// if construction failed earlier,
/// [`SkyweaveError::CyclicDependency`](skyweave_common::error::SkyweaveError::CyclicDependency)
/// if the ordering edges form a cycle, or a provider lookup error.
pub fn plan(app: App) -> Result<DeploymentPlan> {
    app.ensure_intact()?;
    let graph = CompositionGraph::build(&app);
    let order = graph.topological_order()?;
    let levels = graph.levels(&order);

    for &resource in &order {
        let descriptor = app.descriptor(resource);
        let provider = app.registry().get(descriptor.kind())?;
        descriptor.populate_outputs(provider.realize(&descriptor.template_id()))?;
    }

    let mut resources = Vec::with_capacity(order.len());
    for &resource in &order {
        let descriptor = app.descriptor(resource);
        let config = resolver::resolve_config(&app, resource)?;
        let depends_on = graph
            .dependencies_of(resource)
            .into_iter()
            .map(|d| app.descriptor(d).address())
            .collect();
        resources.push(PlannedResource {
            address: descriptor.address(),
            template_id: descriptor.template_id().to_string(),
            kind: descriptor.kind().to_string(),
            logical_id: descriptor.logical_id().to_string(),
            stack: descriptor.stack().to_string(),
            level: levels.get(&resource).copied().unwrap_or(0),
            depends_on,
            config,
            outputs: descriptor.outputs().cloned().unwrap_or_default(),
        });
        tracing::debug!(address = %descriptor.address(), "resource planned");
    }

    let stacks = plan_stacks(&app, &graph)?;
    let digest = digest(&stacks, &resources)?;
    tracing::info!(
        stacks = stacks.len(),
        resources = resources.len(),
        %digest,
        "deployment plan produced"
    );

    Ok(DeploymentPlan {
        stacks,
        resources,
        digest,
    })
}

fn plan_stacks(app: &App, graph: &CompositionGraph<'_>) -> Result<Vec<PlannedStack>> {
    let names: Vec<String> = app
        .stacks()
        .iter()
        .map(|s| app.node(s.node()).name().to_string())
        .collect();

    let mut planned = Vec::with_capacity(names.len());
    for (record, name) in app.stacks().iter().zip(&names) {
        let mut depends_on: Vec<&String> = Vec::new();
        for edge in graph.ordering_edges() {
            if app.descriptor(edge.consumer).stack() != name {
                continue;
            }
            let producer_stack = app.descriptor(edge.producer).stack();
            if producer_stack == name {
                continue;
            }
            let unseen = names
                .iter()
                .find(|n| *n == producer_stack)
                .filter(|s| !depends_on.contains(s));
            if let Some(stack) = unseen {
                depends_on.push(stack);
            }
        }
        depends_on.sort_by_key(|s| names.iter().position(|n| n == *s));

        let mut exports = BTreeMap::new();
        for (output, reference) in record.outputs() {
            let value = app
                .descriptor(reference.source())
                .output(reference.attribute())?
                .clone();
            let export_name = ExportRef {
                stack: name.clone(),
                output: output.clone(),
            }
            .export_name();
            let _ = exports.insert(output.clone(), PlannedExport { export_name, value });
        }

        planned.push(PlannedStack {
            name: name.clone(),
            depends_on: depends_on.into_iter().cloned().collect(),
            exports,
        });
    }
    Ok(planned)
}

fn digest(stacks: &[PlannedStack], resources: &[PlannedResource]) -> Result<String> {
    let canonical = serde_json::to_vec(&(stacks, resources))?;
    Ok(Sha256::digest(&canonical)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
