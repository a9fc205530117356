//! Synthesizer contract and the built-in template synthesizer.
//!
//! A synthesizer receives a [`DeploymentPlan`] and produces a
//! provider-consumable artifact. The core never provisions anything itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skyweave_common::config::OutputFormat;
use skyweave_common::constants::{PLAN_FILE_NAME, TEMPLATE_FILE_SUFFIX, TEMPLATE_FORMAT_VERSION};
use skyweave_common::error::{Result, SkyweaveError};
use skyweave_core::provider::pascal_case;

use crate::plan::{DeploymentPlan, PlannedResource, PlannedStack};

/// Turns a deployment plan into a deployment artifact.
pub trait Synthesizer {
    /// What the synthesizer produces.
    type Artifact;

    /// Synthesizes `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be expressed as an artifact.
    fn synthesize(&self, plan: &DeploymentPlan) -> Result<Self::Artifact>;
}

/// One resource entry of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    /// Provider kind.
    #[serde(rename = "Type")]
    pub kind: String,
    /// Resolved configuration with `PascalCase` top-level keys.
    pub properties: serde_json::Value,
    /// Template ids of same-stack dependencies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Export block of a template output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateExport {
    /// Export name importing stacks use.
    pub name: String,
}

/// One template output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    /// Output token.
    pub value: serde_json::Value,
    /// Cross-stack export.
    pub export: TemplateExport,
}

/// A CloudFormation-style template for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Human-readable description.
    pub description: String,
    /// Resources keyed by template id.
    pub resources: BTreeMap<String, TemplateResource>,
    /// Exported outputs keyed by output logical id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

/// A synthesized stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArtifact {
    /// Stack name.
    pub name: String,
    /// Stacks to deploy first.
    pub depends_on: Vec<String>,
    /// Rendered template.
    pub template: Template,
}

/// Every synthesized stack plus the plan it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
    /// Stacks in creation order.
    pub stacks: Vec<StackArtifact>,
    /// Source plan, written next to the templates.
    pub plan: DeploymentPlan,
}

impl CloudAssembly {
    /// Looks up a synthesized stack by name.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Writes one `<Stack>.template.<ext>` per stack plus the plan into `dir`.
    ///
    /// Returns the written paths, templates first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a file cannot
    /// be serialized or written.
    pub fn write_to(&self, dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| SkyweaveError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(format!(
                "{}{TEMPLATE_FILE_SUFFIX}.{}",
                stack.name,
                format.extension()
            ));
            let content = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&stack.template)?,
                OutputFormat::Yaml => serde_yaml::to_string(&stack.template)?,
            };
            write_file(&path, &content)?;
            tracing::info!(stack = %stack.name, path = %path.display(), "template written");
            written.push(path);
        }

        let plan_path = dir.join(PLAN_FILE_NAME);
        write_file(&plan_path, &self.plan.to_json()?)?;
        written.push(plan_path);
        Ok(written)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| SkyweaveError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Renders one template per stack.
#[derive(Debug, Clone, Default)]
pub struct TemplateSynthesizer {
    description: Option<String>,
}

impl TemplateSynthesizer {
    /// Creates a synthesizer with the default template description.
    #[must_use]
    pub const fn new() -> Self {
        Self { description: None }
    }

    /// Uses `description` for every template.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn render(&self, plan: &DeploymentPlan, stack: &PlannedStack) -> Result<Template> {
        let template_ids: BTreeMap<&str, &str> = plan
            .resources
            .iter()
            .map(|r| (r.address.as_str(), r.template_id.as_str()))
            .collect();

        let resources = plan
            .resources_in(&stack.name)
            .map(|r| (r.template_id.clone(), render_resource(r, &stack.name, plan, &template_ids)))
            .collect();

        let mut outputs: BTreeMap<String, TemplateOutput> = BTreeMap::new();
        for (name, export) in &stack.exports {
            let id: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
            if id.is_empty() || outputs.contains_key(&id) {
                return Err(SkyweaveError::Config {
                    message: format!(
                        "stack {} output \"{name}\" does not map to a unique output id",
                        stack.name
                    ),
                });
            }
            let _ = outputs.insert(
                id,
                TemplateOutput {
                    value: export.value.clone(),
                    export: TemplateExport {
                        name: export.export_name.clone(),
                    },
                },
            );
        }

        Ok(Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| format!("Stack {}", stack.name)),
            resources,
            outputs,
        })
    }
}

fn render_resource(
    resource: &PlannedResource,
    stack: &str,
    plan: &DeploymentPlan,
    template_ids: &BTreeMap<&str, &str>,
) -> TemplateResource {
    let properties = match &resource.config {
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(k, v)| (pascal_case(k), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    let depends_on = resource
        .depends_on
        .iter()
        .filter(|address| plan.resource(address).is_some_and(|d| d.stack == stack))
        .filter_map(|address| template_ids.get(address.as_str()).map(|id| (*id).to_string()))
        .collect();
    TemplateResource {
        kind: resource.kind.clone(),
        properties,
        depends_on,
    }
}

impl Synthesizer for TemplateSynthesizer {
    type Artifact = CloudAssembly;

    fn synthesize(&self, plan: &DeploymentPlan) -> Result<CloudAssembly> {
        let stacks = plan
            .stacks
            .iter()
            .map(|stack| {
                Ok(StackArtifact {
                    name: stack.name.clone(),
                    depends_on: stack.depends_on.clone(),
                    template: self.render(plan, stack)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(stacks = stacks.len(), digest = %plan.digest, "plan synthesized");
        Ok(CloudAssembly {
            stacks,
            plan: plan.clone(),
        })
    }
}
