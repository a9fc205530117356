//! Resource descriptors: one deployable unit each.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;

use skyweave_common::error::{Result, SkyweaveError};
use skyweave_common::types::{ConstructPath, TemplateId};

use crate::construct::NodeId;
use crate::value::Config;

/// Arena handle of a resource descriptor inside an [`App`](crate::construct::App).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(usize);

impl ResourceId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position of the descriptor in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// Realized output attributes of a resource.
pub type Outputs = BTreeMap<String, serde_json::Value>;

/// Immutable description of one deployable unit.
///
/// Everything but `outputs` is fixed at declaration. Outputs start empty and
/// are populated exactly once, when the synthesizer realizes the resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    id: ResourceId,
    kind: String,
    logical_id: String,
    path: ConstructPath,
    owner: NodeId,
    config: Config,
    outputs: OnceCell<Outputs>,
}

impl ResourceDescriptor {
    pub(crate) fn new(
        id: ResourceId,
        kind: String,
        path: ConstructPath,
        owner: NodeId,
        config: Config,
    ) -> Self {
        Self {
            id,
            kind,
            logical_id: path.name().to_string(),
            path,
            owner,
            config,
            outputs: OnceCell::new(),
        }
    }

    /// Arena handle.
    #[must_use]
    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// Provider kind, e.g. `AWS::DynamoDB::Table`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Logical id, unique among the owner's resources.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Full construct path; unique across the whole app.
    #[must_use]
    pub const fn path(&self) -> &ConstructPath {
        &self.path
    }

    /// Path-qualified address, e.g. `Api/Firewall/WebAcl`.
    #[must_use]
    pub fn address(&self) -> String {
        self.path.to_string()
    }

    /// Name of the stack the resource belongs to.
    #[must_use]
    pub fn stack(&self) -> &str {
        self.path.stack()
    }

    /// Template id derived from the path.
    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.path.template_id()
    }

    /// Owning construct node.
    #[must_use]
    pub const fn owner(&self) -> NodeId {
        self.owner
    }

    /// Declared (unresolved) configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Realized outputs, `None` until the resource is synthesized.
    #[must_use]
    pub fn outputs(&self) -> Option<&Outputs> {
        self.outputs.get()
    }

    /// Records the realized outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if outputs were already populated.
    pub fn populate_outputs(&self, outputs: Outputs) -> Result<()> {
        self.outputs.set(outputs).map_err(|_| SkyweaveError::Config {
            message: format!("outputs of {} were already realized", self.path),
        })
    }

    /// Dereferences one realized output attribute.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::Unresolved`] if the resource has not been
    /// realized yet or does not carry `attribute`.
    pub fn output(&self, attribute: &str) -> Result<&serde_json::Value> {
        self.outputs
            .get()
            .and_then(|outputs| outputs.get(attribute))
            .ok_or_else(|| SkyweaveError::Unresolved {
                address: self.address(),
                attribute: attribute.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceId::from_index(0),
            "AWS::DynamoDB::Table".into(),
            ConstructPath::root("Persistent").child("VideoTable"),
            NodeId::from_index(0),
            Config::new(),
        )
    }

    #[test]
    fn logical_id_is_last_path_component() {
        let d = descriptor();
        assert_eq!(d.logical_id(), "VideoTable");
        assert_eq!(d.address(), "Persistent/VideoTable");
        assert_eq!(d.stack(), "Persistent");
    }

    #[test]
    fn output_before_realization_is_unresolved() {
        let d = descriptor();
        let err = d.output("arn").unwrap_err();
        assert!(matches!(err, SkyweaveError::Unresolved { .. }));
    }

    #[test]
    fn outputs_populate_exactly_once() {
        let d = descriptor();
        let outputs: Outputs = [("arn".to_string(), json!("x"))].into_iter().collect();
        d.populate_outputs(outputs.clone()).expect("first populate");
        assert_eq!(d.output("arn").expect("arn"), &json!("x"));
        assert!(d.populate_outputs(outputs).is_err());
    }
}
