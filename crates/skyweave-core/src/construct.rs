//! Construct tree and composition root.
//!
//! Every construct node and resource descriptor lives in an arena owned by
//! the [`App`]. Nodes are addressed by stable handles and carry a path
//! assigned at creation time, so identifiers are deterministic given the
//! same sequence of declarations.

use std::cell::OnceCell;
use std::fmt;

use skyweave_common::config::SkyweaveConfig;
use skyweave_common::error::{Result, SkyweaveError};
use skyweave_common::types::{ConstructPath, validate_name};

use crate::descriptor::{ResourceDescriptor, ResourceId};
use crate::provider::ProviderRegistry;
use crate::stack::StackRecord;
use crate::value::{Config, Reference};

/// Arena handle of a construct node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position of the node in creation order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What an explicit dependency points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    /// Every resource in the node's subtree.
    Node(NodeId),
    /// A single resource.
    Resource(ResourceId),
}

impl From<NodeId> for DependencyTarget {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<ResourceId> for DependencyTarget {
    fn from(id: ResourceId) -> Self {
        Self::Resource(id)
    }
}

/// A named container of resources and child constructs.
#[derive(Debug, Clone)]
pub struct ConstructNode {
    id: NodeId,
    parent: Option<NodeId>,
    path: ConstructPath,
    children: Vec<NodeId>,
    resources: Vec<ResourceId>,
    dependencies: Vec<DependencyTarget>,
}

impl ConstructNode {
    /// Arena handle.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Node name (last path component).
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Owning parent; `None` for stack roots.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Full path from the stack root.
    #[must_use]
    pub const fn path(&self) -> &ConstructPath {
        &self.path
    }

    /// Child nodes in insertion order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Owned resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Explicit ordering dependencies in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyTarget] {
        &self.dependencies
    }
}

/// Composition root.
///
/// Stacks are registered into an `App` passed explicitly to their
/// constructors. One `App` describes one composition pass; it is consumed
/// when the deployment plan is produced.
///
/// The first failed construction operation is remembered. After that the
/// app is abandoned: [`ensure_intact`](Self::ensure_intact) fails and no
/// plan can be produced from it.
#[derive(Debug)]
pub struct App {
    registry: ProviderRegistry,
    nodes: Vec<ConstructNode>,
    resources: Vec<ResourceDescriptor>,
    pub(crate) stacks: Vec<StackRecord>,
    failure: OnceCell<String>,
}

impl App {
    /// Creates an empty composition root backed by `registry`.
    #[must_use]
    pub const fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            resources: Vec::new(),
            stacks: Vec::new(),
            failure: OnceCell::new(),
        }
    }

    /// Creates a composition root with the built-in provider catalog.
    #[must_use]
    pub fn from_config(config: &SkyweaveConfig) -> Self {
        Self::new(ProviderRegistry::builtin(config.strict_schema))
    }

    /// Message of the first failed construction operation, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    /// Checks that no construction operation has failed on this app.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::Abandoned`] carrying the first failure.
    pub fn ensure_intact(&self) -> Result<()> {
        match self.failure.get() {
            Some(cause) => Err(SkyweaveError::Abandoned {
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Records the error of a failed construction operation, keeping the first.
    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        result.inspect_err(|err| {
            if self.failure.set(err.to_string()).is_ok() {
                tracing::debug!(error = %err, "construction failed; app abandoned");
            }
        })
    }

    /// Provider registry used for validation.
    #[must_use]
    pub const fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Returns the node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different `App`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &ConstructNode {
        &self.nodes[id.0]
    }

    /// Returns the descriptor behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different `App`.
    #[must_use]
    pub fn descriptor(&self, id: ResourceId) -> &ResourceDescriptor {
        &self.resources[id.index()]
    }

    /// All nodes in creation order.
    #[must_use]
    pub fn nodes(&self) -> &[ConstructNode] {
        &self.nodes
    }

    /// All descriptors in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Stack root of the tree containing `id`.
    #[must_use]
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    /// Pre-order walk over every node: stacks in creation order, children in
    /// insertion order.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for stack in &self.stacks {
            self.walk(stack.node, &mut order);
        }
        order
    }

    /// Resources of every node in [`preorder`](Self::preorder), each node's
    /// own resources before its children's.
    #[must_use]
    pub fn resources_preorder(&self) -> Vec<ResourceId> {
        self.preorder()
            .into_iter()
            .flat_map(|id| self.node(id).resources.iter().copied())
            .collect()
    }

    /// Resources owned by `id` or any of its descendants, in pre-order.
    #[must_use]
    pub fn subtree_resources(&self, id: NodeId) -> Vec<ResourceId> {
        let mut nodes = Vec::new();
        self.walk(id, &mut nodes);
        nodes
            .into_iter()
            .flat_map(|n| self.node(n).resources.iter().copied())
            .collect()
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in &self.node(id).children {
            self.walk(child, out);
        }
    }

    pub(crate) fn push_root(&mut self, name: &str) -> Result<NodeId> {
        let result = self.try_push_root(name);
        self.track(result)
    }

    fn try_push_root(&mut self, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        if self.stacks.iter().any(|s| self.node(s.node).name() == name) {
            return Err(SkyweaveError::DuplicateName {
                parent: "app".into(),
                name: name.to_string(),
            });
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ConstructNode {
            id,
            parent: None,
            path: ConstructPath::root(name),
            children: Vec::new(),
            resources: Vec::new(),
            dependencies: Vec::new(),
        });
        Ok(id)
    }

    /// Creates a child construct named `name` under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::DuplicateName`] if a sibling already uses
    /// `name`, or an error if the parent's stack is already complete.
    pub fn add_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let result = self.try_add_child(parent, name);
        self.track(result)
    }

    fn try_add_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        self.ensure_open(parent)?;
        let parent_node = self.node(parent);
        if parent_node
            .children
            .iter()
            .any(|&c| self.node(c).name() == name)
        {
            return Err(SkyweaveError::DuplicateName {
                parent: parent_node.path.to_string(),
                name: name.to_string(),
            });
        }
        let id = NodeId(self.nodes.len());
        let path = parent_node.path.child(name);
        tracing::debug!(%path, "construct added");
        self.nodes.push(ConstructNode {
            id,
            parent: Some(parent),
            path,
            children: Vec::new(),
            resources: Vec::new(),
            dependencies: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Records that `node` must be realized after `target`.
    ///
    /// Repeated declarations of the same edge are recorded once.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::SelfDependency`] if `target` is `node` itself.
    pub fn add_dependency(&mut self, node: NodeId, target: impl Into<DependencyTarget>) -> Result<()> {
        let result = self.try_add_dependency(node, target.into());
        self.track(result)
    }

    fn try_add_dependency(&mut self, node: NodeId, target: DependencyTarget) -> Result<()> {
        if target == DependencyTarget::Node(node) {
            return Err(SkyweaveError::SelfDependency {
                path: self.node(node).path.clone(),
            });
        }
        self.ensure_open(node)?;
        let entry = &mut self.nodes[node.0];
        if !entry.dependencies.contains(&target) {
            tracing::debug!(path = %entry.path, ?target, "explicit dependency declared");
            entry.dependencies.push(target);
        }
        Ok(())
    }

    /// Declares a resource of `kind` owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`SkyweaveError::DuplicateId`] if `owner` already has a resource
    ///   named `logical_id`.
    /// - [`SkyweaveError::NotFound`] if no provider handles `kind`.
    /// - [`SkyweaveError::Schema`] if `config` does not satisfy the kind.
    /// - [`SkyweaveError::UnexposedReference`] if `config` references a
    ///   resource of another stack other than through an exposed output.
    pub fn declare_resource(
        &mut self,
        owner: NodeId,
        kind: &str,
        logical_id: &str,
        config: Config,
    ) -> Result<ResourceId> {
        let result = self.try_declare_resource(owner, kind, logical_id, config);
        self.track(result)
    }

    fn try_declare_resource(
        &mut self,
        owner: NodeId,
        kind: &str,
        logical_id: &str,
        config: Config,
    ) -> Result<ResourceId> {
        validate_name(logical_id)?;
        self.ensure_open(owner)?;
        let owner_node = self.node(owner);
        if owner_node
            .resources
            .iter()
            .any(|&r| self.descriptor(r).logical_id() == logical_id)
        {
            return Err(SkyweaveError::DuplicateId {
                owner: owner_node.path.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        let path = owner_node.path.child(logical_id);
        let address = path.to_string();
        self.registry.validate(kind, &address, &config)?;
        self.check_cross_stack(&path, &config)?;

        let id = ResourceId::from_index(self.resources.len());
        tracing::debug!(%path, kind, "resource declared");
        self.resources.push(ResourceDescriptor::new(
            id,
            kind.to_string(),
            path,
            owner,
            config,
        ));
        self.nodes[owner.0].resources.push(id);
        Ok(id)
    }

    /// Creates a reference to `attribute` of `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::UnknownAttribute`] if the resource's kind does
    /// not declare `attribute` as an output.
    pub fn reference(&self, resource: ResourceId, attribute: &str) -> Result<Reference> {
        self.track(self.try_reference(resource, attribute))
    }

    fn try_reference(&self, resource: ResourceId, attribute: &str) -> Result<Reference> {
        let descriptor = self.descriptor(resource);
        let provider = self.registry.get(descriptor.kind())?;
        if !provider.declared_outputs().contains(&attribute) {
            return Err(SkyweaveError::UnknownAttribute {
                kind: descriptor.kind().to_string(),
                address: descriptor.address(),
                attribute: attribute.to_string(),
            });
        }
        Ok(Reference::new(
            resource,
            descriptor.address(),
            attribute.to_string(),
        ))
    }

    fn check_cross_stack(&self, consumer: &ConstructPath, config: &Config) -> Result<()> {
        for reference in config.references() {
            let producer = self.descriptor(reference.source());
            if producer.stack() == consumer.stack() {
                continue;
            }
            let exposed = reference
                .export()
                .is_some_and(|export| export.stack == producer.stack());
            if !exposed {
                return Err(SkyweaveError::UnexposedReference {
                    consumer: consumer.to_string(),
                    producer: producer.address(),
                    stack: producer.stack().to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn ensure_open(&self, node: NodeId) -> Result<()> {
        let root = self.root_of(node);
        match self.stacks.iter().find(|s| s.node == root) {
            Some(stack) if !stack.complete => Ok(()),
            Some(_) => Err(SkyweaveError::Config {
                message: format!(
                    "stack {} is complete and can no longer be modified",
                    self.node(root).name()
                ),
            }),
            None => Err(SkyweaveError::NotFound {
                kind: "stack",
                id: self.node(root).path.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::catalog;
    use crate::stack::Stack;

    fn app() -> App {
        App::new(ProviderRegistry::builtin(true))
    }

    fn table_config() -> Config {
        Config::new().with(
            "partition_key",
            crate::value::Value::map([("name", "Id"), ("type", "S")]),
        )
    }

    #[test]
    fn child_paths_are_parent_qualified() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Api").expect("stack");
        let child = app.add_child(stack.node(), "Firewall").expect("child");
        assert_eq!(app.node(child).path().to_string(), "Api/Firewall");
        assert_eq!(app.node(child).parent(), Some(stack.node()));
        assert_eq!(app.root_of(child), stack.node());
    }

    #[test]
    fn duplicate_sibling_name_fails() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Api").expect("stack");
        let _ = app.add_child(stack.node(), "Handler").expect("first");
        let err = app.add_child(stack.node(), "Handler").unwrap_err();
        assert!(matches!(err, SkyweaveError::DuplicateName { .. }));
    }

    #[test]
    fn same_name_under_different_parents_succeeds() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Api").expect("stack");
        let a = app.add_child(stack.node(), "A").expect("a");
        let b = app.add_child(stack.node(), "B").expect("b");
        assert!(app.add_child(a, "Inner").is_ok());
        assert!(app.add_child(b, "Inner").is_ok());
    }

    #[test]
    fn duplicate_logical_id_under_same_owner_fails() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        let _ = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
            .expect("first");
        let err = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
            .unwrap_err();
        assert!(matches!(err, SkyweaveError::DuplicateId { .. }));
    }

    #[test]
    fn same_logical_id_under_different_owners_succeeds() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        let child = app.add_child(stack.node(), "Archive").expect("child");
        let a = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
            .expect("a");
        let b = app
            .declare_resource(child, catalog::TABLE.kind, "X", table_config())
            .expect("b");
        assert_ne!(app.descriptor(a).address(), app.descriptor(b).address());
    }

    #[test]
    fn schema_violation_is_reported() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        let err = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "T", Config::new())
            .unwrap_err();
        assert!(matches!(err, SkyweaveError::Schema { .. }));
    }

    #[test]
    fn unknown_attribute_reference_fails() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        let table = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "T", table_config())
            .expect("table");
        assert!(app.reference(table, "table_name").is_ok());
        let err = app.reference(table, "colour").unwrap_err();
        assert!(matches!(err, SkyweaveError::UnknownAttribute { .. }));
    }

    #[test]
    fn self_dependency_fails() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Api").expect("stack");
        let node = app.add_child(stack.node(), "N").expect("node");
        let err = app.add_dependency(node, node).unwrap_err();
        assert!(matches!(err, SkyweaveError::SelfDependency { .. }));
    }

    #[test]
    fn repeated_dependency_recorded_once() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Api").expect("stack");
        let a = app.add_child(stack.node(), "A").expect("a");
        let b = app.add_child(stack.node(), "B").expect("b");
        app.add_dependency(a, b).expect("first");
        app.add_dependency(a, b).expect("second");
        assert_eq!(app.node(a).dependencies(), &[DependencyTarget::Node(b)]);
    }

    #[test]
    fn preorder_visits_children_in_insertion_order() {
        let mut app = app();
        let first = Stack::new(&mut app, "First").expect("first");
        let z = app.add_child(first.node(), "Z").expect("z");
        let a = app.add_child(first.node(), "A").expect("a");
        let z1 = app.add_child(z, "Z1").expect("z1");
        let second = Stack::new(&mut app, "Second").expect("second");
        assert_eq!(
            app.preorder(),
            vec![first.node(), z, z1, a, second.node()]
        );
    }

    #[test]
    fn first_failure_abandons_the_app() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        assert!(app.ensure_intact().is_ok());
        let _ = app
            .declare_resource(stack.node(), catalog::TABLE.kind, "T", Config::new())
            .unwrap_err();
        let _ = app.add_child(stack.node(), "").unwrap_err();

        let err = app.ensure_intact().unwrap_err();
        assert!(matches!(err, SkyweaveError::Abandoned { .. }));
        assert!(err.to_string().contains("schema violation"), "got: {err}");
        assert!(app.failure().is_some_and(|f| f.contains("Persistent/T")));
    }

    #[test]
    fn completed_stack_rejects_mutation() {
        let mut app = app();
        let stack = Stack::new(&mut app, "Persistent").expect("stack");
        let node = stack.node();
        stack.complete(&mut app).expect("complete");
        assert!(app.add_child(node, "Late").is_err());
        assert!(
            app.declare_resource(node, catalog::TABLE.kind, "T", table_config())
                .is_err()
        );
    }
}
