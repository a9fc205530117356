//! Stacks and cross-stack wiring.
//!
//! A stack is a parentless construct node. It is open while its constructor
//! runs and complete afterwards; only complete stacks can have their exposed
//! outputs consumed by other stacks.

use std::collections::BTreeMap;

use skyweave_common::error::{Result, SkyweaveError};
use skyweave_common::types::validate_output_name;

use crate::construct::{App, NodeId};
use crate::descriptor::ResourceId;
use crate::value::{ExportRef, Reference};

/// Bookkeeping for one stack root.
#[derive(Debug, Clone)]
pub struct StackRecord {
    pub(crate) node: NodeId,
    pub(crate) complete: bool,
    pub(crate) outputs: BTreeMap<String, Reference>,
}

impl StackRecord {
    /// Root node of the stack.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Whether construction has finished.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Exposed outputs by name.
    #[must_use]
    pub const fn outputs(&self) -> &BTreeMap<String, Reference> {
        &self.outputs
    }
}

/// Handle to a stack under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    node: NodeId,
    name: String,
}

impl Stack {
    /// Registers a new, open stack named `name` in `app`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::DuplicateName`] if another stack uses `name`.
    pub fn new(app: &mut App, name: &str) -> Result<Self> {
        let node = app.push_root(name)?;
        app.stacks.push(StackRecord {
            node,
            complete: false,
            outputs: BTreeMap::new(),
        });
        tracing::info!(stack = name, "stack construction started");
        Ok(Self {
            node,
            name: name.to_string(),
        })
    }

    /// Root construct node.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exposes `attribute` of `resource` as the named output `name`.
    ///
    /// # Errors
    ///
    /// - [`SkyweaveError::AlreadyExposed`] if `name` is already exposed.
    /// - [`SkyweaveError::UnknownAttribute`] if the kind lacks `attribute`.
    /// - [`SkyweaveError::Config`] if `name` is not alphanumeric or
    ///   `resource` belongs to another stack.
    pub fn expose_output(
        &self,
        app: &mut App,
        name: &str,
        resource: ResourceId,
        attribute: &str,
    ) -> Result<StackOutput> {
        let result = self.try_expose_output(app, name, resource, attribute);
        app.track(result)
    }

    fn try_expose_output(
        &self,
        app: &mut App,
        name: &str,
        resource: ResourceId,
        attribute: &str,
    ) -> Result<StackOutput> {
        validate_output_name(name)?;
        let owner = app.descriptor(resource).owner();
        if app.root_of(owner) != self.node {
            return Err(SkyweaveError::Config {
                message: format!(
                    "stack {} cannot expose {}, which it does not own",
                    self.name,
                    app.descriptor(resource).address()
                ),
            });
        }
        let reference = app.reference(resource, attribute)?;
        app.ensure_open(self.node)?;
        let record = app.stack_record_mut(self.node)?;
        if record.outputs.contains_key(name) {
            return Err(SkyweaveError::AlreadyExposed {
                stack: self.name.clone(),
                name: name.to_string(),
            });
        }
        let _ = record.outputs.insert(name.to_string(), reference.clone());
        tracing::debug!(stack = %self.name, output = name, "output exposed");
        Ok(StackOutput {
            stack: self.name.clone(),
            name: name.to_string(),
            reference,
        })
    }

    /// Orders this whole stack after `other`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::SelfDependency`] if `other` is this stack.
    pub fn add_dependency(&self, app: &mut App, other: &Self) -> Result<()> {
        app.add_dependency(self.node, other.node)
    }

    /// Finishes construction; the stack is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::NotFound`] if the stack is not part of `app`.
    pub fn complete(self, app: &mut App) -> Result<()> {
        let result = app.stack_record_mut(self.node).map(|record| {
            record.complete = true;
            record.outputs.len()
        });
        let outputs = app.track(result)?;
        tracing::info!(stack = %self.name, outputs, "stack construction completed");
        Ok(())
    }
}

/// A named output exposed by a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    stack: String,
    name: String,
    reference: Reference,
}

impl StackOutput {
    /// Producing stack.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Output name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl App {
    /// Stack records in creation order.
    #[must_use]
    pub fn stacks(&self) -> &[StackRecord] {
        &self.stacks
    }

    /// Obtains a reference to an exposed output for use in another stack.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::IncompleteStack`] if the producing stack is
    /// still under construction.
    pub fn consume(&self, output: &StackOutput) -> Result<Reference> {
        self.track(self.try_consume(output))
    }

    fn try_consume(&self, output: &StackOutput) -> Result<Reference> {
        let record = self.stack_record_by_name(&output.stack)?;
        if !record.complete {
            return Err(SkyweaveError::IncompleteStack {
                stack: output.stack.clone(),
                output: output.name.clone(),
            });
        }
        Ok(output.reference.clone().via_export(ExportRef {
            stack: output.stack.clone(),
            output: output.name.clone(),
        }))
    }

    /// Looks up an exposed output by stack and output name.
    ///
    /// Only exposed outputs are addressable; a stack's private resources are not.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::NotFound`] if the stack or output does not exist.
    pub fn stack_output(&self, stack: &str, name: &str) -> Result<StackOutput> {
        let record = self.stack_record_by_name(stack)?;
        let reference = record
            .outputs
            .get(name)
            .ok_or_else(|| SkyweaveError::NotFound {
                kind: "stack output",
                id: format!("{stack}.{name}"),
            })?;
        Ok(StackOutput {
            stack: stack.to_string(),
            name: name.to_string(),
            reference: reference.clone(),
        })
    }

    fn stack_record_by_name(&self, name: &str) -> Result<&StackRecord> {
        self.stacks
            .iter()
            .find(|s| self.node(s.node).name() == name)
            .ok_or_else(|| SkyweaveError::NotFound {
                kind: "stack",
                id: name.to_string(),
            })
    }

    fn stack_record_mut(&mut self, node: NodeId) -> Result<&mut StackRecord> {
        self.stacks
            .iter_mut()
            .find(|s| s.node == node)
            .ok_or_else(|| SkyweaveError::NotFound {
                kind: "stack",
                id: node.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderRegistry, catalog};
    use crate::value::{Config, Value};

    fn persistent(app: &mut App) -> (Stack, ResourceId) {
        let stack = Stack::new(app, "Persistent").expect("stack");
        let table = app
            .declare_resource(
                stack.node(),
                catalog::TABLE.kind,
                "VideoTable",
                Config::new().with("partition_key", Value::map([("name", "Id")])),
            )
            .expect("table");
        (stack, table)
    }

    fn function_config(table_name: Reference) -> Config {
        Config::new()
            .with("runtime", "nodejs14.x")
            .with("handler", "index.handler")
            .with("code", "resources/videos.ts")
            .with("role", "arn:aws:iam::123456789012:role/LabRole")
            .with("environment", Value::map([("VIDEOS_TABLE_NAME", table_name)]))
    }

    #[test]
    fn duplicate_stack_name_fails() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let _ = Stack::new(&mut app, "Api").expect("first");
        let err = Stack::new(&mut app, "Api").unwrap_err();
        assert!(matches!(err, SkyweaveError::DuplicateName { .. }));
    }

    #[test]
    fn exposing_same_output_twice_fails() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        let _ = stack
            .expose_output(&mut app, "tableName", table, "table_name")
            .expect("first");
        let err = stack
            .expose_output(&mut app, "tableName", table, "arn")
            .unwrap_err();
        assert!(matches!(err, SkyweaveError::AlreadyExposed { .. }));
    }

    #[test]
    fn malformed_output_names_are_rejected() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        for bad in ["", "table-name", "Persistent:tableName"] {
            let err = stack
                .expose_output(&mut app, bad, table, "table_name")
                .unwrap_err();
            assert!(matches!(err, SkyweaveError::Config { .. }), "{bad:?}: {err}");
        }
        let _ = stack
            .expose_output(&mut app, "tablename", table, "table_name")
            .expect("plain name");
        let record = app.stacks().first().expect("record");
        assert_eq!(record.outputs().len(), 1);
    }

    #[test]
    fn consuming_incomplete_stack_fails() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        let output = stack
            .expose_output(&mut app, "tableName", table, "table_name")
            .expect("expose");
        let err = app.consume(&output).unwrap_err();
        assert!(matches!(err, SkyweaveError::IncompleteStack { .. }));
        assert!(matches!(
            app.ensure_intact().unwrap_err(),
            SkyweaveError::Abandoned { .. }
        ));
    }

    #[test]
    fn consumed_output_wires_into_other_stack() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        let output = stack
            .expose_output(&mut app, "tableName", table, "table_name")
            .expect("expose");
        stack.complete(&mut app).expect("complete");

        let api = Stack::new(&mut app, "Api").expect("api");
        let reference = app.consume(&output).expect("consume");
        assert_eq!(
            reference.export().map(ExportRef::export_name).as_deref(),
            Some("Persistent:tableName")
        );
        let handler = app.declare_resource(
            api.node(),
            catalog::FUNCTION.kind,
            "VideoHandler",
            function_config(reference),
        );
        assert!(handler.is_ok());
    }

    #[test]
    fn raw_cross_stack_reference_is_rejected() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        stack.complete(&mut app).expect("complete");

        let api = Stack::new(&mut app, "Api").expect("api");
        let raw = app.reference(table, "table_name").expect("reference");
        let err = app
            .declare_resource(
                api.node(),
                catalog::FUNCTION.kind,
                "VideoHandler",
                function_config(raw),
            )
            .unwrap_err();
        assert!(matches!(err, SkyweaveError::UnexposedReference { .. }));
    }

    #[test]
    fn stack_output_lookup_only_sees_exposed_outputs() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (stack, table) = persistent(&mut app);
        let _ = stack
            .expose_output(&mut app, "tableName", table, "table_name")
            .expect("expose");
        assert!(app.stack_output("Persistent", "tableName").is_ok());
        assert!(matches!(
            app.stack_output("Persistent", "VideoTable").unwrap_err(),
            SkyweaveError::NotFound { .. }
        ));
        assert!(app.stack_output("Missing", "tableName").is_err());
    }

    #[test]
    fn exposing_foreign_resource_fails() {
        let mut app = App::new(ProviderRegistry::builtin(true));
        let (persistent, table) = persistent(&mut app);
        persistent.complete(&mut app).expect("complete");
        let api = Stack::new(&mut app, "Api").expect("api");
        assert!(
            api.expose_output(&mut app, "tableName", table, "table_name")
                .is_err()
        );
    }
}
