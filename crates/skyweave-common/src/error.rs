//! Unified error types for the Skyweave workspace.
//!
//! Every failure here is a construction-time defect in the declarative input.
//! A composition pass that returns any of these is discarded as a whole.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ConstructPath;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum SkyweaveError {
    /// Two resources under the same construct use the same logical id.
    #[error("duplicate logical id \"{logical_id}\" under {owner}")]
    DuplicateId {
        /// Path of the owning construct.
        owner: ConstructPath,
        /// The colliding logical id.
        logical_id: String,
    },

    /// Two sibling constructs use the same name.
    #[error("duplicate construct name \"{name}\" under {parent}")]
    DuplicateName {
        /// Path of the parent construct, or the app for stack roots.
        parent: String,
        /// The colliding child name.
        name: String,
    },

    /// A resource configuration does not satisfy its kind's schema.
    #[error("schema violation in {kind} \"{address}\": {message}")]
    Schema {
        /// Provider kind of the resource.
        kind: String,
        /// Path-qualified address of the resource.
        address: String,
        /// Description of the violation.
        message: String,
    },

    /// A reference names an attribute its kind does not produce.
    #[error("{kind} \"{address}\" does not produce attribute \"{attribute}\"")]
    UnknownAttribute {
        /// Provider kind of the referenced resource.
        kind: String,
        /// Path-qualified address of the referenced resource.
        address: String,
        /// The requested attribute.
        attribute: String,
    },

    /// A construct declared a dependency on itself.
    #[error("construct {path} cannot depend on itself")]
    SelfDependency {
        /// Path of the offending construct.
        path: ConstructPath,
    },

    /// A stack exposed two outputs with the same name.
    #[error("output \"{name}\" is already exposed by stack {stack}")]
    AlreadyExposed {
        /// Name of the stack.
        stack: String,
        /// The colliding output name.
        name: String,
    },

    /// A security association targets a resource without a stable identity.
    #[error("cannot bind {association}: target \"{target}\" ({kind}) has no addressable identity")]
    UnboundTarget {
        /// Path of the association construct.
        association: ConstructPath,
        /// Address of the target resource.
        target: String,
        /// Provider kind of the target resource.
        kind: String,
    },

    /// The ordering graph contains a cycle.
    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency {
        /// Addresses along one concrete cycle, first element repeated at the end.
        path: Vec<String>,
    },

    /// A construction operation failed earlier, so the app cannot be planned.
    #[error("composition abandoned after a failed construction: {cause}")]
    Abandoned {
        /// Message of the first failure.
        cause: String,
    },

    /// A resource references another stack's resource without an exposed output.
    #[error("{consumer} references \"{producer}\" in stack {stack}, which does not expose it as an output")]
    UnexposedReference {
        /// Address of the consuming resource.
        consumer: String,
        /// Address of the referenced resource.
        producer: String,
        /// Name of the producing stack.
        stack: String,
    },

    /// An output was consumed before its stack finished construction.
    #[error("stack {stack} is still under construction; its output \"{output}\" cannot be consumed yet")]
    IncompleteStack {
        /// Name of the producing stack.
        stack: String,
        /// Name of the requested output.
        output: String,
    },

    /// A reference was dereferenced before its producer was realized.
    #[error("reference to {address}.{attribute} dereferenced before its producer was realized")]
    Unresolved {
        /// Address of the producer.
        address: String,
        /// Requested attribute.
        attribute: String,
    },

    /// A required entity was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing entity.
        kind: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML serialization or deserialization failed.
    #[error("yaml error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SkyweaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_full_path() {
        let err = SkyweaveError::CyclicDependency {
            path: vec!["A/X".into(), "B/Y".into(), "A/X".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: A/X -> B/Y -> A/X");
    }

    #[test]
    fn duplicate_id_names_owner_path() {
        let err = SkyweaveError::DuplicateId {
            owner: ConstructPath::root("Api").child("Handler"),
            logical_id: "X".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Api/Handler"), "got: {msg}");
        assert!(msg.contains("\"X\""), "got: {msg}");
    }

    #[test]
    fn json_errors_convert() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SkyweaveError = source.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
