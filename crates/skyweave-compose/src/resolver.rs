//! Reference resolution.
//!
//! Replaces every reference in a consumer's configuration with the realized
//! output of its producer. References obtained through an exposed stack output
//! resolve to an import of that export instead, so each stack's template only
//! names its own resources.

use serde_json::json;
use skyweave_common::error::Result;
use skyweave_core::construct::App;
use skyweave_core::descriptor::ResourceId;
use skyweave_core::value::Reference;

/// Resolves one reference on behalf of a resource in `consumer_stack`.
///
/// # Errors
///
/// Returns [`SkyweaveError::Unresolved`](skyweave_common::error::SkyweaveError::Unresolved)
/// if the producer has not been realized yet.
pub fn resolve_reference(app: &App, consumer_stack: &str, reference: &Reference) -> Result<serde_json::Value> {
    let producer = app.descriptor(reference.source());
    let value = producer.output(reference.attribute())?;
    match reference.export() {
        Some(export) if export.stack != consumer_stack => {
            Ok(json!({ "Fn::ImportValue": export.export_name() }))
        }
        _ => Ok(value.clone()),
    }
}

/// Resolves the whole configuration of `consumer` to JSON.
///
/// # Errors
///
/// Returns an error if any referenced producer has not been realized.
pub fn resolve_config(app: &App, consumer: ResourceId) -> Result<serde_json::Value> {
    let descriptor = app.descriptor(consumer);
    let stack = descriptor.stack();
    descriptor
        .config()
        .resolve(&mut |reference: &Reference| resolve_reference(app, stack, reference))
}
