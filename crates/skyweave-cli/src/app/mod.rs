//! The sample video service composed by the CLI.
//!
//! `Persistent` owns the table and network and exposes them; `Api` consumes
//! them. The firewall and the network attachment are opt-in.

pub mod api;
pub mod persistent;

use std::path::Path;

use anyhow::Context;
use skyweave_common::config::SkyweaveConfig;
use skyweave_common::error::Result;
use skyweave_core::construct::App;
use skyweave_core::value::Value;

/// Optional parts of the sample service.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Attach the video handler to the persistent network.
    pub vpc: bool,
    /// Firewall rule statements; `None` means no firewall.
    pub rules: Option<Vec<Value>>,
}

/// Composes both stacks into a fresh app.
///
/// # Errors
///
/// Returns an error if any stack rejects a declaration.
pub fn build_app(config: &SkyweaveConfig, options: &AppOptions) -> Result<App> {
    let mut app = App::from_config(config);
    let persistent = persistent::build(&mut app)?;
    let api_stack = api::build(
        &mut app,
        api::ApiProps {
            table_name: persistent.table_name,
            vpc_id: options.vpc.then_some(persistent.vpc_id),
            rules: options.rules.clone(),
            stage_name: config.stage_name.clone(),
        },
    )?;
    tracing::debug!(
        rest_api = %app.descriptor(api_stack.rest_api).address(),
        stage = %app.descriptor(api_stack.stage).address(),
        handler = %app.descriptor(api_stack.handler).address(),
        "api resources declared"
    );
    tracing::info!(
        stacks = app.stacks().len(),
        resources = app.resources().len(),
        firewall = api_stack.firewall.is_some(),
        vpc = options.vpc,
        "video service composed"
    );
    Ok(app)
}

/// Reads firewall rule statements from a JSON array file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not JSON, or is not an array.
pub fn load_rules(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("rules file {} is not valid JSON", path.display()))?;
    let serde_json::Value::Array(rules) = json else {
        anyhow::bail!("rules file {} must contain a JSON array", path.display());
    };
    Ok(rules.iter().map(Value::from).collect())
}
