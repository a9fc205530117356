//! `Api` stack: REST API, its stage, the video handler, and an optional firewall.

use skyweave_common::error::Result;
use skyweave_core::construct::App;
use skyweave_core::descriptor::ResourceId;
use skyweave_core::provider::catalog;
use skyweave_core::security::{SecurityAssociation, SecurityAssociationProps};
use skyweave_core::stack::{Stack, StackOutput};
use skyweave_core::value::{Config, Value};

/// Stack name.
pub const NAME: &str = "Api";

/// Execution role assumed by the handler, substituted per account at deploy time.
pub const HANDLER_ROLE: &str = "arn:aws:iam::${AWS::AccountId}:role/LabRole";

/// Inputs wired in from other stacks.
#[derive(Debug, Clone)]
pub struct ApiProps {
    /// Table the handler reads and writes.
    pub table_name: StackOutput,
    /// Network to attach the handler to, if any.
    pub vpc_id: Option<StackOutput>,
    /// Firewall rule statements; no firewall without them.
    pub rules: Option<Vec<Value>>,
    /// Deployment stage name.
    pub stage_name: String,
}

/// Handles to the declared resources.
#[derive(Debug, Clone, Copy)]
pub struct ApiStack {
    /// The REST API.
    pub rest_api: ResourceId,
    /// Its deployment stage.
    pub stage: ResourceId,
    /// The video handler function.
    pub handler: ResourceId,
    /// Firewall bound to the stage, when rules were given.
    pub firewall: Option<SecurityAssociation>,
}

/// Declares and completes the stack.
///
/// # Errors
///
/// Returns an error if a consumed output belongs to an incomplete stack or
/// any declaration is rejected.
pub fn build(app: &mut App, props: ApiProps) -> Result<ApiStack> {
    let stack = Stack::new(app, NAME)?;

    let rest_api = app.declare_resource(
        stack.node(),
        catalog::REST_API.kind,
        "videos-api",
        Config::new()
            .with("name", "Videos API Service")
            .with("description", "This service serves videos.")
            .with("cloud_watch_role", false),
    )?;
    let api_id = app.reference(rest_api, "rest_api_id")?;
    let stage = app.declare_resource(
        stack.node(),
        catalog::STAGE.kind,
        "Stage",
        Config::new()
            .with("rest_api_id", api_id)
            .with("stage_name", props.stage_name),
    )?;

    let firewall = match props.rules {
        Some(rules) => Some(SecurityAssociation::new(
            app,
            stack.node(),
            "Firewall",
            SecurityAssociationProps::new(stage, rules),
        )?),
        None => None,
    };

    let table_name = app.consume(&props.table_name)?;
    let vpc_config = match &props.vpc_id {
        Some(output) => Some(Value::map([("vpc_id", app.consume(output)?)])),
        None => None,
    };
    let handler = app.declare_resource(
        stack.node(),
        catalog::FUNCTION.kind,
        "VideoHandler",
        Config::new()
            .with("runtime", "nodejs14.x")
            .with("handler", "index.handler")
            .with("code", "resources/videos.ts")
            .with("role", Value::sub(HANDLER_ROLE))
            .with("environment", Value::map([("VIDEOS_TABLE_NAME", table_name)]))
            .with_opt("vpc_config", vpc_config),
    )?;

    stack.complete(app)?;
    Ok(ApiStack {
        rest_api,
        stage,
        handler,
        firewall,
    })
}
