//! `Persistent` stack: the video table and the network.

use skyweave_common::error::Result;
use skyweave_core::construct::App;
use skyweave_core::provider::catalog;
use skyweave_core::stack::{Stack, StackOutput};
use skyweave_core::value::{Config, Value};

/// Stack name.
pub const NAME: &str = "Persistent";

/// Outputs exposed to other stacks.
#[derive(Debug, Clone)]
pub struct PersistentStack {
    /// Name of the video table.
    pub table_name: StackOutput,
    /// Id of the network.
    pub vpc_id: StackOutput,
}

/// Declares and completes the stack.
///
/// # Errors
///
/// Returns an error if any declaration is rejected.
pub fn build(app: &mut App) -> Result<PersistentStack> {
    let stack = Stack::new(app, NAME)?;

    let table = app.declare_resource(
        stack.node(),
        catalog::TABLE.kind,
        "VideoTable",
        Config::new()
            .with("billing_mode", "PAY_PER_REQUEST")
            .with("partition_key", Value::map([("name", "Id"), ("type", "S")])),
    )?;
    let vpc = app.declare_resource(
        stack.node(),
        catalog::VPC.kind,
        "Vpc",
        Config::new()
            .with("cidr_block", "10.0.0.0/16")
            .with("max_azs", 2),
    )?;

    let table_name = stack.expose_output(app, "tableName", table, "table_name")?;
    let vpc_id = stack.expose_output(app, "vpcId", vpc, "vpc_id")?;
    stack.complete(app)?;

    Ok(PersistentStack { table_name, vpc_id })
}
