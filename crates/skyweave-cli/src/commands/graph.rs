//! `skyweave graph` — Print the ordering graph in DOT format.

use clap::Args;
use skyweave_common::config::SkyweaveConfig;
use skyweave_compose::graph::CompositionGraph;

use super::AppArgs;
use crate::app;

/// Arguments for the `graph` command.
#[derive(Args, Debug, Clone, Default)]
pub struct GraphArgs {
    /// Optional parts of the sample service.
    #[command(flatten)]
    pub app: AppArgs,
}

/// Executes the `graph` command.
///
/// The graph is printed before the cycle check, so a cyclic graph can still
/// be inspected.
///
/// # Errors
///
/// Returns an error if composition fails or the graph has a cycle.
pub fn execute(args: &GraphArgs, config: &SkyweaveConfig) -> anyhow::Result<()> {
    let options = args.app.options()?;
    let app = app::build_app(config, &options)?;
    let graph = CompositionGraph::build(&app);
    println!("{}", graph.to_dot());
    graph.check_acyclic()?;
    Ok(())
}
