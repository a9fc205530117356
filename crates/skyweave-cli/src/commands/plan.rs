//! `skyweave plan` — Print the ordered deployment plan.

use clap::Args;
use skyweave_common::config::SkyweaveConfig;

use super::AppArgs;
use crate::{app, output};

/// Arguments for the `plan` command.
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Optional parts of the sample service.
    #[command(flatten)]
    pub app: AppArgs,

    /// Print the full plan as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// Composes the service, orders its resources, and prints one line per
/// resource with its level and dependencies, followed by the digest.
///
/// # Errors
///
/// Returns an error if composition or ordering fails.
pub fn execute(args: &PlanArgs, config: &SkyweaveConfig) -> anyhow::Result<()> {
    let options = args.app.options()?;
    let app = app::build_app(config, &options)?;
    let plan = skyweave_compose::plan::plan(app)?;

    if args.json {
        println!("{}", plan.to_json()?);
    } else {
        print!("{}", output::render_plan(&plan));
    }
    Ok(())
}
