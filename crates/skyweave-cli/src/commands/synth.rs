//! `skyweave synth` — Write one template per stack plus the plan.

use std::path::{Path, PathBuf};

use clap::Args;
use skyweave_common::config::{OutputFormat, SkyweaveConfig};
use skyweave_compose::synth::{Synthesizer, TemplateSynthesizer};

use super::AppArgs;
use crate::app;

/// Arguments for the `synth` command.
#[derive(Args, Debug, Clone, Default)]
pub struct SynthArgs {
    /// Optional parts of the sample service.
    #[command(flatten)]
    pub app: AppArgs,

    /// Output directory; overrides the configuration.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Template format (json or yaml); overrides the configuration.
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

/// Executes the `synth` command.
///
/// # Errors
///
/// Returns an error if composition, ordering, or writing fails.
pub fn execute(args: &SynthArgs, config: &SkyweaveConfig) -> anyhow::Result<()> {
    let out = args.out.as_deref().unwrap_or(config.output_dir.as_path());
    let format = args.format.unwrap_or(config.format);
    let written = synthesize(args, config, out, format)?;

    println!("Synthesized {} file(s) into {}", written.len(), out.display());
    for path in &written {
        println!("  {}", path.display());
    }
    Ok(())
}

fn synthesize(
    args: &SynthArgs,
    config: &SkyweaveConfig,
    out: &Path,
    format: OutputFormat,
) -> anyhow::Result<Vec<PathBuf>> {
    let options = args.app.options()?;
    let app = app::build_app(config, &options)?;
    let plan = skyweave_compose::plan::plan(app)?;
    let assembly = TemplateSynthesizer::new().synthesize(&plan)?;
    Ok(assembly.write_to(out, format)?)
}
