//! CLI command definitions and dispatch.

pub mod graph;
pub mod plan;
pub mod synth;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use skyweave_common::config::SkyweaveConfig;

use crate::app::{self, AppOptions};

/// Skyweave — compose infrastructure stacks into deployment templates.
#[derive(Parser, Debug)]
#[command(name = skyweave_common::constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a YAML configuration file.
    #[arg(long, global = true, env = "SKYWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the ordered deployment plan.
    Plan(plan::PlanArgs),
    /// Write one template per stack plus the plan.
    Synth(synth::SynthArgs),
    /// Print the ordering graph in DOT format.
    Graph(graph::GraphArgs),
}

/// Options selecting the optional parts of the sample service.
#[derive(Args, Debug, Clone, Default)]
pub struct AppArgs {
    /// JSON array of firewall rule statements; enables the firewall.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Attach the video handler to the persistent network.
    #[arg(long)]
    pub vpc: bool,
}

impl AppArgs {
    /// Resolves the arguments into build options.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules file cannot be loaded.
    pub fn options(&self) -> anyhow::Result<AppOptions> {
        let rules = match &self.rules {
            Some(path) => Some(app::load_rules(path)?),
            None => None,
        };
        Ok(AppOptions {
            vpc: self.vpc,
            rules,
        })
    }
}

/// Loads the configuration file, or the defaults when none is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<SkyweaveConfig> {
    match path {
        Some(path) => {
            let config = SkyweaveConfig::load(path)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(SkyweaveConfig::default()),
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Plan(args) => plan::execute(&args, &config),
        Command::Synth(args) => synth::execute(&args, &config),
        Command::Graph(args) => graph::execute(&args, &config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "skyweave",
            "synth",
            "--vpc",
            "--format",
            "yaml",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert!(args.app.vpc);
        assert_eq!(args.format, Some(skyweave_common::config::OutputFormat::Yaml));
    }

    #[test]
    fn missing_config_file_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, SkyweaveConfig::default());
        assert!(load_config(Some(std::path::Path::new("/nonexistent/skyweave.yaml"))).is_err());
    }
}
