//! # skyweave — Skyweave CLI
//!
//! Composes the sample video service from its stacks, orders every
//! resource, and synthesizes one deployment template per stack.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod app;
mod commands;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::{Cli, LogFormat};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    commands::execute(cli)
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
