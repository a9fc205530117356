//! # skyweave-compose
//!
//! Turns a fully constructed [`App`](skyweave_core::construct::App) into a
//! deployment plan.
//!
//! Handles:
//! - **Graph**: Composition graph assembly with `petgraph`, cycle detection,
//!   and deterministic topological resolution.
//! - **Resolver**: Replacement of references with realized output tokens.
//! - **Plan**: The ordered, fully resolved deployment plan handed to synthesizers.
//! - **Synth**: The synthesizer contract and a template synthesizer.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod graph;
pub mod plan;
pub mod resolver;
pub mod synth;
