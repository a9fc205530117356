//! # skyweave-core
//!
//! The declarative half of the composition pipeline.
//!
//! This crate provides:
//! - **Value**: typed configuration trees that may embed deferred references.
//! - **Descriptor**: immutable resource descriptors with once-populated outputs.
//! - **Provider**: the per-kind schema contract and the built-in catalog.
//! - **Construct**: the arena-backed construct tree owned by the [`App`](construct::App) root.
//! - **Stack**: stack roots, exposed outputs, and cross-stack consumption.
//! - **Security**: the security-association construct binding a policy set to a target.
//!
//! Ordering, cycle detection, and synthesis live in `skyweave-compose`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod construct;
pub mod descriptor;
pub mod provider;
pub mod security;
pub mod stack;
pub mod value;
