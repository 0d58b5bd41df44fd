//! Demonstration command-line interface for the model router.
//!
//! This crate is a thin consumer of `router-core` and `router-orchestrator`'s
//! public surface (`Orchestrator::route`, `ModelRegistry`, `CostEvent`); it
//! carries no routing logic of its own. `anyhow` is used throughout since
//! this is the outer edge of the workspace — library crates return
//! `RouterResult`, this crate converts those into `anyhow::Result` for
//! convenient `?` composition and top-level reporting.

pub mod args;
pub mod cli;
