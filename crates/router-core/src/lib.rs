// crates/router-core/src/lib.rs

//! Core data types, error taxonomy, and leaf components (C1, C2) of the
//! LLM router: the model registry, the price table, the task-analyzer
//! cache, credential resolution, and layered runtime configuration.
//!
//! Everything in this crate is pure or read-mostly; the stateful pipeline
//! components (analyzer, scorer, selector, client pool, executor, fallback
//! manager, cost tracker, orchestrator) live in `router-orchestrator` and
//! the provider wire adapters live in `router-providers`, both of which
//! depend on this crate for shared types and errors.

pub mod auth;
pub mod cache;
pub mod config;
pub mod cost_calculator;
pub mod error;
pub mod model_registry;
pub mod price_table;
pub mod types;
