//! Core CLI functionality: argument parsing, orchestrator bootstrap, and
//! command dispatch for the demonstration `router-cli` binary.

use crate::args::{Command, RouterArgs};
use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use owo_colors::OwoColorize;
use router_core::config::RuntimeConfig;
use router_core::model_registry::ModelRegistry;
use router_core::price_table::PriceTable;
use router_core::types::RouteRequest;
use router_orchestrator::analyzer::TaskAnalyzer;
use router_orchestrator::guide::Guide;
use router_orchestrator::Orchestrator;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn bootstrap(config_dir: &str) -> Result<Orchestrator> {
    debug!("bootstrapping orchestrator from config_dir={config_dir}");
    let dir = Path::new(config_dir);
    let registry_path = dir.join("model_registry.yaml");
    let price_table_path = dir.join("price_table.yaml");
    let patterns_path = dir.join("task_patterns.yaml");
    let guide_path = dir.join("guide.yaml");
    let runtime_path = dir.join("runtime.yaml");

    let registry = ModelRegistry::load(&registry_path)
        .with_context(|| format!("loading model registry from {}", registry_path.display()))?;
    let price_table = PriceTable::load(&price_table_path)
        .with_context(|| format!("loading price table from {}", price_table_path.display()))?;
    let config = load_runtime_config(&runtime_path)?;
    let analyzer = TaskAnalyzer::load_or_fallback(&patterns_path, config.analyzer_cache_size);
    let guide = Guide::load_or_empty(&guide_path);

    Ok(Orchestrator::new(config, registry, price_table, analyzer, guide))
}

fn load_runtime_config(path: &PathBuf) -> Result<RuntimeConfig> {
    let path_opt = if path.exists() { Some(path.as_path()) } else { None };
    RuntimeConfig::load(path_opt).context("loading runtime configuration")
}

pub async fn run() -> Result<()> {
    let args = RouterArgs::parse();
    let orchestrator = bootstrap(&args.config_dir)?;

    match args.command {
        Command::Route {
            prompt,
            task,
            priority,
            model,
            deadline_ms,
        } => route(&orchestrator, prompt, task, priority, model, deadline_ms).await,
        Command::Models => {
            list_models(&orchestrator);
            Ok(())
        }
        Command::Health => health(&orchestrator).await,
    }
}

async fn route(
    orchestrator: &Orchestrator,
    prompt: String,
    task: Option<router_core::types::TaskType>,
    priority: router_core::types::Priority,
    model: Option<String>,
    deadline_ms: Option<u64>,
) -> Result<()> {
    let request = RouteRequest {
        prompt,
        task_hint: task,
        priority: Some(priority),
        model_hint: model,
        deadline: deadline_ms.map(Duration::from_millis),
        ..Default::default()
    };

    debug!("dispatching route request task_hint={:?} priority={:?}", task, priority);
    let result = orchestrator.route(request).await;
    match result {
        Ok(response) => {
            if let Some(content) = &response.response.content {
                println!("{content}");
            }
            let event = &response.cost_event;
            eprintln!(
                "{} model={} provider={} tokens={} cost=${:.6} fallback_depth={}",
                "·".dimmed(),
                event.model_id,
                event.provider,
                event.prompt_tokens + event.completion_tokens,
                event.cost_usd_total,
                response.fallback_depth,
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            Err(e.into())
        }
    }
}

fn list_models(orchestrator: &Orchestrator) {
    for model in orchestrator.list_models() {
        println!(
            "{:<28} {:<10} ctx={:<8} tier={:?}",
            model.id, model.provider, model.context_window, model.cost_tier
        );
    }
}

async fn health(orchestrator: &Orchestrator) -> Result<()> {
    for (provider, healthy) in orchestrator.health().await {
        let marker = if healthy { "ok".green().to_string() } else { "down".red().to_string() };
        println!("{provider:<10} {marker}");
    }
    Ok(())
}
