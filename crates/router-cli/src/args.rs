//! Command-line argument definitions for the demonstration CLI.

use clap::{Parser, Subcommand};
use router_core::types::{Priority, TaskType};

#[derive(Parser, Debug)]
#[command(name = "modelcourier", about = "Intelligent LLM request router")]
pub struct RouterArgs {
    /// Directory containing model_registry.yaml, price_table.yaml,
    /// task_patterns.yaml, guide.yaml and runtime.yaml.
    #[arg(long, global = true, value_name = "DIR", default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Route a single prompt through the orchestrator and print the response.
    Route {
        /// The prompt to classify and route.
        prompt: String,

        /// Force a specific task type instead of letting the analyzer classify it.
        #[arg(long, value_parser = parse_task_type)]
        task: Option<TaskType>,

        /// Bias model selection toward quality, speed, cost, or a balance of all three.
        #[arg(long, value_parser = parse_priority, default_value = "balanced")]
        priority: Priority,

        /// Force a specific model id to the front of the candidate chain.
        #[arg(long)]
        model: Option<String>,

        /// Abort the request if it hasn't completed within this many milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// List every model in the registry along with its provider and scores.
    Models,
    /// Probe every provider's credentials and connectivity.
    Health,
}

fn parse_task_type(s: &str) -> Result<TaskType, String> {
    s.parse().map_err(|_| format!("unrecognized task type '{s}'"))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    match s.to_ascii_lowercase().as_str() {
        "quality" => Ok(Priority::Quality),
        "speed" => Ok(Priority::Speed),
        "cost" => Ok(Priority::Cost),
        "balanced" => Ok(Priority::Balanced),
        other => Err(format!("unrecognized priority '{other}' (expected quality, speed, cost or balanced)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_task_type() {
        assert_eq!(parse_task_type("code_generation"), Ok(TaskType::CodeGeneration));
    }

    #[test]
    fn rejects_unknown_task_type() {
        assert!(parse_task_type("not_a_task").is_err());
    }

    #[test]
    fn parses_priority_case_insensitively() {
        assert_eq!(parse_priority("QUALITY"), Ok(Priority::Quality));
        assert_eq!(parse_priority("balanced"), Ok(Priority::Balanced));
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(parse_priority("fastest").is_err());
    }

    #[test]
    fn router_args_parses_route_subcommand() {
        let args = RouterArgs::parse_from([
            "modelcourier",
            "route",
            "hello world",
            "--priority",
            "speed",
            "--deadline-ms",
            "2000",
        ]);
        match args.command {
            Command::Route { prompt, priority, deadline_ms, .. } => {
                assert_eq!(prompt, "hello world");
                assert_eq!(priority, Priority::Speed);
                assert_eq!(deadline_ms, Some(2000));
            }
            _ => panic!("expected Route subcommand"),
        }
    }
}
