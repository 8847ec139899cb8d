//! Covenant CLI - plan and inspect budget contracts for LLM agents.
//!
//! Everything runs locally against `covenant-core`; no server is involved.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{estimate, plan, recommend, templates, validate};
use output::OutputFormat;

/// Covenant - budget and deadline contracts for autonomous agents
#[derive(Parser)]
#[command(
    name = "covenant",
    author = "Aezi <aezi.zhu@icloud.com>",
    version = "0.1.0",
    about = "Covenant - budget and deadline contracts for autonomous agents",
    long_about = "Plan task allocations, compare approaches and validate resource constraints for Covenant contracts.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Configuration file (defaults to ~/.covenant/config.toml when present)
    #[arg(short, long, global = true, env = "COVENANT_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contract templates and their limits
    Templates(templates::TemplatesArgs),

    /// Prioritize tasks and allocate the token budget
    Plan(plan::PlanArgs),

    /// Compare quality, tokens and time across approaches
    Estimate(estimate::EstimateArgs),

    /// Recommend a strategy for the current budget utilization
    Recommend(recommend::RecommendArgs),

    /// Validate resource constraints from a file
    Validate(validate::ValidateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = covenant_core::telemetry::init_logging(&config.logging, "cli") {
        output::print_warning(&format!("Logging disabled: {:#}", e));
    }

    let format = cli.output;

    let result = match cli.command {
        Commands::Templates(args) => templates::execute(args, &config, format),
        Commands::Plan(args) => plan::execute(args, &config, format),
        Commands::Estimate(args) => estimate::execute(args, &config, format),
        Commands::Recommend(args) => recommend::execute(args, &config, format),
        Commands::Validate(args) => validate::execute(args, &config, format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
