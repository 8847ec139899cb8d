//! `covenant validate`: build resource constraints from a file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use covenant_core::config::Config;
use covenant_core::contracts::{
    ReasoningEffort, ResourceConstraints, ResourceConstraintsBuilder, TokenMode,
};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Constraints file (.json, .yaml or .toml)
    #[arg(short = 'f', long)]
    constraints: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    token_mode: TokenMode,
    reasoning_effort: Option<ReasoningEffort>,
    recommended_effort: Option<ReasoningEffort>,
    constraints: ResourceConstraints,
}

pub fn execute(args: ValidateArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let builder: ResourceConstraintsBuilder = super::read_structured(&args.constraints)?;
    let thresholds = &config.enforcement.reasoning_thresholds;
    let constraints = builder
        .build_with(thresholds)
        .with_context(|| format!("Invalid constraints in {}", args.constraints.display()))?;

    let report = ValidationReport {
        token_mode: constraints.token_mode(),
        reasoning_effort: constraints.reasoning_effort(),
        recommended_effort: constraints.recommended_reasoning_effort_with(thresholds),
        constraints,
    };

    let OutputFormat::Table = format else {
        return output::print_item(&report, format);
    };

    output::print_success(&format!("{} is valid", args.constraints.display()));
    output::print_detail("Token mode", &report.token_mode.to_string());
    output::print_detail("Reasoning effort", &output::limit(report.reasoning_effort));
    output::print_detail("Recommended effort", &output::limit(report.recommended_effort));

    let c = &report.constraints;
    let limits = [
        ("tokens", output::limit(c.tokens())),
        ("reasoning_tokens", output::limit(c.reasoning_tokens())),
        ("text_tokens", output::limit(c.text_tokens())),
        ("api_calls", output::limit(c.api_calls())),
        ("web_searches", output::limit(c.web_searches())),
        ("tool_invocations", output::limit(c.tool_invocations())),
        ("memory_mb", output::limit(c.memory_mb())),
        ("compute_seconds", output::limit(c.compute_seconds())),
        ("cost_usd", output::limit(c.cost_usd())),
    ];
    for (name, value) in limits.iter().filter(|(_, v)| v != "-") {
        output::print_detail(name, value);
    }
    Ok(())
}
