//! `covenant recommend`: strategy advice for a given budget utilization.

use anyhow::Result;
use clap::Args;
use colored::*;
use covenant_core::config::Config;
use covenant_core::contracts::{Contract, ContractMode, ResourceConstraints, ResourceUsage};
use covenant_core::planning::{recommend_strategy, RiskLevel};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RecommendArgs {
    /// Contract mode (defaults to the configured planner mode)
    #[arg(short, long)]
    mode: Option<ContractMode>,

    /// Token limit of the contract
    #[arg(short, long)]
    limit: u64,

    /// Tokens consumed so far
    #[arg(short, long, default_value = "0")]
    used: u64,
}

pub fn execute(args: RecommendArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let mode = args.mode.unwrap_or(config.planner.default_mode);
    let contract = Contract::new("recommend", "Recommend")
        .with_mode(mode)
        .with_resources(ResourceConstraints::builder().tokens(args.limit).build()?);

    let mut usage = ResourceUsage::new();
    usage.add_tokens(args.used, 0, 0);

    let recommendation = recommend_strategy(&contract, Some(&usage));

    let OutputFormat::Table = format else {
        return output::print_item(&recommendation, format);
    };

    let risk = match recommendation.risk_level {
        RiskLevel::Low => "low".green(),
        RiskLevel::Medium => "medium".yellow(),
        RiskLevel::High => "high".red(),
    };

    output::print_header("Strategy recommendation");
    output::print_detail("Mode", recommendation.mode.as_str());
    output::print_detail(
        "Budget utilization",
        &format!("{:.1}%", recommendation.budget_utilization * 100.0),
    );
    output::print_detail("Risk", &risk.to_string());
    output::print_detail("Approach", &recommendation.recommended_approach);
    output::print_detail(
        "Continue",
        if recommendation.should_continue { "yes" } else { "no" },
    );
    for warning in &recommendation.warnings {
        output::print_warning(warning);
    }
    Ok(())
}
