//! `covenant estimate`: quality/tokens/time tradeoffs for each approach.

use anyhow::Result;
use clap::Args;
use covenant_core::config::Config;
use covenant_core::contracts::{Contract, ContractMode};
use covenant_core::planning::{estimate_quality_cost_time, Approach, TradeoffEstimate};
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct EstimateArgs {
    /// Contract mode (defaults to the configured planner mode)
    #[arg(short, long)]
    mode: Option<ContractMode>,
}

#[derive(Debug, Tabled)]
struct EstimateRow {
    #[tabled(rename = "Approach")]
    approach: String,
    #[tabled(rename = "Quality")]
    quality: String,
    #[tabled(rename = "Tokens")]
    tokens: u64,
    #[tabled(rename = "Time (s)")]
    time_seconds: String,
}

impl From<&TradeoffEstimate> for EstimateRow {
    fn from(e: &TradeoffEstimate) -> Self {
        Self {
            approach: e.approach.to_string(),
            quality: format!("{:.3}", e.quality),
            tokens: e.tokens,
            time_seconds: format!("{:.0}", e.time_seconds),
        }
    }
}

pub fn execute(args: EstimateArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let mode = args.mode.unwrap_or(config.planner.default_mode);
    let contract = Contract::new("estimate", "Estimate").with_mode(mode);

    let estimates: Vec<TradeoffEstimate> = Approach::ALL
        .into_iter()
        .map(|approach| estimate_quality_cost_time(approach, &contract))
        .collect();

    if let OutputFormat::Table = format {
        output::print_header(&format!("Approach tradeoffs ({})", mode));
    }
    let rows: Vec<EstimateRow> = estimates.iter().map(EstimateRow::from).collect();
    output::print_rows(&rows, &estimates, format)
}
