//! `covenant templates`: list presets with their per-mode limits.

use anyhow::Result;
use clap::Args;
use covenant_core::config::Config;
use covenant_core::contracts::{ContractMode, Template};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct TemplatesArgs {
    /// Only show limits for this mode
    #[arg(short, long)]
    mode: Option<ContractMode>,
}

#[derive(Debug, Serialize, Tabled)]
struct TemplateRow {
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
    #[tabled(rename = "Cost ($)")]
    cost_usd: String,
    #[tabled(rename = "API Calls")]
    api_calls: String,
    #[tabled(rename = "Max Duration")]
    max_duration: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn execute(args: TemplatesArgs, _config: &Config, format: OutputFormat) -> Result<()> {
    let modes: Vec<ContractMode> = match args.mode {
        Some(mode) => vec![mode],
        None => ContractMode::ALL.to_vec(),
    };

    let mut rows = Vec::new();
    for template in Template::ALL {
        for &mode in &modes {
            let contract = template.create_default(mode)?;
            rows.push(TemplateRow {
                template: template.to_string(),
                mode: mode.to_string(),
                tokens: output::limit(contract.resources.tokens()),
                cost_usd: output::limit(contract.resources.cost_usd().map(|c| format!("{:.2}", c))),
                api_calls: output::limit(contract.resources.api_calls()),
                max_duration: output::limit(
                    contract
                        .temporal
                        .max_duration()
                        .map(|d| format!("{}s", d.as_secs())),
                ),
                description: template.description().to_string(),
            });
        }
    }

    output::print_rows(&rows, &rows, format)
}
