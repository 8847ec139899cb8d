//! `covenant plan`: prioritize tasks and allocate the remaining token budget.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use covenant_core::config::Config;
use covenant_core::contracts::{Contract, ContractMode, ResourceUsage, Template};
use covenant_core::planning::{
    plan_resource_allocation, prioritize_tasks, recommend_strategy, ResourceAllocation, Task,
};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct PlanArgs {
    /// Task file (.json, .yaml or .toml)
    #[arg(short, long)]
    tasks: PathBuf,

    /// Take limits from a template instead of the configured defaults
    #[arg(long)]
    template: Option<Template>,

    /// Contract mode (defaults to the configured planner mode)
    #[arg(short, long)]
    mode: Option<ContractMode>,

    /// Tokens already consumed
    #[arg(long, default_value = "0")]
    used_tokens: u64,
}

/// A task file holds either a bare list or a `tasks` table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TaskFile {
    List(Vec<Task>),
    Wrapped { tasks: Vec<Task> },
}

impl TaskFile {
    pub(crate) fn into_tasks(self) -> Vec<Task> {
        match self {
            TaskFile::List(tasks) | TaskFile::Wrapped { tasks } => tasks,
        }
    }
}

#[derive(Debug, Serialize)]
struct PlannedTask {
    rank: usize,
    #[serde(flatten)]
    task: Task,
    allocation: Option<ResourceAllocation>,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    contract_id: String,
    mode: ContractMode,
    token_limit: Option<u64>,
    used_tokens: u64,
    tasks: Vec<PlannedTask>,
}

#[derive(Debug, Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Required")]
    required: String,
    #[tabled(rename = "Estimated")]
    estimated_tokens: u64,
    #[tabled(rename = "Allocated")]
    allocated_tokens: String,
    #[tabled(rename = "Time (s)")]
    allocated_time: String,
    #[tabled(rename = "Quality")]
    expected_quality: String,
}

fn build_contract(args: &PlanArgs, config: &Config) -> Result<Contract> {
    let mode = args.mode.unwrap_or(config.planner.default_mode);
    let contract = match args.template {
        Some(template) => template.create_default(mode)?,
        None => config.defaults.to_contract("plan", mode)?,
    };
    Ok(contract)
}

pub fn execute(args: PlanArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let file: TaskFile = super::read_structured(&args.tasks)?;
    let tasks = file.into_tasks();
    let contract = build_contract(&args, config).context("Failed to build contract")?;

    let mut usage = ResourceUsage::new();
    usage.add_tokens(args.used_tokens, 0, 0);

    let ordered = prioritize_tasks(&tasks, &contract, Some(&usage));
    let mut allocations: HashMap<String, ResourceAllocation> =
        plan_resource_allocation(&tasks, &contract, Some(&usage))
            .into_iter()
            .map(|a| (a.task_id.clone(), a))
            .collect();

    let planned: Vec<PlannedTask> = ordered
        .into_iter()
        .enumerate()
        .map(|(i, task)| PlannedTask {
            rank: i + 1,
            allocation: allocations.remove(&task.id),
            task,
        })
        .collect();

    tracing::debug!(tasks = planned.len(), mode = %contract.mode, "Plan computed");

    if let OutputFormat::Table = format {
        output::print_header(&format!("Plan for {}", contract.id));
        output::print_detail("Mode", contract.mode.as_str());
        output::print_detail("Token limit", &output::limit(contract.resources.tokens()));
        output::print_detail("Used tokens", &args.used_tokens.to_string());

        let rows: Vec<PlanRow> = planned.iter().map(plan_row).collect();
        println!();
        output::print_table(&rows);

        let strategy = recommend_strategy(&contract, Some(&usage));
        for warning in &strategy.warnings {
            output::print_warning(warning);
        }
        return Ok(());
    }

    let report = PlanReport {
        contract_id: contract.id.clone(),
        mode: contract.mode,
        token_limit: contract.resources.tokens(),
        used_tokens: args.used_tokens,
        tasks: planned,
    };
    output::print_item(&report, format)
}

fn plan_row(planned: &PlannedTask) -> PlanRow {
    let task = &planned.task;
    let allocation = planned.allocation.as_ref();
    PlanRow {
        rank: planned.rank,
        id: task.id.clone(),
        name: task.name.clone(),
        priority: task.priority.to_string(),
        required: if task.required { "yes" } else { "no" }.to_string(),
        estimated_tokens: task.estimated_tokens,
        allocated_tokens: output::limit(allocation.map(|a| a.allocated_tokens)),
        allocated_time: output::limit(allocation.map(|a| format!("{:.1}", a.allocated_time))),
        expected_quality: output::limit(allocation.map(|a| format!("{:.2}", a.expected_quality))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{parse_structured, InputFormat};

    #[test]
    fn test_task_file_shapes() {
        let list: TaskFile = parse_structured(
            r#"[{"id": "a", "name": "A", "estimated_tokens": 100, "required": true}]"#,
            InputFormat::Json,
        )
        .unwrap();
        let tasks = list.into_tasks();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].required);
        assert_eq!(tasks[0].estimated_quality, 0.8);

        let wrapped: TaskFile = parse_structured(
            "[[tasks]]\nid = \"b\"\nname = \"B\"\npriority = \"critical\"\n",
            InputFormat::Toml,
        )
        .unwrap();
        assert_eq!(wrapped.into_tasks()[0].id, "b");
    }
}
