//! Mode-aware Planning
//!
//! Pure functions that turn a contract's strategic mode and current usage into
//! decisions:
//!
//! - **Allocation**: split the remaining token budget across tasks
//! - **Prioritization**: order tasks, required work always first
//! - **Tradeoffs**: quality / tokens / time per approach
//! - **Strategy**: risk assessment and continue/stop advice
//!
//! None of these mutate the contract or its usage.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contracts::{Contract, ContractMode, ResourceUsage};
use crate::error::{CovenantError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════════

/// Task priority tiers, highest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    /// Score used for prioritization (Critical 4 .. Low 1).
    pub const fn score(&self) -> i32 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of planned work with its estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub estimated_tokens: u64,
    /// Seconds
    #[serde(default)]
    pub estimated_time: f64,
    #[serde(default = "default_quality")]
    pub estimated_quality: f64,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub required: bool,
}

fn default_quality() -> f64 {
    0.8
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            estimated_tokens: 0,
            estimated_time: 0.0,
            estimated_quality: default_quality(),
            priority: TaskPriority::default(),
            required: false,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn with_time(mut self, seconds: f64) -> Self {
        self.estimated_time = seconds;
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.estimated_quality = quality;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Budget assigned to one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub task_id: String,
    pub allocated_tokens: u64,
    pub allocated_time: f64,
    pub expected_quality: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Allocation
// ═══════════════════════════════════════════════════════════════════════════════

/// `floor(value × num / den)` without float rounding.
fn scale(value: u64, num: u64, den: u64) -> u64 {
    (u128::from(value) * u128::from(num) / u128::from(den)) as u64
}

/// Required tasks first, then by priority tier. Stable for ties.
fn required_then_tier(tasks: &[Task]) -> Vec<&Task> {
    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by_key(|t| (!t.required, Reverse(t.priority.score())));
    ordered
}

/// Distribute the remaining token budget across tasks according to the
/// contract's mode.
///
/// Without a token ceiling every task receives its estimate unchanged.
pub fn plan_resource_allocation(
    tasks: &[Task],
    contract: &Contract,
    usage: Option<&ResourceUsage>,
) -> Vec<ResourceAllocation> {
    let Some(limit) = contract.resources.tokens() else {
        return tasks.iter().map(as_estimated).collect();
    };

    let used = usage.map(ResourceUsage::tokens).unwrap_or(0);
    let remaining = limit.saturating_sub(used);

    tracing::debug!(
        contract_id = %contract.id,
        mode = %contract.mode,
        remaining_tokens = remaining,
        tasks = tasks.len(),
        "Planning allocation"
    );

    match contract.mode {
        ContractMode::Urgent => allocate_urgent(tasks),
        ContractMode::Economical => allocate_economical(tasks, remaining),
        ContractMode::Balanced => allocate_balanced(tasks, remaining),
    }
}

fn as_estimated(task: &Task) -> ResourceAllocation {
    ResourceAllocation {
        task_id: task.id.clone(),
        allocated_tokens: task.estimated_tokens,
        allocated_time: task.estimated_time,
        expected_quality: task.estimated_quality,
    }
}

fn allocate_urgent(tasks: &[Task]) -> Vec<ResourceAllocation> {
    required_then_tier(tasks)
        .into_iter()
        .map(|task| {
            let generous = task.required
                || matches!(task.priority, TaskPriority::Critical | TaskPriority::High);
            let allocated = if generous {
                scale(task.estimated_tokens, 12, 10)
            } else {
                task.estimated_tokens
            };
            ResourceAllocation {
                task_id: task.id.clone(),
                allocated_tokens: allocated,
                allocated_time: task.estimated_time,
                expected_quality: task.estimated_quality.max(0.85),
            }
        })
        .collect()
}

fn allocate_economical(tasks: &[Task], remaining: u64) -> Vec<ResourceAllocation> {
    let usable = scale(remaining, 8, 10);
    let mut allocated_so_far: u64 = 0;

    required_then_tier(tasks)
        .into_iter()
        .map(|task| {
            let allocated = if task.required {
                scale(task.estimated_tokens, 7, 10)
            } else if allocated_so_far < usable {
                scale(task.estimated_tokens, 6, 10).min(usable - allocated_so_far)
            } else {
                0
            };
            allocated_so_far = allocated_so_far.saturating_add(allocated);

            ResourceAllocation {
                task_id: task.id.clone(),
                allocated_tokens: allocated,
                allocated_time: task.estimated_time * 1.3,
                expected_quality: task.estimated_quality * 0.95,
            }
        })
        .collect()
}

fn allocate_balanced(tasks: &[Task], remaining: u64) -> Vec<ResourceAllocation> {
    let usable = scale(remaining, 9, 10);
    let total: u64 = tasks
        .iter()
        .fold(0u64, |acc, t| acc.saturating_add(t.estimated_tokens));

    if total <= usable {
        return tasks.iter().map(as_estimated).collect();
    }

    let factor = usable as f64 / total as f64;
    tasks
        .iter()
        .map(|task| {
            let mut allocated = scale(task.estimated_tokens, usable, total);
            if task.required {
                allocated = allocated.max(scale(task.estimated_tokens, 8, 10));
            }
            ResourceAllocation {
                task_id: task.id.clone(),
                allocated_tokens: allocated,
                allocated_time: task.estimated_time,
                expected_quality: task.estimated_quality * factor,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prioritization
// ═══════════════════════════════════════════════════════════════════════════════

/// Token utilization (used / limit), 0.0 without a ceiling or usage.
fn token_utilization(contract: &Contract, usage: Option<&ResourceUsage>) -> f64 {
    match (usage, contract.resources.tokens()) {
        (Some(usage), Some(limit)) if limit > 0 => usage.tokens() as f64 / limit as f64,
        _ => 0.0,
    }
}

/// Order tasks for execution, highest priority first.
///
/// Required tasks always precede optional ones. Within each group the
/// mode-adjusted priority score decides, lighter tasks winning ties.
pub fn prioritize_tasks(
    tasks: &[Task],
    contract: &Contract,
    usage: Option<&ResourceUsage>,
) -> Vec<Task> {
    let utilization = token_utilization(contract, usage);
    let mode = contract.mode;

    let score = |task: &Task| -> (i32, i32, Reverse<u64>) {
        let required_score = match (task.required, utilization > 0.7) {
            (true, true) => 2,
            (true, false) => 1,
            (false, _) => 0,
        };

        let penalty = match mode {
            ContractMode::Urgent if task.estimated_quality < 0.8 => -1,
            ContractMode::Economical if task.estimated_tokens > 5000 => -1,
            _ => 0,
        };

        (
            required_score,
            task.priority.score() + penalty,
            Reverse(task.estimated_tokens),
        )
    };

    let mut ordered = tasks.to_vec();
    ordered.sort_by_key(|task| Reverse(score(task)));
    ordered
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tradeoffs
// ═══════════════════════════════════════════════════════════════════════════════

/// Named execution approaches, from most to least thorough.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Thorough,
    #[default]
    Standard,
    Quick,
    Minimal,
}

impl Approach {
    pub const ALL: [Approach; 4] = [
        Approach::Thorough,
        Approach::Standard,
        Approach::Quick,
        Approach::Minimal,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Thorough => "thorough",
            Self::Standard => "standard",
            Self::Quick => "quick",
            Self::Minimal => "minimal",
        }
    }

    /// Parse a name, falling back to `Standard` for unknown names.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    /// Baseline (quality, tokens, seconds) before mode adjustment.
    const fn baseline(&self) -> (f64, u64, f64) {
        match self {
            Self::Thorough => (0.95, 10_000, 300.0),
            Self::Standard => (0.85, 5_000, 180.0),
            Self::Quick => (0.75, 3_000, 60.0),
            Self::Minimal => (0.65, 1_000, 30.0),
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Approach {
    type Err = CovenantError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Approach::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| {
                CovenantError::validation(format!(
                    "Unknown approach '{}', expected one of: thorough, standard, quick, minimal",
                    s
                ))
            })
    }
}

/// Expected outcome of an approach under a contract's mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffEstimate {
    pub approach: Approach,
    pub quality: f64,
    pub tokens: u64,
    pub time_seconds: f64,
}

/// Quality, token and time estimate for an approach, adjusted for the mode.
pub fn estimate_quality_cost_time(approach: Approach, contract: &Contract) -> TradeoffEstimate {
    let (quality, tokens, time) = approach.baseline();

    let (quality, tokens, time_seconds) = match contract.mode {
        ContractMode::Urgent => (quality * 0.9, scale(tokens, 12, 10), time * 0.5),
        ContractMode::Economical => (quality, scale(tokens, 4, 10), time * 1.5),
        ContractMode::Balanced => (quality, tokens, time),
    };

    TradeoffEstimate {
        approach,
        quality,
        tokens,
        time_seconds,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Strategy
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.3 {
            RiskLevel::Low
        } else if utilization < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advice for the current budget state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub mode: ContractMode,
    pub budget_utilization: f64,
    pub recommended_approach: String,
    pub risk_level: RiskLevel,
    pub should_continue: bool,
    pub warnings: Vec<String>,
}

/// Recommend how to proceed given token utilization and the contract's mode.
pub fn recommend_strategy(
    contract: &Contract,
    usage: Option<&ResourceUsage>,
) -> StrategyRecommendation {
    let utilization = token_utilization(contract, usage);
    let risk_level = RiskLevel::from_utilization(utilization);

    let mut warnings = Vec::new();
    match risk_level {
        RiskLevel::Medium => warnings.push("Moderate budget consumption detected".to_string()),
        RiskLevel::High => {
            warnings.push("High budget utilization - approaching limits".to_string())
        }
        RiskLevel::Low => {}
    }

    let mut should_continue = true;
    let approach = match contract.mode {
        ContractMode::Urgent => {
            if utilization > 0.9 {
                warnings.push("Budget critical but URGENT mode - push to completion".to_string());
                "Complete core objectives immediately, skip all optional tasks"
            } else if utilization > 0.7 {
                "Focus on required tasks, use fastest available methods"
            } else {
                "Prioritize speed using parallel operations and caching"
            }
        }
        ContractMode::Economical => {
            if utilization > 0.8 {
                should_continue = false;
                warnings.push("Budget exceeded threshold for ECONOMICAL mode".to_string());
                "Enter strict conservation mode - parametric knowledge only, no API calls"
            } else if utilization > 0.6 {
                warnings.push("Approaching budget limits in ECONOMICAL mode".to_string());
                "Reduce resource usage - batch operations, minimal API calls"
            } else {
                "Maintain efficiency - batch operations, leverage caching"
            }
        }
        ContractMode::Balanced => {
            if utilization > 0.85 {
                warnings.push("May need to deliver partial results".to_string());
                "Reduce scope - focus on highest-value tasks only"
            } else if utilization > 0.7 {
                "Monitor usage closely - balance quality and efficiency"
            } else {
                "Standard execution - balanced resource allocation"
            }
        }
    };

    if !should_continue {
        tracing::warn!(
            contract_id = %contract.id,
            utilization = utilization,
            "Strategy recommends stopping"
        );
    }

    StrategyRecommendation {
        mode: contract.mode,
        budget_utilization: utilization,
        recommended_approach: approach.to_string(),
        risk_level,
        should_continue,
        warnings,
    }
}
