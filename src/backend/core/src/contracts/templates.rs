//! Ready-made contract presets for common agent workloads.
//!
//! Every preset returns a Drafted contract. Individual limits can be replaced
//! through [`TemplateOverrides`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::limits::ResourceConstraints;
use super::temporal::{DeadlineType, TemporalConstraints};
use super::{Contract, ContractMode};
use crate::error::{CovenantError, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

// ═══════════════════════════════════════════════════════════════════════════════
// Overrides
// ═══════════════════════════════════════════════════════════════════════════════

/// Replacement values for a preset's limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateOverrides {
    /// Explicit contract id instead of the derived one
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub api_calls: Option<u64>,
    #[serde(default)]
    pub web_searches: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    #[serde(default, with = "humantime_serde")]
    pub max_duration: Option<Duration>,
}

impl TemplateOverrides {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_cost_usd(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }
}

/// Preset limits before overrides.
#[derive(Debug, Clone, Copy)]
struct PresetLimits {
    tokens: u64,
    api_calls: u64,
    web_searches: Option<u64>,
    cost_usd: f64,
    memory_mb: Option<f64>,
    max_duration: Duration,
}

impl PresetLimits {
    fn apply(mut self, overrides: &TemplateOverrides) -> Self {
        if let Some(tokens) = overrides.tokens {
            self.tokens = tokens;
        }
        if let Some(calls) = overrides.api_calls {
            self.api_calls = calls;
        }
        if overrides.web_searches.is_some() {
            self.web_searches = overrides.web_searches;
        }
        if let Some(cost) = overrides.cost_usd {
            self.cost_usd = cost;
        }
        if overrides.memory_mb.is_some() {
            self.memory_mb = overrides.memory_mb;
        }
        if let Some(duration) = overrides.max_duration {
            self.max_duration = duration;
        }
        self
    }

    fn resources(&self) -> Result<ResourceConstraints> {
        let mut builder = ResourceConstraints::builder()
            .tokens(self.tokens)
            .api_calls(self.api_calls)
            .cost_usd(self.cost_usd);
        if let Some(searches) = self.web_searches {
            builder = builder.web_searches(searches);
        }
        if let Some(memory) = self.memory_mb {
            builder = builder.memory_mb(memory);
        }
        builder.build()
    }

    fn temporal(&self, deadline_type: DeadlineType) -> Result<TemporalConstraints> {
        TemporalConstraints::builder()
            .max_duration(self.max_duration)
            .deadline_type(deadline_type)
            .build()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-step research: gathering, analysis and report writing.
pub fn research(
    topic: &str,
    depth: &str,
    mode: ContractMode,
    overrides: &TemplateOverrides,
) -> Result<Contract> {
    let preset = research_limits(mode).apply(overrides);

    let id = overrides
        .id
        .clone()
        .unwrap_or_else(|| format!("research-{}", slug(topic)));

    Ok(Contract::new(id, format!("Research: {}", topic))
        .with_mode(mode)
        .with_resources(preset.resources()?)
        .with_temporal(preset.temporal(DeadlineType::Soft)?)
        .with_skill("web_search")
        .with_skill("analysis")
        .with_skill("report_writing")
        .with_metadata("template", Template::Research.as_str())
        .with_metadata("topic", topic)
        .with_metadata("depth", depth)
        .with_metadata(
            "allocation",
            json!({ "gathering": 0.4, "analysis": 0.3, "writing": 0.3 }),
        ))
}

fn research_limits(mode: ContractMode) -> PresetLimits {
    match mode {
        ContractMode::Urgent => PresetLimits {
            tokens: 200_000,
            api_calls: 60,
            web_searches: Some(30),
            cost_usd: 4.0,
            memory_mb: None,
            max_duration: Duration::from_secs(30 * MINUTE),
        },
        ContractMode::Balanced => PresetLimits {
            tokens: 150_000,
            api_calls: 40,
            web_searches: Some(20),
            cost_usd: 3.0,
            memory_mb: None,
            max_duration: Duration::from_secs(2 * HOUR),
        },
        ContractMode::Economical => PresetLimits {
            tokens: 80_000,
            api_calls: 25,
            web_searches: Some(10),
            cost_usd: 1.5,
            memory_mb: None,
            max_duration: Duration::from_secs(4 * HOUR),
        },
    }
}

/// Automated pull request review; limits scale with the number of files.
pub fn code_review(
    repository: &str,
    pr_number: Option<u64>,
    files_changed: u32,
    strict: bool,
    overrides: &TemplateOverrides,
) -> Result<Contract> {
    let preset = code_review_limits(files_changed).apply(overrides);
    let deadline_type = if strict {
        DeadlineType::Hard
    } else {
        DeadlineType::Soft
    };

    let id = overrides.id.clone().unwrap_or_else(|| {
        let pr = pr_number.map(|n| format!("-pr{}", n)).unwrap_or_default();
        format!("code-review-{}{}", repository.replace('/', "-"), pr)
    });

    Ok(Contract::new(id, format!("Code Review: {}", repository))
        .with_mode(ContractMode::Balanced)
        .with_resources(preset.resources()?)
        .with_temporal(preset.temporal(deadline_type)?)
        .with_skill("static_analysis")
        .with_skill("security_scanning")
        .with_skill("style_checking")
        .with_skill("complexity_analysis")
        .with_metadata("template", Template::CodeReview.as_str())
        .with_metadata("repository", repository)
        .with_metadata("pr_number", pr_number)
        .with_metadata("files_changed", files_changed))
}

fn code_review_limits(files_changed: u32) -> PresetLimits {
    let (tokens, api_calls, cost_usd, minutes) = match files_changed {
        0..=4 => (30_000, 15, 1.5, 3),
        5..=15 => (50_000, 25, 2.5, 5),
        _ => (80_000, 40, 4.0, 10),
    };
    PresetLimits {
        tokens,
        api_calls,
        web_searches: Some(0),
        cost_usd,
        memory_mb: None,
        max_duration: Duration::from_secs(minutes * MINUTE),
    }
}

/// Support ticket handling. The mode follows the ticket priority unless given.
pub fn customer_support(
    ticket_id: &str,
    priority: &str,
    mode: Option<ContractMode>,
    overrides: &TemplateOverrides,
) -> Result<Contract> {
    let mode = mode.unwrap_or_else(|| mode_for_priority(priority));
    let preset = support_limits(mode).apply(overrides);

    let id = overrides
        .id
        .clone()
        .unwrap_or_else(|| format!("support-{}", ticket_id));

    Ok(Contract::new(id, format!("Customer Support: {}", ticket_id))
        .with_mode(mode)
        .with_resources(preset.resources()?)
        .with_temporal(preset.temporal(DeadlineType::Soft)?)
        .with_skill("triage")
        .with_skill("knowledge_search")
        .with_skill("response_generation")
        .with_metadata("template", Template::CustomerSupport.as_str())
        .with_metadata("ticket_id", ticket_id)
        .with_metadata("priority", priority))
}

fn mode_for_priority(priority: &str) -> ContractMode {
    match priority.to_ascii_lowercase().as_str() {
        "low" => ContractMode::Economical,
        "high" | "urgent" => ContractMode::Urgent,
        _ => ContractMode::Balanced,
    }
}

fn support_limits(mode: ContractMode) -> PresetLimits {
    let (tokens, api_calls, web_searches, cost_usd, minutes) = match mode {
        ContractMode::Urgent => (10_000, 15, 5, 0.5, 2),
        ContractMode::Balanced => (8_000, 10, 3, 0.3, 5),
        ContractMode::Economical => (5_000, 5, 2, 0.15, 10),
    };
    PresetLimits {
        tokens,
        api_calls,
        web_searches: Some(web_searches),
        cost_usd,
        memory_mb: None,
        max_duration: Duration::from_secs(minutes * MINUTE),
    }
}

/// Dataset analysis; limits scale with dataset size.
pub fn data_analysis(
    dataset: &str,
    size_mb: f64,
    analysis_type: &str,
    overrides: &TemplateOverrides,
) -> Result<Contract> {
    if !size_mb.is_finite() || size_mb < 0.0 {
        return Err(CovenantError::negative_value("dataset_size_mb", size_mb));
    }
    let preset = analysis_limits(size_mb).apply(overrides);

    let id = overrides
        .id
        .clone()
        .unwrap_or_else(|| format!("analysis-{}", dataset.replace('.', "-")));

    Ok(Contract::new(id, format!("Data Analysis: {}", dataset))
        .with_mode(ContractMode::Balanced)
        .with_resources(preset.resources()?)
        .with_temporal(preset.temporal(DeadlineType::Soft)?)
        .with_skill("data_loading")
        .with_skill("statistical_analysis")
        .with_skill("visualization")
        .with_metadata("template", Template::DataAnalysis.as_str())
        .with_metadata("dataset_name", dataset)
        .with_metadata("dataset_size_mb", size_mb)
        .with_metadata("analysis_type", analysis_type))
}

fn analysis_limits(size_mb: f64) -> PresetLimits {
    let (tokens, api_calls, cost_usd, memory_mb, minutes) = if size_mb < 1.0 {
        (20_000, 10, 1.0, 512.0, 5)
    } else if size_mb <= 10.0 {
        (50_000, 25, 2.5, 1024.0, 15)
    } else {
        (100_000, 50, 5.0, 2048.0, 30)
    };
    PresetLimits {
        tokens,
        api_calls,
        web_searches: Some(0),
        cost_usd,
        memory_mb: Some(memory_mb),
        max_duration: Duration::from_secs(minutes * MINUTE),
    }
}

fn slug(text: &str) -> String {
    text.to_lowercase().replace(' ', "-")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Template registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Research,
    CodeReview,
    CustomerSupport,
    DataAnalysis,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::Research,
        Template::CodeReview,
        Template::CustomerSupport,
        Template::DataAnalysis,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::CodeReview => "code_review",
            Self::CustomerSupport => "customer_support",
            Self::DataAnalysis => "data_analysis",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::Research => "Multi-step research reports",
            Self::CodeReview => "Pull request review, scaled by files changed",
            Self::CustomerSupport => "Support tickets, mode follows priority",
            Self::DataAnalysis => "Dataset analysis, scaled by size",
        }
    }

    /// Build the preset with neutral arguments, then set `mode`.
    pub fn create_default(&self, mode: ContractMode) -> Result<Contract> {
        let none = TemplateOverrides::default();
        let contract = match self {
            Self::Research => research("general", "comprehensive", mode, &none)?,
            Self::CodeReview => code_review("repository", None, 10, true, &none)?,
            Self::CustomerSupport => customer_support("ticket", "normal", Some(mode), &none)?,
            Self::DataAnalysis => data_analysis("dataset", 1.0, "exploratory", &none)?,
        };
        Ok(contract.with_mode(mode))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = CovenantError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        Template::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| {
                let available = Template::ALL.map(|t| t.as_str()).join(", ");
                CovenantError::validation(format!(
                    "Template '{}' not found. Available templates: {}",
                    s, available
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractState;

    #[test]
    fn test_research_modes() {
        let none = TemplateOverrides::default();
        let urgent = research("AI Safety", "overview", ContractMode::Urgent, &none).unwrap();
        assert_eq!(urgent.id, "research-ai-safety");
        assert_eq!(urgent.resources.tokens(), Some(200_000));
        assert_eq!(urgent.resources.web_searches(), Some(30));
        assert_eq!(
            urgent.temporal.max_duration(),
            Some(Duration::from_secs(30 * MINUTE))
        );
        assert_eq!(urgent.temporal.deadline_type(), DeadlineType::Soft);
        assert_eq!(urgent.state(), ContractState::Drafted);

        let cheap = research("x", "overview", ContractMode::Economical, &none).unwrap();
        assert_eq!(cheap.resources.cost_usd(), Some(1.5));
        assert_eq!(cheap.metadata["allocation"]["gathering"], 0.4);
    }

    #[test]
    fn test_code_review_scales_with_files() {
        let none = TemplateOverrides::default();
        let small = code_review("org/app", Some(12), 3, true, &none).unwrap();
        assert_eq!(small.id, "code-review-org-app-pr12");
        assert_eq!(small.resources.tokens(), Some(30_000));
        assert_eq!(small.resources.web_searches(), Some(0));
        assert_eq!(small.temporal.deadline_type(), DeadlineType::Hard);

        let medium = code_review("org/app", None, 15, false, &none).unwrap();
        assert_eq!(medium.resources.tokens(), Some(50_000));
        assert_eq!(medium.temporal.deadline_type(), DeadlineType::Soft);

        let large = code_review("org/app", None, 16, true, &none).unwrap();
        assert_eq!(large.resources.api_calls(), Some(40));
    }

    #[test]
    fn test_support_mode_from_priority() {
        let none = TemplateOverrides::default();
        let low = customer_support("T-1", "low", None, &none).unwrap();
        assert_eq!(low.mode, ContractMode::Economical);
        assert_eq!(low.resources.tokens(), Some(5_000));

        let high = customer_support("T-2", "HIGH", None, &none).unwrap();
        assert_eq!(high.mode, ContractMode::Urgent);

        let forced = customer_support("T-3", "low", Some(ContractMode::Balanced), &none).unwrap();
        assert_eq!(forced.resources.tokens(), Some(8_000));
        assert_eq!(forced.id, "support-T-3");
    }

    #[test]
    fn test_data_analysis_tiers() {
        let none = TemplateOverrides::default();
        let small = data_analysis("sales.csv", 0.5, "exploratory", &none).unwrap();
        assert_eq!(small.id, "analysis-sales-csv");
        assert_eq!(small.resources.memory_mb(), Some(512.0));

        let large = data_analysis("logs", 50.0, "predictive", &none).unwrap();
        assert_eq!(large.resources.tokens(), Some(100_000));
        assert!(data_analysis("bad", -1.0, "x", &none).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = TemplateOverrides::default()
            .with_id("custom")
            .with_tokens(1_000)
            .with_cost_usd(0.25);
        let contract = research("x", "overview", ContractMode::Balanced, &overrides).unwrap();
        assert_eq!(contract.id, "custom");
        assert_eq!(contract.resources.tokens(), Some(1_000));
        assert_eq!(contract.resources.cost_usd(), Some(0.25));
        assert_eq!(contract.resources.api_calls(), Some(40));

        let invalid = TemplateOverrides::default().with_cost_usd(-1.0);
        assert!(research("x", "overview", ContractMode::Balanced, &invalid).is_err());
    }

    #[test]
    fn test_template_lookup() {
        assert_eq!("code-review".parse::<Template>().unwrap(), Template::CodeReview);
        assert_eq!("Research".parse::<Template>().unwrap(), Template::Research);

        let err = "unknown".parse::<Template>().unwrap_err();
        assert!(err.user_message().contains("Available templates"));
    }

    #[test]
    fn test_create_default_sets_mode() {
        for template in Template::ALL {
            let contract = template.create_default(ContractMode::Economical).unwrap();
            assert_eq!(contract.mode, ContractMode::Economical);
        }
    }
}
