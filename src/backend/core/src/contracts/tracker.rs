//! Usage tracking and constraint checking.
//!
//! [`ResourceUsage`] accumulates what an execution actually consumed;
//! [`ResourceMonitor`] compares it against a contract's
//! [`ResourceConstraints`] and keeps the history of detected violations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::limits::{ResourceConstraints, TokenMode};
use crate::error::{CovenantError, Result};
use crate::telemetry::metrics::ViolationCounter;

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Kind
// ═══════════════════════════════════════════════════════════════════════════════

/// A single resource dimension a contract may bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tokens,
    ReasoningTokens,
    TextTokens,
    ApiCalls,
    WebSearches,
    ToolInvocations,
    MemoryMb,
    ComputeSeconds,
    CostUsd,
}

impl ResourceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::ReasoningTokens => "reasoning_tokens",
            Self::TextTokens => "text_tokens",
            Self::ApiCalls => "api_calls",
            Self::WebSearches => "web_searches",
            Self::ToolInvocations => "tool_invocations",
            Self::MemoryMb => "memory_mb",
            Self::ComputeSeconds => "compute_seconds",
            Self::CostUsd => "cost_usd",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Violation Info
// ═══════════════════════════════════════════════════════════════════════════════

/// One resource that exceeded its ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationInfo {
    pub resource: ResourceKind,
    pub limit: f64,
    pub actual: f64,
    pub timestamp: DateTime<Utc>,
}

impl ViolationInfo {
    pub fn new(resource: ResourceKind, limit: f64, actual: f64) -> Self {
        Self {
            resource,
            limit,
            actual,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for ViolationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.resource, self.actual, self.limit)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Usage
// ═══════════════════════════════════════════════════════════════════════════════

/// Running totals of consumed resources.
///
/// Every counter only grows, except `memory_mb`, which holds the peak seen.
/// Whenever a reasoning/text split has been reported,
/// `tokens == reasoning_tokens + text_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    tokens: u64,
    reasoning_tokens: u64,
    text_tokens: u64,
    api_calls: u64,
    web_searches: u64,
    tool_invocations: u64,
    memory_mb: f64,
    compute_seconds: f64,
    cost_usd: f64,
    started_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceUsage {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            tokens: 0,
            reasoning_tokens: 0,
            text_tokens: 0,
            api_calls: 0,
            web_searches: 0,
            tool_invocations: 0,
            memory_mb: 0.0,
            compute_seconds: 0.0,
            cost_usd: 0.0,
            started_at: now,
            last_updated: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Add token usage.
    ///
    /// When `reasoning` or `text` is non-zero the split is recorded and its sum
    /// added to the total; `count` is ignored. Otherwise `count` is added to
    /// the total only.
    pub fn add_tokens(&mut self, count: u64, reasoning: u64, text: u64) {
        if reasoning > 0 || text > 0 {
            self.reasoning_tokens = self.reasoning_tokens.saturating_add(reasoning);
            self.text_tokens = self.text_tokens.saturating_add(text);
            self.tokens = self
                .tokens
                .saturating_add(reasoning.saturating_add(text));
        } else {
            self.tokens = self.tokens.saturating_add(count);
        }
        self.touch();
        debug!(
            tokens = self.tokens,
            reasoning_tokens = self.reasoning_tokens,
            text_tokens = self.text_tokens,
            "Token usage updated"
        );
    }

    /// Record one API call together with its cost and tokens.
    ///
    /// Do not also call [`add_tokens`](Self::add_tokens) for the same call.
    pub fn add_api_call(&mut self, cost: f64, tokens: u64) -> Result<()> {
        check_amount("cost", cost)?;
        self.api_calls = self.api_calls.saturating_add(1);
        self.cost_usd += cost;
        self.tokens = self.tokens.saturating_add(tokens);
        self.touch();
        debug!(api_calls = self.api_calls, cost_usd = self.cost_usd, "API call recorded");
        Ok(())
    }

    pub fn add_web_search(&mut self) {
        self.web_searches = self.web_searches.saturating_add(1);
        self.touch();
    }

    pub fn add_tool_invocation(&mut self) {
        self.tool_invocations = self.tool_invocations.saturating_add(1);
        self.touch();
    }

    /// Report current memory; the peak is kept.
    pub fn update_memory(&mut self, memory_mb: f64) -> Result<()> {
        check_amount("memory_mb", memory_mb)?;
        self.memory_mb = self.memory_mb.max(memory_mb);
        self.touch();
        Ok(())
    }

    pub fn add_compute_time(&mut self, seconds: f64) -> Result<()> {
        check_amount("compute_seconds", seconds)?;
        self.compute_seconds += seconds;
        self.touch();
        Ok(())
    }

    pub fn add_cost(&mut self, cost_usd: f64) -> Result<()> {
        check_amount("cost_usd", cost_usd)?;
        self.cost_usd += cost_usd;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn reasoning_tokens(&self) -> u64 {
        self.reasoning_tokens
    }

    pub fn text_tokens(&self) -> u64 {
        self.text_tokens
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls
    }

    pub fn web_searches(&self) -> u64 {
        self.web_searches
    }

    pub fn tool_invocations(&self) -> u64 {
        self.tool_invocations
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_mb
    }

    pub fn compute_seconds(&self) -> f64 {
        self.compute_seconds
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Seconds since tracking started.
    pub fn elapsed_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Value of one dimension as a float.
    pub fn value_of(&self, resource: ResourceKind) -> f64 {
        match resource {
            ResourceKind::Tokens => self.tokens as f64,
            ResourceKind::ReasoningTokens => self.reasoning_tokens as f64,
            ResourceKind::TextTokens => self.text_tokens as f64,
            ResourceKind::ApiCalls => self.api_calls as f64,
            ResourceKind::WebSearches => self.web_searches as f64,
            ResourceKind::ToolInvocations => self.tool_invocations as f64,
            ResourceKind::MemoryMb => self.memory_mb,
            ResourceKind::ComputeSeconds => self.compute_seconds,
            ResourceKind::CostUsd => self.cost_usd,
        }
    }

    /// Flat snapshot used in audit logs.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            tokens: self.tokens,
            reasoning_tokens: self.reasoning_tokens,
            text_tokens: self.text_tokens,
            api_calls: self.api_calls,
            web_searches: self.web_searches,
            tool_invocations: self.tool_invocations,
            memory_mb: self.memory_mb,
            compute_seconds: self.compute_seconds,
            cost_usd: self.cost_usd,
            elapsed_seconds: self.elapsed_seconds(),
        }
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CovenantError::negative_value(field, value));
    }
    Ok(())
}

/// Point-in-time copy of usage counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub tokens: u64,
    pub reasoning_tokens: u64,
    pub text_tokens: u64,
    pub api_calls: u64,
    pub web_searches: u64,
    pub tool_invocations: u64,
    pub memory_mb: f64,
    pub compute_seconds: f64,
    pub cost_usd: f64,
    pub elapsed_seconds: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Monitor
// ═══════════════════════════════════════════════════════════════════════════════

/// Checks usage against a contract's resource constraints.
#[derive(Debug, Clone)]
pub struct ResourceMonitor {
    constraints: ResourceConstraints,
    usage: ResourceUsage,
    violations: Vec<ViolationInfo>,
}

impl ResourceMonitor {
    pub fn new(constraints: ResourceConstraints) -> Self {
        Self {
            constraints,
            usage: ResourceUsage::new(),
            violations: Vec::new(),
        }
    }

    pub fn constraints(&self) -> &ResourceConstraints {
        &self.constraints
    }

    pub fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    pub fn usage_mut(&mut self) -> &mut ResourceUsage {
        &mut self.usage
    }

    /// Integer and float ceilings that apply, paired with their kind.
    ///
    /// With a lumpsum budget only the total token count is bounded; otherwise
    /// the reasoning and text ceilings apply independently.
    fn limits(&self) -> Vec<(ResourceKind, f64)> {
        let c = &self.constraints;
        let mut limits = Vec::with_capacity(9);

        match c.token_mode() {
            TokenMode::Lumpsum => {
                if let Some(limit) = c.tokens() {
                    limits.push((ResourceKind::Tokens, limit as f64));
                }
            }
            TokenMode::FineGrained => {
                if let Some(limit) = c.reasoning_tokens() {
                    limits.push((ResourceKind::ReasoningTokens, limit as f64));
                }
                if let Some(limit) = c.text_tokens() {
                    limits.push((ResourceKind::TextTokens, limit as f64));
                }
            }
            TokenMode::None => {}
        }

        let counted = [
            (ResourceKind::ApiCalls, c.api_calls()),
            (ResourceKind::WebSearches, c.web_searches()),
            (ResourceKind::ToolInvocations, c.tool_invocations()),
        ];
        for (kind, limit) in counted {
            if let Some(limit) = limit {
                limits.push((kind, limit as f64));
            }
        }

        let measured = [
            (ResourceKind::MemoryMb, c.memory_mb()),
            (ResourceKind::ComputeSeconds, c.compute_seconds()),
            (ResourceKind::CostUsd, c.cost_usd()),
        ];
        for (kind, limit) in measured {
            if let Some(limit) = limit {
                limits.push((kind, limit));
            }
        }

        limits
    }

    /// Every resource currently over its ceiling.
    pub fn check_constraints(&self) -> Vec<ViolationInfo> {
        self.limits()
            .into_iter()
            .filter_map(|(kind, limit)| {
                let actual = self.usage.value_of(kind);
                (actual > limit).then(|| ViolationInfo::new(kind, limit, actual))
            })
            .collect()
    }

    pub fn is_violated(&self) -> bool {
        !self.check_constraints().is_empty()
    }

    /// Append a violation to the recorded history.
    pub fn record_violation(&mut self, violation: ViolationInfo) {
        ViolationCounter::increment(violation.resource.as_str());
        self.violations.push(violation);
    }

    /// Recorded violation history.
    pub fn violations(&self) -> &[ViolationInfo] {
        &self.violations
    }

    /// Usage as a percentage of each ceiling (0–100+).
    ///
    /// Resources without a ceiling, or with a zero ceiling, are omitted.
    pub fn get_usage_percentage(&self) -> BTreeMap<ResourceKind, f64> {
        self.limits()
            .into_iter()
            .filter(|(_, limit)| *limit > 0.0)
            .map(|(kind, limit)| (kind, self.usage.value_of(kind) / limit * 100.0))
            .collect()
    }

    /// Tokens left under a lumpsum budget, clamped at zero.
    pub fn remaining_tokens(&self) -> Option<u64> {
        self.constraints
            .tokens()
            .map(|limit| limit.saturating_sub(self.usage.tokens))
    }

    pub fn remaining_cost(&self) -> Option<f64> {
        self.constraints
            .cost_usd()
            .map(|limit| (limit - self.usage.cost_usd).max(0.0))
    }

    pub fn remaining_api_calls(&self) -> Option<u64> {
        self.constraints
            .api_calls()
            .map(|limit| limit.saturating_sub(self.usage.api_calls))
    }

    /// Clear usage and violation history.
    pub fn reset(&mut self) {
        self.usage = ResourceUsage::new();
        self.violations.clear();
    }
}
