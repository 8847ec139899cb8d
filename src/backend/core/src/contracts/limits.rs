//! Resource constraint definitions.
//!
//! A contract carries at most one token budget shape:
//! - **Lumpsum**: a single `tokens` ceiling; the model decides the split
//! - **Fine-grained**: separate `reasoning_tokens` and/or `text_tokens` ceilings
//!
//! Constraints are validated once in [`ResourceConstraintsBuilder::build`] and
//! are immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CovenantError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Reasoning Effort
// ═══════════════════════════════════════════════════════════════════════════════

/// Reasoning effort hint passed to reasoning-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for ReasoningEffort {
    type Err = CovenantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CovenantError::invalid_constraint(format!(
                "reasoning_effort must be one of low, medium, high; got '{}'",
                other
            ))),
        }
    }
}

/// Minimum reasoning budgets each effort level needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningThresholds {
    /// Minimum `reasoning_tokens` for `high` effort
    #[serde(default = "default_high_min_tokens")]
    pub high_min_tokens: u64,

    /// Minimum `reasoning_tokens` for `medium` effort
    #[serde(default = "default_medium_min_tokens")]
    pub medium_min_tokens: u64,
}

fn default_high_min_tokens() -> u64 {
    2000
}

fn default_medium_min_tokens() -> u64 {
    500
}

impl Default for ReasoningThresholds {
    fn default() -> Self {
        Self {
            high_min_tokens: default_high_min_tokens(),
            medium_min_tokens: default_medium_min_tokens(),
        }
    }
}

impl ReasoningThresholds {
    /// Minimum reasoning budget required for the given effort.
    pub fn minimum_for(&self, effort: ReasoningEffort) -> u64 {
        match effort {
            ReasoningEffort::High => self.high_min_tokens,
            ReasoningEffort::Medium => self.medium_min_tokens,
            ReasoningEffort::Low => 0,
        }
    }

    /// Effort level a reasoning budget supports.
    pub fn effort_for(&self, reasoning_tokens: u64) -> ReasoningEffort {
        if reasoning_tokens >= self.high_min_tokens {
            ReasoningEffort::High
        } else if reasoning_tokens >= self.medium_min_tokens {
            ReasoningEffort::Medium
        } else {
            ReasoningEffort::Low
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.medium_min_tokens > self.high_min_tokens {
            return Err(CovenantError::configuration(format!(
                "medium_min_tokens ({}) must not exceed high_min_tokens ({})",
                self.medium_min_tokens, self.high_min_tokens
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Token Mode
// ═══════════════════════════════════════════════════════════════════════════════

/// Which token budget shape a set of constraints uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Single `tokens` ceiling
    Lumpsum,
    /// Separate reasoning/text ceilings
    FineGrained,
    /// No token ceiling at all
    None,
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lumpsum => "lumpsum",
            Self::FineGrained => "fine_grained",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Constraints
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-dimensional resource budget for a contract.
///
/// Every ceiling is optional; `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResourceConstraintsBuilder")]
pub struct ResourceConstraints {
    /// Maximum total tokens (lumpsum mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<u64>,

    /// Maximum reasoning tokens (fine-grained mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_tokens: Option<u64>,

    /// Maximum visible output tokens (fine-grained mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    text_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<ReasoningEffort>,

    #[serde(skip_serializing_if = "Option::is_none")]
    api_calls: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    web_searches: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tool_invocations: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    memory_mb: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    compute_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cost_usd: Option<f64>,
}

impl ResourceConstraints {
    /// Start building a set of constraints.
    pub fn builder() -> ResourceConstraintsBuilder {
        ResourceConstraintsBuilder::default()
    }

    /// Constraints with no ceilings at all.
    pub fn unlimited() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn tokens(&self) -> Option<u64> {
        self.tokens
    }

    pub fn reasoning_tokens(&self) -> Option<u64> {
        self.reasoning_tokens
    }

    pub fn text_tokens(&self) -> Option<u64> {
        self.text_tokens
    }

    pub fn reasoning_effort(&self) -> Option<ReasoningEffort> {
        self.reasoning_effort
    }

    pub fn api_calls(&self) -> Option<u64> {
        self.api_calls
    }

    pub fn web_searches(&self) -> Option<u64> {
        self.web_searches
    }

    pub fn tool_invocations(&self) -> Option<u64> {
        self.tool_invocations
    }

    pub fn memory_mb(&self) -> Option<f64> {
        self.memory_mb
    }

    pub fn compute_seconds(&self) -> Option<f64> {
        self.compute_seconds
    }

    pub fn cost_usd(&self) -> Option<f64> {
        self.cost_usd
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Token budget shape of these constraints.
    pub fn token_mode(&self) -> TokenMode {
        if self.tokens.is_some() {
            TokenMode::Lumpsum
        } else if self.reasoning_tokens.is_some() || self.text_tokens.is_some() {
            TokenMode::FineGrained
        } else {
            TokenMode::None
        }
    }

    /// Effort level the reasoning budget supports, using default thresholds.
    pub fn recommended_reasoning_effort(&self) -> Option<ReasoningEffort> {
        self.recommended_reasoning_effort_with(&ReasoningThresholds::default())
    }

    /// Effort level the reasoning budget supports.
    ///
    /// `None` when there is no reasoning ceiling.
    pub fn recommended_reasoning_effort_with(
        &self,
        thresholds: &ReasoningThresholds,
    ) -> Option<ReasoningEffort> {
        self.reasoning_tokens.map(|budget| thresholds.effort_for(budget))
    }

    /// Explicit effort if set, otherwise the recommended one.
    pub fn effective_reasoning_effort(&self) -> Option<ReasoningEffort> {
        self.reasoning_effort
            .or_else(|| self.recommended_reasoning_effort())
    }

    /// True when no ceiling is set.
    pub fn is_unlimited(&self) -> bool {
        *self == Self::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for [`ResourceConstraints`].
///
/// Also the deserialization shape, so constraints read from a file go through
/// the same validation as constraints built in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConstraintsBuilder {
    #[serde(default)]
    tokens: Option<u64>,
    #[serde(default)]
    reasoning_tokens: Option<u64>,
    #[serde(default)]
    text_tokens: Option<u64>,
    #[serde(default)]
    reasoning_effort: Option<ReasoningEffort>,
    #[serde(default)]
    api_calls: Option<u64>,
    #[serde(default)]
    web_searches: Option<u64>,
    #[serde(default)]
    tool_invocations: Option<u64>,
    #[serde(default)]
    memory_mb: Option<f64>,
    #[serde(default)]
    compute_seconds: Option<f64>,
    #[serde(default)]
    cost_usd: Option<f64>,
}

impl ResourceConstraintsBuilder {
    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn reasoning_tokens(mut self, tokens: u64) -> Self {
        self.reasoning_tokens = Some(tokens);
        self
    }

    pub fn text_tokens(mut self, tokens: u64) -> Self {
        self.text_tokens = Some(tokens);
        self
    }

    pub fn reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn api_calls(mut self, calls: u64) -> Self {
        self.api_calls = Some(calls);
        self
    }

    pub fn web_searches(mut self, searches: u64) -> Self {
        self.web_searches = Some(searches);
        self
    }

    pub fn tool_invocations(mut self, invocations: u64) -> Self {
        self.tool_invocations = Some(invocations);
        self
    }

    pub fn memory_mb(mut self, mb: f64) -> Self {
        self.memory_mb = Some(mb);
        self
    }

    pub fn compute_seconds(mut self, seconds: f64) -> Self {
        self.compute_seconds = Some(seconds);
        self
    }

    pub fn cost_usd(mut self, cost: f64) -> Self {
        self.cost_usd = Some(cost);
        self
    }

    /// Validate with the default reasoning thresholds.
    pub fn build(self) -> Result<ResourceConstraints> {
        self.build_with(&ReasoningThresholds::default())
    }

    /// Validate against the given reasoning thresholds.
    pub fn build_with(self, thresholds: &ReasoningThresholds) -> Result<ResourceConstraints> {
        for (field, value) in [
            ("memory_mb", self.memory_mb),
            ("compute_seconds", self.compute_seconds),
            ("cost_usd", self.cost_usd),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(CovenantError::invalid_constraint(format!(
                        "{} must be a finite non-negative number, got {}",
                        field, v
                    ))
                    .with_context("field", field));
                }
            }
        }

        if self.tokens.is_some() && (self.reasoning_tokens.is_some() || self.text_tokens.is_some()) {
            return Err(CovenantError::invalid_constraint(
                "Cannot combine a lumpsum `tokens` budget with `reasoning_tokens`/`text_tokens`; \
                 choose one token budget mode",
            ));
        }

        if let (Some(effort), Some(budget)) = (self.reasoning_effort, self.reasoning_tokens) {
            let minimum = thresholds.minimum_for(effort);
            if budget < minimum {
                return Err(CovenantError::invalid_constraint(format!(
                    "reasoning_effort '{}' requires reasoning_tokens >= {}, got {}",
                    effort, minimum, budget
                ))
                .with_context("reasoning_effort", effort)
                .with_context("reasoning_tokens", budget));
            }
        }

        Ok(ResourceConstraints {
            tokens: self.tokens,
            reasoning_tokens: self.reasoning_tokens,
            text_tokens: self.text_tokens,
            reasoning_effort: self.reasoning_effort,
            api_calls: self.api_calls,
            web_searches: self.web_searches,
            tool_invocations: self.tool_invocations,
            memory_mb: self.memory_mb,
            compute_seconds: self.compute_seconds,
            cost_usd: self.cost_usd,
        })
    }
}

impl TryFrom<ResourceConstraintsBuilder> for ResourceConstraints {
    type Error = CovenantError;

    fn try_from(builder: ResourceConstraintsBuilder) -> Result<Self> {
        builder.build()
    }
}

impl From<&ResourceConstraints> for ResourceConstraintsBuilder {
    fn from(c: &ResourceConstraints) -> Self {
        Self {
            tokens: c.tokens,
            reasoning_tokens: c.reasoning_tokens,
            text_tokens: c.text_tokens,
            reasoning_effort: c.reasoning_effort,
            api_calls: c.api_calls,
            web_searches: c.web_searches,
            tool_invocations: c.tool_invocations,
            memory_mb: c.memory_mb,
            compute_seconds: c.compute_seconds,
            cost_usd: c.cost_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_token_modes_are_exclusive() {
        let err = ResourceConstraints::builder()
            .tokens(1000)
            .reasoning_tokens(500)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConstraint);

        let err = ResourceConstraints::builder()
            .tokens(1000)
            .text_tokens(500)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConstraint);
    }

    #[test]
    fn test_token_mode_detection() {
        let lumpsum = ResourceConstraints::builder().tokens(1000).build().unwrap();
        assert_eq!(lumpsum.token_mode(), TokenMode::Lumpsum);

        let fine = ResourceConstraints::builder().text_tokens(200).build().unwrap();
        assert_eq!(fine.token_mode(), TokenMode::FineGrained);

        assert_eq!(ResourceConstraints::unlimited().token_mode(), TokenMode::None);
    }

    #[test]
    fn test_effort_requires_budget() {
        assert!(ResourceConstraints::builder()
            .reasoning_tokens(1999)
            .reasoning_effort(ReasoningEffort::High)
            .build()
            .is_err());
        assert!(ResourceConstraints::builder()
            .reasoning_tokens(2000)
            .reasoning_effort(ReasoningEffort::High)
            .build()
            .is_ok());
        assert!(ResourceConstraints::builder()
            .reasoning_tokens(499)
            .reasoning_effort(ReasoningEffort::Medium)
            .build()
            .is_err());
        assert!(ResourceConstraints::builder()
            .reasoning_tokens(10)
            .reasoning_effort(ReasoningEffort::Low)
            .build()
            .is_ok());
        // no reasoning ceiling means an unlimited budget
        assert!(ResourceConstraints::builder()
            .reasoning_effort(ReasoningEffort::High)
            .build()
            .is_ok());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = ReasoningThresholds {
            high_min_tokens: 8000,
            medium_min_tokens: 1000,
        };
        let result = ResourceConstraints::builder()
            .reasoning_tokens(4000)
            .reasoning_effort(ReasoningEffort::High)
            .build_with(&thresholds);
        assert!(result.is_err());

        let c = ResourceConstraints::builder()
            .reasoning_tokens(4000)
            .build_with(&thresholds)
            .unwrap();
        assert_eq!(
            c.recommended_reasoning_effort_with(&thresholds),
            Some(ReasoningEffort::Medium)
        );
    }

    #[test]
    fn test_recommended_effort() {
        let c = ResourceConstraints::builder().reasoning_tokens(2500).build().unwrap();
        assert_eq!(c.recommended_reasoning_effort(), Some(ReasoningEffort::High));

        let c = ResourceConstraints::builder().reasoning_tokens(700).build().unwrap();
        assert_eq!(c.recommended_reasoning_effort(), Some(ReasoningEffort::Medium));

        let c = ResourceConstraints::builder().reasoning_tokens(100).build().unwrap();
        assert_eq!(c.recommended_reasoning_effort(), Some(ReasoningEffort::Low));

        let c = ResourceConstraints::builder().tokens(100).build().unwrap();
        assert_eq!(c.recommended_reasoning_effort(), None);
        assert_eq!(c.effective_reasoning_effort(), None);
    }

    #[test]
    fn test_effective_effort_prefers_explicit() {
        let c = ResourceConstraints::builder()
            .reasoning_tokens(5000)
            .reasoning_effort(ReasoningEffort::Low)
            .build()
            .unwrap();
        assert_eq!(c.effective_reasoning_effort(), Some(ReasoningEffort::Low));
    }

    #[test]
    fn test_float_fields_validated() {
        assert!(ResourceConstraints::builder().cost_usd(-0.01).build().is_err());
        assert!(ResourceConstraints::builder().memory_mb(f64::NAN).build().is_err());
        assert!(ResourceConstraints::builder()
            .compute_seconds(f64::INFINITY)
            .build()
            .is_err());
        assert!(ResourceConstraints::builder().cost_usd(0.0).build().is_ok());
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let ok: ResourceConstraints =
            serde_json::from_str(r#"{"tokens": 1000, "cost_usd": 1.5}"#).unwrap();
        assert_eq!(ok.tokens(), Some(1000));
        assert_eq!(ok.cost_usd(), Some(1.5));

        let bad = serde_json::from_str::<ResourceConstraints>(
            r#"{"tokens": 1000, "reasoning_tokens": 100}"#,
        );
        assert!(bad.is_err());

        let unknown = serde_json::from_str::<ResourceConstraints>(r#"{"tokenz": 5}"#);
        assert!(unknown.is_err());
    }
}
