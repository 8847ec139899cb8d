//! Contract Enforcement - turns detected violations into state transitions and events.
//!
//! The `ContractEnforcer` is responsible for:
//! - Owning a contract together with its resource and temporal monitors
//! - Strict (terminate on violation) and lenient (record and continue) policies
//! - Fanning enforcement events out to registered callbacks
//! - Raising typed errors for strict-mode breaches

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::limits::{ReasoningThresholds, TokenMode};
use super::temporal::TemporalMonitor;
use super::tracker::{ResourceKind, ResourceMonitor, ResourceUsage, UsageSnapshot, ViolationInfo};
use super::{Contract, ContractState};
use crate::error::{CovenantError, Result, ViolationKind};
use crate::pricing;
use crate::telemetry::metrics::{CostMetrics, EventCounter, TokenUsageMetrics};

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for contract enforcement.
#[derive(Debug, Clone, Deserialize)]
pub struct EnforcementConfig {
    /// Terminate the contract on the first violation
    #[serde(default = "default_true")]
    pub strict_mode: bool,

    /// Keep an execution log in the harness
    #[serde(default = "default_true")]
    pub enable_logging: bool,

    /// Reasoning budget needed per effort level
    #[serde(default)]
    pub reasoning_thresholds: ReasoningThresholds,
}

fn default_true() -> bool {
    true
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            enable_logging: true,
            reasoning_thresholds: ReasoningThresholds::default(),
        }
    }
}

/// Threshold levels for usage warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    /// Under 70% usage
    Normal,
    /// 70-90% usage
    Warning,
    /// Over 90% usage
    Critical,
    /// Over 100% usage
    Exceeded,
}

impl ThresholdLevel {
    /// Get threshold level from a percentage (0 - 100+).
    pub fn from_percentage(pct: f64) -> Self {
        if pct > 100.0 {
            ThresholdLevel::Exceeded
        } else if pct >= 90.0 {
            ThresholdLevel::Critical
        } else if pct >= 70.0 {
            ThresholdLevel::Warning
        } else {
            ThresholdLevel::Normal
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════════

/// Kinds of enforcement events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ContractStarted,
    ContractStopped,
    ConstraintViolated,
    DeadlineExceeded,
    DurationExceeded,
    ContractExpired,
    ContractTerminated,
    /// Reported by adapters after each external model call
    LlmCompletion,
    /// Harness record: the operation produced no output
    Incomplete,
    /// Harness record: the operation failed
    Error,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContractStarted => "contract_started",
            Self::ContractStopped => "contract_stopped",
            Self::ConstraintViolated => "constraint_violated",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::DurationExceeded => "duration_exceeded",
            Self::ContractExpired => "contract_expired",
            Self::ContractTerminated => "contract_terminated",
            Self::LlmCompletion => "llm_completion",
            Self::Incomplete => "incomplete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to enforcement callbacks.
#[derive(Debug, Clone)]
pub struct EnforcementEvent<'a> {
    pub event_type: EventType,
    pub contract: &'a Contract,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EnforcementEvent<'_> {
    /// Owned, serializable projection of this event.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            event_type: self.event_type,
            contract_id: Some(self.contract.id.clone()),
            message: self.message.clone(),
            data: self.data.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Serializable event as kept in audit logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            event_type,
            contract_id: None,
            message: message.into(),
            data: json!({}),
            timestamp: Utc::now(),
        }
    }
}

/// Observer of enforcement events.
///
/// Errors and panics are contained: they are logged and never reach the
/// enforcer or the remaining callbacks.
pub type EnforcementCallback =
    Box<dyn Fn(&EnforcementEvent<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`ContractEnforcer::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

// ═══════════════════════════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of [`ContractEnforcer::check_constraints`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintCheck {
    pub violated: bool,
    pub violations: Vec<ViolationInfo>,
}

impl ConstraintCheck {
    /// Reason naming every violated resource, e.g.
    /// `Resource constraints violated: tokens (1500/1000)`.
    pub fn reason(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        Some(violation_reason(&self.violations))
    }
}

fn violation_reason(violations: &[ViolationInfo]) -> String {
    let details = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Resource constraints violated: {}", details)
}

/// Stable summary shape for dashboards and audits.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub usage: UsageSnapshot,
    pub percentages: BTreeMap<ResourceKind, f64>,
    /// Number of recorded violations
    pub violations: usize,
    pub contract_state: ContractState,
    pub is_violated: bool,
    /// Highest threshold level across bounded resources
    pub threshold: ThresholdLevel,
}

/// Usage reported by an adapter after one external model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Provider-reported cost; estimated from the pricing table when absent
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Enforcer
// ═══════════════════════════════════════════════════════════════════════════════

/// Enforces one contract's constraints during execution.
///
/// Single-owner and synchronous; wrap in a mutex to share across threads.
pub struct ContractEnforcer {
    contract: Contract,
    monitor: ResourceMonitor,
    temporal: TemporalMonitor,
    strict_mode: bool,
    active: bool,
    callbacks: Vec<(CallbackId, EnforcementCallback)>,
    next_callback_id: u64,
    last_breach: Option<(ViolationKind, String)>,
}

impl fmt::Debug for ContractEnforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractEnforcer")
            .field("contract_id", &self.contract.id)
            .field("state", &self.contract.state())
            .field("strict_mode", &self.strict_mode)
            .field("active", &self.active)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ContractEnforcer {
    /// Create an enforcer for a contract.
    pub fn new(contract: Contract, strict_mode: bool) -> Self {
        let monitor = ResourceMonitor::new(contract.resources.clone());
        let temporal = TemporalMonitor::new(&contract.temporal);
        Self {
            contract,
            monitor,
            temporal,
            strict_mode,
            active: false,
            callbacks: Vec::new(),
            next_callback_id: 0,
            last_breach: None,
        }
    }

    pub fn builder(contract: Contract) -> ContractEnforcerBuilder {
        ContractEnforcerBuilder::new(contract)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub(crate) fn contract_mut(&mut self) -> &mut Contract {
        &mut self.contract
    }

    /// Give the contract back, ending enforcement.
    pub fn into_contract(self) -> Contract {
        self.contract
    }

    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    pub fn temporal(&self) -> &TemporalMonitor {
        &self.temporal
    }

    pub fn usage(&self) -> &ResourceUsage {
        self.monitor.usage()
    }

    /// Usage accumulator adapters report deltas into.
    pub fn usage_mut(&mut self) -> &mut ResourceUsage {
        self.monitor.usage_mut()
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    /// Started and the contract is still Active.
    pub fn is_active(&self) -> bool {
        self.active && self.contract.is_active()
    }

    /// Whether `start` ran and `stop` has not.
    pub fn is_started(&self) -> bool {
        self.active
    }

    /// Reason of the most recent resource or temporal breach, in either mode.
    pub fn last_breach_reason(&self) -> Option<&str> {
        self.last_breach.as_ref().map(|(_, reason)| reason.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Activate the contract and start the clock.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(CovenantError::already_active(&self.contract.id));
        }

        self.contract.activate()?;
        self.active = true;
        self.temporal.start();

        info!(
            contract_id = %self.contract.id,
            strict_mode = self.strict_mode,
            "Enforcement started"
        );
        self.emit(
            EventType::ContractStarted,
            format!("Contract '{}' enforcement started", self.contract.name),
            json!({}),
        );
        Ok(())
    }

    /// Stop enforcement. No-op when not started.
    pub fn stop(&mut self, reason: &str) {
        if !self.active {
            return;
        }
        self.active = false;

        info!(contract_id = %self.contract.id, reason = reason, "Enforcement stopped");
        let data = if reason.is_empty() {
            json!({})
        } else {
            json!({ "reason": reason })
        };
        self.emit(
            EventType::ContractStopped,
            format!("Contract '{}' enforcement stopped", self.contract.name),
            data,
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Check usage against resource constraints.
    ///
    /// Violations are recorded and reported through one `constraint_violated`
    /// event. In strict mode an Active contract then moves to Violated,
    /// enforcement stops and `contract_terminated` follows.
    pub fn check_constraints(&mut self) -> ConstraintCheck {
        let violations = self.monitor.check_constraints();
        if violations.is_empty() {
            return ConstraintCheck {
                violated: false,
                violations,
            };
        }

        for violation in &violations {
            self.monitor.record_violation(violation.clone());
        }

        let details = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warn!(
            contract_id = %self.contract.id,
            violations = %details,
            strict_mode = self.strict_mode,
            "Resource constraints exceeded"
        );

        self.emit(
            EventType::ConstraintViolated,
            format!(
                "Constraint violation: {} resource(s) exceeded",
                violations.len()
            ),
            json!({ "violations": violation_payload(&violations) }),
        );

        self.last_breach = Some((ViolationKind::Budget, violation_reason(&violations)));
        if self.strict_mode {
            self.handle_violation(&violations, &details);
        }

        ConstraintCheck {
            violated: true,
            violations,
        }
    }

    fn handle_violation(&mut self, violations: &[ViolationInfo], details: &str) {
        let reason = violation_reason(violations);

        if !self.contract.is_active() {
            return;
        }
        if let Err(e) = self.contract.violate(reason.clone()) {
            e.log();
            return;
        }
        self.stop(&reason);

        self.emit(
            EventType::ContractTerminated,
            format!("Contract terminated due to violations: {}", details),
            json!({
                "violations": violation_payload(violations),
                "reason": reason,
            }),
        );
    }

    /// Check the absolute deadline, then the maximum duration.
    ///
    /// Returns true when either was exceeded. In strict mode an Active
    /// contract moves to Expired and enforcement stops; in lenient mode only
    /// the event is emitted. Always false while enforcement is not running.
    pub fn check_temporal_constraints(&mut self) -> bool {
        if !self.active {
            return false;
        }

        if let Some(deadline) = self.temporal.absolute_deadline() {
            if self.temporal.is_past_absolute_deadline() {
                warn!(contract_id = %self.contract.id, deadline = %deadline, "Deadline exceeded");
                self.emit(
                    EventType::DeadlineExceeded,
                    "Contract deadline exceeded".to_string(),
                    json!({ "deadline": deadline.to_rfc3339() }),
                );
                let reason = format!("Deadline exceeded: {}", deadline.to_rfc3339());
                self.last_breach = Some((ViolationKind::Deadline, reason.clone()));
                if self.strict_mode {
                    self.handle_expiry(
                        reason,
                        "Contract expired due to deadline",
                    );
                }
                return true;
            }
        }

        if self.temporal.is_over_duration() {
            let elapsed = self.temporal.elapsed_seconds();
            let max = self.temporal.max_duration_seconds().unwrap_or_default();
            warn!(
                contract_id = %self.contract.id,
                elapsed_seconds = elapsed,
                max_duration_seconds = max,
                "Max duration exceeded"
            );
            self.emit(
                EventType::DurationExceeded,
                "Contract max duration exceeded".to_string(),
                json!({ "max_duration": max, "elapsed": elapsed }),
            );
            let reason = format!("Max duration exceeded: {:.3}s > {:.3}s", elapsed, max);
            self.last_breach = Some((ViolationKind::Duration, reason.clone()));
            if self.strict_mode {
                self.handle_expiry(
                    reason,
                    "Contract expired due to duration limit",
                );
            }
            return true;
        }

        false
    }

    fn handle_expiry(&mut self, reason: String, message: &str) {
        if !self.contract.is_active() {
            return;
        }
        if let Err(e) = self.contract.expire() {
            e.log();
            return;
        }
        self.stop(&reason);

        self.emit(
            EventType::ContractExpired,
            message.to_string(),
            json!({ "reason": reason }),
        );
    }

    /// Run both checks and raise strict-mode breaches as errors.
    ///
    /// The error carries the same reason recorded on the contract. Lenient
    /// mode never raises.
    pub fn enforce(&mut self) -> Result<()> {
        let check = self.check_constraints();
        if check.violated && self.strict_mode {
            return Err(self.breach_error(ViolationKind::Budget));
        }

        if self.check_temporal_constraints() && self.strict_mode {
            return Err(self.breach_error(ViolationKind::Duration));
        }

        Ok(())
    }

    fn breach_error(&self, fallback: ViolationKind) -> CovenantError {
        let (kind, reason) = self
            .last_breach
            .clone()
            .unwrap_or_else(|| (fallback, "Contract constraints exceeded".to_string()));
        let error = CovenantError::contract_violation(&self.contract.id, kind, reason);
        error.log();
        error
    }

    /// Pre-call check for adapters: the contract must be Active and within limits.
    pub fn guard(&mut self) -> Result<()> {
        if !self.contract.is_active() {
            return Err(CovenantError::contract_not_active(
                &self.contract.id,
                &self.contract.state(),
            ));
        }
        self.enforce()
    }

    /// Record one completed model call, then enforce.
    ///
    /// Lumpsum (or unbounded) contracts count prompt, reasoning and output
    /// tokens into the total. Fine-grained contracts record the
    /// reasoning/output split; prompt tokens are not part of either budget.
    pub fn record_completion(&mut self, report: &CompletionReport) -> Result<()> {
        let cost = match report.cost_usd {
            Some(cost) => cost,
            None => {
                pricing::calculate_cost(&report.model, report.input_tokens, report.output_tokens)
                    .total_cost()
            }
        };

        let usage = self.monitor.usage_mut();
        usage.add_api_call(cost, 0)?;
        match self.monitor.constraints().token_mode() {
            TokenMode::FineGrained => {
                self.monitor
                    .usage_mut()
                    .add_tokens(0, report.reasoning_tokens, report.output_tokens);
            }
            _ => {
                let total = report
                    .input_tokens
                    .saturating_add(report.reasoning_tokens)
                    .saturating_add(report.output_tokens);
                self.monitor.usage_mut().add_tokens(total, 0, 0);
            }
        }

        TokenUsageMetrics::record(
            &report.model,
            report.input_tokens,
            report.output_tokens.saturating_add(report.reasoning_tokens),
        );
        CostMetrics::record(&report.model, cost);

        self.emit(
            EventType::LlmCompletion,
            format!("LLM completion: {}", report.model),
            json!({
                "model": report.model,
                "input_tokens": report.input_tokens,
                "output_tokens": report.output_tokens,
                "reasoning_tokens": report.reasoning_tokens,
                "total_tokens": report.input_tokens
                    .saturating_add(report.output_tokens)
                    .saturating_add(report.reasoning_tokens),
                "cost": cost,
            }),
        );

        self.enforce()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_usage_summary(&self) -> UsageSummary {
        let percentages = self.monitor.get_usage_percentage();
        let threshold = percentages
            .values()
            .copied()
            .map(ThresholdLevel::from_percentage)
            .max()
            .unwrap_or(ThresholdLevel::Normal);

        UsageSummary {
            usage: self.monitor.usage().snapshot(),
            percentages,
            violations: self.monitor.violations().len(),
            contract_state: self.contract.state(),
            is_violated: self.monitor.is_violated(),
            threshold,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Callbacks
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an observer; delivery follows registration order.
    pub fn add_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: Fn(&EnforcementEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback_id);
        self.next_callback_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
        self.callbacks.len() != before
    }

    fn emit(&self, event_type: EventType, message: String, data: serde_json::Value) {
        EventCounter::increment(event_type.as_str());

        let event = EnforcementEvent {
            event_type,
            contract: &self.contract,
            message,
            data,
            timestamp: Utc::now(),
        };

        for (id, callback) in &self.callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        contract_id = %self.contract.id,
                        callback = id.0,
                        event_type = %event_type,
                        error = %e,
                        "Enforcement callback failed"
                    );
                }
                Err(panic) => {
                    error!(
                        contract_id = %self.contract.id,
                        callback = id.0,
                        event_type = %event_type,
                        panic = %panic_message(panic.as_ref()),
                        "Enforcement callback panicked"
                    );
                }
            }
        }
    }
}

impl fmt::Display for ContractEnforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_active() { "ACTIVE" } else { "INACTIVE" };
        let mode = if self.strict_mode { "STRICT" } else { "LENIENT" };
        write!(
            f,
            "ContractEnforcer(contract='{}', status={}, mode={})",
            self.contract.id, status, mode
        )
    }
}

fn violation_payload(violations: &[ViolationInfo]) -> serde_json::Value {
    violations
        .iter()
        .map(|v| {
            json!({
                "resource": v.resource,
                "limit": v.limit,
                "actual": v.actual,
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for creating configured contract enforcers.
pub struct ContractEnforcerBuilder {
    contract: Contract,
    strict_mode: bool,
    callbacks: Vec<EnforcementCallback>,
}

impl ContractEnforcerBuilder {
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            strict_mode: true,
            callbacks: Vec::new(),
        }
    }

    /// Apply an enforcement configuration.
    pub fn config(mut self, config: &EnforcementConfig) -> Self {
        self.strict_mode = config.strict_mode;
        self
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EnforcementEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn build(self) -> ContractEnforcer {
        let mut enforcer = ContractEnforcer::new(self.contract, self.strict_mode);
        for callback in self.callbacks {
            let id = CallbackId(enforcer.next_callback_id);
            enforcer.next_callback_id += 1;
            enforcer.callbacks.push((id, callback));
        }
        enforcer
    }
}
