//! Agent Contract Framework
//!
//! A contract binds resource and temporal limits plus a lifecycle state to one
//! unit of agent work. Enforcement lives in [`enforcement`], usage accounting
//! in [`tracker`], and ready-made presets in [`templates`].

pub mod enforcement;
pub mod limits;
pub mod temporal;
pub mod templates;
pub mod tracker;

pub use enforcement::{
    CallbackId, CompletionReport, ConstraintCheck, ContractEnforcer, ContractEnforcerBuilder,
    EnforcementCallback, EnforcementConfig, EnforcementEvent, EventRecord, EventType,
    ThresholdLevel, UsageSummary,
};
pub use limits::{
    ReasoningEffort, ReasoningThresholds, ResourceConstraints, ResourceConstraintsBuilder,
    TokenMode,
};
pub use temporal::{Deadline, DeadlineType, TemporalConstraints, TemporalMonitor};
pub use templates::{Template, TemplateOverrides};
pub use tracker::{ResourceKind, ResourceMonitor, ResourceUsage, UsageSnapshot, ViolationInfo};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CovenantError, Result};
use crate::telemetry::metrics::StateTransitionCounter;

// ═══════════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    /// Defined but not yet active
    Drafted,
    /// Work is executing within constraints
    Active,
    /// Success criteria met
    Fulfilled,
    /// A resource constraint was breached
    Violated,
    /// A time limit was reached
    Expired,
    /// Cancelled externally
    Terminated,
}

impl ContractState {
    /// Check if transition to another state is valid.
    pub fn can_transition_to(&self, target: &ContractState) -> bool {
        use ContractState::*;
        matches!(
            (self, target),
            (Drafted, Active)
                | (Drafted, Terminated)
                | (Active, Fulfilled)
                | (Active, Violated)
                | (Active, Expired)
                | (Active, Terminated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractState::Fulfilled
                | ContractState::Violated
                | ContractState::Expired
                | ContractState::Terminated
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::Active => "active",
            Self::Fulfilled => "fulfilled",
            Self::Violated => "violated",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategic posture shaping allocation and risk thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMode {
    /// Speed over cost
    Urgent,
    #[default]
    Balanced,
    /// Cost over speed
    Economical,
}

impl ContractMode {
    pub const ALL: [ContractMode; 3] = [
        ContractMode::Urgent,
        ContractMode::Balanced,
        ContractMode::Economical,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Balanced => "balanced",
            Self::Economical => "economical",
        }
    }
}

impl fmt::Display for ContractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractMode {
    type Err = CovenantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "balanced" => Ok(Self::Balanced),
            "economical" => Ok(Self::Economical),
            other => Err(CovenantError::validation(format!(
                "Unknown contract mode '{}' (expected urgent, balanced or economical)",
                other
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conditions
// ═══════════════════════════════════════════════════════════════════════════════

/// A measurable condition for fulfilling the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SuccessCriterionFields")]
pub struct SuccessCriterion {
    pub name: String,
    pub condition: String,
    weight: f64,
    #[serde(default)]
    pub required: bool,
}

impl SuccessCriterion {
    /// Create a criterion; `weight` must lie in `[0, 1]`.
    pub fn new(name: impl Into<String>, condition: impl Into<String>, weight: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(CovenantError::invalid_constraint(format!(
                "weight must be in [0, 1], got {}",
                weight
            )));
        }
        Ok(Self {
            name: name.into(),
            condition: condition.into(),
            weight,
            required: false,
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Deserialization shape, checked through [`SuccessCriterion::new`].
#[derive(Deserialize)]
struct SuccessCriterionFields {
    name: String,
    condition: String,
    weight: f64,
    #[serde(default)]
    required: bool,
}

impl TryFrom<SuccessCriterionFields> for SuccessCriterion {
    type Error = CovenantError;

    fn try_from(fields: SuccessCriterionFields) -> Result<Self> {
        let criterion = Self::new(fields.name, fields.condition, fields.weight)?;
        Ok(if fields.required {
            criterion.required()
        } else {
            criterion
        })
    }
}

/// An event that ends the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationCondition {
    /// e.g. `time_limit`, `resource_exhaustion`, `task_completion`
    pub kind: String,
    pub condition: String,
    /// Higher is evaluated earlier
    #[serde(default)]
    pub priority: i32,
}

impl TerminationCondition {
    pub fn new(kind: impl Into<String>, condition: impl Into<String>, priority: i32) -> Self {
        Self {
            kind: kind.into(),
            condition: condition.into(),
            priority,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Contract
// ═══════════════════════════════════════════════════════════════════════════════

/// An agent contract: limits, conditions, and lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub mode: ContractMode,
    pub resources: ResourceConstraints,
    pub temporal: TemporalConstraints,
    pub skills: Vec<String>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub termination_conditions: Vec<TerminationCondition>,
    pub metadata: HashMap<String, serde_json::Value>,

    state: ContractState,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    termination_reason: Option<String>,
}

impl Contract {
    /// Create a Drafted contract with no constraints.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: "1.0".to_string(),
            created_at: Utc::now(),
            mode: ContractMode::default(),
            resources: ResourceConstraints::default(),
            temporal: TemporalConstraints::default(),
            skills: Vec::new(),
            success_criteria: Vec::new(),
            termination_conditions: Vec::new(),
            metadata: HashMap::new(),
            state: ContractState::Drafted,
            violation_reason: None,
            termination_reason: None,
        }
    }

    /// Create a Drafted contract with a random UUID id.
    pub fn with_generated_id(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mode(mut self, mode: ContractMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_resources(mut self, resources: ResourceConstraints) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraints) -> Self {
        self.temporal = temporal;
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_success_criterion(mut self, criterion: SuccessCriterion) -> Self {
        self.success_criteria.push(criterion);
        self
    }

    pub fn with_termination_condition(mut self, condition: TerminationCondition) -> Self {
        self.termination_conditions.push(condition);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> ContractState {
        self.state
    }

    pub fn violation_reason(&self) -> Option<&str> {
        self.violation_reason.as_deref()
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    /// Drafted → Active.
    pub fn activate(&mut self) -> Result<()> {
        self.transition("activate", ContractState::Active)
    }

    /// Active → Fulfilled.
    pub fn fulfill(&mut self) -> Result<()> {
        self.transition("fulfill", ContractState::Fulfilled)
    }

    /// Active → Violated; a non-empty reason is kept for audit.
    pub fn violate(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition("violate", ContractState::Violated)?;
        let reason = reason.into();
        if !reason.is_empty() {
            self.violation_reason = Some(reason);
        }
        Ok(())
    }

    /// Active → Expired.
    pub fn expire(&mut self) -> Result<()> {
        self.transition("expire", ContractState::Expired)
    }

    /// Drafted or Active → Terminated; a non-empty reason is kept for audit.
    pub fn terminate(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition("terminate", ContractState::Terminated)?;
        let reason = reason.into();
        if !reason.is_empty() {
            self.termination_reason = Some(reason);
        }
        Ok(())
    }

    fn transition(&mut self, action: &str, target: ContractState) -> Result<()> {
        if !self.state.can_transition_to(&target) {
            return Err(CovenantError::invalid_state_transition(
                &self.id, action, &self.state,
            ));
        }

        let from = self.state;
        self.state = target;
        StateTransitionCounter::record(from.as_str(), target.as_str());
        info!(
            contract_id = %self.id,
            from = %from,
            to = %target,
            "Contract state changed"
        );
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state == ContractState::Active
    }

    /// Whether the contract reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contract(id='{}', name='{}', state={}, version='{}')",
            self.id, self.name, self.state, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn drafted() -> Contract {
        Contract::new("c-1", "Test")
    }

    #[test]
    fn test_contract_lifecycle() {
        let mut contract = drafted();
        assert_eq!(contract.state(), ContractState::Drafted);

        contract.activate().unwrap();
        assert!(contract.is_active());

        contract.fulfill().unwrap();
        assert!(contract.is_complete());
        assert_eq!(contract.state(), ContractState::Fulfilled);
    }

    #[test]
    fn test_drafted_only_activates_or_terminates() {
        let err = drafted().fulfill().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert!(drafted().violate("x").is_err());
        assert!(drafted().expire().is_err());
        assert!(drafted().activate().is_ok());
        assert!(drafted().terminate("cancelled").is_ok());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut contract = drafted();
        contract.activate().unwrap();
        contract.violate("over budget").unwrap();

        assert!(contract.activate().is_err());
        assert!(contract.fulfill().is_err());
        assert!(contract.expire().is_err());
        assert!(contract.terminate("late").is_err());
        assert_eq!(contract.state(), ContractState::Violated);
        assert_eq!(contract.violation_reason(), Some("over budget"));
        assert_eq!(contract.termination_reason(), None);
    }

    #[test]
    fn test_empty_reason_not_recorded() {
        let mut contract = drafted();
        contract.terminate("").unwrap();
        assert_eq!(contract.state(), ContractState::Terminated);
        assert_eq!(contract.termination_reason(), None);
    }

    #[test]
    fn test_success_criterion_weight() {
        assert!(SuccessCriterion::new("accuracy", "score > 0.9", 1.5).is_err());
        assert!(SuccessCriterion::new("accuracy", "score > 0.9", -0.1).is_err());
        let c = SuccessCriterion::new("accuracy", "score > 0.9", 0.5)
            .unwrap()
            .required();
        assert!(c.required);
        assert_eq!(c.weight(), 0.5);
    }

    #[test]
    fn test_success_criterion_deserialize_checks_weight() {
        let ok: SuccessCriterion = serde_json::from_str(
            r#"{"name": "accuracy", "condition": "score >= 0.9", "weight": 0.5, "required": true}"#,
        )
        .unwrap();
        assert_eq!(ok.weight(), 0.5);
        assert!(ok.required);

        let too_heavy = serde_json::from_str::<SuccessCriterion>(
            r#"{"name": "accuracy", "condition": "score >= 0.9", "weight": 1.5}"#,
        );
        assert!(too_heavy.is_err());

        let round_trip: SuccessCriterion =
            serde_json::from_value(serde_json::to_value(&ok).unwrap()).unwrap();
        assert_eq!(round_trip, ok);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("URGENT".parse::<ContractMode>().unwrap(), ContractMode::Urgent);
        assert_eq!(ContractMode::default(), ContractMode::Balanced);
        assert!("fast".parse::<ContractMode>().is_err());
    }

    #[test]
    fn test_contract_serializes_state_snake_case() {
        let mut contract = drafted().with_metadata("owner", "ops");
        contract.activate().unwrap();

        let json = serde_json::to_value(&contract).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["mode"], "balanced");
        assert_eq!(json["metadata"]["owner"], "ops");
    }

    #[test]
    fn test_generated_id_is_uuid() {
        let contract = Contract::with_generated_id("auto");
        assert!(Uuid::parse_str(&contract.id).is_ok());
    }
}
