//! Integration tests for contracts, constraints and usage monitoring.

use std::time::Duration;

use covenant_core::contracts::{
    Contract, ContractMode, ContractState, ReasoningEffort, ResourceConstraints, ResourceKind,
    ResourceMonitor, ResourceUsage, TemporalConstraints, TemporalMonitor, TokenMode,
};
use covenant_core::error::ErrorCode;

fn lumpsum(tokens: u64) -> ResourceConstraints {
    ResourceConstraints::builder().tokens(tokens).build().unwrap()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_drafted_transitions() {
    let mut contract = Contract::new("c-1", "Lifecycle");
    assert_eq!(contract.state(), ContractState::Drafted);

    let err = contract.fulfill().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    assert!(contract.violate("too early").is_err());
    assert!(contract.expire().is_err());
    assert_eq!(contract.state(), ContractState::Drafted);

    contract.activate().unwrap();
    assert!(contract.is_active());
    contract.fulfill().unwrap();
    assert!(contract.is_complete());
}

#[test]
fn test_drafted_can_be_terminated() {
    let mut contract = Contract::new("c-2", "Cancelled");
    contract.terminate("user cancelled").unwrap();
    assert_eq!(contract.state(), ContractState::Terminated);
    assert_eq!(contract.termination_reason(), Some("user cancelled"));
}

#[test]
fn test_terminal_states_are_final() {
    let mut contract = Contract::new("c-3", "Final");
    contract.activate().unwrap();
    contract.violate("budget").unwrap();

    assert!(contract.activate().is_err());
    assert!(contract.terminate("again").is_err());
    assert_eq!(contract.violation_reason(), Some("budget"));
}

#[test]
fn test_contract_serializes_state() {
    let contract = Contract::new("c-4", "Serialized")
        .with_mode(ContractMode::Urgent)
        .with_resources(lumpsum(100));
    let json = serde_json::to_value(&contract).unwrap();
    assert_eq!(json["state"], "drafted");
    assert_eq!(json["mode"], "urgent");
    assert_eq!(json["resources"]["tokens"], 100);
}

// ============================================================================
// Constraints
// ============================================================================

#[test]
fn test_token_modes_are_exclusive() {
    let err = ResourceConstraints::builder()
        .tokens(1000)
        .reasoning_tokens(500)
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConstraint);

    let fine = ResourceConstraints::builder()
        .reasoning_tokens(500)
        .text_tokens(200)
        .build()
        .unwrap();
    assert_eq!(fine.token_mode(), TokenMode::FineGrained);
    assert_eq!(lumpsum(10).token_mode(), TokenMode::Lumpsum);
    assert_eq!(ResourceConstraints::unlimited().token_mode(), TokenMode::None);
}

#[test]
fn test_negative_limits_rejected() {
    let err = ResourceConstraints::builder()
        .cost_usd(-0.5)
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConstraint);
}

#[test]
fn test_reasoning_effort_minimum() {
    assert!(ResourceConstraints::builder()
        .reasoning_tokens(1000)
        .reasoning_effort(ReasoningEffort::High)
        .build()
        .is_err());

    let ok = ResourceConstraints::builder()
        .reasoning_tokens(2500)
        .reasoning_effort(ReasoningEffort::High)
        .build()
        .unwrap();
    assert_eq!(ok.recommended_reasoning_effort(), Some(ReasoningEffort::High));
}

#[test]
fn test_constraints_deserialize_validated() {
    let ok: ResourceConstraints = serde_json::from_str(r#"{"tokens": 500}"#).unwrap();
    assert_eq!(ok.tokens(), Some(500));

    let bad = serde_json::from_str::<ResourceConstraints>(
        r#"{"tokens": 500, "text_tokens": 100}"#,
    );
    assert!(bad.is_err());
}

// ============================================================================
// Monitoring
// ============================================================================

#[test]
fn test_token_overrun_single_violation() {
    let mut monitor = ResourceMonitor::new(lumpsum(1000));
    monitor.usage_mut().add_tokens(1500, 0, 0);

    let violations = monitor.check_constraints();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].resource, ResourceKind::Tokens);
    assert_eq!(violations[0].limit, 1000.0);
    assert_eq!(violations[0].actual, 1500.0);
}

#[test]
fn test_reasoning_only_violation() {
    let constraints = ResourceConstraints::builder()
        .reasoning_tokens(500)
        .text_tokens(200)
        .build()
        .unwrap();
    let mut monitor = ResourceMonitor::new(constraints);
    monitor.usage_mut().add_tokens(0, 600, 100);

    let violations = monitor.check_constraints();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].resource, ResourceKind::ReasoningTokens);
}

#[test]
fn test_split_sum_and_monotonic_usage() {
    let mut usage = ResourceUsage::new();
    usage.add_tokens(0, 300, 200);
    usage.add_tokens(0, 50, 0);
    assert_eq!(usage.tokens(), usage.reasoning_tokens() + usage.text_tokens());

    usage.update_memory(512.0).unwrap();
    usage.update_memory(128.0).unwrap();
    assert_eq!(usage.memory_mb(), 512.0);

    assert_eq!(
        usage.add_cost(-1.0).unwrap_err().code(),
        ErrorCode::InvalidInput
    );
    assert_eq!(usage.cost_usd(), 0.0);
}

#[test]
fn test_percentages_omit_unbounded_and_zero_limits() {
    let constraints = ResourceConstraints::builder()
        .tokens(1000)
        .api_calls(0)
        .build()
        .unwrap();
    let mut monitor = ResourceMonitor::new(constraints);
    monitor.usage_mut().add_tokens(250, 0, 0);

    let pct = monitor.get_usage_percentage();
    assert_eq!(pct.len(), 1);
    assert_eq!(pct[&ResourceKind::Tokens], 25.0);
}

// ============================================================================
// Temporal
// ============================================================================

#[test]
fn test_duration_exceeded_full_pressure() {
    let constraints = TemporalConstraints::with_max_duration(Duration::from_millis(100));
    let mut monitor = TemporalMonitor::new(&constraints);
    assert!(!monitor.is_past_deadline());
    assert_eq!(monitor.get_time_pressure(), 0.0);

    monitor.start();
    std::thread::sleep(Duration::from_millis(200));

    assert!(monitor.is_over_duration());
    assert!(monitor.is_past_deadline());
    assert_eq!(monitor.get_time_pressure(), 1.0);
    assert_eq!(monitor.remaining_seconds(), Some(0.0));
}
