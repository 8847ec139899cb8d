//! Integration tests for contract enforcement: policies, events and callbacks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use covenant_core::contracts::{
    CompletionReport, Contract, ContractEnforcer, ContractState, Deadline, EventType,
    ResourceConstraints, TemporalConstraints,
};
use covenant_core::error::{ErrorCode, ViolationKind};
use parking_lot::Mutex;

fn budgeted(tokens: u64) -> Contract {
    Contract::new("enforced", "Enforced").with_resources(
        ResourceConstraints::builder().tokens(tokens).build().unwrap(),
    )
}

fn record_events(enforcer: &mut ContractEnforcer) -> Arc<Mutex<Vec<(EventType, serde_json::Value)>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    enforcer.add_callback(move |event| {
        sink.lock().push((event.event_type, event.data.clone()));
        Ok(())
    });
    events
}

// ============================================================================
// Strict vs lenient
// ============================================================================

#[test]
fn test_strict_token_overrun() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), true);
    let events = record_events(&mut enforcer);
    enforcer.start().unwrap();
    enforcer.usage_mut().add_tokens(1500, 0, 0);

    let check = enforcer.check_constraints();
    assert_eq!(check.violations.len(), 1);
    assert_eq!(enforcer.contract().state(), ContractState::Violated);
    assert!(!enforcer.is_active());

    let events = events.lock();
    let violated = events
        .iter()
        .position(|(t, _)| *t == EventType::ConstraintViolated)
        .unwrap();
    let terminated = events
        .iter()
        .position(|(t, _)| *t == EventType::ContractTerminated)
        .unwrap();
    assert!(violated < terminated);
    assert_eq!(events[violated].1["violations"][0]["resource"], "tokens");
    assert_eq!(events[violated].1["violations"][0]["actual"], 1500.0);
}

#[test]
fn test_lenient_token_overrun() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), false);
    let events = record_events(&mut enforcer);
    enforcer.start().unwrap();
    enforcer.usage_mut().add_tokens(1500, 0, 0);

    let check = enforcer.check_constraints();
    assert!(check.violated);
    assert_eq!(enforcer.contract().state(), ContractState::Active);
    assert!(enforcer.is_active());
    assert!(events
        .lock()
        .iter()
        .all(|(t, _)| *t != EventType::ContractTerminated));
}

#[test]
fn test_strict_error_matches_contract_reason() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), true);
    enforcer.start().unwrap();
    enforcer.usage_mut().add_tokens(1500, 0, 0);

    let err = enforcer.enforce().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContractViolation);
    assert_eq!(err.violation_type(), Some(ViolationKind::Budget));
    assert_eq!(err.contract_id(), Some("enforced"));
    assert_eq!(err.reason(), enforcer.contract().violation_reason());
}

#[test]
fn test_double_start_and_inactive_stop() {
    let mut enforcer = ContractEnforcer::new(budgeted(10), true);
    let events = record_events(&mut enforcer);

    enforcer.stop("not started");
    assert!(events.lock().is_empty());

    enforcer.start().unwrap();
    assert_eq!(
        enforcer.start().unwrap_err().code(),
        ErrorCode::EnforcementAlreadyActive
    );

    enforcer.stop("done");
    let events = events.lock();
    assert_eq!(events.last().unwrap().0, EventType::ContractStopped);
    assert_eq!(events.last().unwrap().1["reason"], "done");
}

// ============================================================================
// Temporal
// ============================================================================

#[test]
fn test_past_absolute_deadline_expires_strict() {
    let past = Utc::now() - chrono::Duration::seconds(5);
    let temporal = TemporalConstraints::builder()
        .deadline(Deadline::At(past))
        .build()
        .unwrap();
    let mut enforcer = ContractEnforcer::new(
        Contract::new("late", "Late").with_temporal(temporal),
        true,
    );
    let events = record_events(&mut enforcer);
    enforcer.start().unwrap();

    let err = enforcer.enforce().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContractExpired);
    assert_eq!(err.violation_type(), Some(ViolationKind::Deadline));
    assert_eq!(enforcer.contract().state(), ContractState::Expired);

    let types: Vec<EventType> = events.lock().iter().map(|(t, _)| *t).collect();
    assert!(types.contains(&EventType::DeadlineExceeded));
    assert!(types.contains(&EventType::ContractExpired));
}

#[test]
fn test_duration_lenient_keeps_active() {
    let contract = Contract::new("slow", "Slow")
        .with_temporal(TemporalConstraints::with_max_duration(Duration::from_millis(10)));
    let mut enforcer = ContractEnforcer::new(contract, false);
    let events = record_events(&mut enforcer);
    enforcer.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));

    assert!(enforcer.check_temporal_constraints());
    assert_eq!(enforcer.contract().state(), ContractState::Active);
    assert!(events
        .lock()
        .iter()
        .any(|(t, _)| *t == EventType::DurationExceeded));
}

// ============================================================================
// Callbacks
// ============================================================================

#[test]
fn test_callbacks_delivered_in_order_despite_failures() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), true);
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    enforcer.add_callback(move |_| {
        first.lock().push("first");
        anyhow::bail!("first observer failed")
    });
    enforcer.add_callback(|_| panic!("second observer panicked"));
    let third = Arc::clone(&order);
    enforcer.add_callback(move |_| {
        third.lock().push("third");
        Ok(())
    });

    enforcer.start().unwrap();
    assert_eq!(*order.lock(), vec!["first", "third"]);
    assert!(enforcer.is_active());
}

// ============================================================================
// Adapter surface
// ============================================================================

#[test]
fn test_record_completion_lumpsum() {
    let mut enforcer = ContractEnforcer::new(budgeted(10_000), true);
    let events = record_events(&mut enforcer);
    enforcer.start().unwrap();

    enforcer
        .record_completion(&CompletionReport {
            model: "gpt-4o-mini".to_string(),
            input_tokens: 1000,
            output_tokens: 500,
            reasoning_tokens: 0,
            cost_usd: None,
        })
        .unwrap();

    let usage = enforcer.usage();
    assert_eq!(usage.tokens(), 1500);
    assert_eq!(usage.api_calls(), 1);
    assert!(usage.cost_usd() > 0.0);

    let events = events.lock();
    let (_, data) = events
        .iter()
        .find(|(t, _)| *t == EventType::LlmCompletion)
        .unwrap();
    assert_eq!(data["total_tokens"], 1500);
}

#[test]
fn test_record_completion_fine_grained_split() {
    let constraints = ResourceConstraints::builder()
        .reasoning_tokens(5000)
        .text_tokens(2000)
        .build()
        .unwrap();
    let mut enforcer = ContractEnforcer::new(
        Contract::new("fg", "Fine").with_resources(constraints),
        true,
    );
    enforcer.start().unwrap();

    enforcer
        .record_completion(&CompletionReport {
            model: "o1".to_string(),
            input_tokens: 800,
            output_tokens: 300,
            reasoning_tokens: 1200,
            cost_usd: Some(0.02),
        })
        .unwrap();

    let usage = enforcer.usage();
    assert_eq!(usage.reasoning_tokens(), 1200);
    assert_eq!(usage.text_tokens(), 300);
    assert_eq!(usage.tokens(), 1500);
    assert_eq!(usage.cost_usd(), 0.02);
}

#[test]
fn test_record_completion_strict_breach() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), true);
    enforcer.start().unwrap();

    let err = enforcer
        .record_completion(&CompletionReport {
            model: "gpt-4o".to_string(),
            input_tokens: 900,
            output_tokens: 400,
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContractViolation);

    // Violated contracts refuse further calls
    assert_eq!(
        enforcer.guard().unwrap_err().code(),
        ErrorCode::ContractViolation
    );
}

#[test]
fn test_usage_summary_json_shape() {
    let mut enforcer = ContractEnforcer::new(budgeted(1000), false);
    enforcer.start().unwrap();
    enforcer.usage_mut().add_tokens(1200, 0, 0);
    enforcer.check_constraints();

    let json = serde_json::to_value(enforcer.get_usage_summary()).unwrap();
    assert_eq!(json["usage"]["tokens"], 1200);
    assert_eq!(json["percentages"]["tokens"], 120.0);
    assert_eq!(json["violations"], 1);
    assert_eq!(json["contract_state"], "active");
    assert_eq!(json["is_violated"], true);
}
