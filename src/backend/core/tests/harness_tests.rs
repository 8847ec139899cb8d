//! Integration tests for the execution harness.

use std::time::Duration;

use covenant_core::contracts::{
    CompletionReport, Contract, ContractState, EnforcementConfig, EventType, ResourceConstraints,
    TemporalConstraints,
};
use covenant_core::harness::{ContractAgent, ExecutionContext};

fn contract(tokens: u64) -> Contract {
    Contract::new("agent", "Agent")
        .with_resources(ResourceConstraints::builder().tokens(tokens).build().unwrap())
}

#[test]
fn test_cumulative_usage_until_violation() {
    let mut agent = ContractAgent::new(
        contract(1000),
        |tokens: u64, ctx: &mut ExecutionContext| -> anyhow::Result<Option<String>> {
            ctx.usage_mut().add_tokens(tokens, 0, 0);
            Ok(Some(format!("used {}", tokens)))
        },
    );

    assert!(agent.execute(600).success);
    assert_eq!(agent.contract().state(), ContractState::Active);

    let result = agent.execute(600);
    assert!(!result.success);
    assert_eq!(
        result.violations,
        vec!["Resource constraints violated: tokens (1200/1000)".to_string()]
    );
    assert_eq!(agent.contract().state(), ContractState::Violated);
    assert_eq!(
        agent.contract().violation_reason(),
        Some(result.violations[0].as_str())
    );

    let log = result.execution_log.unwrap();
    assert_eq!(log.final_state, ContractState::Violated);
    assert_eq!(log.resource_usage.tokens, 1200);

    // Violated contracts cannot be restarted
    let again = agent.execute(1);
    assert!(!again.success);
}

#[test]
fn test_strict_breach_inside_operation() {
    let mut agent = ContractAgent::new(
        contract(1000),
        |_: (), ctx: &mut ExecutionContext| -> anyhow::Result<Option<String>> {
            ctx.record_completion(&CompletionReport {
                model: "gpt-4o-mini".to_string(),
                input_tokens: 2000,
                output_tokens: 10,
                ..Default::default()
            })?;
            Ok(Some("unreachable".to_string()))
        },
    );

    let result = agent.execute(());
    assert!(!result.success);
    assert!(result.output.is_none());
    assert!(result
        .events
        .iter()
        .any(|e| e.event_type == EventType::ContractTerminated));
    assert!(result.events.iter().any(|e| e.event_type == EventType::Error));
    assert_eq!(agent.contract().state(), ContractState::Violated);
}

#[test]
fn test_execution_log_json() {
    let mut agent = ContractAgent::new(
        contract(5000),
        |_: (), ctx: &mut ExecutionContext| -> anyhow::Result<Option<u32>> {
            ctx.usage_mut().add_tokens(0, 100, 50);
            ctx.usage_mut().add_api_call(0.01, 0)?;
            Ok(Some(1))
        },
    );

    assert!(agent.execute(()).success);
    let json: serde_json::Value = serde_json::from_str(&agent.to_json().unwrap()).unwrap();
    assert_eq!(json["contract_id"], "agent");
    assert_eq!(json["final_state"], "active");
    assert_eq!(json["resource_usage"]["reasoning_tokens"], 100);
    assert_eq!(json["resource_usage"]["api_calls"], 1);
    assert_eq!(json["temporal_metrics"]["deadline_met"], true);
    assert_eq!(json["events"][0]["type"], "contract_started");
}

#[test]
fn test_logging_disabled() {
    let config = EnforcementConfig {
        enable_logging: false,
        ..Default::default()
    };
    let mut agent = ContractAgent::from_config(
        contract(5000),
        |_: (), _: &mut ExecutionContext| -> anyhow::Result<Option<u32>> { Ok(Some(1)) },
        &config,
    );

    let result = agent.execute(());
    assert!(result.success);
    assert!(result.execution_log.is_none());
    assert!(agent.execution_log().is_none());
}

#[test]
fn test_time_pressure_and_budget_visible_to_operation() {
    let contract = contract(1000)
        .with_temporal(TemporalConstraints::with_max_duration(Duration::from_secs(60)));
    let mut agent = ContractAgent::new(
        contract,
        |_: (), ctx: &mut ExecutionContext| -> anyhow::Result<Option<(f64, Option<u64>)>> {
            ctx.usage_mut().add_tokens(400, 0, 0);
            Ok(Some((ctx.time_pressure(), ctx.remaining_budget().tokens)))
        },
    );

    let result = agent.execute(());
    let (pressure, remaining) = result.output.unwrap();
    assert!(pressure < 0.5);
    assert_eq!(remaining, Some(600));
    assert!(agent.get_time_pressure() < 1.0);
}
