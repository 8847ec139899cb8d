//! Integration tests for mode-aware planning.

use covenant_core::contracts::{Contract, ContractMode, ResourceConstraints, ResourceUsage};
use covenant_core::planning::{
    estimate_quality_cost_time, plan_resource_allocation, prioritize_tasks, recommend_strategy,
    Approach, RiskLevel, Task, TaskPriority,
};

fn contract(mode: ContractMode, tokens: u64) -> Contract {
    Contract::new("plan", "Plan")
        .with_mode(mode)
        .with_resources(ResourceConstraints::builder().tokens(tokens).build().unwrap())
}

#[test]
fn test_economical_required_task_gets_seventy_percent() {
    let c = contract(ContractMode::Economical, 10_000);
    let tasks = vec![Task::new("t1", "Required").with_tokens(4000).required()];

    let plan = plan_resource_allocation(&tasks, &c, None);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].allocated_tokens, 2800);
}

#[test]
fn test_required_low_precedes_optional_high_in_every_mode() {
    let tasks = vec![
        Task::new("optional", "Optional")
            .with_priority(TaskPriority::High)
            .with_tokens(100),
        Task::new("required", "Required")
            .with_priority(TaskPriority::Low)
            .with_tokens(9000)
            .with_quality(0.5)
            .required(),
    ];

    for mode in ContractMode::ALL {
        let c = contract(mode, 10_000);
        let ordered = prioritize_tasks(&tasks, &c, None);
        assert_eq!(ordered[0].id, "required", "mode {}", mode);

        let mut heavy_usage = ResourceUsage::new();
        heavy_usage.add_tokens(8000, 0, 0);
        let ordered = prioritize_tasks(&tasks, &c, Some(&heavy_usage));
        assert_eq!(ordered[0].id, "required", "mode {} under pressure", mode);
    }
}

#[test]
fn test_lighter_task_wins_ties() {
    let c = contract(ContractMode::Balanced, 10_000);
    let tasks = vec![
        Task::new("heavy", "Heavy").with_tokens(3000),
        Task::new("light", "Light").with_tokens(1000),
    ];
    let ordered = prioritize_tasks(&tasks, &c, None);
    assert_eq!(ordered[0].id, "light");
}

#[test]
fn test_balanced_fits_keeps_input_order() {
    let c = contract(ContractMode::Balanced, 10_000);
    let tasks = vec![
        Task::new("b", "B").with_tokens(2000),
        Task::new("a", "A").with_tokens(1000).required(),
    ];
    let plan = plan_resource_allocation(&tasks, &c, None);
    assert_eq!(plan[0].task_id, "b");
    assert_eq!(plan[0].allocated_tokens, 2000);
    assert_eq!(plan[1].allocated_tokens, 1000);
}

#[test]
fn test_tradeoffs_across_modes() {
    let balanced = estimate_quality_cost_time(
        Approach::Standard,
        &contract(ContractMode::Balanced, 1),
    );
    assert_eq!(balanced.tokens, 5000);
    assert_eq!(balanced.time_seconds, 180.0);

    let urgent = estimate_quality_cost_time(Approach::Quick, &contract(ContractMode::Urgent, 1));
    assert_eq!(urgent.tokens, 3600);
    assert_eq!(urgent.time_seconds, 30.0);
}

#[test]
fn test_strategy_risk_levels() {
    let c = contract(ContractMode::Balanced, 10_000);
    let mut usage = ResourceUsage::new();

    usage.add_tokens(2000, 0, 0);
    assert_eq!(recommend_strategy(&c, Some(&usage)).risk_level, RiskLevel::Low);

    usage.add_tokens(3000, 0, 0);
    let rec = recommend_strategy(&c, Some(&usage));
    assert_eq!(rec.risk_level, RiskLevel::Medium);
    assert_eq!(rec.warnings, vec!["Moderate budget consumption detected"]);

    usage.add_tokens(4000, 0, 0);
    let rec = recommend_strategy(&c, Some(&usage));
    assert_eq!(rec.risk_level, RiskLevel::High);
    assert!(rec.should_continue);
    assert_eq!(
        rec.recommended_approach,
        "Reduce scope - focus on highest-value tasks only"
    );
}
