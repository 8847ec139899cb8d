//! Execution Harness
//!
//! Binds an operation to a contract. Each `execute` call runs the operation
//! under enforcement, checks constraints afterwards, and produces an audit
//! log. Operation failures never propagate; they become failed results.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::contracts::{
    CompletionReport, Contract, ContractEnforcer, ContractState, EnforcementConfig, EventRecord,
    EventType, ResourceUsage, TemporalMonitor,
};
use crate::error::{CovenantError, Result};
use crate::telemetry::metrics::ExecutionTimer;

// ═══════════════════════════════════════════════════════════════════════════════
// Operation
// ═══════════════════════════════════════════════════════════════════════════════

/// Work run under a contract.
///
/// `Ok(None)` means the operation finished without a usable output.
pub trait Operation<I, O> {
    fn run(&mut self, input: I, ctx: &mut ExecutionContext) -> anyhow::Result<Option<O>>;
}

impl<I, O, F> Operation<I, O> for F
where
    F: FnMut(I, &mut ExecutionContext) -> anyhow::Result<Option<O>>,
{
    fn run(&mut self, input: I, ctx: &mut ExecutionContext) -> anyhow::Result<Option<O>> {
        self(input, ctx)
    }
}

/// What an operation sees while it runs: usage accounting, the clock and the
/// remaining budget.
#[derive(Debug)]
pub struct ExecutionContext {
    enforcer: ContractEnforcer,
    call_clock: TemporalMonitor,
}

impl ExecutionContext {
    pub fn contract(&self) -> &Contract {
        self.enforcer.contract()
    }

    pub fn enforcer(&self) -> &ContractEnforcer {
        &self.enforcer
    }

    pub fn usage(&self) -> &ResourceUsage {
        self.enforcer.usage()
    }

    /// Report usage deltas for work done so far.
    pub fn usage_mut(&mut self) -> &mut ResourceUsage {
        self.enforcer.usage_mut()
    }

    /// Record a model call and enforce; strict breaches surface as errors.
    pub fn record_completion(&mut self, report: &CompletionReport) -> Result<()> {
        self.enforcer.record_completion(report)
    }

    /// Pre-call check before starting more external work.
    pub fn guard(&mut self) -> Result<()> {
        self.enforcer.guard()
    }

    /// Fraction of this call's allotted duration already used.
    pub fn time_pressure(&self) -> f64 {
        self.call_clock.get_time_pressure()
    }

    pub fn remaining_budget(&self) -> RemainingBudget {
        RemainingBudget::of(&self.enforcer)
    }
}

/// Budget left under the contract's ceilings; `None` where unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemainingBudget {
    pub tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub api_calls: Option<u64>,
}

impl RemainingBudget {
    fn of(enforcer: &ContractEnforcer) -> Self {
        let monitor = enforcer.monitor();
        Self {
            tokens: monitor.remaining_tokens(),
            cost_usd: monitor.remaining_cost(),
            api_calls: monitor.remaining_api_calls(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Results and audit log
// ═══════════════════════════════════════════════════════════════════════════════

/// Usage totals as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tokens: u64,
    pub reasoning_tokens: u64,
    pub text_tokens: u64,
    pub api_calls: u64,
    pub cost_usd: f64,
}

impl From<&ResourceUsage> for UsageRecord {
    fn from(usage: &ResourceUsage) -> Self {
        Self {
            tokens: usage.tokens(),
            reasoning_tokens: usage.reasoning_tokens(),
            text_tokens: usage.text_tokens(),
            api_calls: usage.api_calls(),
            cost_usd: usage.cost_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetrics {
    pub elapsed_seconds: f64,
    pub deadline_met: bool,
}

/// Audit record of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub contract_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub final_state: ContractState,
    pub resource_usage: UsageRecord,
    pub temporal_metrics: TemporalMetrics,
    pub events: Vec<EventRecord>,
}

impl ExecutionLog {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult<O> {
    pub output: Option<O>,
    pub success: bool,
    pub violations: Vec<String>,
    pub events: Vec<EventRecord>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub execution_log: Option<ExecutionLog>,
}

impl<O> ExecutionResult<O> {
    pub fn is_success(&self) -> bool {
        self.success
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Agent
// ═══════════════════════════════════════════════════════════════════════════════

/// An operation bound to a contract.
///
/// Successful calls leave the contract Active so usage accumulates across
/// repeated `execute` calls.
pub struct ContractAgent<Op> {
    operation: Op,
    context: ExecutionContext,
    events: Arc<Mutex<Vec<EventRecord>>>,
    enable_logging: bool,
    last_log: Option<ExecutionLog>,
}

impl<Op> ContractAgent<Op> {
    /// Strict enforcement with logging enabled.
    pub fn new(contract: Contract, operation: Op) -> Self {
        Self::from_config(contract, operation, &EnforcementConfig::default())
    }

    pub fn from_config(contract: Contract, operation: Op, config: &EnforcementConfig) -> Self {
        let call_clock = TemporalMonitor::new(&contract.temporal);
        let mut enforcer = ContractEnforcer::builder(contract).config(config).build();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        enforcer.add_callback(move |event| {
            sink.lock().push(event.to_record());
            Ok(())
        });

        Self {
            operation,
            context: ExecutionContext {
                enforcer,
                call_clock,
            },
            events,
            enable_logging: config.enable_logging,
            last_log: None,
        }
    }

    pub fn contract(&self) -> &Contract {
        self.context.contract()
    }

    pub fn enforcer(&self) -> &ContractEnforcer {
        &self.context.enforcer
    }

    /// Run the operation once under the contract.
    #[instrument(skip(self, input), fields(contract_id = %self.context.contract().id))]
    pub fn execute<I, O>(&mut self, input: I) -> ExecutionResult<O>
    where
        Op: Operation<I, O>,
    {
        self.events.lock().clear();
        self.context.call_clock.start();
        let start_time = Utc::now();
        let timer = ExecutionTimer::start();

        if !self.context.enforcer.is_started() {
            if let Err(e) = self.context.enforcer.start() {
                let message = e.user_message().to_string();
                timer.finish(false);
                return self.failed(start_time, message, None);
            }
        }

        let operation = &mut self.operation;
        let context = &mut self.context;
        let outcome = catch_unwind(AssertUnwindSafe(|| operation.run(input, context)));

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                timer.finish(false);
                let message = e.to_string();
                let source = e.downcast::<CovenantError>().ok();
                return self.failed(start_time, message, source);
            }
            Err(panic) => {
                timer.finish(false);
                let message = panic_message(panic.as_ref());
                return self.failed(start_time, message, None);
            }
        };

        let check = self.context.enforcer.check_constraints();
        let temporal_violated = self.context.enforcer.check_temporal_constraints();

        let mut violations: Vec<String> = check.reason().into_iter().collect();
        if temporal_violated {
            violations.extend(
                self.context
                    .enforcer
                    .last_breach_reason()
                    .map(str::to_string),
            );
        }
        let violated = check.violated || temporal_violated;
        let success = output.is_some() && !violated;

        if !success {
            if output.is_none() {
                self.push_record(EventRecord::new(
                    EventType::Incomplete,
                    "Success criteria not met",
                ));
            }
            let reason = if violated {
                violations.join("; ")
            } else {
                "Success criteria not met".to_string()
            };
            self.mark_violated(&reason);
        }

        let elapsed = timer.finish(success);
        let events = self.events.lock().clone();

        info!(
            success = success,
            state = %self.contract().state(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Execution finished"
        );

        let execution_log = self.build_log(start_time, &events);
        ExecutionResult {
            output,
            success,
            violations,
            events,
            metadata: serde_json::Map::new(),
            execution_log,
        }
    }

    fn failed<O>(
        &mut self,
        start_time: DateTime<Utc>,
        message: String,
        source: Option<CovenantError>,
    ) -> ExecutionResult<O> {
        warn!(
            contract_id = %self.contract().id,
            error = %message,
            "Operation failed"
        );

        let mut record = EventRecord::new(EventType::Error, message.clone());
        record.contract_id = Some(self.contract().id.clone());
        if let Some(code) = source.as_ref().map(CovenantError::code) {
            record.data = json!({ "code": code });
        }
        self.push_record(record);

        self.mark_violated(&format!("Execution failed: {}", message));

        let events = self.events.lock().clone();
        let mut metadata = serde_json::Map::new();
        metadata.insert("error".to_string(), json!(message));
        metadata.insert(
            "elapsed_seconds".to_string(),
            json!(self.context.call_clock.elapsed_seconds()),
        );

        let execution_log = self.build_log(start_time, &events);
        ExecutionResult {
            output: None,
            success: false,
            violations: vec![message],
            events,
            metadata,
            execution_log,
        }
    }

    /// Move a still-Active contract to Violated and stop enforcement.
    fn mark_violated(&mut self, reason: &str) {
        let enforcer = &mut self.context.enforcer;
        if enforcer.contract().is_active() {
            if let Err(e) = enforcer.contract_mut().violate(reason) {
                e.log();
            }
        }
        enforcer.stop(reason);
    }

    fn push_record(&self, mut record: EventRecord) {
        if record.contract_id.is_none() {
            record.contract_id = Some(self.contract().id.clone());
        }
        self.events.lock().push(record);
    }

    fn build_log(&mut self, start_time: DateTime<Utc>, events: &[EventRecord]) -> Option<ExecutionLog> {
        if !self.enable_logging {
            return None;
        }

        let log = ExecutionLog {
            contract_id: self.contract().id.clone(),
            start_time,
            end_time: Utc::now(),
            final_state: self.contract().state(),
            resource_usage: UsageRecord::from(self.context.enforcer.usage()),
            temporal_metrics: TemporalMetrics {
                elapsed_seconds: self.context.call_clock.elapsed_seconds(),
                deadline_met: !self.context.call_clock.is_past_deadline(),
            },
            events: events.to_vec(),
        };
        self.last_log = Some(log.clone());
        Some(log)
    }

    /// Audit log of the most recent call.
    pub fn execution_log(&self) -> Option<&ExecutionLog> {
        self.last_log.as_ref()
    }

    pub fn get_remaining_budget(&self) -> RemainingBudget {
        self.context.remaining_budget()
    }

    pub fn get_time_pressure(&self) -> f64 {
        self.context.time_pressure()
    }

    /// The most recent audit log as JSON.
    pub fn to_json(&self) -> Result<String> {
        match &self.last_log {
            Some(log) => log.to_json(),
            None => Ok(serde_json::to_string_pretty(
                &json!({ "error": "No execution log available" }),
            )?),
        }
    }
}

impl<Op> std::fmt::Debug for ContractAgent<Op> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractAgent")
            .field("context", &self.context)
            .field("enable_logging", &self.enable_logging)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Operation panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Operation panicked: {}", s)
    } else {
        "Operation panicked".to_string()
    }
}
