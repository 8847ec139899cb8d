//! Governance metrics on the `metrics` facade.
//!
//! The library only records; installing an exporter (Prometheus, StatsD, ...)
//! is left to the embedding application.
//!
//! # Example
//!
//! ```rust,no_run
//! use covenant_core::telemetry::metrics::{register_metrics, ViolationCounter};
//!
//! register_metrics();
//! ViolationCounter::increment("tokens");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;
use std::time::{Duration, Instant};

static REGISTER: Once = Once::new();

/// Describe every metric this crate records. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        describe_counter!(
            "covenant_violations_total",
            "Resource constraint violations detected, by resource"
        );
        describe_counter!(
            "covenant_events_total",
            "Enforcement events emitted, by event type"
        );
        describe_counter!(
            "covenant_state_transitions_total",
            "Contract lifecycle transitions, by target state"
        );
        describe_counter!(
            "covenant_errors_total",
            "Errors raised, by code, category and severity"
        );
        describe_counter!(
            "covenant_tokens_total",
            "Tokens reported by completions, by model and direction"
        );
        describe_counter!(
            "covenant_cost_total_microdollars",
            "Reported cost in microdollars, by model"
        );
        describe_histogram!(
            "covenant_execution_seconds",
            "Wall time of harness executions, by outcome"
        );
    });
}

/// Counter for detected constraint violations.
pub struct ViolationCounter;

impl ViolationCounter {
    pub fn increment(resource: &str) {
        counter!(
            "covenant_violations_total",
            "resource" => resource.to_string(),
        )
        .increment(1);
    }
}

/// Counter for emitted enforcement events.
pub struct EventCounter;

impl EventCounter {
    pub fn increment(event_type: &str) {
        counter!(
            "covenant_events_total",
            "event_type" => event_type.to_string(),
        )
        .increment(1);
    }
}

/// Counter for contract lifecycle transitions.
pub struct StateTransitionCounter;

impl StateTransitionCounter {
    pub fn record(from: &str, to: &str) {
        counter!(
            "covenant_state_transitions_total",
            "from" => from.to_string(),
            "to" => to.to_string(),
        )
        .increment(1);
    }
}

/// Token usage reported by completions.
pub struct TokenUsageMetrics;

impl TokenUsageMetrics {
    pub fn record(model: &str, input_tokens: u64, output_tokens: u64) {
        counter!(
            "covenant_tokens_total",
            "model" => model.to_string(),
            "direction" => "input",
        )
        .increment(input_tokens);

        counter!(
            "covenant_tokens_total",
            "model" => model.to_string(),
            "direction" => "output",
        )
        .increment(output_tokens);
    }
}

/// Reported cost, kept in microdollars so it fits a counter.
pub struct CostMetrics;

impl CostMetrics {
    pub fn record(model: &str, cost_dollars: f64) {
        let microdollars = (cost_dollars * 1_000_000.0) as u64;
        counter!(
            "covenant_cost_total_microdollars",
            "model" => model.to_string(),
        )
        .increment(microdollars);
    }
}

/// Times one harness execution.
pub struct ExecutionTimer {
    start: Instant,
}

impl ExecutionTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time without recording.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the duration under the given outcome and return it.
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        let outcome = if success { "success" } else { "failure" };

        histogram!(
            "covenant_execution_seconds",
            "outcome" => outcome,
        )
        .record(duration.as_secs_f64());

        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_execution_timer() {
        let timer = ExecutionTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.finish(true);

        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        ViolationCounter::increment("tokens");
        EventCounter::increment("contract_started");
        StateTransitionCounter::record("drafted", "active");
        TokenUsageMetrics::record("gpt-4o", 10, 20);
        CostMetrics::record("gpt-4o", 0.0002);
    }
}
