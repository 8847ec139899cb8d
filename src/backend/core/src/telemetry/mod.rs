//! Telemetry: structured logging and governance metrics.
//!
//! - **Logging**: `tracing-subscriber` with JSON/pretty/compact output
//! - **Metrics**: counters and histograms on the `metrics` facade
//!
//! # Example
//!
//! ```rust,no_run
//! use covenant_core::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    register_metrics, CostMetrics, EventCounter, ExecutionTimer, StateTransitionCounter,
    TokenUsageMetrics, ViolationCounter,
};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_environment() -> String {
    std::env::var("COVENANT_ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

/// Install the log subscriber and describe metrics.
///
/// Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    register_metrics();
    init_logging(&config.logging, &config.environment)?;
    ::tracing::debug!(environment = %config.environment, "Telemetry initialized");
    Ok(())
}
