//! Configuration management.
//!
//! Sources, later ones overriding earlier: an optional file, then
//! `COVENANT__`-prefixed environment variables (`__` separates sections, e.g.
//! `COVENANT__ENFORCEMENT__STRICT_MODE=false`).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::contracts::{
    Contract, ContractMode, EnforcementConfig, ResourceConstraints, TemporalConstraints,
};
use crate::error::Result;
use crate::telemetry::LoggingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enforcement policy
    #[serde(default)]
    pub enforcement: EnforcementConfig,

    /// Planner configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Limits used when no template is given
    #[serde(default)]
    pub defaults: DefaultLimits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlannerConfig {
    /// Mode assumed when none is requested
    #[serde(default)]
    pub default_mode: ContractMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultLimits {
    #[serde(default = "default_token_limit")]
    pub tokens: Option<u64>,

    #[serde(default = "default_cost_limit")]
    pub cost_usd: Option<f64>,

    #[serde(default)]
    pub api_calls: Option<u64>,

    /// Humantime string, e.g. "5m"
    #[serde(default = "default_max_duration", with = "humantime_serde")]
    pub max_duration: Option<Duration>,
}

impl Default for DefaultLimits {
    fn default() -> Self {
        Self {
            tokens: default_token_limit(),
            cost_usd: default_cost_limit(),
            api_calls: None,
            max_duration: default_max_duration(),
        }
    }
}

impl DefaultLimits {
    /// Build a Drafted contract carrying these limits.
    pub fn to_contract(&self, name: &str, mode: ContractMode) -> Result<Contract> {
        let mut resources = ResourceConstraints::builder();
        if let Some(tokens) = self.tokens {
            resources = resources.tokens(tokens);
        }
        if let Some(cost) = self.cost_usd {
            resources = resources.cost_usd(cost);
        }
        if let Some(calls) = self.api_calls {
            resources = resources.api_calls(calls);
        }

        let temporal = match self.max_duration {
            Some(duration) => TemporalConstraints::with_max_duration(duration),
            None => TemporalConstraints::default(),
        };

        Ok(Contract::with_generated_id(name)
            .with_mode(mode)
            .with_resources(resources.build()?)
            .with_temporal(temporal))
    }
}

// Default value functions
fn default_token_limit() -> Option<u64> { Some(20_000) }
fn default_cost_limit() -> Option<f64> { Some(0.25) }
fn default_max_duration() -> Option<Duration> { Some(Duration::from_secs(300)) }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;

        Self::finish(config.try_deserialize()?)
    }

    /// Load from a specific file path, with the environment on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        Self::finish(config.try_deserialize()?)
    }

    fn finish(config: Config) -> Result<Self> {
        config.enforcement.reasoning_thresholds.validate()?;
        Ok(config)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("COVENANT")
        .separator("__")
        .try_parsing(true)
}
