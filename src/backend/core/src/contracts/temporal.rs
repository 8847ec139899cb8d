//! Temporal constraints and the monitor that tracks them.
//!
//! A contract may bound time three ways: an absolute wall-clock deadline, a
//! deadline expressed as an offset from start, or a maximum duration. The
//! [`TemporalMonitor`] folds the last two into one effective duration that
//! drives time pressure and violation checks.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CovenantError, Result};

/// Whether missing the deadline fails the contract or only degrades quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    #[default]
    Hard,
    Soft,
}

/// A deadline, either absolute or relative to the start of execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deadline {
    /// Wall-clock instant
    At(DateTime<Utc>),
    /// Offset from the moment monitoring starts
    After(#[serde(with = "humantime_serde")] Duration),
}

fn default_quality_decay() -> f64 {
    0.1
}

/// Time-related boundaries of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TemporalConstraintsBuilder")]
pub struct TemporalConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    deadline: Option<Deadline>,

    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    max_duration: Option<Duration>,

    deadline_type: DeadlineType,

    /// Quality decay rate applied after a soft deadline
    soft_deadline_quality_decay: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    contract_expiration: Option<DateTime<Utc>>,
}

impl Default for TemporalConstraints {
    fn default() -> Self {
        Self {
            deadline: None,
            max_duration: None,
            deadline_type: DeadlineType::Hard,
            soft_deadline_quality_decay: default_quality_decay(),
            contract_expiration: None,
        }
    }
}

impl TemporalConstraints {
    pub fn builder() -> TemporalConstraintsBuilder {
        TemporalConstraintsBuilder::default()
    }

    /// Shorthand for constraints bounded only by a maximum duration.
    pub fn with_max_duration(max_duration: Duration) -> Self {
        Self {
            max_duration: Some(max_duration),
            ..Self::default()
        }
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Absolute deadline, if the deadline is wall-clock based.
    pub fn absolute_deadline(&self) -> Option<DateTime<Utc>> {
        match self.deadline {
            Some(Deadline::At(at)) => Some(at),
            _ => None,
        }
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    pub fn deadline_type(&self) -> DeadlineType {
        self.deadline_type
    }

    pub fn soft_deadline_quality_decay(&self) -> f64 {
        self.soft_deadline_quality_decay
    }

    pub fn contract_expiration(&self) -> Option<DateTime<Utc>> {
        self.contract_expiration
    }

    /// The single duration the monitor measures against.
    ///
    /// `max_duration` wins over a relative deadline.
    pub fn effective_max_duration(&self) -> Option<Duration> {
        self.max_duration.or(match self.deadline {
            Some(Deadline::After(offset)) => Some(offset),
            _ => None,
        })
    }
}

/// Builder for [`TemporalConstraints`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemporalConstraintsBuilder {
    #[serde(default)]
    deadline: Option<Deadline>,
    #[serde(default, with = "humantime_serde")]
    max_duration: Option<Duration>,
    #[serde(default)]
    deadline_type: DeadlineType,
    #[serde(default = "default_quality_decay")]
    soft_deadline_quality_decay: f64,
    #[serde(default)]
    contract_expiration: Option<DateTime<Utc>>,
}

impl Default for TemporalConstraintsBuilder {
    fn default() -> Self {
        Self {
            deadline: None,
            max_duration: None,
            deadline_type: DeadlineType::Hard,
            soft_deadline_quality_decay: default_quality_decay(),
            contract_expiration: None,
        }
    }
}

impl TemporalConstraintsBuilder {
    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn deadline_type(mut self, deadline_type: DeadlineType) -> Self {
        self.deadline_type = deadline_type;
        self
    }

    pub fn soft_deadline_quality_decay(mut self, decay: f64) -> Self {
        self.soft_deadline_quality_decay = decay;
        self
    }

    pub fn contract_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.contract_expiration = Some(at);
        self
    }

    pub fn build(self) -> Result<TemporalConstraints> {
        let decay = self.soft_deadline_quality_decay;
        if !decay.is_finite() || decay < 0.0 {
            return Err(CovenantError::invalid_constraint(format!(
                "soft_deadline_quality_decay must be a finite non-negative number, got {}",
                decay
            )));
        }

        Ok(TemporalConstraints {
            deadline: self.deadline,
            max_duration: self.max_duration,
            deadline_type: self.deadline_type,
            soft_deadline_quality_decay: decay,
            contract_expiration: self.contract_expiration,
        })
    }
}

impl TryFrom<TemporalConstraintsBuilder> for TemporalConstraints {
    type Error = CovenantError;

    fn try_from(builder: TemporalConstraintsBuilder) -> Result<Self> {
        builder.build()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Temporal Monitor
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracks elapsed time against a contract's temporal constraints.
///
/// Expiration is cooperative: nothing fires on its own, callers poll.
#[derive(Debug, Clone)]
pub struct TemporalMonitor {
    max_duration: Option<Duration>,
    absolute_deadline: Option<DateTime<Utc>>,
    started: Option<Started>,
}

#[derive(Debug, Clone, Copy)]
struct Started {
    instant: Instant,
    at: DateTime<Utc>,
    derived_deadline: Option<DateTime<Utc>>,
}

impl TemporalMonitor {
    pub fn new(constraints: &TemporalConstraints) -> Self {
        Self {
            max_duration: constraints.effective_max_duration(),
            absolute_deadline: constraints.absolute_deadline(),
            started: None,
        }
    }

    /// Start (or restart) the clock.
    pub fn start(&mut self) {
        let at = Utc::now();
        let derived_deadline = self
            .max_duration
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| at.checked_add_signed(d));

        self.started = Some(Started {
            instant: Instant::now(),
            at,
            derived_deadline,
        });
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.started.map(|s| s.at)
    }

    /// Effective maximum duration in seconds.
    pub fn max_duration_seconds(&self) -> Option<f64> {
        self.max_duration.map(|d| d.as_secs_f64())
    }

    /// Deadline derived from the start time, else the absolute deadline.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.started
            .and_then(|s| s.derived_deadline)
            .or(self.absolute_deadline)
    }

    pub fn absolute_deadline(&self) -> Option<DateTime<Utc>> {
        self.absolute_deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started
            .map(|s| s.instant.elapsed())
            .unwrap_or_default()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Seconds left before the deadline, clamped at zero.
    pub fn remaining_seconds(&self) -> Option<f64> {
        self.started?;

        if let Some(max) = self.max_duration {
            return Some((max.as_secs_f64() - self.elapsed_seconds()).max(0.0));
        }

        self.absolute_deadline.map(|deadline| {
            let left = deadline - Utc::now();
            (left.num_milliseconds() as f64 / 1000.0).max(0.0)
        })
    }

    /// Fraction of the allotted duration already used, in `[0, 1]`.
    pub fn get_time_pressure(&self) -> f64 {
        match (self.started, self.max_duration) {
            (Some(_), Some(max)) => {
                let max = max.as_secs_f64();
                if max <= 0.0 {
                    return 1.0;
                }
                (self.elapsed_seconds() / max).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn is_past_deadline(&self) -> bool {
        if self.started.is_none() {
            return false;
        }
        if self.max_duration.is_some() {
            return self.is_over_duration();
        }
        self.is_past_absolute_deadline()
    }

    pub fn is_over_duration(&self) -> bool {
        match (self.started, self.max_duration) {
            (Some(_), Some(max)) => self.elapsed() > max,
            _ => false,
        }
    }

    /// Wall-clock check against an absolute deadline; independent of start.
    pub fn is_past_absolute_deadline(&self) -> bool {
        self.absolute_deadline
            .map(|deadline| Utc::now() > deadline)
            .unwrap_or(false)
    }
}
