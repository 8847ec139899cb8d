//! Error handling for Covenant Core.
//!
//! This module provides:
//! - A single error type with context and chaining
//! - Stable error codes for machine-readable audit output
//! - User-facing vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use covenant_core::error::{CovenantError, Result, ErrorContext, ErrorCode};
//!
//! fn load() -> Result<String> {
//!     std::fs::read_to_string("tasks.json")
//!         .context("Failed to read task file")
//!         .with_error_code(ErrorCode::InvalidInput)
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Covenant operations.
pub type Result<T> = std::result::Result<T, CovenantError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and appear in exported audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Lifecycle Errors (1000-1099)
    InvalidStateTransition,
    EnforcementAlreadyActive,
    EnforcementInactive,

    // Contract Errors (1100-1199)
    ContractViolation,
    ContractExpired,
    ContractTerminated,

    // Execution Errors (1200-1299)
    OperationFailed,
    CallbackFailed,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // Validation Errors (4100-4199)
    ValidationError,
    InvalidInput,
    InvalidConstraint,
    MissingRequiredField,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InvalidStateTransition => 1000,
            Self::EnforcementAlreadyActive => 1001,
            Self::EnforcementInactive => 1002,

            Self::ContractViolation => 1100,
            Self::ContractExpired => 1101,
            Self::ContractTerminated => 1102,

            Self::OperationFailed => 1200,
            Self::CallbackFailed => 1201,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::ValidationError => 4100,
            Self::InvalidInput => 4101,
            Self::InvalidConstraint => 4102,
            Self::MissingRequiredField => 4103,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
            Self::UnknownError => 9099,
        }
    }

    /// Whether this code marks a contract ending in a violation state.
    pub const fn is_contract_breach(&self) -> bool {
        matches!(
            self,
            Self::ContractViolation | Self::ContractExpired | Self::ContractTerminated
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "lifecycle",
            1100..=1199 => "contract",
            1200..=1299 => "execution",
            2200..=2299 => "serialization",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, illegal transitions)
    Low,
    /// Governance outcomes (violations, expirations)
    Medium,
    /// Failures of wrapped work or configuration
    High,
    /// Bugs
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::ValidationError
            | ErrorCode::InvalidInput
            | ErrorCode::InvalidConstraint
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidStateTransition
            | ErrorCode::EnforcementAlreadyActive
            | ErrorCode::EnforcementInactive => Self::Low,

            ErrorCode::ContractViolation
            | ErrorCode::ContractExpired
            | ErrorCode::ContractTerminated
            | ErrorCode::CallbackFailed => Self::Medium,

            ErrorCode::OperationFailed
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::InternalError | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Violation Kind
// ═══════════════════════════════════════════════════════════════════════════════

/// What kind of contract boundary was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A resource ceiling was exceeded
    Budget,
    /// The absolute deadline passed
    Deadline,
    /// The maximum duration elapsed
    Duration,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Budget => "budget",
            Self::Deadline => "deadline",
            Self::Duration => "duration",
        };
        f.write_str(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (contract, task, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Covenant Core.
///
/// Contract breaches raised in strict mode carry the contract id (as the
/// details entity) and a [`ViolationKind`] tag next to the same reason string
/// the contract records.
#[derive(Error, Debug)]
pub struct CovenantError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-facing error message
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Violation tag for contract breaches
    violation: Option<ViolationKind>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for CovenantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl CovenantError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            violation: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details, keeping context already attached.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        let mut context = std::mem::take(&mut self.details.context);
        context.extend(details.context.clone());
        self.details = details;
        self.details.context = context;
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-facing message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Violation tag, set only for contract breaches.
    pub fn violation_type(&self) -> Option<ViolationKind> {
        self.violation
    }

    /// Contract this error refers to, if any.
    pub fn contract_id(&self) -> Option<&str> {
        match self.details.entity_type.as_deref() {
            Some("contract") => self.details.entity_id.as_deref(),
            _ => None,
        }
    }

    /// Violation reason recorded for a contract breach.
    pub fn reason(&self) -> Option<&str> {
        self.details.context.get("reason").and_then(|v| v.as_str())
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    contract_id = ?self.contract_id(),
                    violation = ?self.violation,
                    user_message = %self.user_message,
                    "Contract breach"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "covenant_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to results.
pub trait ErrorContext<T> {
    /// Add a context message, wrapping the error as internal.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Set a specific error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let message = message.into();
            CovenantError::with_internal(ErrorCode::InternalError, message, e.to_string())
                .with_source(e)
        })
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| CovenantError::with_internal(code, e.to_string(), e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| CovenantError::new(ErrorCode::MissingRequiredField, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| CovenantError::new(code, "Required value is missing"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<serde_json::Error> for CovenantError {
    fn from(error: serde_json::Error) -> Self {
        let (code, user_msg) = if error.is_data() || error.is_syntax() || error.is_eof() {
            (ErrorCode::DeserializationError, "Failed to parse JSON")
        } else {
            (ErrorCode::SerializationError, "Failed to serialize JSON")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for CovenantError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::MissingConfiguration, "File not found"),
            ErrorKind::InvalidData => (ErrorCode::InvalidInput, "Invalid data"),
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for CovenantError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<CovenantError>() {
            Ok(covenant_error) => covenant_error,
            Err(error) => Self::with_internal(
                ErrorCode::OperationFailed,
                "Wrapped operation failed",
                format!("{:#}", error),
            ),
        }
    }
}

impl From<config::ConfigError> for CovenantError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl CovenantError {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an invalid state transition error.
    pub fn invalid_state_transition(
        contract_id: &str,
        action: &str,
        from: &crate::contracts::ContractState,
    ) -> Self {
        Self::new(
            ErrorCode::InvalidStateTransition,
            format!("Cannot {} contract in {} state", action, from),
        )
        .with_details(ErrorDetails::new().with_entity("contract", contract_id))
        .with_context("from_state", from.to_string())
        .with_context("action", action)
    }

    /// Create an enforcement-already-active error.
    pub fn already_active(contract_id: &str) -> Self {
        Self::new(
            ErrorCode::EnforcementAlreadyActive,
            "Enforcement is already active",
        )
        .with_details(ErrorDetails::new().with_entity("contract", contract_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an invalid constraint error (construction-time failure).
    pub fn invalid_constraint(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConstraint, message.into())
    }

    /// Create a negative-value error for a usage mutator or constraint field.
    pub fn negative_value(field: &str, value: f64) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("{} must be non-negative, got {}", field, value),
        )
        .with_context("field", field)
        .with_context("value", value)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Contract Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a contract breach error raised by strict enforcement.
    pub fn contract_violation(contract_id: &str, kind: ViolationKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let code = match kind {
            ViolationKind::Budget => ErrorCode::ContractViolation,
            ViolationKind::Deadline | ViolationKind::Duration => ErrorCode::ContractExpired,
        };
        let mut error = Self::new(
            code,
            format!("Contract {} violated ({}): {}", contract_id, kind, reason),
        )
        .with_details(ErrorDetails::new().with_entity("contract", contract_id))
        .with_context("violation_type", kind)
        .with_context("reason", &reason);
        error.violation = Some(kind);
        error
    }

    /// Create an error for work attempted against a contract that is no longer active.
    pub fn contract_not_active(contract_id: &str, state: &crate::contracts::ContractState) -> Self {
        let code = match state {
            crate::contracts::ContractState::Violated => ErrorCode::ContractViolation,
            crate::contracts::ContractState::Expired => ErrorCode::ContractExpired,
            crate::contracts::ContractState::Terminated => ErrorCode::ContractTerminated,
            _ => ErrorCode::EnforcementInactive,
        };
        Self::new(code, format!("Contract {} is not active ({})", contract_id, state))
            .with_details(ErrorDetails::new().with_entity("contract", contract_id))
            .with_context("state", state.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractState;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::InvalidStateTransition.category(), "lifecycle");
        assert_eq!(ErrorCode::ContractViolation.category(), "contract");
        assert_eq!(ErrorCode::InvalidConstraint.category(), "validation");
        assert_eq!(ErrorCode::InternalError.category(), "internal");
    }

    #[test]
    fn test_contract_breach_codes() {
        assert!(ErrorCode::ContractViolation.is_contract_breach());
        assert!(ErrorCode::ContractExpired.is_contract_breach());
        assert!(!ErrorCode::InvalidInput.is_contract_breach());
    }

    #[test]
    fn test_contract_violation_carries_tag_and_reason() {
        let error = CovenantError::contract_violation(
            "c-1",
            ViolationKind::Budget,
            "Resource constraints violated: tokens (1500/1000)",
        );

        assert_eq!(error.code(), ErrorCode::ContractViolation);
        assert_eq!(error.violation_type(), Some(ViolationKind::Budget));
        assert_eq!(error.contract_id(), Some("c-1"));
        assert_eq!(
            error.reason(),
            Some("Resource constraints violated: tokens (1500/1000)")
        );
        assert!(error.to_string().contains("violated (budget)"));
    }

    #[test]
    fn test_temporal_violation_maps_to_expired() {
        let error = CovenantError::contract_violation("c-2", ViolationKind::Duration, "too slow");
        assert_eq!(error.code(), ErrorCode::ContractExpired);
        assert_eq!(error.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_invalid_transition_context() {
        let error = CovenantError::invalid_state_transition("c-3", "fulfill", &ContractState::Drafted);

        assert_eq!(error.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(error.contract_id(), Some("c-3"));
        assert!(error.details().context.contains_key("from_state"));
        assert!(error.user_message().contains("drafted"));
    }

    #[test]
    fn test_error_details_builder() {
        let details = ErrorDetails::new()
            .with_entity("contract", "abc-123")
            .with_suggestion("Raise the token ceiling")
            .with_context("extra", "info");

        assert_eq!(details.entity_type, Some("contract".to_string()));
        assert_eq!(details.entity_id, Some("abc-123".to_string()));
        assert!(details.suggested_action.is_some());
        assert!(details.context.contains_key("extra"));
    }

    #[test]
    fn test_with_details_keeps_context() {
        let error = CovenantError::validation("bad")
            .with_context("field", "tokens")
            .with_details(ErrorDetails::new().with_entity("contract", "x"));

        assert!(error.details().context.contains_key("field"));
        assert_eq!(error.contract_id(), Some("x"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InvalidInput),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::ContractExpired),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::OperationFailed),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InternalError),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_from_anyhow_preserves_covenant_error() {
        let original = CovenantError::negative_value("tokens", -1.0);
        let wrapped: anyhow::Error = original.into();
        let back: CovenantError = wrapped.into();
        assert_eq!(back.code(), ErrorCode::InvalidInput);

        let other: CovenantError = anyhow::anyhow!("model timed out").into();
        assert_eq!(other.code(), ErrorCode::OperationFailed);
        assert!(other.internal_message().unwrap().contains("model timed out"));
    }

    #[test]
    fn test_error_context_on_results_and_options() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "tasks.json"));
        let err = io.context("Failed to read task file").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.internal_message(), Some("tasks.json"));

        let missing: Option<u64> = None;
        let err = missing.context("token limit").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingRequiredField);

        let err = None::<u64>.with_error_code(ErrorCode::InvalidInput).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(Some(5).context("present").unwrap(), 5);
    }

    #[test]
    fn test_error_display() {
        let error = CovenantError::with_internal(
            ErrorCode::ConfigurationError,
            "Configuration error occurred",
            "missing field `level`",
        );

        let display = format!("{}", error);
        assert!(display.contains("ConfigurationError"));
        assert!(display.contains("Configuration error occurred"));
        assert!(display.contains("missing field"));
    }
}
