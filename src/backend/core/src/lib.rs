#![allow(clippy::result_large_err)]
//! # Covenant Core
//!
//! Budget and deadline contracts for autonomous LLM agents.
//!
//! ## Architecture
//!
//! - **Contracts**: resource and temporal constraints plus a lifecycle state machine
//! - **Enforcement**: strict/lenient policies, violation events and callbacks
//! - **Planning**: mode-aware allocation, prioritization and strategy advice
//! - **Harness**: runs an operation under a contract and keeps an audit log
//! - **Pricing**: token estimation and per-model cost tables
//! - **Telemetry**: structured logging and governance metrics
//!
//! ## Example
//!
//! ```rust
//! use covenant_core::prelude::*;
//!
//! let contract = Contract::new("summarize", "Summarize report")
//!     .with_resources(ResourceConstraints::builder().tokens(1000).build()?);
//!
//! let mut enforcer = ContractEnforcer::new(contract, true);
//! enforcer.start()?;
//! enforcer.usage_mut().add_tokens(1500, 0, 0);
//!
//! assert!(enforcer.enforce().is_err());
//! assert_eq!(enforcer.contract().state(), ContractState::Violated);
//! # Ok::<(), covenant_core::CovenantError>(())
//! ```

pub mod config;
pub mod contracts;
pub mod error;
pub mod harness;
pub mod planning;
pub mod pricing;
pub mod telemetry;

pub use error::{CovenantError, ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::contracts::{
        CompletionReport, Contract, ContractEnforcer, ContractMode, ContractState, Deadline,
        DeadlineType, EnforcementEvent, EventType, ReasoningEffort, ResourceConstraints,
        ResourceUsage, TemporalConstraints, Template, TemplateOverrides,
    };
    pub use crate::error::{CovenantError, ErrorCode, ErrorContext, Result, ViolationKind};
    pub use crate::harness::{ContractAgent, ExecutionContext, ExecutionResult};
    pub use crate::planning::{
        estimate_quality_cost_time, plan_resource_allocation, prioritize_tasks,
        recommend_strategy, Approach, Task, TaskPriority,
    };
}
