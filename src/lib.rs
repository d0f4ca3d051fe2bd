//! HR Dispatch
//!
//! Task dispatch framework for HR administration.
//!
//! # Overview
//!
//! - A closed set of HR task kinds and the [`Task`] / [`HandlerResponse`] data model
//! - The [`TaskHandler`] contract, wrapped by [`ManagedHandler`] for metrics,
//!   health and activity logging
//! - A [`HandlerRegistry`] owning every handler plus a coordinator that asks a
//!   [`RoutingOracle`] (normally an LLM) which handler should take a task
//! - A Malaysian statutory payroll engine (EPF, SOCSO, EIS, Tabung Haji,
//!   progressive income tax, zakat) with compliance validation
//! - A small warp HTTP surface and the `hr-dispatch` CLI
//!
//! # Quick Start
//!
//! ```rust
//! use hr_dispatch::payroll::compute_payroll;
//! use rust_decimal_macros::dec;
//!
//! let result = compute_payroll(dec!(3000), dec!(500), dec!(100), false, None);
//!
//! assert_eq!(result.gross_salary, dec!(3500.00));
//! assert_eq!(result.epf_employee, dec!(385.00));
//! assert_eq!(result.net_salary, dec!(2848.57));
//! ```
//!
//! Dispatching through the registry:
//!
//! ```rust
//! use hr_dispatch::handler::ActivityLogger;
//! use hr_dispatch::handlers::PayrollHandler;
//! use hr_dispatch::task::{create_task, TaskKind, TaskOptions};
//! use hr_dispatch::testing::StaticRoutingOracle;
//! use hr_dispatch::HandlerRegistry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let registry = HandlerRegistry::new(
//!     Arc::new(StaticRoutingOracle::new("payroll")),
//!     ActivityLogger::disabled(),
//! );
//! registry.register_handler(Arc::new(PayrollHandler::default()));
//!
//! let input = json!({"basic_salary": 3000, "allowances": 500, "deductions": 100});
//! let task = create_task(
//!     TaskKind::PayrollCalculation,
//!     input.as_object().cloned().unwrap_or_default(),
//!     TaskOptions::default(),
//! );
//!
//! let response = registry.execute_task(&task, None).await;
//! assert!(response.succeeded);
//! # });
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod llm;
pub mod observability;
pub mod payroll;
pub mod registry;
pub mod routing;
pub mod server;
pub mod task;
pub mod testing;

// Re-export commonly used types
pub use config::{ConfigError, DispatchConfig};
pub use coordinator::{Coordinator, COORDINATOR_ID};
pub use error::{DispatchError, DispatchResult};
pub use handler::{ActivityLogger, Capability, ManagedHandler, TaskHandler};
pub use registry::{HandlerRegistry, HandlerTable, SystemHealth};
pub use routing::{RoutingCandidate, RoutingDecision, RoutingOracle};
pub use task::{
    create_context, create_task, ExecutionContext, HandlerResponse, Priority, Task, TaskKind,
    TaskOptions,
};
