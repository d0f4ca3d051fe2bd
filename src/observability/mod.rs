//! Observability: structured logging setup and span macros
//!
//! Runtime health and per-handler metrics live with the handlers themselves
//! (`handler::base`) and are aggregated by the registry.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

pub use logging::{handler_span, routing_span, task_span};
