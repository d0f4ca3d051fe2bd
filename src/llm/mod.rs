//! LLM provider abstraction layer
//!
//! A provider-agnostic completion interface plus an OpenAI-compatible HTTP
//! implementation. The routing oracle and the assistant handler are the only
//! consumers.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
