//! Routing oracle
//!
//! The coordinator delegates the "which handler?" question to a
//! [`RoutingOracle`]. [`LlmRoutingOracle`] answers it with a text-generation
//! model constrained by the schema in [`schema`].

pub mod llm_oracle;
pub mod oracle;
pub mod schema;

pub use llm_oracle::{LlmRoutingOracle, DEFAULT_ROUTING_PROMPT};
pub use oracle::{RoutingCandidate, RoutingDecision, RoutingOracle};
pub use schema::RoutingDecisionOutput;
