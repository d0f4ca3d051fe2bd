//! Testing utilities and mock implementations
//!
//! Used by unit tests, the integration tests under `tests/`, and downstream
//! crates that want to exercise a registry without an LLM endpoint.

pub mod mocks;

pub use mocks::*;
