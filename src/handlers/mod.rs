//! Domain handlers registered at startup

pub mod assistant;
pub mod payroll;

pub use assistant::{
    default_assistant_kinds, AssistantHandler, ASSISTANT_HANDLER_ID, DEFAULT_ASSISTANT_PROMPT,
};
pub use payroll::{PayrollHandler, PAYROLL_HANDLER_ID};
