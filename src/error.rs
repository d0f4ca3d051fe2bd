//! Error types for the dispatch framework
//!
//! Every failure inside the dispatch path (capability mismatch, routing failure,
//! handler execution failure, empty registry) is expressed as a [`DispatchError`].
//! The handler base converts these into `succeeded: false` responses, so callers
//! of the registry never see them as `Err` values.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::task::TaskKind;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

/// Maximum length of an error message handed back to callers
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Main error type for dispatch operations
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler cannot process task kind {kind}")]
    CapabilityMismatch { handler_id: String, kind: TaskKind },

    #[error("Routing failed: {message}")]
    RoutingFailed { message: String },

    #[error("Routing failed: selected handler '{name}' not found")]
    HandlerNotFound { name: String },

    #[error("Routing failed: no handlers registered")]
    EmptyRegistry,

    #[error("Handler execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Create capability mismatch error
    pub fn capability_mismatch<S: Into<String>>(handler_id: S, kind: TaskKind) -> Self {
        Self::CapabilityMismatch {
            handler_id: handler_id.into(),
            kind,
        }
    }

    /// Create routing failure
    pub fn routing_failed<S: Into<String>>(message: S) -> Self {
        Self::RoutingFailed {
            message: message.into(),
        }
    }

    /// Create handler-not-found error
    pub fn handler_not_found<S: Into<String>>(name: S) -> Self {
        Self::HandlerNotFound { name: name.into() }
    }

    /// Create execution failure
    pub fn execution_failed<S: Into<String>>(message: S) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error category, used as a structured logging field
    pub fn category(&self) -> &'static str {
        match self {
            DispatchError::CapabilityMismatch { .. } => "capability_mismatch",
            DispatchError::RoutingFailed { .. } | DispatchError::HandlerNotFound { .. } => {
                "routing_failure"
            }
            DispatchError::EmptyRegistry => "empty_registry",
            DispatchError::ExecutionFailed { .. }
            | DispatchError::InvalidInput { .. }
            | DispatchError::Llm(_) => "execution_failure",
            DispatchError::Config(_) => "configuration",
            DispatchError::Internal { .. } => "internal",
        }
    }

    /// Message safe to hand back to callers
    pub fn public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Redact secrets and sensitive paths, then truncate to 500 characters
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], suffix);
    }

    sanitized
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
