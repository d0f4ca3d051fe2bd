//! Task and execution context model
//!
//! A [`Task`] is an immutable description of one unit of work. An
//! [`ExecutionContext`] describes the environment of the inbound request that
//! produced it. Neither type validates `input`; that is each handler's job.

pub mod response;

pub use response::HandlerResponse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of work categories known to the dispatch framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PayrollCalculation,
    PayrollCompliance,
    LeaveManagement,
    Recruitment,
    EmployeeOnboarding,
    PerformanceReview,
    AttendanceTracking,
    BenefitsInquiry,
    PolicyInquiry,
    DocumentGeneration,
    WorkforceAnalytics,
    GeneralInquiry,
}

impl TaskKind {
    /// Every task kind, in declaration order
    pub const ALL: [TaskKind; 12] = [
        TaskKind::PayrollCalculation,
        TaskKind::PayrollCompliance,
        TaskKind::LeaveManagement,
        TaskKind::Recruitment,
        TaskKind::EmployeeOnboarding,
        TaskKind::PerformanceReview,
        TaskKind::AttendanceTracking,
        TaskKind::BenefitsInquiry,
        TaskKind::PolicyInquiry,
        TaskKind::DocumentGeneration,
        TaskKind::WorkforceAnalytics,
        TaskKind::GeneralInquiry,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::PayrollCalculation => "payroll_calculation",
            TaskKind::PayrollCompliance => "payroll_compliance",
            TaskKind::LeaveManagement => "leave_management",
            TaskKind::Recruitment => "recruitment",
            TaskKind::EmployeeOnboarding => "employee_onboarding",
            TaskKind::PerformanceReview => "performance_review",
            TaskKind::AttendanceTracking => "attendance_tracking",
            TaskKind::BenefitsInquiry => "benefits_inquiry",
            TaskKind::PolicyInquiry => "policy_inquiry",
            TaskKind::DocumentGeneration => "document_generation",
            TaskKind::WorkforceAnalytics => "workforce_analytics",
            TaskKind::GeneralInquiry => "general_inquiry",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown task kind '{s}'"))
    }
}

/// Task priority
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Wire name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requesting_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Look up an input field
    pub fn input_field(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }
}

/// Optional fields accepted by [`create_task`]
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub priority: Option<Priority>,
    pub user_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl TaskOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Create a task with a freshly generated id and creation timestamp
pub fn create_task(kind: TaskKind, input: Map<String, Value>, options: TaskOptions) -> Task {
    Task {
        id: generate_id("task"),
        kind,
        priority: options.priority.unwrap_or_default(),
        input,
        requesting_user: options.user_id,
        metadata: options.metadata,
        created_at: Utc::now(),
    }
}

/// A prior conversation turn carried in the execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Environment of the inbound request a task belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub prior_messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub prior_task_ids: Vec<String>,
}

/// Overrides accepted by [`create_context`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextOverrides {
    pub role: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub prior_messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub prior_task_ids: Vec<String>,
}

/// Create a fresh execution context with a generated session id
pub fn create_context(
    user_id: Option<String>,
    tenant_id: Option<String>,
    overrides: Option<ContextOverrides>,
) -> ExecutionContext {
    let overrides = overrides.unwrap_or_default();
    ExecutionContext {
        user_id,
        tenant_id,
        role: overrides.role,
        session_id: overrides
            .session_id
            .unwrap_or_else(|| generate_id("session")),
        prior_messages: overrides.prior_messages,
        prior_task_ids: overrides.prior_task_ids,
    }
}

/// `<prefix>_<unix millis>_<random suffix>`
fn generate_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}",
        Utc::now().timestamp_millis(),
        &suffix[..9]
    )
}
