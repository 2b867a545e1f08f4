use serde::Serialize;
use thiserror::Error;

use crate::analytics::Analytics;

pub const ENTITY_HTTP_REQUEST: &str = "http-request";
pub const ENTITY_AUCTION_REQUEST: &str = "auction-request";
pub const ENTITY_AUCTION_RESPONSE: &str = "auction-response";
pub const ENTITY_ALL_PROCESSED_BID_RESPONSES: &str = "all-processed-bid-responses";

/// Identifies a hook implementation within the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct HookId {
    pub module_code: String,
    pub hook_impl_code: String,
}

impl HookId {
    pub fn new(module: impl Into<String>, code: impl Into<String>) -> Self {
        HookId { module_code: module.into(), hook_impl_code: code.into() }
    }
}

/// Terminal status of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Success,
    Timeout,
    /// The hook returned a domain error.
    ExecutionFailure,
    /// The hook faulted unexpectedly (including panics).
    ExecutionError,
}

impl HookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HookStatus::Success => "success",
            HookStatus::Timeout => "timeout",
            HookStatus::ExecutionFailure => "execution_failure",
            HookStatus::ExecutionError => "execution_error",
        }
    }
}

/// What the hook asked the executor to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    #[default]
    #[serde(rename = "")]
    None,
    Update,
    Reject,
}

/// Record of a single hook invocation.
#[derive(Debug, Clone, Serialize)]
pub struct HookOutcome {
    pub hook_id: HookId,
    pub status: HookStatus,
    pub action: HookAction,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug_messages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Analytics::is_empty")]
    pub analytics_tags: Analytics,
    pub execution_time_millis: u64,
}

impl HookOutcome {
    pub fn new(hook_id: HookId, status: HookStatus) -> Self {
        HookOutcome {
            hook_id,
            status,
            action: HookAction::None,
            message: String::new(),
            debug_messages: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            analytics_tags: Analytics::default(),
            execution_time_millis: 0,
        }
    }
}

/// One executed group: its hooks' outcomes plus the group's wall-clock time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupOutcome {
    pub execution_time_millis: u64,
    pub invocation_results: Vec<HookOutcome>,
}

/// One executed stage for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    /// Stage name; carried separately in the trace block.
    #[serde(skip)]
    pub stage: String,
    /// What was processed: the http request, the auction request, a bidder
    /// name, the aggregate response set, or the auction response.
    pub entity: String,
    pub execution_time_millis: u64,
    pub groups: Vec<GroupOutcome>,
}

/// A hook asked to stop the stage. Downstream groups of that stage are
/// skipped; how much of the request survives depends on the stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Module rejected stage, reason: \"{reason}\"")]
pub struct RejectError {
    pub stage: String,
    pub reason: String,
}

impl RejectError {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        RejectError { stage: stage.into(), reason: reason.into() }
    }
}
