//! Execution state models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How the handlers of one dispatch are coordinated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One handler at a time, priority descending
    #[default]
    Sequential,
    /// All handlers at once, aggregate waits for every one
    Parallel,
    /// All handlers at once, first success wins
    Race,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Race => "race",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            "race" => Ok(ExecutionMode::Race),
            other => Err(format!("Unknown execution mode: {}", other)),
        }
    }
}

/// Lifecycle of a single dispatch
///
/// `Init -> Running -> {Completed | Aborted | Errored}`. The three right-hand
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Init,
    Running,
    Completed,
    Aborted,
    Errored,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Completed | DispatchState::Aborted | DispatchState::Errored
        )
    }
}

/// One entry in a dispatch's result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    /// Handler that produced the value
    pub handler_id: String,

    /// Priority of that handler, for deterministic re-sorting
    pub priority: i64,

    pub value: Value,
}

/// Outcome of `dispatch_with_result`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub dispatch_id: Uuid,

    pub action: String,

    pub execution_mode: ExecutionMode,

    /// True when the pipeline completed or terminated early on purpose
    pub success: bool,

    /// True when a handler aborted the pipeline
    pub aborted: bool,

    pub abort_reason: Option<String>,

    /// Failure message for handler errors and loop detection
    pub error: Option<String>,

    /// Results in completion order
    pub results: Vec<HandlerResult>,

    /// True when the pipeline stopped before running every handler
    pub terminated: bool,

    pub termination_result: Option<Value>,

    pub duration_ms: u64,

    /// Number of handlers in the dispatch snapshot
    pub handler_count: usize,
}

impl ExecutionResult {
    /// Result values sorted by originating priority, highest first
    pub fn results_by_priority(&self) -> Vec<&HandlerResult> {
        let mut sorted: Vec<&HandlerResult> = self.results.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }

    /// Bare result values in completion order
    pub fn values(&self) -> Vec<Value> {
        self.results.iter().map(|r| r.value.clone()).collect()
    }
}
