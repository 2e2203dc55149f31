//! Pipeline context - mutable state of one dispatch

use crate::core::handler::HandlerRegistration;
use crate::core::state::{DispatchState, ExecutionMode, HandlerResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Context shared between a strategy and the controllers it hands out
pub type SharedContext = Arc<Mutex<PipelineContext>>;

/// Execution state for a single dispatch
///
/// Owned by exactly one in-flight dispatch. The handler list is a snapshot
/// taken when the dispatch starts, so registry changes never reach it.
#[derive(Debug)]
pub struct PipelineContext {
    pub dispatch_id: Uuid,

    pub action: String,

    /// Current payload; replaced by `modify_payload`
    pub payload: Value,

    /// Sorted handler snapshot
    pub handlers: Vec<Arc<HandlerRegistration>>,

    /// Index of the next handler (sequential mode)
    pub current_index: usize,

    pub aborted: bool,

    pub abort_reason: Option<String>,

    /// Pending jump requested by the handler currently running
    pub jump_to_priority: Option<i64>,

    /// Jumps honoured so far in this dispatch
    pub jump_count: usize,

    pub execution_mode: ExecutionMode,

    /// Results in completion order
    pub results: Vec<HandlerResult>,

    pub terminated: bool,

    pub termination_result: Option<Value>,

    /// Handler that called `terminate`
    pub terminated_by: Option<String>,

    pub state: DispatchState,

    /// `once` handlers claimed by this dispatch, unregistered when it settles
    pub claimed_once: Vec<Arc<HandlerRegistration>>,
}

impl PipelineContext {
    pub fn new(
        action: impl Into<String>,
        payload: Value,
        handlers: Vec<Arc<HandlerRegistration>>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            dispatch_id: Uuid::new_v4(),
            action: action.into(),
            payload,
            handlers,
            current_index: 0,
            aborted: false,
            abort_reason: None,
            jump_to_priority: None,
            jump_count: 0,
            execution_mode,
            results: Vec::new(),
            terminated: false,
            termination_result: None,
            terminated_by: None,
            state: DispatchState::Init,
            claimed_once: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Mark the dispatch as running
    pub fn start(&mut self) {
        self.state = DispatchState::Running;
    }

    /// Move to a terminal state; the first terminal state wins
    pub fn finish(&mut self, state: DispatchState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }

    /// Whether the strategy should stop invoking further handlers
    pub fn should_stop(&self) -> bool {
        self.aborted || self.terminated
    }

    pub fn abort(&mut self, reason: String) {
        if !self.aborted {
            self.aborted = true;
            self.abort_reason = Some(reason);
        }
    }

    pub fn terminate(&mut self, handler_id: &str, value: Value) {
        if !self.terminated {
            self.terminated = true;
            self.termination_result = Some(value);
            self.terminated_by = Some(handler_id.to_string());
        }
    }

    pub fn push_result(&mut self, handler_id: &str, priority: i64, value: Value) {
        self.results.push(HandlerResult {
            handler_id: handler_id.to_string(),
            priority,
            value,
        });
    }

    /// Index of the first handler whose priority is at or below `priority`,
    /// or the end of the snapshot when there is none
    pub fn jump_target(&self, priority: i64) -> usize {
        self.handlers
            .iter()
            .position(|h| h.priority <= priority)
            .unwrap_or(self.handlers.len())
    }

    pub fn take_jump(&mut self) -> Option<i64> {
        self.jump_to_priority.take()
    }

    pub fn claim_once(&mut self, registration: &Arc<HandlerRegistration>) {
        self.claimed_once.push(Arc::clone(registration));
    }
}
