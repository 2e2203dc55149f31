//! Pipeline controller - the API a handler uses to steer its dispatch

use crate::core::context::SharedContext;
use crate::core::state::{ExecutionMode, HandlerResult};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// View of one dispatch's context, bound to a single handler invocation
///
/// Cheap to clone. All state lives in the context; the controller only
/// remembers which handler it was handed to.
#[derive(Clone)]
pub struct PipelineController {
    context: SharedContext,
    handler_id: Arc<str>,
    priority: i64,
    /// Jumps are only honoured for blocking invocations
    blocking: bool,
    /// Set when this invocation called `abort`
    aborted_here: Arc<AtomicBool>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("handler_id", &self.handler_id)
            .field("priority", &self.priority)
            .field("blocking", &self.blocking)
            .finish()
    }
}

impl PipelineController {
    pub fn new(context: SharedContext, handler_id: &str, priority: i64) -> Self {
        Self {
            context,
            handler_id: Arc::from(handler_id),
            priority,
            blocking: true,
            aborted_here: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the controller to a non-blocking invocation, whose jump requests
    /// are dropped
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// Stop the pipeline; no further handlers are started
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("Handler {} aborted pipeline: {}", self.handler_id, reason);
        self.aborted_here.store(true, Ordering::SeqCst);
        self.context.lock().abort(reason);
    }

    /// Whether this particular invocation called `abort`
    pub(crate) fn called_abort(&self) -> bool {
        self.aborted_here.load(Ordering::SeqCst)
    }

    /// Replace the payload seen by handlers invoked after this one
    ///
    /// `modifier` works on a copy; the payload is only replaced once it
    /// returns, so a panicking modifier leaves it untouched.
    pub fn modify_payload<F>(&self, modifier: F)
    where
        F: FnOnce(Value) -> Value,
    {
        let current = self.context.lock().payload.clone();
        let modified = modifier(current);
        self.context.lock().payload = modified;
    }

    /// Current payload, including modifications by earlier handlers
    pub fn payload(&self) -> Value {
        self.context.lock().payload.clone()
    }

    /// Append a result tagged with this handler's id and priority
    pub fn set_result(&self, value: Value) {
        self.context
            .lock()
            .push_result(&self.handler_id, self.priority, value);
    }

    /// Results collected so far, in completion order
    pub fn results(&self) -> Vec<HandlerResult> {
        self.context.lock().results.clone()
    }

    /// After this handler returns, continue at the first handler whose
    /// priority is at or below `priority`
    ///
    /// Only sequential mode jumps. Requests from non-blocking handlers are
    /// ignored.
    pub fn jump_to_priority(&self, priority: i64) {
        if !self.blocking {
            debug!(
                "Ignoring jump to {} from non-blocking handler {}",
                priority, self.handler_id
            );
            return;
        }
        self.context.lock().jump_to_priority = Some(priority);
    }

    /// End the pipeline successfully with `value` as its final result
    pub fn terminate(&self, value: Value) {
        debug!("Handler {} terminated pipeline", self.handler_id);
        self.context.lock().terminate(&self.handler_id, value);
    }

    pub fn is_aborted(&self) -> bool {
        self.context.lock().aborted
    }

    pub fn is_terminated(&self) -> bool {
        self.context.lock().terminated
    }

    pub fn action(&self) -> String {
        self.context.lock().action.clone()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.context.lock().execution_mode
    }

    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }
}
