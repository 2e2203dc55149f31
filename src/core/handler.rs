//! Handler registration model

use crate::core::controller::PipelineController;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Future returned by a type-erased handler
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// Type-erased handler body
pub type HandlerFn = Arc<dyn Fn(Value, PipelineController) -> HandlerFuture + Send + Sync>;

/// Predicate over the current payload deciding whether a handler runs
pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Erase a handler closure into a [`HandlerFn`]
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(Value, PipelineController) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |payload, controller| handler(payload, controller).boxed())
}

/// Options accepted by `register`
#[derive(Clone)]
pub struct HandlerConfig {
    /// Explicit id; generated when absent
    pub id: Option<String>,

    /// Higher runs first
    pub priority: i64,

    /// Whether the strategy waits for this handler
    pub blocking: bool,

    pub tags: BTreeSet<String>,

    /// Fire at most once, then unregister
    pub once: bool,

    pub condition: Option<Condition>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            id: None,
            priority: 0,
            blocking: true,
            tags: BTreeSet::new(),
            once: false,
            condition: None,
        }
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("blocking", &self.blocking)
            .field("tags", &self.tags)
            .field("once", &self.once)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Shorthand for `with_blocking(false)`
    pub fn non_blocking(self) -> Self {
        self.with_blocking(false)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Only run when `condition` holds for the payload at invocation time
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

/// A handler as stored in the registry
pub struct HandlerRegistration {
    pub id: String,
    pub action: String,
    pub priority: i64,
    pub blocking: bool,
    pub tags: BTreeSet<String>,
    pub once: bool,
    pub condition: Option<Condition>,
    pub handler: HandlerFn,

    /// Registration order, used to break priority ties
    pub(crate) sequence: u64,

    claimed: AtomicBool,
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("priority", &self.priority)
            .field("blocking", &self.blocking)
            .field("tags", &self.tags)
            .field("once", &self.once)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl HandlerRegistration {
    pub(crate) fn new(
        action: String,
        id: String,
        handler: HandlerFn,
        config: HandlerConfig,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            action,
            priority: config.priority,
            blocking: config.blocking,
            tags: config.tags,
            once: config.once,
            condition: config.condition,
            handler,
            sequence,
            claimed: AtomicBool::new(false),
        }
    }

    /// Evaluate the condition predicate; handlers without one always run
    pub fn should_run(&self, payload: &Value) -> bool {
        self.condition.as_ref().map_or(true, |cond| cond(payload))
    }

    /// Reserve this handler for invocation.
    ///
    /// Always succeeds for regular handlers. A `once` handler succeeds for
    /// exactly one caller across all dispatches.
    pub fn try_claim(&self) -> bool {
        if !self.once {
            return true;
        }
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
