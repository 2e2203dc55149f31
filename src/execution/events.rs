//! Dispatch lifecycle events

use crate::core::{DispatchState, ExecutionMode};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    DispatchStarted {
        dispatch_id: Uuid,
        action: String,
        mode: ExecutionMode,
        handler_count: usize,
    },
    HandlerStarted {
        dispatch_id: Uuid,
        handler_id: String,
        priority: i64,
    },
    HandlerSkipped {
        dispatch_id: Uuid,
        handler_id: String,
        reason: String,
    },
    HandlerCompleted {
        dispatch_id: Uuid,
        handler_id: String,
    },
    HandlerFailed {
        dispatch_id: Uuid,
        handler_id: String,
        blocking: bool,
        error: String,
    },
    PipelineJumped {
        dispatch_id: Uuid,
        from_handler: String,
        to_priority: i64,
    },
    DispatchCompleted {
        dispatch_id: Uuid,
        action: String,
        state: DispatchState,
        duration_ms: u64,
    },
}

/// Type for event listeners
pub type EventListener = Arc<dyn Fn(DispatchEvent) + Send + Sync>;

/// Listener list shared by the dispatcher and in-flight handler tasks
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Arc<RwLock<Vec<EventListener>>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, listener: F)
    where
        F: Fn(DispatchEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Emit an event to all listeners
    pub fn emit(&self, event: DispatchEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners.iter() {
            listener(event.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
