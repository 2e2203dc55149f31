//! Handler invoker - runs a single handler as its own task

use crate::core::{HandlerRegistration, PipelineController, SharedContext};
use crate::execution::events::{DispatchEvent, EventListeners};
use crate::execution::stats::StatsTracker;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// What happened when one handler ran
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub handler_id: String,
    pub priority: i64,
    pub blocking: bool,

    /// Return value, or the failure message for errors and panics
    pub result: Result<Value, String>,

    /// The handler called `abort` on its controller
    pub called_abort: bool,
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Spawns handlers and records their outcome
#[derive(Clone)]
pub struct HandlerInvoker {
    stats: StatsTracker,
    events: EventListeners,
}

impl HandlerInvoker {
    pub fn new(stats: StatsTracker, events: EventListeners) -> Self {
        Self { stats, events }
    }

    pub fn emit(&self, event: DispatchEvent) {
        self.events.emit(event);
    }

    /// Start `registration` on its own task with the context's current payload.
    ///
    /// Errors and panics are captured into the outcome. Failures of
    /// non-blocking handlers are logged and counted here, since nobody
    /// awaits them.
    pub fn spawn(
        &self,
        context: &SharedContext,
        registration: &Arc<HandlerRegistration>,
    ) -> JoinHandle<InvocationOutcome> {
        let (payload, action, dispatch_id) = {
            let ctx = context.lock();
            (ctx.payload.clone(), ctx.action.clone(), ctx.dispatch_id)
        };
        let mut controller =
            PipelineController::new(Arc::clone(context), &registration.id, registration.priority);
        if !registration.blocking {
            controller = controller.non_blocking();
        }
        let registration = Arc::clone(registration);
        let context = Arc::clone(context);
        let invoker = self.clone();

        debug!(
            "Invoking handler {} for {} (priority {})",
            registration.id, action, registration.priority
        );
        self.events.emit(DispatchEvent::HandlerStarted {
            dispatch_id,
            handler_id: registration.id.clone(),
            priority: registration.priority,
        });

        tokio::spawn(async move {
            let handler = Arc::clone(&registration.handler);
            let call_controller = controller.clone();
            let result = match AssertUnwindSafe(async move { handler(payload, call_controller).await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(format!("{:#}", err)),
                Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
            };

            match &result {
                Ok(value) => {
                    if !value.is_null() {
                        context
                            .lock()
                            .push_result(&registration.id, registration.priority, value.clone());
                    }
                    invoker.events.emit(DispatchEvent::HandlerCompleted {
                        dispatch_id,
                        handler_id: registration.id.clone(),
                    });
                }
                Err(message) => {
                    if registration.blocking {
                        error!("Handler {} failed for {}: {}", registration.id, action, message);
                    } else {
                        warn!(
                            "Non-blocking handler {} failed for {}: {}",
                            registration.id, action, message
                        );
                        invoker.stats.record_non_blocking_failure(&action);
                    }
                    invoker.events.emit(DispatchEvent::HandlerFailed {
                        dispatch_id,
                        handler_id: registration.id.clone(),
                        blocking: registration.blocking,
                        error: message.clone(),
                    });
                }
            }

            InvocationOutcome {
                handler_id: registration.id.clone(),
                priority: registration.priority,
                blocking: registration.blocking,
                result,
                called_abort: controller.called_abort(),
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
