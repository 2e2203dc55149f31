//! Execution strategies - how the handlers of one dispatch are driven

use crate::core::{DispatchError, ExecutionMode, HandlerRegistration, SharedContext};
use crate::execution::events::DispatchEvent;
use crate::execution::invoker::{HandlerInvoker, InvocationOutcome};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Drives a dispatch's handler snapshot to completion
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    async fn execute(
        &self,
        context: &SharedContext,
        invoker: &HandlerInvoker,
    ) -> Result<(), DispatchError>;
}

/// Strategy implementing `mode`
pub fn strategy_for(mode: ExecutionMode, max_jumps: usize) -> Box<dyn ExecutionStrategy> {
    match mode {
        ExecutionMode::Sequential => Box::new(SequentialStrategy::new(max_jumps)),
        ExecutionMode::Parallel => Box::new(ParallelStrategy),
        ExecutionMode::Race => Box::new(RaceStrategy),
    }
}

fn aborted_error(context: &SharedContext) -> DispatchError {
    let ctx = context.lock();
    DispatchError::Aborted {
        action: ctx.action.clone(),
        reason: ctx.abort_reason.clone().unwrap_or_default(),
    }
}

fn handler_error(context: &SharedContext, handler_id: &str, message: &str) -> DispatchError {
    DispatchError::Handler {
        action: context.lock().action.clone(),
        handler_id: handler_id.to_string(),
        message: message.to_string(),
    }
}

fn join_error(err: tokio::task::JoinError) -> DispatchError {
    DispatchError::Internal(format!("handler task did not finish: {}", err))
}

/// Check the condition and the once-claim for `registration`.
///
/// Returns false (after emitting a skip event) when the handler must not run.
fn admit(
    context: &SharedContext,
    invoker: &HandlerInvoker,
    registration: &Arc<HandlerRegistration>,
) -> bool {
    let (payload, dispatch_id) = {
        let ctx = context.lock();
        (ctx.payload.clone(), ctx.dispatch_id)
    };

    let skip_reason = if !registration.should_run(&payload) {
        Some("condition not met")
    } else if !registration.try_claim() {
        Some("once handler already fired")
    } else {
        None
    };

    if let Some(reason) = skip_reason {
        debug!("Skipping handler {}: {}", registration.id, reason);
        invoker.emit(DispatchEvent::HandlerSkipped {
            dispatch_id,
            handler_id: registration.id.clone(),
            reason: reason.to_string(),
        });
        return false;
    }

    if registration.once {
        context.lock().claim_once(registration);
    }
    true
}

/// Start every admitted handler of the snapshot at once
fn spawn_all(
    context: &SharedContext,
    invoker: &HandlerInvoker,
) -> FuturesUnordered<JoinHandle<InvocationOutcome>> {
    let handlers = context.lock().handlers.clone();
    let in_flight = FuturesUnordered::new();
    for registration in &handlers {
        if admit(context, invoker, registration) {
            in_flight.push(invoker.spawn(context, registration));
        }
    }
    in_flight
}

fn discard_jump(context: &SharedContext) {
    let mut ctx = context.lock();
    if let Some(priority) = ctx.take_jump() {
        debug!(
            "Ignoring jump to priority {} in {} mode",
            priority, ctx.execution_mode
        );
    }
}

/// One handler at a time, priority descending, honouring aborts, jumps and
/// early termination between handlers
pub struct SequentialStrategy {
    max_jumps: usize,
}

impl SequentialStrategy {
    pub fn new(max_jumps: usize) -> Self {
        Self { max_jumps }
    }

    /// Relocate `current_index` after the handler at `index` returned
    fn advance(
        &self,
        context: &SharedContext,
        invoker: &HandlerInvoker,
        index: usize,
    ) -> Result<(), DispatchError> {
        let mut ctx = context.lock();
        let Some(priority) = ctx.take_jump() else {
            ctx.current_index = index + 1;
            return Ok(());
        };

        ctx.jump_count += 1;
        if ctx.jump_count > self.max_jumps {
            return Err(DispatchError::LoopDetected {
                action: ctx.action.clone(),
                max_jumps: self.max_jumps,
            });
        }

        let target = ctx.jump_target(priority);
        let from_handler = ctx.handlers[index].id.clone();
        debug!(
            "Handler {} jumped to priority {} (index {} -> {})",
            from_handler, priority, index, target
        );
        ctx.current_index = target;
        let dispatch_id = ctx.dispatch_id;
        drop(ctx);

        invoker.emit(DispatchEvent::PipelineJumped {
            dispatch_id,
            from_handler,
            to_priority: priority,
        });
        Ok(())
    }
}

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    async fn execute(
        &self,
        context: &SharedContext,
        invoker: &HandlerInvoker,
    ) -> Result<(), DispatchError> {
        loop {
            let next = {
                let ctx = context.lock();
                if ctx.should_stop() || ctx.current_index >= ctx.handlers.len() {
                    None
                } else {
                    Some((ctx.current_index, Arc::clone(&ctx.handlers[ctx.current_index])))
                }
            };
            let Some((index, registration)) = next else {
                break;
            };

            if !admit(context, invoker, &registration) {
                context.lock().current_index = index + 1;
                continue;
            }

            let handle = invoker.spawn(context, &registration);
            if registration.blocking {
                let outcome = handle.await.map_err(join_error)?;

                // An error raised because the handler aborted is still an abort
                let aborted = context.lock().aborted;
                if aborted {
                    return Err(aborted_error(context));
                }
                if let Err(message) = &outcome.result {
                    return Err(handler_error(context, &outcome.handler_id, message));
                }
            }

            self.advance(context, invoker, index)?;
        }

        let aborted = context.lock().aborted;
        if aborted {
            return Err(aborted_error(context));
        }
        Ok(())
    }
}

/// Every handler at once; waits for all of them, fails fast on the first
/// blocking failure
pub struct ParallelStrategy;

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    async fn execute(
        &self,
        context: &SharedContext,
        invoker: &HandlerInvoker,
    ) -> Result<(), DispatchError> {
        let mut in_flight = spawn_all(context, invoker);

        // Returning early drops the join handles, which detaches the
        // remaining tasks rather than cancelling them.
        while let Some(joined) = in_flight.next().await {
            let outcome = joined.map_err(join_error)?;

            let aborted = context.lock().aborted;
            if aborted {
                return Err(aborted_error(context));
            }
            if outcome.blocking {
                if let Err(message) = &outcome.result {
                    return Err(handler_error(context, &outcome.handler_id, message));
                }
            }
        }

        discard_jump(context);
        Ok(())
    }
}

/// Every handler at once; the first successful one settles the dispatch
pub struct RaceStrategy;

#[async_trait]
impl ExecutionStrategy for RaceStrategy {
    async fn execute(
        &self,
        context: &SharedContext,
        invoker: &HandlerInvoker,
    ) -> Result<(), DispatchError> {
        let mut in_flight = spawn_all(context, invoker);
        let abort_handles: Vec<_> = in_flight.iter().map(|h| h.abort_handle()).collect();

        let mut first_failure: Option<DispatchError> = None;
        let mut first_non_blocking_failure: Option<DispatchError> = None;
        let mut first_abort: Option<String> = None;

        while let Some(joined) = in_flight.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => continue,
                Err(err) => return Err(join_error(err)),
            };

            if outcome.called_abort {
                debug!("Dropping aborted race branch {}", outcome.handler_id);
                if first_abort.is_none() {
                    first_abort = context.lock().abort_reason.clone();
                }
                continue;
            }

            match outcome.result {
                Ok(value) => {
                    {
                        let mut ctx = context.lock();
                        let own_termination = ctx.terminated_by.as_deref()
                            == Some(outcome.handler_id.as_str());
                        if !own_termination {
                            ctx.termination_result = Some(value);
                        }
                        ctx.terminated = true;
                        ctx.terminated_by = Some(outcome.handler_id.clone());
                        // A losing branch's abort does not fail the race
                        ctx.aborted = false;
                        ctx.abort_reason = None;
                    }
                    info!("Race won by handler {}", outcome.handler_id);
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    discard_jump(context);
                    return Ok(());
                }
                Err(message) => {
                    let slot = if outcome.blocking {
                        &mut first_failure
                    } else {
                        &mut first_non_blocking_failure
                    };
                    if slot.is_none() {
                        *slot = Some(handler_error(context, &outcome.handler_id, &message));
                    }
                }
            }
        }

        // Nothing won: a failure of any kind rejects the race
        discard_jump(context);
        if let Some(err) = first_failure.or(first_non_blocking_failure) {
            return Err(err);
        }
        if let Some(reason) = first_abort {
            let action = context.lock().action.clone();
            return Err(DispatchError::Aborted { action, reason });
        }
        Ok(())
    }
}
