//! Dispatcher - public entry point composing registry, context and strategies

use crate::core::{
    handler_fn, ConfigError, DispatchError, DispatchState, DispatcherConfig, ExecutionMode,
    ExecutionResult, HandlerConfig, HandlerFn, HandlerRegistration, HandlerRegistry,
    PipelineContext, PipelineController, SharedContext, Unregister,
};
use crate::execution::events::{DispatchEvent, EventListeners};
use crate::execution::invoker::HandlerInvoker;
use crate::execution::stats::{ActionStats, StatsTracker};
use crate::execution::strategy::strategy_for;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-dispatch options
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Overrides the action's configured mode
    pub execution_mode: Option<ExecutionMode>,

    /// Only handlers carrying at least one of these tags
    pub tags: Vec<String>,

    /// Skip handlers carrying any of these tags
    pub exclude_tags: Vec<String>,

    /// Only these handler ids
    pub handler_ids: Vec<String>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn without_tag(mut self, tag: impl Into<String>) -> Self {
        self.exclude_tags.push(tag.into());
        self
    }

    pub fn only_handler(mut self, id: impl Into<String>) -> Self {
        self.handler_ids.push(id.into());
        self
    }

    fn admits(&self, registration: &HandlerRegistration) -> bool {
        let tagged = self.tags.is_empty() || self.tags.iter().any(|t| registration.has_tag(t));
        let excluded = self.exclude_tags.iter().any(|t| registration.has_tag(t));
        let selected =
            self.handler_ids.is_empty() || self.handler_ids.iter().any(|id| *id == registration.id);
        tagged && !excluded && selected
    }
}

/// Action dispatcher
///
/// Cloning is cheap and every clone shares the same registry, mode
/// overrides, statistics and listeners, so handlers can capture a clone to
/// register handlers or dispatch further actions.
#[derive(Clone)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    default_mode: ExecutionMode,
    max_jumps: usize,
    action_modes: Arc<RwLock<HashMap<String, ExecutionMode>>>,
    stats: StatsTracker,
    events: EventListeners,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Build a dispatcher from `config` as given
    ///
    /// The config is not validated here. A `max_jumps_per_dispatch` of zero
    /// forbids jumps, so the first jump fails the dispatch with
    /// [`DispatchError::LoopDetected`].
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            default_mode: config.default_mode,
            max_jumps: config.max_jumps_per_dispatch,
            action_modes: Arc::new(RwLock::new(config.action_modes)),
            stats: StatsTracker::new(),
            events: EventListeners::new(),
        }
    }

    /// Register an async handler for `action`
    pub fn register<F, Fut>(
        &self,
        action: &str,
        handler: F,
        config: HandlerConfig,
    ) -> Result<Unregister, ConfigError>
    where
        F: Fn(Value, PipelineController) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.registry.register(action, handler_fn(handler), config)
    }

    /// Register an already type-erased handler
    pub fn register_fn(
        &self,
        action: &str,
        handler: HandlerFn,
        config: HandlerConfig,
    ) -> Result<Unregister, ConfigError> {
        self.registry.register(action, handler, config)
    }

    pub fn unregister(&self, action: &str, handler_id: &str) -> bool {
        self.registry.unregister(action, handler_id)
    }

    pub fn clear_action(&self, action: &str) -> usize {
        self.registry.clear_action(action)
    }

    pub fn clear_all(&self) {
        self.registry.clear_all();
    }

    /// Override the execution mode of one action
    pub fn set_action_execution_mode(&self, action: &str, mode: ExecutionMode) {
        self.action_modes.write().insert(action.to_string(), mode);
    }

    pub fn clear_action_execution_mode(&self, action: &str) {
        self.action_modes.write().remove(action);
    }

    /// Mode used for `action` when the dispatch does not name one
    pub fn execution_mode_for(&self, action: &str) -> ExecutionMode {
        self.action_modes
            .read()
            .get(action)
            .copied()
            .unwrap_or(self.default_mode)
    }

    /// Add an event listener
    pub fn add_event_listener<F>(&self, listener: F)
    where
        F: Fn(DispatchEvent) + Send + Sync + 'static,
    {
        self.events.add(listener);
    }

    pub fn handler_count(&self, action: &str) -> usize {
        self.registry.handler_count(action)
    }

    pub fn has_handlers(&self, action: &str) -> bool {
        self.registry.has_handlers(action)
    }

    /// Handler ids of `action` in dispatch order
    pub fn handler_ids(&self, action: &str) -> Vec<String> {
        self.registry.handler_ids(action)
    }

    pub fn registered_actions(&self) -> Vec<String> {
        self.registry.actions()
    }

    pub fn action_stats(&self, action: &str) -> Option<ActionStats> {
        self.stats.get(action)
    }

    pub fn reset_stats(&self, action: &str) {
        self.stats.reset(action);
    }

    /// Dispatch `action` with default options
    pub async fn dispatch(&self, action: &str, payload: Value) -> Result<(), DispatchError> {
        self.dispatch_with_options(action, payload, DispatchOptions::default())
            .await
    }

    /// Dispatch `action`; rejects when a handler aborts or a blocking
    /// handler fails
    pub async fn dispatch_with_options(
        &self,
        action: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Result<(), DispatchError> {
        let (_, outcome) = self.run(action, payload, options).await;
        outcome
    }

    /// Dispatch `action` and report the outcome as a value.
    ///
    /// Aborts and handler failures are reported through
    /// [`ExecutionResult`]; only internal engine errors are returned as `Err`.
    pub async fn dispatch_with_result(
        &self,
        action: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Result<ExecutionResult, DispatchError> {
        let (result, outcome) = self.run(action, payload, options).await;
        match outcome {
            Err(err @ DispatchError::Internal(_)) => Err(err),
            _ => Ok(result),
        }
    }

    async fn run(
        &self,
        action: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> (ExecutionResult, Result<(), DispatchError>) {
        let started = Instant::now();
        let mode = options
            .execution_mode
            .unwrap_or_else(|| self.execution_mode_for(action));

        let snapshot: Vec<Arc<HandlerRegistration>> = self
            .registry
            .snapshot(action)
            .into_iter()
            .filter(|h| options.admits(h))
            .collect();
        let handler_count = snapshot.len();

        let mut context = PipelineContext::new(action, payload, snapshot, mode);
        context.start();
        let dispatch_id = context.dispatch_id;
        let context = context.into_shared();

        info!(
            "Dispatching {} ({}) to {} handlers in {} mode",
            action, dispatch_id, handler_count, mode
        );
        self.events.emit(DispatchEvent::DispatchStarted {
            dispatch_id,
            action: action.to_string(),
            mode,
            handler_count,
        });

        let mut settlement = Settlement {
            dispatcher: self,
            action,
            dispatch_id,
            context: Arc::clone(&context),
            started,
            settled: false,
        };

        let outcome = if handler_count == 0 {
            debug!("No handlers registered for {}", action);
            Ok(())
        } else {
            let invoker = HandlerInvoker::new(self.stats.clone(), self.events.clone());
            strategy_for(mode, self.max_jumps)
                .execute(&context, &invoker)
                .await
        };

        let state = match &outcome {
            Ok(()) => DispatchState::Completed,
            Err(DispatchError::Aborted { .. }) => DispatchState::Aborted,
            Err(_) => DispatchState::Errored,
        };
        let duration_ms = settlement.settle(state);

        match &outcome {
            Ok(()) => info!("Dispatch {} of {} completed in {}ms", dispatch_id, action, duration_ms),
            Err(err) => warn!("Dispatch {} of {} did not complete: {}", dispatch_id, action, err),
        }

        let (results, terminated, termination_result) = {
            let ctx = context.lock();
            (
                ctx.results.clone(),
                ctx.terminated,
                ctx.termination_result.clone(),
            )
        };

        let success = outcome.is_ok();
        let (abort_reason, error) = match &outcome {
            Ok(()) => (None, None),
            Err(DispatchError::Aborted { reason, .. }) => (Some(reason.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };

        let result = ExecutionResult {
            dispatch_id,
            action: action.to_string(),
            execution_mode: mode,
            success,
            aborted: abort_reason.is_some(),
            abort_reason,
            error,
            results,
            terminated: terminated || !success,
            termination_result,
            duration_ms,
            handler_count,
        };
        (result, outcome)
    }
}

/// Final bookkeeping of one dispatch
///
/// Runs exactly once: either when the dispatch finishes normally or, when
/// the caller drops the dispatch future early, on drop with an errored state.
struct Settlement<'a> {
    dispatcher: &'a Dispatcher,
    action: &'a str,
    dispatch_id: Uuid,
    context: SharedContext,
    started: Instant,
    settled: bool,
}

impl Settlement<'_> {
    /// Removes claimed once handlers, records stats and emits the completion
    /// event; returns the dispatch duration
    fn settle(&mut self, state: DispatchState) -> u64 {
        self.settled = true;
        let duration_ms = self.started.elapsed().as_millis() as u64;

        let claimed_once = {
            let mut ctx = self.context.lock();
            ctx.finish(state);
            std::mem::take(&mut ctx.claimed_once)
        };

        for registration in &claimed_once {
            if self.dispatcher.registry.remove_registration(registration) {
                debug!("Removed once handler {} from {}", registration.id, self.action);
            }
        }

        self.dispatcher
            .stats
            .record_dispatch(self.action, duration_ms, state);
        self.dispatcher.events.emit(DispatchEvent::DispatchCompleted {
            dispatch_id: self.dispatch_id,
            action: self.action.to_string(),
            state,
            duration_ms,
        });
        duration_ms
    }
}

impl Drop for Settlement<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                "Dispatch {} of {} was cancelled before it finished",
                self.dispatch_id, self.action
            );
            self.settle(DispatchState::Errored);
        }
    }
}
