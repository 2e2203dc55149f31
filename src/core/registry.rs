//! Handler registry - per-action handler lists

use crate::core::error::ConfigError;
use crate::core::handler::{HandlerConfig, HandlerFn, HandlerRegistration};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct RegistryInner {
    /// Registration order per action; sorting happens at snapshot time
    actions: HashMap<String, Vec<Arc<HandlerRegistration>>>,
    next_sequence: u64,
}

impl RegistryInner {
    fn remove_where<F>(&mut self, action: &str, predicate: F) -> bool
    where
        F: Fn(&HandlerRegistration) -> bool,
    {
        let Some(handlers) = self.actions.get_mut(action) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|h| !predicate(h));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.actions.remove(action);
        }
        removed
    }
}

/// Shared registry of handlers keyed by action name
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `action`
    ///
    /// Fails with [`ConfigError::DuplicateHandlerId`] when an explicit id is
    /// already in use for the same action.
    pub fn register(
        &self,
        action: &str,
        handler: HandlerFn,
        config: HandlerConfig,
    ) -> Result<Unregister, ConfigError> {
        if action.trim().is_empty() {
            return Err(ConfigError::EmptyActionName);
        }

        let id = match &config.id {
            Some(id) if id.trim().is_empty() => {
                return Err(ConfigError::EmptyHandlerId {
                    action: action.to_string(),
                })
            }
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };

        let mut inner = self.inner.write();
        if let Some(existing) = inner.actions.get(action) {
            if existing.iter().any(|h| h.id == id) {
                return Err(ConfigError::DuplicateHandlerId {
                    action: action.to_string(),
                    id,
                });
            }
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let registration = Arc::new(HandlerRegistration::new(
            action.to_string(),
            id.clone(),
            handler,
            config,
            sequence,
        ));
        debug!(
            "Registered handler {} for {} (priority {})",
            id, action, registration.priority
        );
        inner
            .actions
            .entry(action.to_string())
            .or_default()
            .push(registration);

        Ok(Unregister {
            registry: Arc::downgrade(&self.inner),
            action: action.to_string(),
            id,
            sequence,
            done: AtomicBool::new(false),
        })
    }

    /// Remove a handler by id; returns whether anything was removed
    pub fn unregister(&self, action: &str, id: &str) -> bool {
        self.inner.write().remove_where(action, |h| h.id == id)
    }

    /// Remove exactly this registration, leaving any later one with the same id
    pub(crate) fn remove_registration(&self, registration: &HandlerRegistration) -> bool {
        let sequence = registration.sequence;
        self.inner
            .write()
            .remove_where(&registration.action, |h| h.sequence == sequence)
    }

    /// Remove every handler of `action`, returning how many were removed
    pub fn clear_action(&self, action: &str) -> usize {
        self.inner
            .write()
            .actions
            .remove(action)
            .map_or(0, |handlers| handlers.len())
    }

    pub fn clear_all(&self) {
        self.inner.write().actions.clear();
    }

    /// Handlers of `action` in dispatch order: priority descending, ties by
    /// registration order
    pub fn snapshot(&self, action: &str) -> Vec<Arc<HandlerRegistration>> {
        let mut handlers = self
            .inner
            .read()
            .actions
            .get(action)
            .cloned()
            .unwrap_or_default();
        handlers.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.sequence.cmp(&b.sequence))
        });
        handlers
    }

    pub fn handler_count(&self, action: &str) -> usize {
        self.inner.read().actions.get(action).map_or(0, Vec::len)
    }

    pub fn has_handlers(&self, action: &str) -> bool {
        self.handler_count(action) > 0
    }

    /// Handler ids of `action` in dispatch order
    pub fn handler_ids(&self, action: &str) -> Vec<String> {
        self.snapshot(action).iter().map(|h| h.id.clone()).collect()
    }

    /// Actions with at least one handler, sorted by name
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self.inner.read().actions.keys().cloned().collect();
        actions.sort();
        actions
    }
}

/// Handle returned by `register`; removes that one registration
///
/// Calling [`Unregister::unregister`] more than once is harmless. Dropping the
/// handle leaves the handler registered.
#[derive(Debug)]
pub struct Unregister {
    registry: Weak<RwLock<RegistryInner>>,
    action: String,
    id: String,
    sequence: u64,
    done: AtomicBool,
}

impl Unregister {
    /// Returns true only on the call that actually removed the handler
    pub fn unregister(&self) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let sequence = self.sequence;
        let removed = inner
            .write()
            .remove_where(&self.action, |h| h.sequence == sequence);
        removed
    }

    pub fn handler_id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl std::fmt::Debug for RegistryInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryInner")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}
