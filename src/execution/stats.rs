//! Per-action dispatch statistics

use crate::core::DispatchState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Counters for one action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStats {
    pub dispatch_count: u64,
    pub success_count: u64,
    pub abort_count: u64,
    pub error_count: u64,

    /// Failures of non-blocking handlers, which never fail a dispatch
    pub non_blocking_failures: u64,

    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub last_duration_ms: u64,
    pub last_dispatched_at: Option<DateTime<Utc>>,
}

impl ActionStats {
    fn record(&mut self, duration_ms: u64, state: DispatchState) {
        self.dispatch_count += 1;
        match state {
            DispatchState::Aborted => self.abort_count += 1,
            DispatchState::Errored => self.error_count += 1,
            _ => self.success_count += 1,
        }
        self.total_duration_ms = self.total_duration_ms.saturating_add(duration_ms);
        self.avg_duration_ms = self.total_duration_ms as f64 / self.dispatch_count as f64;
        self.last_duration_ms = duration_ms;
        self.last_dispatched_at = Some(Utc::now());
    }
}

/// Shared statistics store, updated after every dispatch settles
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    inner: Arc<Mutex<HashMap<String, ActionStats>>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self, action: &str, duration_ms: u64, state: DispatchState) {
        self.inner
            .lock()
            .entry(action.to_string())
            .or_default()
            .record(duration_ms, state);
    }

    pub fn record_non_blocking_failure(&self, action: &str) {
        self.inner
            .lock()
            .entry(action.to_string())
            .or_default()
            .non_blocking_failures += 1;
    }

    pub fn get(&self, action: &str) -> Option<ActionStats> {
        self.inner.lock().get(action).cloned()
    }

    pub fn reset(&self, action: &str) {
        self.inner.lock().remove(action);
    }

    pub fn reset_all(&self) {
        self.inner.lock().clear();
    }
}
