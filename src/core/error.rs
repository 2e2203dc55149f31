//! Error types for registration and dispatch

use thiserror::Error;

/// Invalid handler registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Action name must not be empty")]
    EmptyActionName,

    #[error("Handler id for action '{action}' must not be empty")]
    EmptyHandlerId { action: String },

    #[error("Handler '{id}' is already registered for action '{action}'")]
    DuplicateHandlerId { action: String, id: String },
}

/// Coarse classification of a [`DispatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    Abort,
    Handler,
    LoopDetected,
    Internal,
}

/// Why a dispatch did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A handler called `abort()` on its controller
    #[error("Pipeline for '{action}' aborted: {reason}")]
    Aborted { action: String, reason: String },

    /// A blocking handler failed or panicked, or every race branch failed
    #[error("Handler '{handler_id}' failed for action '{action}': {message}")]
    Handler {
        action: String,
        handler_id: String,
        message: String,
    },

    /// Priority jumps exceeded the per-dispatch limit
    #[error("Pipeline for '{action}' exceeded {max_jumps} priority jumps")]
    LoopDetected { action: String, max_jumps: usize },

    /// Engine bug, never caused by handler behaviour
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Aborted { .. } => DispatchErrorKind::Abort,
            DispatchError::Handler { .. } => DispatchErrorKind::Handler,
            DispatchError::LoopDetected { .. } => DispatchErrorKind::LoopDetected,
            DispatchError::Internal(_) => DispatchErrorKind::Internal,
        }
    }

    /// The abort reason or failure message
    pub fn reason(&self) -> &str {
        match self {
            DispatchError::Aborted { reason, .. } => reason,
            DispatchError::Handler { message, .. } => message,
            DispatchError::LoopDetected { .. } => "priority jump limit exceeded",
            DispatchError::Internal(message) => message,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, DispatchError::Aborted { .. })
    }
}
