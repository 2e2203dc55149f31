//! Core data model for action dispatch
//!
//! This module defines handler registrations, the registry that stores
//! them, and the per-dispatch context and controller handlers steer.

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod handler;
pub mod registry;
pub mod state;

pub use config::DispatcherConfig;
pub use context::{PipelineContext, SharedContext};
pub use controller::PipelineController;
pub use error::{ConfigError, DispatchError, DispatchErrorKind};
pub use handler::{handler_fn, Condition, HandlerConfig, HandlerFn, HandlerFuture, HandlerRegistration};
pub use registry::{HandlerRegistry, Unregister};
pub use state::*;
