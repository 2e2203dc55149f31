//! actionpipe - in-process action dispatch with prioritized handler pipelines

pub mod cli;
pub mod core;
pub mod execution;
pub mod script;

// Re-export commonly used types
pub use self::core::{
    ConfigError, DispatchError, DispatcherConfig, ExecutionMode, ExecutionResult, HandlerConfig,
    HandlerResult, PipelineController, Unregister,
};
pub use self::execution::{ActionStats, DispatchEvent, DispatchOptions, Dispatcher};
