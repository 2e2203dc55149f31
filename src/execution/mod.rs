//! Dispatch execution: strategies, handler invocation and the dispatcher

pub mod dispatcher;
pub mod events;
pub mod invoker;
pub mod stats;
pub mod strategy;

pub use dispatcher::{DispatchOptions, Dispatcher};
pub use events::{DispatchEvent, EventListener, EventListeners};
pub use invoker::{HandlerInvoker, InvocationOutcome};
pub use stats::{ActionStats, StatsTracker};
pub use strategy::{strategy_for, ExecutionStrategy, ParallelStrategy, RaceStrategy, SequentialStrategy};
