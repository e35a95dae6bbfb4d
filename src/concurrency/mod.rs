//! Concurrency primitives for the pull orchestrator
//!
//! - [`WorkerPool`]: a fixed-capacity pool of workers generic over its task type.
//!   Submitting to a saturated pool waits for a free worker instead of spawning
//!   unbounded parallelism.
//! - [`CompletionBarrier`]: counts outstanding tasks and releases its waiter once
//!   every [`CompletionSignal`] has fired. Signals fire on drop, so a task that
//!   bails out early still counts as complete.

pub mod barrier;
pub mod pool;

pub use barrier::{CompletionBarrier, CompletionSignal};
pub use pool::WorkerPool;

/// Worker pool errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("invalid pool capacity {0}, must be greater than 0")]
    InvalidCapacity(usize),

    #[error("pool has been released")]
    Closed,
}
