//! Schedulers decide where and when automaton resumptions run.
//!
//! The engine hands the scheduler a unit of work and a delay. A zero delay
//! means "as soon as possible"; a positive delay means "no earlier than
//! that". Pending asynchronous results are awaited on the scheduler's
//! execution context, if it has one.

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use futures::future::BoxFuture;
use std::time::Duration;

/// A unit of work submitted to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs futures whose completion resumes a suspended automaton.
pub trait ExecutionContext: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Accepts resumptions from any number of automatons.
pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay`. No ordering is promised between tasks.
    fn submit(&self, task: Task, delay: Duration);

    /// Context for completion callbacks; `None` is only acceptable for
    /// automatons that never suspend.
    fn execution_context(&self) -> Option<&dyn ExecutionContext>;
}
