//! Resumable automatons.
//!
//! An [`Automaton`] pairs a [`Machine`] value with a step resolver. Each
//! resumption runs the current state's [`Step`], which returns exactly one
//! [`Transition`] issued through the step's [`Context`]. Between steps the
//! automaton yields to its [`Scheduler`](crate::sched::Scheduler), so many
//! automatons can share a small pool of threads.

mod completion;
mod context;
mod directive;
mod engine;
mod machine;
mod step;

pub use completion::StopFuture;
pub use context::Context;
pub use directive::{StepResult, Transition};
pub use engine::{AssocSupplier, Automaton, Resolver};
pub use machine::Machine;
pub use step::{AsyncStep, Step, StepFn};

pub(crate) use engine::Blueprint;
