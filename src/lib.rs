//! Automatons: resumable, scheduler-driven state machines
//!
//! An automaton is a state machine that runs in steps. Every step executes
//! the logic of the current state and returns exactly one transition: move
//! to another state after a delay, chain into the next state right away,
//! suspend on an asynchronous operation, or end. Between steps the automaton
//! gives its thread back to a scheduler, so thousands of automatons can share
//! a handful of threads.
//!
//! # Core Concepts
//!
//! - **Machine**: the automaton's data plus lifecycle hooks, see [`automaton::Machine`]
//! - **Step**: logic run for a state, synchronous or asynchronous
//! - **Transition**: the single token a step returns, issued by its [`automaton::Context`]
//! - **Scheduler**: decides where and when resumptions run, see [`sched`]
//! - **Jump table**: transitions declared as guarded, weighted edges, see [`jump`]
//!
//! Every run ends exactly once with a [`core::StopDescriptor`] carrying one of
//! four reasons: `Natural`, `Age`, `Error` or `Manual`.
//!
//! # Example
//!
//! ```rust
//! use automatons::automaton::{Machine, Step};
//! use automatons::builder::AutomatonBuilder;
//! use automatons::core::StopReason;
//! use automatons::sched::ManualScheduler;
//! use futures::executor::block_on;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Blinker {
//!     blinks: u32,
//! }
//!
//! impl Machine for Blinker {
//!     type State = &'static str;
//! }
//!
//! let automaton = AutomatonBuilder::new(Blinker::default())
//!     .initial("on")
//!     .on("on", Step::sync(|b: &mut Blinker, cx| {
//!         b.blinks += 1;
//!         Ok(cx.next_after("off", Duration::from_millis(500)))
//!     }))
//!     .on("off", Step::sync(|b: &mut Blinker, cx| {
//!         Ok(if b.blinks == 3 { cx.end() } else { cx.next_after("on", Duration::from_millis(500)) })
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let stopped = automaton.start(scheduler.clone()).unwrap();
//! scheduler.run_until_idle();
//!
//! let descriptor = block_on(stopped).unwrap();
//! assert_eq!(descriptor.reason, StopReason::Natural);
//! assert_eq!(automaton.inspect(|b| b.blinks), 3);
//! ```

pub mod automaton;
pub mod builder;
pub mod core;
pub mod jump;
pub mod random;
pub mod sched;

pub use automaton::{Automaton, Context, Machine, Step, StepResult, StopFuture, Transition};
pub use builder::{AutomatonBuilder, AutomatonSettings, BuildError};
pub use core::{AutomatonError, InvariantViolation, RunError, State, StopDescriptor, StopReason};
pub use jump::{Guard, JumpAutomatonBuilder, JumpTable, JumpTableBuilder};
pub use sched::{ManualScheduler, Scheduler, TokioScheduler};
