//! Core value types of the engine.
//!
//! This module contains the pieces every other module builds on:
//! - State definitions via the `State` trait
//! - Stop reasons and stop descriptors
//! - Error types for runs and for the control surface
//! - Monotonic tickers for age tracking

mod clock;
mod error;
mod state;
mod stop;

pub use clock::{ManualTicker, SystemTicker, Ticker};
pub use error::{AutomatonError, InvariantViolation, RunError};
pub use state::State;
pub use stop::{StopDescriptor, StopReason};

pub(crate) use state::describe;
