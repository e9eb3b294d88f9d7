//! The user side of an automaton: its data and its lifecycle hooks.

use crate::core::{RunError, State, StopReason};

/// Data owned by an automaton, plus hooks the engine calls around a run.
///
/// Step logic receives `&mut Self` on every step. The engine guarantees that
/// at most one step or hook touches the value at a time.
///
/// # Example
///
/// ```rust
/// use automatons::automaton::Machine;
///
/// #[derive(Default)]
/// struct Counter {
///     visits: usize,
/// }
///
/// impl Machine for Counter {
///     type State = u8;
///
///     fn check_state(&self, state: &u8) -> bool {
///         (1..=3).contains(state)
///     }
/// }
/// ```
pub trait Machine: Send + 'static {
    type State: State;

    /// Whether `state` belongs to this automaton. Override for open state
    /// domains (integers, strings); the default accepts everything.
    fn check_state(&self, state: &Self::State) -> bool {
        let _ = state;
        true
    }

    /// Called by `start` before the first step of a run.
    fn on_started(&mut self) {}

    /// Called for domain errors raised by step logic or by pending
    /// operations without an error branch. Returning a state resumes the run
    /// from it; returning `None` stops the run with `Error`.
    ///
    /// Think twice before recovering: the failed step's effects are not
    /// rolled back, and a recovery state that fails again loops forever.
    fn on_error(&mut self, state: Option<&Self::State>, error: &RunError) -> Option<Self::State> {
        let _ = (state, error);
        None
    }

    /// Called once when a run ends, before the stop descriptor is delivered.
    fn on_stopped(&mut self, reason: StopReason, error: Option<&RunError>) {
        let _ = (reason, error);
    }
}
