//! Build errors for automaton and jump builders.

use crate::jump::TableError;
use thiserror::Error;

/// Errors that can occur when building automatons.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("No steps defined. Register steps with .on(state, step), .resolver(f) or .dispatch(step)")]
    NoSteps,

    #[error("Steps registered with .on() cannot be combined with .resolver() or .dispatch()")]
    ConflictingSteps,

    #[error("Step for state {0} registered twice")]
    DuplicateStep(String),

    #[error("Initial state {0} doesn't belong to this automaton")]
    RejectedInitialState(String),

    #[error("No jump table. Call .jumps(table) or .declare(builder) before .build()")]
    MissingJumps,

    #[error("Jump table draws random values but no randomizer is configured")]
    MissingRandomizer,

    #[error("Invalid jump table: {0}")]
    Table(#[from] TableError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}
