//! Jump table construction errors.

use thiserror::Error;

/// Errors raised while declaring jumps; reported by the table builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("jump from {state}: probability {probability} is outside (0, 1]")]
    InvalidProbability { state: String, probability: f64 },

    #[error("jumps from {state}: probability sum {sum} exceeds 1")]
    ProbabilityOverflow { state: String, sum: f64 },

    #[error("jumps from {state}: cumulative probability {bound} is registered twice")]
    AmbiguousBound { state: String, bound: f64 },

    #[error("jumps from {state}: multiple jumps with no probability share one predicate")]
    MultipleDeterministic { state: String },

    #[error("jump table has no jumps")]
    Empty,
}
