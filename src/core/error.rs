//! Error types shared across the engine.
//!
//! Two classes of failure end a run with [`StopReason::Error`]:
//! invariant violations, which are defects in the automaton's design and
//! are never retried, and domain errors raised by step logic or pending
//! operations, which go through [`Machine::on_error`] first.
//!
//! [`StopReason::Error`]: crate::core::StopReason::Error
//! [`Machine::on_error`]: crate::automaton::Machine::on_error

use std::sync::Arc;
use thiserror::Error;

/// The automaton was ill-designed; an error of the automaton's author.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[automaton {automaton}] in state {state}: {message}")]
pub struct InvariantViolation {
    pub automaton: String,
    pub state: String,
    pub message: String,
}

impl InvariantViolation {
    pub fn new(
        automaton: impl Into<String>,
        state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            automaton: automaton.into(),
            state: state.into(),
            message: message.into(),
        }
    }
}

/// Error carried by a stop descriptor when a run ends with `Error`.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("invariant violated: {0}")]
    Invariant(InvariantViolation),

    #[error("step failed: {0:#}")]
    Step(Arc<anyhow::Error>),

    #[error("pending operation failed: {0:#}")]
    Operation(Arc<anyhow::Error>),

    #[error("step panicked: {0}")]
    Panicked(String),
}

impl RunError {
    /// Whether this error reports a design defect rather than a runtime fault.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// The invariant violation, if that is what stopped the run.
    pub fn as_invariant(&self) -> Option<&InvariantViolation> {
        match self {
            Self::Invariant(violation) => Some(violation),
            _ => None,
        }
    }

    /// Downcast the underlying domain error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Step(error) | Self::Operation(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Classify an error returned by step logic.
    pub(crate) fn from_step(error: anyhow::Error) -> Self {
        match error.downcast::<InvariantViolation>() {
            Ok(violation) => Self::Invariant(violation),
            Err(error) => Self::Step(Arc::new(error)),
        }
    }
}

/// Errors returned by the automaton control surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AutomatonError {
    #[error("automaton '{0}' is already running")]
    AlreadyRunning(String),

    #[error("automaton '{0}' has not been started")]
    NotStarted(String),

    #[error("manual stop is not enabled for automaton '{0}'")]
    ManualStopDisabled(String),

    #[error("automaton '{0}' cannot be restarted")]
    NotRestartable(String),

    #[error("automaton '{0}' dropped its completion signal without stopping")]
    Abandoned(String),

    #[error("state rejected: {0}")]
    Rejected(InvariantViolation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn invariant_violations_are_recognised_through_anyhow() {
        let violation = InvariantViolation::new("abc", "2", "no jumps found");
        let error = RunError::from_step(anyhow::Error::new(violation.clone()));

        assert!(error.is_invariant());
        assert_eq!(error.as_invariant(), Some(&violation));
    }

    #[test]
    fn domain_errors_keep_their_type() {
        let error = RunError::from_step(anyhow::Error::new(DiskFull));

        assert!(!error.is_invariant());
        assert!(error.downcast_ref::<DiskFull>().is_some());
        assert_eq!(error.to_string(), "step failed: disk full");
    }

    #[test]
    fn violation_message_names_automaton_and_state() {
        let violation = InvariantViolation::new("counter", "3", "current state undefined");
        assert_eq!(
            violation.to_string(),
            "[automaton counter] in state 3: current state undefined"
        );
    }
}
