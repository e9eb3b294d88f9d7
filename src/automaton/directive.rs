//! Transition directives: the only legal result of step logic.

use super::context::Context;
use super::machine::Machine;
use crate::core::describe;
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;

/// Result returned by step logic.
pub type StepResult<M> = anyhow::Result<Transition<M>>;

/// Opaque directive telling the engine what to do after a step.
///
/// Tokens are only produced by [`Context`]'s transition methods; they cannot
/// be built, cloned or altered elsewhere. Every step must return exactly one
/// of the tokens it issued.
#[must_use = "a step must return the transition it issued"]
pub struct Transition<M: Machine> {
    pub(crate) directive: Directive<M>,
}

pub(crate) enum Directive<M: Machine> {
    Move {
        target: Option<M::State>,
        delay: Delay,
    },
    Suspend(Suspension<M>),
}

/// Delay before the next resumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delay {
    /// Run the next step in the same resumption, without a scheduler hop.
    Join,
    After(Duration),
}

impl Delay {
    pub(crate) fn duration(self) -> Duration {
        match self {
            Self::Join => Duration::ZERO,
            Self::After(delay) => delay,
        }
    }
}

pub(crate) type Continuation<M> =
    Box<dyn FnOnce(&mut M, &mut Context<M>) -> StepResult<M> + Send + 'static>;

/// What a completed pending operation asks the engine to do.
pub(crate) enum Resumption<M: Machine> {
    Continue(Continuation<M>),
    /// The operation failed and the step has no error branch.
    Failed(anyhow::Error),
    /// The operation panicked while being polled.
    Panicked(String),
}

/// A pending operation with its continuation folded in.
pub(crate) struct Suspension<M: Machine> {
    pub(crate) outcome: BoxFuture<'static, Resumption<M>>,
}

impl<M: Machine> Transition<M> {
    pub(crate) fn moving(target: Option<M::State>, delay: Delay) -> Self {
        Self {
            directive: Directive::Move { target, delay },
        }
    }

    pub(crate) fn suspending(suspension: Suspension<M>) -> Self {
        Self {
            directive: Directive::Suspend(suspension),
        }
    }

    pub fn is_suspension(&self) -> bool {
        matches!(self.directive, Directive::Suspend(_))
    }

    /// Target of a move; `None` for suspensions and for the terminal marker.
    pub fn target(&self) -> Option<&M::State> {
        match &self.directive {
            Directive::Move { target, .. } => target.as_ref(),
            Directive::Suspend(_) => None,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(
            self.directive,
            Directive::Move {
                delay: Delay::Join,
                ..
            }
        )
    }

    /// Scheduler delay of a move; zero for joins and suspensions.
    pub fn delay(&self) -> Duration {
        match &self.directive {
            Directive::Move { delay, .. } => delay.duration(),
            Directive::Suspend(_) => Duration::ZERO,
        }
    }
}

impl<M: Machine> fmt::Debug for Transition<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directive {
            Directive::Move { target, delay } => f
                .debug_struct("Move")
                .field("target", &describe(target.as_ref()))
                .field("delay", delay)
                .finish(),
            Directive::Suspend(_) => f.write_str("Suspend"),
        }
    }
}

