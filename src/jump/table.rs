//! Immutable jump tables and the selection algorithm.

use super::edge::Jump;
use super::error::TableError;
use super::guard::Guard;
use crate::automaton::{Context, Machine, Step, StepResult, Transition};
use crate::core::State;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Probability sums may overshoot 1 by this much from float rounding.
const EPSILON: f64 = 1e-9;

enum Choice<M: Machine> {
    Single(Jump<M>),
    /// Jumps keyed by strictly increasing cumulative bounds in (0, 1].
    Weighted {
        bounds: Vec<f64>,
        jumps: Vec<Jump<M>>,
    },
}

/// Jumps sharing one guard, or the unguarded default group.
pub(crate) struct PredicateGroup<M: Machine> {
    guard: Option<Guard<M>>,
    choice: Choice<M>,
}

impl<M: Machine> PredicateGroup<M> {
    /// The first jump decides the group kind: deterministic without a
    /// probability, weighted with one.
    fn new(jump: Jump<M>) -> Result<Self, TableError> {
        let guard = jump.guard.clone();
        if jump.probability.is_none() {
            return Ok(Self {
                guard,
                choice: Choice::Single(jump),
            });
        }
        let mut group = Self {
            guard,
            choice: Choice::Weighted {
                bounds: Vec::new(),
                jumps: Vec::new(),
            },
        };
        group.add(jump)?;
        Ok(group)
    }

    fn add(&mut self, jump: Jump<M>) -> Result<(), TableError> {
        let Choice::Weighted { bounds, jumps } = &mut self.choice else {
            return Err(TableError::MultipleDeterministic {
                state: jump.source.name().into_owned(),
            });
        };

        let previous = bounds.last().copied().unwrap_or(0.0);
        let bound = match jump.probability {
            // takes whatever mass is left
            None => 1.0,
            Some(p) if !(p > 0.0 && p <= 1.0) => {
                return Err(TableError::InvalidProbability {
                    state: jump.source.name().into_owned(),
                    probability: p,
                });
            }
            Some(p) => previous + p,
        };

        if bound > 1.0 + EPSILON {
            return Err(TableError::ProbabilityOverflow {
                state: jump.source.name().into_owned(),
                sum: bound,
            });
        }
        let bound = bound.min(1.0);
        if bounds.last().is_some_and(|last| bound <= *last) {
            return Err(TableError::AmbiguousBound {
                state: jump.source.name().into_owned(),
                bound,
            });
        }

        bounds.push(bound);
        jumps.push(jump);
        Ok(())
    }

    fn is_weighted(&self) -> bool {
        matches!(self.choice, Choice::Weighted { .. })
    }

    fn matches(&self, machine: &M, cx: &Context<M>) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard.check(machine, cx))
    }

    /// Fire one jump of the group; `Ok(None)` when a draw lands past the
    /// registered mass.
    fn fire(&self, machine: &mut M, cx: &mut Context<M>) -> anyhow::Result<Option<Transition<M>>> {
        match &self.choice {
            Choice::Single(jump) => Ok(Some(jump.fire(machine, cx))),
            Choice::Weighted { bounds, jumps } => {
                let draw = cx.require_randomizer()?.uniform();
                match select(bounds, draw) {
                    Some(index) => Ok(Some(jumps[index].fire(machine, cx))),
                    None => Ok(None),
                }
            }
        }
    }
}

/// Index of the smallest bound that is `>= draw`.
fn select(bounds: &[f64], draw: f64) -> Option<usize> {
    let index = bounds.partition_point(|bound| *bound < draw);
    (index < bounds.len()).then_some(index)
}

/// Jumps out of one source state.
pub(crate) struct StateJumps<M: Machine> {
    guarded: Vec<PredicateGroup<M>>,
    default: Option<PredicateGroup<M>>,
}

impl<M: Machine> Default for StateJumps<M> {
    fn default() -> Self {
        Self {
            guarded: Vec::new(),
            default: None,
        }
    }
}

impl<M: Machine> StateJumps<M> {
    pub(crate) fn add(&mut self, jump: Jump<M>) -> Result<(), TableError> {
        let guard = jump.guard.clone();
        let group = match &guard {
            None => self.default.as_mut(),
            Some(guard) => self.guarded.iter_mut().find(|group| {
                group
                    .guard
                    .as_ref()
                    .is_some_and(|registered| registered.same_as(guard))
            }),
        };
        if let Some(group) = group {
            return group.add(jump);
        }

        let group = PredicateGroup::new(jump)?;
        match guard {
            None => self.default = Some(group),
            Some(_) => self.guarded.push(group),
        }
        Ok(())
    }

    fn groups(&self) -> impl Iterator<Item = &PredicateGroup<M>> {
        self.guarded.iter().chain(self.default.as_ref())
    }

    fn fire(&self, machine: &mut M, cx: &mut Context<M>) -> anyhow::Result<Option<Transition<M>>> {
        // the first group whose guard holds is the only one tried
        for group in &self.guarded {
            if group.matches(machine, cx) {
                return group.fire(machine, cx);
            }
        }
        match &self.default {
            Some(group) => group.fire(machine, cx),
            None => Ok(None),
        }
    }
}

/// Immutable table of jumps, shared by every run of an automaton.
///
/// For the current state, guarded groups are tried in registration order
/// and the first one whose guard holds fires; when none holds the default
/// group fires. A weighted group draws `r` in `[0, 1)` and picks the jump
/// with the smallest cumulative bound `>= r`.
pub struct JumpTable<M: Machine> {
    states: HashMap<M::State, StateJumps<M>>,
}

impl<M: Machine> JumpTable<M> {
    pub(crate) fn new(states: HashMap<M::State, StateJumps<M>>) -> Result<Self, TableError> {
        if states.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(Self { states })
    }

    /// Whether any jump leaves `state`.
    pub fn contains(&self, state: &M::State) -> bool {
        self.states.contains_key(state)
    }

    pub fn states(&self) -> impl Iterator<Item = &M::State> {
        self.states.keys()
    }

    /// Whether firing can draw random values.
    pub fn needs_randomizer(&self) -> bool {
        self.states
            .values()
            .flat_map(|jumps| jumps.groups())
            .any(PredicateGroup::is_weighted)
    }

    /// Fire exactly one jump out of the current state.
    pub fn fire(&self, machine: &mut M, cx: &mut Context<M>) -> StepResult<M> {
        let Some(jumps) = self.states.get(cx.state()) else {
            return Err(cx.violation("no transitions defined for state").into());
        };
        match jumps.fire(machine, cx)? {
            Some(transition) => {
                trace!(
                    automaton = %cx.name(),
                    state = %cx.state().name(),
                    transition = ?transition,
                    "jump fired"
                );
                Ok(transition)
            }
            None => Err(cx.violation("no jumps found").into()),
        }
    }

    /// Step that only fires the table.
    pub fn step(self: &Arc<Self>) -> Step<M> {
        let table = Arc::clone(self);
        Step::sync(move |machine: &mut M, cx: &mut Context<M>| table.fire(machine, cx))
    }
}
