//! Fluent declaration of jump tables and jump automatons.

use super::edge::{DelayFn, Jump, JumpAction};
use super::error::TableError;
use super::guard::Guard;
use super::table::{JumpTable, StateJumps};
use crate::automaton::{Automaton, Context, Machine, Step, StepResult};
use crate::builder::{AutomatonBuilder, AutomatonSettings, BuildError};
use crate::core::{State, Ticker};
use crate::random::Randomizer;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`JumpTable`].
///
/// Every declaration starts with [`jump`](Self::jump), [`loop_on`](Self::loop_on)
/// or [`end`](Self::end), optionally narrows it with `when`, `maybe` and
/// `act`, and is committed by `delay`, `delay_with` or `nodelay`. The first
/// invalid declaration is reported by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use automatons::automaton::Machine;
/// use automatons::jump::{delay, Guard, JumpTableBuilder};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Walker {
///     tired: bool,
/// }
///
/// impl Machine for Walker {
///     type State = &'static str;
/// }
///
/// let tired = Guard::from_machine(|w: &Walker| w.tired);
/// let table = JumpTableBuilder::<Walker>::new()
///     .jump("walk", "rest").when(tired).nodelay()
///     .loop_on("walk").maybe(0.9).delay(delay::fixed(Duration::from_millis(5)))
///     .end("walk").nodelay()
///     .jump("rest", "walk").nodelay()
///     .build()
///     .unwrap();
///
/// assert!(table.needs_randomizer());
/// ```
pub struct JumpTableBuilder<M: Machine> {
    states: HashMap<M::State, StateJumps<M>>,
    error: Option<TableError>,
}

impl<M: Machine> JumpTableBuilder<M> {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            error: None,
        }
    }

    /// Declare a jump from `source` to `target`.
    pub fn jump(self, source: M::State, target: M::State) -> JumpBuilder<M> {
        self.jump_to(source, Some(target))
    }

    /// Declare a jump whose target may be the terminal marker.
    pub fn jump_to(self, source: M::State, target: Option<M::State>) -> JumpBuilder<M> {
        JumpBuilder {
            table: self,
            jump: Jump {
                source,
                target,
                guard: None,
                probability: None,
                delay: None,
                action: None,
            },
        }
    }

    /// Declare a jump from `source` to itself.
    pub fn loop_on(self, source: M::State) -> JumpBuilder<M> {
        let target = source.clone();
        self.jump(source, target)
    }

    /// Declare a jump from `source` to the terminal marker.
    pub fn end(self, source: M::State) -> JumpBuilder<M> {
        self.jump_to(source, None)
    }

    fn add(mut self, jump: Jump<M>) -> Self {
        if self.error.is_none() {
            let source = jump.source.clone();
            if let Err(error) = self.states.entry(source).or_default().add(jump) {
                self.error = Some(error);
            }
        }
        self
    }

    /// Finalize the table.
    pub fn build(self) -> Result<JumpTable<M>, TableError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        JumpTable::new(self.states)
    }
}

impl<M: Machine> Default for JumpTableBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A jump being declared; commit it with a delay choice.
pub struct JumpBuilder<M: Machine> {
    table: JumpTableBuilder<M>,
    jump: Jump<M>,
}

impl<M: Machine> JumpBuilder<M> {
    /// Only fire when `guard` holds. Reuse clones of one guard to group
    /// weighted jumps under it.
    pub fn when(mut self, guard: Guard<M>) -> Self {
        self.jump.guard = Some(guard);
        self
    }

    /// Shorthand for `when(Guard::from_machine(predicate))`.
    pub fn when_fn<F>(self, predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.when(Guard::from_machine(predicate))
    }

    /// Fire with probability `probability` among jumps with the same guard.
    pub fn maybe(mut self, probability: f64) -> Self {
        self.jump.probability = Some(probability);
        self
    }

    /// Run `action` with `(source, target)` right before moving.
    pub fn act<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut M, &M::State, Option<&M::State>) + Send + Sync + 'static,
    {
        let action: JumpAction<M> = Arc::new(action);
        self.jump.action = Some(action);
        self
    }

    pub fn delay(mut self, delay: DelayFn<M>) -> JumpTableBuilder<M> {
        self.jump.delay = Some(delay);
        self.table.add(self.jump)
    }

    pub fn delay_with<F>(self, delay: F) -> JumpTableBuilder<M>
    where
        F: Fn(&M, &Context<M>) -> Duration + Send + Sync + 'static,
    {
        self.delay(Arc::new(delay))
    }

    pub fn nodelay(self) -> JumpTableBuilder<M> {
        self.table.add(self.jump)
    }
}

type Body<M> = Box<dyn FnOnce(Arc<JumpTable<M>>) -> Step<M>>;

/// Builds automatons whose transitions come from a [`JumpTable`].
///
/// States without a body simply fire their jumps. A body registered with
/// [`on_state`](Self::on_state) runs first and the table fires right after
/// it; [`on_state_async`](Self::on_state_async) does the same once a pending
/// operation completes.
pub struct JumpAutomatonBuilder<M: Machine> {
    inner: AutomatonBuilder<M>,
    table: Option<Result<JumpTable<M>, TableError>>,
    bodies: HashMap<M::State, Body<M>>,
    duplicate: Option<M::State>,
}

impl<M: Machine> JumpAutomatonBuilder<M> {
    pub fn new(machine: M) -> Self {
        Self {
            inner: AutomatonBuilder::new(machine),
            table: None,
            bodies: HashMap::new(),
            duplicate: None,
        }
    }

    fn map(mut self, f: impl FnOnce(AutomatonBuilder<M>) -> AutomatonBuilder<M>) -> Self {
        self.inner = f(self.inner);
        self
    }

    pub fn initial(self, state: M::State) -> Self {
        self.map(|b| b.initial(state))
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.map(|b| b.name(name))
    }

    pub fn max_age(self, max_age: Duration) -> Self {
        self.map(|b| b.max_age(max_age))
    }

    pub fn ticker(self, ticker: impl Ticker + 'static) -> Self {
        self.map(|b| b.ticker(ticker))
    }

    pub fn randomizer(self, randomizer: impl Randomizer + 'static) -> Self {
        self.map(|b| b.randomizer(randomizer))
    }

    pub fn shared_randomizer(self, randomizer: Arc<dyn Randomizer>) -> Self {
        self.map(|b| b.shared_randomizer(randomizer))
    }

    pub fn manual_stop(self, enabled: bool) -> Self {
        self.map(|b| b.manual_stop(enabled))
    }

    pub fn restartable(self, enabled: bool) -> Self {
        self.map(|b| b.restartable(enabled))
    }

    pub fn assoc<T, F>(self, supplier: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.map(|b| b.assoc(supplier))
    }

    pub fn settings(self, settings: &AutomatonSettings) -> Self {
        self.map(|b| b.settings(settings))
    }

    pub fn jumps(mut self, table: JumpTable<M>) -> Self {
        self.table = Some(Ok(table));
        self
    }

    /// Like [`jumps`](Self::jumps), building the table here; an invalid
    /// declaration surfaces from [`build`](Self::build) as
    /// [`BuildError::Table`].
    pub fn declare(mut self, table: JumpTableBuilder<M>) -> Self {
        self.table = Some(table.build());
        self
    }

    fn body(mut self, state: M::State, body: Body<M>) -> Self {
        if self.bodies.contains_key(&state) {
            self.duplicate.get_or_insert(state);
        } else {
            self.bodies.insert(state, body);
        }
        self
    }

    /// Run `body` before firing the jumps of `state`.
    pub fn on_state<F>(self, state: M::State, body: F) -> Self
    where
        F: Fn(&mut M, &mut Context<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.body(
            state,
            Box::new(move |table: Arc<JumpTable<M>>| {
                Step::sync(move |machine: &mut M, cx: &mut Context<M>| -> StepResult<M> {
                    body(machine, cx)?;
                    table.fire(machine, cx)
                })
            }),
        )
    }

    /// Start `operation`, then run `body` with its value and fire the jumps
    /// of `state`.
    pub fn on_state_async<Op, Fut, V, E, F>(self, state: M::State, operation: Op, body: F) -> Self
    where
        Op: Fn(&mut M, &Context<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        F: Fn(&mut M, &mut Context<M>, V) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.body(
            state,
            Box::new(move |table: Arc<JumpTable<M>>| {
                Step::asynchronous(
                    operation,
                    move |machine: &mut M, cx: &mut Context<M>, value: V| -> StepResult<M> {
                        body(machine, cx, value)?;
                        table.fire(machine, cx)
                    },
                )
            }),
        )
    }

    pub fn build(self) -> Result<Automaton<M>, BuildError> {
        let table = Arc::new(self.table.ok_or(BuildError::MissingJumps)??);
        if let Some(state) = &self.duplicate {
            return Err(BuildError::DuplicateStep(state.name().into_owned()));
        }
        if table.needs_randomizer() && !self.inner.has_randomizer() {
            return Err(BuildError::MissingRandomizer);
        }

        let fire = table.step();
        let steps: HashMap<M::State, Step<M>> = self
            .bodies
            .into_iter()
            .map(|(state, body)| (state, body(Arc::clone(&table))))
            .collect();

        self.inner
            .resolver(move |state| match steps.get(state) {
                Some(step) => Some(step.clone()),
                None => table.contains(state).then(|| fire.clone()),
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random;

    #[derive(Default)]
    struct Ferry {
        crossings: u32,
    }

    impl Machine for Ferry {
        type State = &'static str;
    }

    #[test]
    fn builder_reports_the_first_error() {
        let result = JumpTableBuilder::<Ferry>::new()
            .jump("dock", "sail")
            .nodelay()
            .jump("dock", "wait")
            .nodelay()
            .jump("sail", "dock")
            .maybe(2.0)
            .nodelay()
            .build();

        assert!(matches!(result, Err(TableError::MultipleDeterministic { state }) if state == "dock"));
    }

    #[test]
    fn empty_builder_is_rejected() {
        assert!(matches!(JumpTableBuilder::<Ferry>::new().build(), Err(TableError::Empty)));
    }

    #[test]
    fn same_guard_forms_one_weighted_group() {
        let windy = Guard::from_machine(|ferry: &Ferry| ferry.crossings > 0);
        let table = JumpTableBuilder::<Ferry>::new()
            .jump("dock", "sail")
            .when(windy.clone())
            .maybe(0.5)
            .nodelay()
            .jump("dock", "wait")
            .when(windy)
            .maybe(0.5)
            .nodelay()
            .build();

        assert!(table.is_ok());
    }

    #[test]
    fn distinct_deterministic_guards_are_separate_groups() {
        let table = JumpTableBuilder::<Ferry>::new()
            .jump("dock", "sail")
            .when_fn(|ferry| ferry.crossings > 0)
            .nodelay()
            .jump("dock", "wait")
            .when_fn(|ferry| ferry.crossings == 0)
            .nodelay()
            .build()
            .unwrap();

        assert!(table.contains(&"dock"));
        assert!(!table.contains(&"sail"));
        assert!(!table.needs_randomizer());
    }

    #[test]
    fn jump_automaton_requires_a_table() {
        let result = JumpAutomatonBuilder::new(Ferry::default())
            .initial("dock")
            .build();

        assert!(matches!(result, Err(BuildError::MissingJumps)));
    }

    #[test]
    fn invalid_declared_table_is_a_build_error() {
        let result = JumpAutomatonBuilder::new(Ferry::default())
            .initial("dock")
            .declare(JumpTableBuilder::new().loop_on("dock").maybe(1.5).nodelay())
            .build();

        assert!(matches!(
            result,
            Err(BuildError::Table(TableError::InvalidProbability { ref state, .. })) if state == "dock"
        ));
    }

    #[test]
    fn declared_table_builds_the_automaton() {
        let automaton = JumpAutomatonBuilder::new(Ferry::default())
            .name("declared")
            .initial("dock")
            .declare(JumpTableBuilder::new().end("dock").nodelay())
            .build()
            .unwrap();

        assert_eq!(automaton.name(), "declared");
    }

    #[test]
    fn weighted_table_requires_a_randomizer() {
        let table = JumpTableBuilder::<Ferry>::new()
            .loop_on("dock")
            .maybe(0.5)
            .nodelay()
            .end("dock")
            .nodelay()
            .build()
            .unwrap();

        let missing = JumpAutomatonBuilder::new(Ferry::default())
            .initial("dock")
            .jumps(table)
            .build();
        assert!(matches!(missing, Err(BuildError::MissingRandomizer)));
    }

    #[test]
    fn jump_automaton_builds_with_bodies() {
        let table = JumpTableBuilder::<Ferry>::new()
            .loop_on("dock")
            .maybe(0.5)
            .nodelay()
            .end("dock")
            .nodelay()
            .build()
            .unwrap();

        let automaton = JumpAutomatonBuilder::new(Ferry::default())
            .name("ferry")
            .initial("dock")
            .randomizer(random::seeded(3))
            .jumps(table)
            .on_state("dock", |ferry, _| {
                ferry.crossings += 1;
                Ok(())
            })
            .build()
            .unwrap();

        assert_eq!(automaton.name(), "ferry");
    }

    #[test]
    fn body_registered_twice_is_rejected() {
        let table = JumpTableBuilder::<Ferry>::new().end("dock").nodelay().build().unwrap();

        let result = JumpAutomatonBuilder::new(Ferry::default())
            .initial("dock")
            .jumps(table)
            .on_state("dock", |_, _| Ok(()))
            .on_state("dock", |_, _| Ok(()))
            .build();

        assert!(matches!(result, Err(BuildError::DuplicateStep(state)) if state == "dock"));
    }
}
