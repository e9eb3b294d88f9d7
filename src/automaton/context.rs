//! Per-step view of the running automaton.

use super::directive::{Delay, Resumption, StepResult, Suspension, Transition};
use super::machine::Machine;
use crate::core::{InvariantViolation, State};
use crate::random::Randomizer;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Handed to every step, continuation, guard and delay function.
///
/// The transition methods are the only way to obtain a [`Transition`]; each
/// call is counted and a step that issues anything but exactly one
/// transition stops the run with an invariant violation.
pub struct Context<M: Machine> {
    state: M::State,
    name: Arc<str>,
    age: Duration,
    randomizer: Option<Arc<dyn Randomizer>>,
    assoc: Option<Box<dyn Any + Send>>,
    issued: u32,
    _machine: PhantomData<fn() -> M>,
}

impl<M: Machine> Context<M> {
    pub(crate) fn new(
        state: M::State,
        name: Arc<str>,
        age: Duration,
        randomizer: Option<Arc<dyn Randomizer>>,
        assoc: Option<Box<dyn Any + Send>>,
    ) -> Self {
        Self {
            state,
            name,
            age,
            randomizer,
            assoc,
            issued: 0,
            _machine: PhantomData,
        }
    }

    pub(crate) fn issued(&self) -> u32 {
        self.issued
    }

    pub(crate) fn into_assoc(self) -> Option<Box<dyn Any + Send>> {
        self.assoc
    }

    /// State whose step is running.
    pub fn state(&self) -> &M::State {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time since the run started, as measured by the automaton's ticker.
    pub fn age(&self) -> Duration {
        self.age
    }

    pub fn randomizer(&self) -> Option<&dyn Randomizer> {
        self.randomizer.as_deref()
    }

    /// The randomizer, or an invariant violation if none was configured.
    pub fn require_randomizer(&self) -> Result<&dyn Randomizer, InvariantViolation> {
        self.randomizer()
            .ok_or_else(|| self.violation("randomizer required but not configured"))
    }

    /// Per-run associated value, if one was configured and has type `T`.
    pub fn assoc<T: Any>(&self) -> Option<&T> {
        self.assoc.as_deref()?.downcast_ref()
    }

    pub fn assoc_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.assoc.as_deref_mut()?.downcast_mut()
    }

    /// Invariant violation located at the current state.
    pub fn violation(&self, message: impl Into<String>) -> InvariantViolation {
        InvariantViolation::new(&*self.name, self.state.name(), message)
    }

    /// Fail the run with an invariant violation unless `condition` holds.
    pub fn check(&self, condition: bool, message: &str) -> anyhow::Result<()> {
        if condition {
            Ok(())
        } else {
            Err(self.violation(message).into())
        }
    }

    fn issue(&mut self, transition: Transition<M>) -> Transition<M> {
        self.issued += 1;
        transition
    }

    /// Move to `target` (the terminal marker when `None`) after `delay`.
    pub fn goto(&mut self, target: Option<M::State>, delay: Duration) -> Transition<M> {
        self.issue(Transition::moving(target, Delay::After(delay)))
    }

    /// Move to `target` on the next scheduler turn.
    pub fn next(&mut self, target: M::State) -> Transition<M> {
        self.goto(Some(target), Duration::ZERO)
    }

    pub fn next_after(&mut self, target: M::State, delay: Duration) -> Transition<M> {
        self.goto(Some(target), delay)
    }

    /// Run `target`'s step right away, in the same resumption.
    ///
    /// Join chains must terminate; a cycle of joins never yields.
    pub fn join(&mut self, target: M::State) -> Transition<M> {
        self.issue(Transition::moving(Some(target), Delay::Join))
    }

    /// Stop the automaton naturally.
    pub fn end(&mut self) -> Transition<M> {
        self.goto(None, Duration::ZERO)
    }

    /// Run the current state's step again on the next scheduler turn.
    pub fn stay(&mut self) -> Transition<M> {
        let state = self.state.clone();
        self.next(state)
    }

    /// Loop on the current state, sleeping `delay` between iterations.
    pub fn stay_after(&mut self, delay: Duration) -> Transition<M> {
        let state = self.state.clone();
        self.next_after(state, delay)
    }

    /// Run the current state's step again without yielding.
    pub fn rejoin(&mut self) -> Transition<M> {
        let state = self.state.clone();
        self.join(state)
    }

    /// Suspend until `operation` completes, then continue with `handler`.
    ///
    /// A failed operation is reported to [`Machine::on_error`].
    pub fn suspend<F, V, E, H>(&mut self, operation: F, handler: H) -> Transition<M>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        H: FnOnce(&mut M, &mut Context<M>, V) -> StepResult<M> + Send + 'static,
    {
        let outcome = async move {
            match operation.await {
                Ok(value) => Resumption::Continue(Box::new(
                    move |machine: &mut M, cx: &mut Context<M>| handler(machine, cx, value),
                )),
                Err(error) => Resumption::Failed(error.into()),
            }
        }
        .boxed();
        self.issue(Transition::suspending(Suspension { outcome }))
    }

    /// Like [`suspend`](Self::suspend), but a failed operation is handed to
    /// `on_error`, which must produce the next transition itself.
    pub fn suspend_with_error<F, V, E, H, R>(
        &mut self,
        operation: F,
        handler: H,
        on_error: R,
    ) -> Transition<M>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        H: FnOnce(&mut M, &mut Context<M>, V) -> StepResult<M> + Send + 'static,
        R: FnOnce(&mut M, &mut Context<M>, anyhow::Error) -> StepResult<M> + Send + 'static,
    {
        let outcome = async move {
            match operation.await {
                Ok(value) => Resumption::Continue(Box::new(
                    move |machine: &mut M, cx: &mut Context<M>| handler(machine, cx, value),
                )),
                Err(error) => {
                    let error = error.into();
                    Resumption::Continue(Box::new(
                        move |machine: &mut M, cx: &mut Context<M>| on_error(machine, cx, error),
                    ))
                }
            }
        }
        .boxed();
        self.issue(Transition::suspending(Suspension { outcome }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random;

    struct Probe;

    impl Machine for Probe {
        type State = u8;
    }

    fn context(state: u8) -> Context<Probe> {
        Context::new(state, Arc::from("probe"), Duration::from_millis(5), None, None)
    }

    #[test]
    fn every_transition_method_is_counted() {
        let mut cx = context(1);

        let _ = cx.next(2);
        let _ = cx.join(3);
        let _ = cx.end();

        assert_eq!(cx.issued(), 3);
    }

    #[test]
    fn stay_targets_the_current_state() {
        let mut cx = context(4);

        let transition = cx.stay_after(Duration::from_millis(10));

        assert_eq!(transition.target(), Some(&4));
        assert_eq!(transition.delay(), Duration::from_millis(10));
        assert!(!transition.is_join());
    }

    #[test]
    fn rejoin_is_a_join_on_the_current_state() {
        let mut cx = context(2);
        let transition = cx.rejoin();
        assert!(transition.is_join());
        assert_eq!(transition.target(), Some(&2));
    }

    #[test]
    fn end_targets_the_terminal_marker() {
        let mut cx = context(1);
        let transition = cx.end();
        assert_eq!(transition.target(), None);
        assert!(!transition.is_suspension());
    }

    #[test]
    fn suspend_produces_a_suspension() {
        let mut cx = context(1);
        let transition =
            cx.suspend(async { Ok::<_, anyhow::Error>(7) }, |_, cx, _| Ok(cx.end()));
        assert!(transition.is_suspension());
        assert_eq!(cx.issued(), 1);
    }

    #[test]
    fn check_raises_invariant_violations() {
        let cx = context(3);
        let error = cx.check(false, "invariant").unwrap_err();
        let violation = error.downcast_ref::<InvariantViolation>().unwrap();

        assert_eq!(violation.automaton, "probe");
        assert_eq!(violation.state, "3");
        assert!(cx.check(true, "invariant").is_ok());
    }

    #[test]
    fn missing_randomizer_is_a_violation() {
        let cx = context(1);
        assert!(cx.require_randomizer().is_err());

        let cx: Context<Probe> = Context::new(
            1,
            Arc::from("probe"),
            Duration::ZERO,
            Some(Arc::new(random::fixed(0.25))),
            None,
        );
        assert_eq!(cx.require_randomizer().unwrap().uniform(), 0.25);
    }

    #[test]
    fn assoc_is_typed() {
        let mut cx: Context<Probe> = Context::new(
            1,
            Arc::from("probe"),
            Duration::ZERO,
            None,
            Some(Box::new(10_u32)),
        );

        assert_eq!(cx.assoc::<u32>(), Some(&10));
        assert!(cx.assoc::<String>().is_none());
        *cx.assoc_mut::<u32>().unwrap() += 1;
        assert_eq!(cx.assoc::<u32>(), Some(&11));
    }
}
