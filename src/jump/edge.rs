//! Single jumps and their delay functions.

use super::guard::Guard;
use crate::automaton::{Context, Machine, Transition};
use std::sync::Arc;
use std::time::Duration;

type Source<M> = <M as Machine>::State;

/// Side effect run with `(source, target)` right before a jump moves.
pub type JumpAction<M> = Arc<dyn Fn(&mut M, &Source<M>, Option<&Source<M>>) + Send + Sync>;

/// Computes the delay of a jump from the automaton's current values.
pub type DelayFn<M> = Arc<dyn Fn(&M, &Context<M>) -> Duration + Send + Sync>;

/// One declared edge of a jump table.
pub struct Jump<M: Machine> {
    pub(crate) source: M::State,
    pub(crate) target: Option<M::State>,
    pub(crate) guard: Option<Guard<M>>,
    pub(crate) probability: Option<f64>,
    pub(crate) delay: Option<DelayFn<M>>,
    pub(crate) action: Option<JumpAction<M>>,
}

impl<M: Machine> Jump<M> {
    pub fn source(&self) -> &M::State {
        &self.source
    }

    /// `None` for jumps to the terminal marker.
    pub fn target(&self) -> Option<&M::State> {
        self.target.as_ref()
    }

    pub fn probability(&self) -> Option<f64> {
        self.probability
    }

    /// Run the action, then issue the transition.
    pub(crate) fn fire(&self, machine: &mut M, cx: &mut Context<M>) -> Transition<M> {
        if let Some(action) = &self.action {
            action(machine, &self.source, self.target.as_ref());
        }
        let delay = self
            .delay
            .as_ref()
            .map_or(Duration::ZERO, |delay| delay(machine, cx));
        cx.goto(self.target.clone(), delay)
    }
}

impl<M: Machine> std::fmt::Debug for Jump<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jump")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("guarded", &self.guard.is_some())
            .field("probability", &self.probability)
            .finish()
    }
}

/// Ready-made delay functions.
pub mod delay {
    use super::DelayFn;
    use crate::automaton::{Context, Machine};
    use crate::random::Interval;
    use std::sync::Arc;
    use std::time::Duration;

    pub fn fixed<M: Machine>(delay: Duration) -> DelayFn<M> {
        Arc::new(move |_: &M, _: &Context<M>| delay)
    }

    /// Random delay in `[lower, upper]`, drawn from the automaton's
    /// randomizer. Without a randomizer the lower bound is used.
    pub fn between<M: Machine>(lower: Duration, upper: Duration) -> DelayFn<M> {
        interval(Interval::new(lower, upper))
    }

    pub fn interval<M: Machine>(interval: Interval<Duration>) -> DelayFn<M> {
        Arc::new(move |_: &M, cx: &Context<M>| match cx.randomizer() {
            Some(randomizer) => randomizer.duration_between(interval),
            None => interval.lower(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random;

    #[derive(Default)]
    struct Trail {
        moves: Vec<(u8, Option<u8>)>,
    }

    impl Machine for Trail {
        type State = u8;
    }

    fn context(randomizer: Option<Arc<dyn crate::random::Randomizer>>) -> Context<Trail> {
        Context::new(1, Arc::from("trail"), Duration::ZERO, randomizer, None)
    }

    fn jump(target: Option<u8>) -> Jump<Trail> {
        Jump {
            source: 1,
            target,
            guard: None,
            probability: None,
            delay: None,
            action: None,
        }
    }

    #[test]
    fn action_sees_source_and_target_before_the_move() {
        let mut jump = jump(Some(2));
        jump.action = Some(Arc::new(|trail: &mut Trail, from: &u8, to: Option<&u8>| {
            trail.moves.push((*from, to.copied()))
        }));
        let mut trail = Trail::default();
        let mut cx = context(None);

        let transition = jump.fire(&mut trail, &mut cx);

        assert_eq!(trail.moves, vec![(1, Some(2))]);
        assert_eq!(transition.target(), Some(&2));
        assert_eq!(transition.delay(), Duration::ZERO);
        assert_eq!(cx.issued(), 1);
    }

    #[test]
    fn jump_without_target_ends_the_run() {
        let mut cx = context(None);
        let transition = jump(None).fire(&mut Trail::default(), &mut cx);
        assert_eq!(transition.target(), None);
    }

    #[test]
    fn delay_function_sets_the_transition_delay() {
        let mut jump = jump(Some(3));
        jump.delay = Some(delay::fixed(Duration::from_millis(40)));
        let mut cx = context(None);

        let transition = jump.fire(&mut Trail::default(), &mut cx);

        assert_eq!(transition.delay(), Duration::from_millis(40));
    }

    #[test]
    fn random_delay_uses_the_randomizer() {
        let between = delay::between::<Trail>(Duration::from_secs(3), Duration::from_secs(1));
        let trail = Trail::default();

        let cx = context(Some(Arc::new(random::fixed(0.5))));
        assert_eq!(between(&trail, &cx), Duration::from_secs(2));

        let cx = context(None);
        assert_eq!(between(&trail, &cx), Duration::from_secs(1));
    }
}
