//! Guard predicates for controlling jumps.
//!
//! Guards are boolean functions over the automaton that decide whether a
//! predicate group can fire. Clones of one guard are the same guard: jumps
//! registered with them end up in one group.

use crate::automaton::{Context, Machine};
use std::sync::Arc;

type Predicate<M> = dyn Fn(&M, &Context<M>) -> bool + Send + Sync;

/// Predicate that determines if a group of jumps can fire.
///
/// Guards are evaluated in registration order; the first one that holds
/// selects its group.
///
/// # Example
///
/// ```rust
/// use automatons::automaton::Machine;
/// use automatons::jump::Guard;
///
/// struct Tank {
///     level: u32,
/// }
///
/// impl Machine for Tank {
///     type State = u8;
/// }
///
/// let full = Guard::from_machine(|tank: &Tank| tank.level >= 100);
/// let same = full.clone();
///
/// assert!(full.same_as(&same));
/// ```
pub struct Guard<M: Machine> {
    predicate: Arc<Predicate<M>>,
}

impl<M: Machine> Guard<M> {
    /// Create a guard from a predicate over the automaton and the current
    /// step context.
    ///
    /// The predicate should be deterministic for a given automaton value and
    /// free of side effects.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&M, &Context<M>) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Create a guard that only looks at the automaton's data.
    pub fn from_machine<F>(predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self::new(move |machine, _| predicate(machine))
    }

    /// Check if the guard allows its group to fire.
    pub fn check(&self, machine: &M, cx: &Context<M>) -> bool {
        (self.predicate)(machine, cx)
    }

    /// Whether both guards are clones of one another.
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.predicate), Arc::as_ptr(&other.predicate))
    }
}

impl<M: Machine> Clone for Guard<M> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<M: Machine> std::fmt::Debug for Guard<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guard({:p})", Arc::as_ptr(&self.predicate) as *const ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Meter {
        reading: i32,
    }

    impl Machine for Meter {
        type State = u8;
    }

    fn context() -> Context<Meter> {
        Context::new(0, Arc::from("meter"), Duration::ZERO, None, None)
    }

    #[test]
    fn guard_allows_matching_values() {
        let guard = Guard::from_machine(|m: &Meter| m.reading > 10);
        let cx = context();

        assert!(guard.check(&Meter { reading: 11 }, &cx));
        assert!(!guard.check(&Meter { reading: 10 }, &cx));
    }

    #[test]
    fn guard_sees_the_step_context() {
        let guard = Guard::new(|_: &Meter, cx: &Context<Meter>| *cx.state() == 0);
        assert!(guard.check(&Meter { reading: 0 }, &context()));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::from_machine(|m: &Meter| m.reading % 2 == 0);
        let meter = Meter { reading: 4 };
        let cx = context();

        assert_eq!(guard.check(&meter, &cx), guard.check(&meter, &cx));
    }

    #[test]
    fn clones_share_identity() {
        let guard = Guard::from_machine(|m: &Meter| m.reading > 0);
        let clone = guard.clone();
        let lookalike = Guard::from_machine(|m: &Meter| m.reading > 0);

        assert!(guard.same_as(&clone));
        assert!(!guard.same_as(&lookalike));
    }
}
