//! Core State trait for automaton states.
//!
//! A state is a label for a step: the automaton looks up the step logic for
//! its current state, runs it, and moves to whatever state the step names.
//! The terminal marker is not a state value; it is `None` wherever an
//! `Option<S>` appears.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for automaton states.
///
/// # Required Traits
///
/// - `Clone`: states are copied into stop descriptors and contexts
/// - `Eq` + `Hash`: states key the step registry and the jump table
/// - `Debug`: states are rendered in diagnostics
/// - `Serialize`: stop descriptors can be reported as JSON
///
/// # Example
///
/// ```rust
/// use automatons::core::State;
/// use serde::Serialize;
/// use std::borrow::Cow;
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
/// enum TaskState {
///     Pending,
///     Running,
/// }
///
/// impl State for TaskState {
///     fn name(&self) -> Cow<'_, str> {
///         match self {
///             Self::Pending => "Pending".into(),
///             Self::Running => "Running".into(),
///         }
///     }
/// }
///
/// assert_eq!(TaskState::Running.name(), "Running");
/// ```
pub trait State: Clone + Eq + Hash + Debug + Serialize + Send + Sync + 'static {
    /// Get the state's name for display/logging.
    ///
    /// Default implementation returns the `Debug` rendering.
    fn name(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{:?}", self))
    }
}

macro_rules! primitive_states {
    ($($ty:ty),* $(,)?) => {
        $(impl State for $ty {})*
    };
}

primitive_states!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, char, bool);

impl State for &'static str {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl State for String {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

/// Render an optional state, using `END` for the terminal marker.
pub(crate) fn describe<S: State>(state: Option<&S>) -> String {
    state.map_or_else(|| "END".to_string(), |s| s.name().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
    enum TestState {
        Initial,
        Processing,
    }

    impl State for TestState {}

    #[test]
    fn default_name_uses_debug_rendering() {
        assert_eq!(TestState::Initial.name(), "Initial");
        assert_eq!(TestState::Processing.name(), "Processing");
    }

    #[test]
    fn integer_states_are_named_by_value() {
        assert_eq!(3_i32.name(), "3");
        assert_eq!(42_u64.name(), "42");
    }

    #[test]
    fn string_states_borrow_their_name() {
        let state = String::from("waiting");
        assert!(matches!(state.name(), Cow::Borrowed("waiting")));
        assert_eq!("idle".name(), "idle");
    }

    #[test]
    fn describe_renders_terminal_marker() {
        assert_eq!(describe::<i32>(None), "END");
        assert_eq!(describe(Some(&7_i32)), "7");
    }

    #[test]
    fn state_serializes_correctly() {
        let json = serde_json::to_string(&TestState::Processing).unwrap();
        assert_eq!(json, "\"Processing\"");
    }
}
