//! Macros for ergonomic automaton construction.

/// Declare a state enum and its State trait implementation.
///
/// Variant names become state names. Listing `domain: [...]` also generates
/// an inherent `belongs` function, handy for [`Machine::check_state`].
///
/// # Example
///
/// ```
/// use automatons::state_enum;
/// use automatons::core::State;
///
/// state_enum! {
///     pub enum Door {
///         Open,
///         Closed,
///         Jammed,
///     }
///     domain: [Open, Closed]
/// }
///
/// assert_eq!(Door::Open.name(), "Open");
/// assert!(Door::Closed.belongs());
/// assert!(!Door::Jammed.belongs());
/// ```
///
/// [`Machine::check_state`]: crate::automaton::Machine::check_state
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(domain: [$($member:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> ::std::borrow::Cow<'_, str> {
                match self {
                    $(Self::$variant => ::std::borrow::Cow::Borrowed(stringify!($variant))),*
                }
            }
        }

        $(
            impl $name {
                #[allow(dead_code)]
                $vis fn belongs(&self) -> bool {
                    matches!(self, $(Self::$member)|*)
                }
            }
        )?
    };
}
