//! Jump resolution: automatons whose transitions are declared as data.
//!
//! A jump is an edge `(source, target)` with an optional guard, probability,
//! delay function and action. For every step exactly one jump out of the
//! current state fires:
//!
//! 1. the first guarded group whose guard holds is selected; if none holds,
//!    the unguarded default group is;
//! 2. a deterministic group fires its only jump, a weighted group draws
//!    `r` and fires the jump with the smallest cumulative bound `>= r`;
//! 3. a selected group that yields no jump is an invariant violation; it
//!    never falls through to later groups.

mod builder;
mod edge;
mod error;
mod guard;
mod table;

pub use builder::{JumpAutomatonBuilder, JumpBuilder, JumpTableBuilder};
pub use edge::{delay, DelayFn, Jump, JumpAction};
pub use error::TableError;
pub use guard::Guard;
pub use table::JumpTable;
