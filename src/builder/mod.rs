//! Builder API for ergonomic automaton construction.
//!
//! This module provides a fluent builder, serializable settings and the
//! `state_enum!` macro for declaring states with minimal boilerplate.

pub mod error;
pub mod machine;
pub mod macros;
pub mod settings;

pub use error::BuildError;
pub use machine::AutomatonBuilder;
pub use settings::AutomatonSettings;
