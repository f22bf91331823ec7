//! `Operator` implementations.
//!
//! - **`console`** – a person at the terminal.
//! - **`auto`** – row-major placement for a pre-wired strip.
//! - **`mock`** – queued answers for tests.

pub mod auto;
pub mod console;
pub mod mock;

pub use auto::AutoOperator;
pub use console::ConsoleOperator;
pub use mock::ScriptedOperator;
