//! Tool-call resolution loop
//!
//! ```text
//! user query ─► send ─► tool calls? ── no ──► final text
//!                 ▲          │ yes
//!                 │          ▼
//!                 └── resolve every call, append results
//! ```
//!
//! Calls are resolved one at a time, in the order the model listed them.
//! Unknown tools, rejected arguments and handler failures become failed tool
//! results; only transport failures end a turn early.

mod options;
mod tool_loop;

pub use options::{TurnError, TurnOptions, TurnOutcome, TurnResult};
pub use tool_loop::ToolCallLoop;
