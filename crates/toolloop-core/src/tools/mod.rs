//! Tool registry and handlers
//!
//! ```text
//! ToolRegistry
//!   name -> ToolDeclaration (sent to the model)
//!        -> ToolHandler     (invoked by the tool-call loop)
//! ```

pub mod builtin;
mod handler;
mod registry;

pub use handler::{number_arg, string_arg, FnHandler, ToolError, ToolHandler, ToolResult};
pub use registry::{RegisteredTool, RegistryError, RegistryResult, ToolRegistry};
