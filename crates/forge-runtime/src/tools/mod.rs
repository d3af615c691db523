//! Tools invocable by the model during the inference loop (§4.1 step 8,
//! §4.2.1 step 6): a `Tool` trait, a name-keyed `ToolRegistry`, and the
//! builtin tools every runner wires in (`cli-execute`, `memory-search`,
//! `memory-get`).

pub mod cli_execute;
pub mod memory_tools;
pub mod registry;
pub mod script_tool;

pub use cli_execute::CliExecuteTool;
pub use memory_tools::{MemoryGetTool, MemorySearchTool};
pub use registry::{Tool, ToolRegistry};
pub use script_tool::ScriptTool;
