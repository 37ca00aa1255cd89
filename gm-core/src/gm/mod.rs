//! The game master: tool declarations, execution, and the dispatch
//! loop that drives a conversation turn.

pub mod agent;
pub mod tools;

pub use agent::{GameMaster, GmConfig, GmError, GmResponse, StreamedEvent};
pub use tools::{tool_declarations, ToolContext, ToolInvocation};
