pub mod bridge;
pub mod grammar;
pub mod parsing;
pub mod prompt;

pub use bridge::{BridgeOutcome, BridgeState, PendingToolCall, ToolBridge};
pub use grammar::{ToolCallScanner, parse_tool_calls};
pub use parsing::ParsedToolCall;
pub use prompt::{ToolSpec, tools_system_prompt};
