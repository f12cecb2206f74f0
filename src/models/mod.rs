pub mod message;
pub mod response;

pub use message::{
    ContentItem, MessagePart, ModelRequest, OutputMode, RequestMode, ToolDefinition, UserContent,
};
pub use response::{ModelResponse, Response, ResponseEvent, ToolCall, Usage};
