use serde_json::Value;

use crate::models::{ModelRequest, RequestMode};

/// What an adapter may look at while rewriting a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub request: &'a ModelRequest,
    pub mode: RequestMode,
}

pub trait Adapter: Send + Sync {
    fn adapt_system_prompt(&self, system_prompt: &str, _ctx: &RequestContext) -> String {
        system_prompt.to_string()
    }

    fn adapt_user_prompt(&self, user_prompt: &str, _ctx: &RequestContext) -> String {
        user_prompt.to_string()
    }

    fn adapt_tool_description(&self, description: &str, _ctx: &RequestContext) -> String {
        description.to_string()
    }

    fn adapt_tool_schema(&self, schema: &Value, _ctx: &RequestContext) -> Value {
        schema.clone()
    }

    fn adapt_max_turns(&self, max_turns: u32, _ctx: &RequestContext) -> u32 {
        max_turns
    }
}
