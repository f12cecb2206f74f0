pub mod defaults;
pub mod traits;

use serde_json::Value;
use std::sync::Arc;

use crate::config::AdapterConfig;

use self::{
    defaults::{
        DefaultSystemPromptAdapter, DefaultToolsAdapter, StructuredOutputAdapter,
        TurnBudgetAdapter,
    },
    traits::{Adapter, RequestContext},
};

pub struct RequestAdapter {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl RequestAdapter {
    /// Builds the pipeline for one request. `output_schema` is the resolved schema
    /// of the output tool in structured mode.
    #[must_use]
    pub fn for_request(config: &AdapterConfig, output_schema: Option<&Value>) -> Self {
        let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();

        if config.default_adapters {
            adapters.push(Arc::new(DefaultSystemPromptAdapter {
                fallback: config.default_system_prompt.clone(),
            }));
            adapters.push(Arc::new(DefaultToolsAdapter));
        }

        adapters.push(Arc::new(TurnBudgetAdapter {
            text: config.text_max_turns,
            attachments: config.attachment_max_turns,
            tools: config.tool_max_turns,
        }));

        if let Some(schema) = output_schema {
            adapters.push(Arc::new(StructuredOutputAdapter::new(schema)));
        }

        Self { adapters }
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    #[must_use]
    pub fn adapt_system_prompt(&self, system_prompt: &str, ctx: &RequestContext) -> String {
        self.adapters
            .iter()
            .fold(system_prompt.to_string(), |prompt, adapter| {
                adapter.adapt_system_prompt(&prompt, ctx)
            })
    }

    #[must_use]
    pub fn adapt_user_prompt(&self, user_prompt: &str, ctx: &RequestContext) -> String {
        self.adapters
            .iter()
            .fold(user_prompt.to_string(), |prompt, adapter| {
                adapter.adapt_user_prompt(&prompt, ctx)
            })
    }

    #[must_use]
    pub fn adapt_tool_description(&self, description: &str, ctx: &RequestContext) -> String {
        self.adapters
            .iter()
            .fold(description.to_string(), |description, adapter| {
                adapter.adapt_tool_description(&description, ctx)
            })
    }

    #[must_use]
    pub fn adapt_tool_schema(&self, schema: &Value, ctx: &RequestContext) -> Value {
        self.adapters
            .iter()
            .fold(schema.clone(), |schema, adapter| {
                adapter.adapt_tool_schema(&schema, ctx)
            })
    }

    #[must_use]
    pub fn adapt_max_turns(&self, max_turns: u32, ctx: &RequestContext) -> u32 {
        self.adapters
            .iter()
            .fold(max_turns, |max_turns, adapter| {
                adapter.adapt_max_turns(max_turns, ctx)
            })
    }
}
