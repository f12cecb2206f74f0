use crate::adapters::traits::{Adapter, RequestContext};

pub struct DefaultSystemPromptAdapter {
    pub fallback: String,
}

impl Adapter for DefaultSystemPromptAdapter {
    fn adapt_system_prompt(&self, system_prompt: &str, _ctx: &RequestContext) -> String {
        let trimmed = system_prompt.trim();
        if trimmed.is_empty() {
            self.fallback.clone()
        } else {
            trimmed.to_string()
        }
    }
}
