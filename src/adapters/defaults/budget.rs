use crate::{
    adapters::traits::{Adapter, RequestContext},
    models::RequestMode,
};

/// Picks how many internal turns the backend gets.
///
/// Attachments need extra turns because the backend reads the file before answering.
pub struct TurnBudgetAdapter {
    pub text: u32,
    pub attachments: u32,
    pub tools: u32,
}

impl Adapter for TurnBudgetAdapter {
    fn adapt_max_turns(&self, _max_turns: u32, ctx: &RequestContext) -> u32 {
        let base = if ctx.request.has_attachments() {
            self.attachments
        } else {
            self.text
        };
        match ctx.mode {
            RequestMode::ToolCall => base.max(self.tools),
            RequestMode::Structured | RequestMode::PlainText => base,
        }
    }
}
