mod budget;
mod prompt;
pub mod structured;
mod tools;

pub use self::{
    budget::TurnBudgetAdapter, prompt::DefaultSystemPromptAdapter,
    structured::StructuredOutputAdapter, tools::DefaultToolsAdapter,
};
