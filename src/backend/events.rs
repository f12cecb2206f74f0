use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::Usage;

/// One line of `claude --output-format stream-json` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Assistant { message: AssistantMessage },
    Result(ResultEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub usage: Option<ResultUsage>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResultUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl ResultEvent {
    #[must_use]
    pub fn usage(&self) -> Usage {
        let usage = self.usage.unwrap_or_default();
        Usage {
            input_tokens: usage.input_tokens
                + usage.cache_creation_input_tokens
                + usage.cache_read_input_tokens,
            output_tokens: usage.output_tokens,
            requests: 1,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.is_error || self.subtype.starts_with("error")
    }
}

/// Parses one output line. Blank lines yield `None`.
///
/// # Errors
/// Fails when the line is not a JSON event.
pub fn parse_event(line: &str) -> Result<Option<StreamEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}
