use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One part of the conversation history handed over by the agent framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    SystemInstruction {
        text: String,
    },
    UserContent {
        content: UserContent,
    },
    ToolResult {
        tool_name: String,
        call_id: String,
        content: Value,
    },
    ModelText {
        text: String,
    },
    ToolCall {
        tool_name: String,
        call_id: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
}

impl MessagePart {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::SystemInstruction { text: text.into() }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserContent {
            content: UserContent::Text(text.into()),
        }
    }

    #[must_use]
    pub fn user_items(items: Vec<ContentItem>) -> Self {
        Self::UserContent {
            content: UserContent::Items(items),
        }
    }

    #[must_use]
    pub fn tool_result(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self::ToolResult {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Items(Vec<ContentItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        #[serde(with = "crate::utils::base64_bytes")]
        data: Bytes,
    },
    ImageUrl {
        url: String,
    },
}

impl ContentItem {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn image(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// A tool as declared by the framework: name, description and parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub parameters_json_schema: Value,
}

impl ToolDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters_json_schema: schema,
        }
    }
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Text,
    Tool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<MessagePart>,
    #[serde(default)]
    pub function_tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub output_tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub output_mode: OutputMode,
}

impl ModelRequest {
    #[must_use]
    pub fn new(messages: Vec<MessagePart>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_function_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.function_tools = tools;
        self
    }

    #[must_use]
    pub fn with_output_tool(mut self, tool: ToolDefinition) -> Self {
        self.output_tools = vec![tool];
        self.output_mode = OutputMode::Tool;
        self
    }

    /// True when the latest user content carries an image.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        self.messages
            .iter()
            .rev()
            .find_map(|part| match part {
                MessagePart::UserContent { content } => Some(content),
                _ => None,
            })
            .is_some_and(|content| match content {
                UserContent::Text(_) => false,
                UserContent::Items(items) => items
                    .iter()
                    .any(|item| !matches!(item, ContentItem::Text { .. })),
            })
    }
}

/// The path a request takes through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Structured,
    ToolCall,
    PlainText,
}
