use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::AdapterError,
    models::{ContentItem, MessagePart, UserContent},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSpec {
    Inline { data: Bytes, media_type: String },
    Url(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedPrompt {
    pub system: String,
    pub user_text: String,
    pub attachments: Vec<AttachmentSpec>,
}

/// Reduces the history to one system text, the latest user content, and its media.
///
/// Tool results that arrived after the latest user content are appended to the
/// user text as a `<function_results>` block.
///
/// # Errors
/// Returns [`AdapterError::MalformedHistory`] when the history holds no user content.
pub fn flatten(history: &[MessagePart]) -> Result<FlattenedPrompt, AdapterError> {
    let system = history
        .iter()
        .filter_map(|part| match part {
            MessagePart::SystemInstruction { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let (last_user, content) = history
        .iter()
        .enumerate()
        .rev()
        .find_map(|(index, part)| match part {
            MessagePart::UserContent { content } => Some((index, content)),
            _ => None,
        })
        .ok_or_else(|| {
            AdapterError::MalformedHistory(format!(
                "no user content among {} message parts",
                history.len()
            ))
        })?;

    let (mut user_text, attachments) = split_content(content);

    let results = render_tool_results(&history[last_user + 1..]);
    if !results.is_empty() {
        if !user_text.is_empty() {
            user_text.push_str("\n\n");
        }
        user_text.push_str(&results);
    }

    debug!(
        "--- FLATTENED PROMPT ---\nsystem: {system}\nuser: {user_text}\nattachments: {}\n--- END FLATTENED PROMPT ---",
        attachments.len()
    );

    Ok(FlattenedPrompt {
        system,
        user_text,
        attachments,
    })
}

fn split_content(content: &UserContent) -> (String, Vec<AttachmentSpec>) {
    match content {
        UserContent::Text(text) => (text.clone(), Vec::new()),
        UserContent::Items(items) => {
            let mut texts = Vec::new();
            let mut attachments = Vec::new();
            for item in items {
                match item {
                    ContentItem::Text { text } => texts.push(text.as_str()),
                    ContentItem::Image { media_type, data } => {
                        attachments.push(AttachmentSpec::Inline {
                            data: data.clone(),
                            media_type: media_type.clone(),
                        });
                    }
                    ContentItem::ImageUrl { url } => attachments.push(AttachmentSpec::Url(url.clone())),
                }
            }
            (texts.join("\n"), attachments)
        }
    }
}

/// Renders every tool result in `parts` into one delimited block, or an empty string.
#[must_use]
pub fn render_tool_results(parts: &[MessagePart]) -> String {
    let results = parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::ToolResult {
                tool_name,
                call_id,
                content,
            } => Some(format!(
                "<result name=\"{tool_name}\" call_id=\"{call_id}\">\n{}\n</result>",
                render_content(content)
            )),
            _ => None,
        })
        .collect::<Vec<_>>();

    if results.is_empty() {
        String::new()
    } else {
        format!(
            "<function_results>\n{}\n</function_results>",
            results.join("\n")
        )
    }
}

fn render_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.trim().to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
