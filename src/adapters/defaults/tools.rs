use serde_json::Value;

use crate::adapters::traits::{Adapter, RequestContext};

const NO_DESCRIPTION: &str = "No description provided.";

pub struct DefaultToolsAdapter;

impl Adapter for DefaultToolsAdapter {
    fn adapt_tool_description(&self, description: &str, _ctx: &RequestContext) -> String {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn adapt_tool_schema(&self, schema: &Value, _ctx: &RequestContext) -> Value {
        match schema {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| *key != "$schema")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
