use serde_json::Value;

use crate::adapters::traits::{Adapter, RequestContext};

pub const SCHEMA_OPEN: &str = "<schema>";
pub const SCHEMA_CLOSE: &str = "</schema>";

const NULL_LIST_INSTRUCTION: &str = "Generate JSON that exactly matches the required schema. For list/array fields, use empty array [] instead of null if there are no items.";

const RESPONSE_RULES: &str = r#"IMPORTANT: Respond with ONLY valid JSON that matches the schema above. No additional text or explanation.
- Follow the EXACT structure of the schema and include ONLY the fields listed in "properties"
- Do NOT add fields that the schema does not define
- Nested objects (type: "object") must be proper nested JSON objects holding only that nested schema's properties
- Include ALL required fields (see the "required" array of every object)
- Optional fields with a "default" may be omitted
- Use the exact data types given (string, integer, number, boolean, object, array)
- Respect every constraint: "minimum", "maximum", "minLength", "maxLength", "pattern", "enum"
- A value for a field with "pattern" must match the regular expression exactly
- You may wrap the JSON in a ```json code fence"#;

const SYSTEM_SUFFIX: &str = r#"You must respond with valid JSON that exactly matches the provided schema.
Follow all constraints, required fields, and data types specified.
For nested objects (type: "object" with properties), create proper nested JSON objects with all their required fields.
Do not include any text outside of the JSON response."#;

/// Embeds the resolved output schema in the prompt and asks for JSON only.
pub struct StructuredOutputAdapter {
    schema_json: String,
}

impl StructuredOutputAdapter {
    #[must_use]
    pub fn new(resolved_schema: &Value) -> Self {
        Self {
            schema_json: serde_json::to_string(resolved_schema).unwrap_or_default(),
        }
    }
}

impl Adapter for StructuredOutputAdapter {
    fn adapt_system_prompt(&self, system_prompt: &str, _ctx: &RequestContext) -> String {
        if system_prompt.is_empty() {
            SYSTEM_SUFFIX.to_string()
        } else {
            format!("{system_prompt}\n\n{SYSTEM_SUFFIX}")
        }
    }

    fn adapt_user_prompt(&self, user_prompt: &str, _ctx: &RequestContext) -> String {
        format!(
            "{SCHEMA_OPEN}\n{}\n{SCHEMA_CLOSE}\n\n{user_prompt}\n\n{NULL_LIST_INSTRUCTION}\n\n{RESPONSE_RULES}",
            self.schema_json
        )
    }
}
