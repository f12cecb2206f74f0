use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ToolSyntax;

/// A tool as registered with the backend. `input_schema` is fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

const XML_TOOLS_PROMPT: &str = r#"In this environment you have access to a set of external tools. They are not among your built-in tools: you call them by writing a "<function_calls></function_calls>" block as part of your reply, and the caller runs them for you.

<formatting_guide>
<function_calls>
  <invoke name="$FUNCTION_NAME">
    <parameter name="parameter_name">"string_value"</parameter>
    <parameter name="count">3</parameter>
  </invoke>
</function_calls>
</formatting_guide>

Parameter formatting rules:
1. Scalar values (strings, numbers, booleans) go directly between the parameter tags.
2. Objects, arrays and multi-line strings MUST be wrapped in a markdown code block with a `json` tag.

You can call several tools at once by writing several <invoke> elements inside the same <function_calls> block.

<example>
<function_calls>
  <invoke name="get_location">
    <parameter name="city">"Paris"</parameter>
  </invoke>
  <invoke name="add_tags">
    <parameter name="tags">
```json
["travel", "europe"]
```
    </parameter>
  </invoke>
</function_calls>
</example>

Place the <function_calls> block at the end of your reply and stop writing after </function_calls>. The results will be sent to you in a later message inside a <function_results> block.

Here are the functions available in JSONSchema format:
<functions>
{}
</functions>"#;

const BRACKET_TOOLS_PROMPT: &str = r#"You have access to a set of external tools. They are not among your built-in tools: you call them by writing a tools block at the end of your reply, and the caller runs them for you.

<formatting_guide>
---TOOLS---
[tool(ToolName, parameter="""value""", count="42", enabled="true")]
[tool(AnotherTool, items="""["a", "b"]""")]
---END_TOOLS---
</formatting_guide>

* Rules:
  * All tool calls must be enclosed in one '---TOOLS---' ... '---END_TOOLS---' block
  * Each tool call goes on its own line
  * ALL parameter values must be quoted:
    * Strings: triple double quotes ("""value""")
    * Numbers and booleans: double quotes ("42", "true")
    * Arrays and objects: the whole JSON payload in triple double quotes ("""[...]""")
  * Stop writing after '---END_TOOLS---'. The results will be sent to you in a later message inside a <function_results> block.

<example>
---TOOLS---
[tool(get_location, city="""Paris""")]
---END_TOOLS---
</example>

Available tools:
{}"#;

/// Prepends the tool registration instructions to `system_prompt`.
#[must_use]
pub fn tools_system_prompt(system_prompt: &str, tools: &[ToolSpec], syntax: ToolSyntax) -> String {
    if tools.is_empty() {
        return system_prompt.to_string();
    }

    let (template, tool_list) = match syntax {
        ToolSyntax::Xml => (
            XML_TOOLS_PROMPT,
            tools
                .iter()
                .map(|tool| {
                    let function = json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    });
                    format!(
                        "<function>{}</function>",
                        serde_json::to_string(&function).unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        ToolSyntax::Bracket => (
            BRACKET_TOOLS_PROMPT,
            tools
                .iter()
                .map(|tool| {
                    format!(
                        "Tool name: `{}`\nDescription: {}\nSchema:\n```json\n{}\n```",
                        tool.name,
                        tool.description,
                        serde_json::to_string_pretty(&tool.input_schema).unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
    };

    let instructions = template.replace("{}", &tool_list);
    if system_prompt.is_empty() {
        instructions
    } else {
        format!("{instructions}\n\n{system_prompt}")
    }
}
