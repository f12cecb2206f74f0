use chumsky::prelude::*;
use llm_json::{RepairOptions, loads};
use memchr::{memchr, memmem::Finder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const INVOKE_OPEN: &str = "<invoke ";
const INVOKE_CLOSE: &str = "</invoke>";
const PARAMETER_OPEN: &[u8] = b"<parameter ";
const PARAMETER_CLOSE: &[u8] = b"</parameter>";

/// A tool invocation written by the backend in one of the text syntaxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedToolCall {
    pub name: String,
    pub args: Map<String, Value>,
}

fn strip_json_fence(input: &str) -> Option<&str> {
    let head = input.get(..7)?;
    if !head.eq_ignore_ascii_case("```json") {
        return None;
    }
    let payload = input[7..].trim_start_matches([' ', '\t', '\r', '\n']);
    let payload = match payload.rfind("\n```") {
        Some(pos) => &payload[..pos],
        None => payload.strip_suffix("```").unwrap_or(payload),
    };
    Some(payload)
}

fn find_quoted_attr_value<'a>(input: &'a str, attr: &str) -> Option<&'a str> {
    let key = format!("{attr}=");
    let key_position = input.find(&key)?;
    let value_start = key_position + key.len();
    let quote = match input.as_bytes().get(value_start)? {
        b'"' => '"',
        b'\'' => '\'',
        _ => return None,
    };
    let rest = &input[value_start + 1..];
    let value_len = rest.find(quote)?;
    Some(&rest[..value_len])
}

/// Iterates `<parameter name="..">value</parameter>` pairs inside an invoke body.
struct ParamIter<'a> {
    body: &'a [u8],
    cursor: usize,
    open: Finder<'static>,
    close: Finder<'static>,
}

impl<'a> ParamIter<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            body: body.as_bytes(),
            cursor: 0,
            open: Finder::new(PARAMETER_OPEN),
            close: Finder::new(PARAMETER_CLOSE),
        }
    }
}

impl Iterator for ParamIter<'_> {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        let tag_start = self.cursor + self.open.find(&self.body[self.cursor..])?;
        let header_start = tag_start + PARAMETER_OPEN.len();
        let header_end = header_start + memchr(b'>', &self.body[header_start..])?;
        let header = std::str::from_utf8(&self.body[tag_start..header_end]).ok()?;
        let name = find_quoted_attr_value(header, "name")?.to_string();

        let content_start = header_end + 1;
        let content_end = content_start + self.close.find(&self.body[content_start..])?;
        let value = std::str::from_utf8(&self.body[content_start..content_end])
            .ok()?
            .to_string();

        self.cursor = content_end + PARAMETER_CLOSE.len();
        Some((name, value))
    }
}

/// Parses one `<invoke name="..">..</invoke>` element.
#[must_use]
pub fn parse_xml_tool(slice: &str) -> Option<ParsedToolCall> {
    let invoke = &slice[slice.find(INVOKE_OPEN)?..];
    let header_len = invoke.find('>')?;
    let name = find_quoted_attr_value(&invoke[..header_len], "name")?;
    let body = &invoke[header_len + 1..];
    let body = &body[..body.find(INVOKE_CLOSE)?];

    let args = ParamIter::new(body).fold(Map::new(), |mut args, (name, raw_value)| {
        let trimmed = raw_value.trim();
        let value = match strip_json_fence(trimmed) {
            Some(payload) => parse_value(payload, true),
            None => parse_value(trimmed, is_potential_json_literal(trimmed)),
        };
        args.insert(name, value);
        args
    });

    Some(ParsedToolCall {
        name: name.to_string(),
        args,
    })
}

/// Parses one `[tool(Name, key="""value""", other="1")]` call.
#[must_use]
pub fn parse_bracket_tool(slice: &str) -> Option<ParsedToolCall> {
    let tool_name = any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .repeated()
        .at_least(1)
        .collect::<String>()
        .padded();

    let escaped = just('\\').ignore_then(any());
    let quoted = just('"')
        .ignore_then(
            escaped
                .or(any().filter(|c: &char| *c != '"' && *c != '\\'))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'))
        .map(Some);

    let triple = just("\"\"\"")
        .ignore_then(
            any()
                .and_is(just("\"\"\"").not())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just("\"\"\""))
        .map(Some);

    // unquoted values are accepted so one sloppy argument does not sink the call
    let bare = any()
        .filter(|c: &char| !c.is_whitespace() && *c != ',' && *c != ')' && *c != ']')
        .repeated()
        .at_least(1)
        .to(None::<String>);

    let key = text::ascii::ident::<&str, extra::Default>()
        .map(ToString::to_string)
        .padded();
    let pair = key
        .then_ignore(just('=').padded())
        .then(triple.or(quoted).or(bare).padded());
    let pairs = pair
        .separated_by(just(',').padded())
        .allow_trailing()
        .collect::<Vec<(String, Option<String>)>>();

    let call = just("[tool(")
        .ignore_then(tool_name)
        .then(
            just(',')
                .padded()
                .ignore_then(pairs)
                .or_not()
                .map(Option::unwrap_or_default),
        )
        .then_ignore(just(")]"));

    let (name, pairs) = call.parse(slice).into_result().ok()?;
    let args = pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .map(|(key, value)| {
            let is_json = is_potential_json_literal(&value);
            (key, parse_value(&value, is_json))
        })
        .collect();
    Some(ParsedToolCall { name, args })
}

pub(crate) fn is_potential_json_literal(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with(['{', '['])
        || trimmed.ends_with(['}', ']'])
        || matches!(trimmed, "true" | "false" | "null")
        || serde_json::from_str::<Value>(trimmed).is_ok()
}

/// Parses a parameter value as JSON with repair, falling back to the raw string.
fn parse_value(raw: &str, is_json: bool) -> Value {
    if is_json {
        let wrapped = format!(r#"{{"data":{raw}}}"#);
        if let Ok(parsed) = loads(&wrapped, &RepairOptions::default())
            && let Some(data) = parsed.get("data")
            && (!data.is_null() || raw.trim() == "null")
        {
            return data.clone();
        }
    }
    Value::String(raw.to_string())
}
