use memchr::memmem;
use tracing::debug;

use super::parsing::{ParsedToolCall, parse_bracket_tool, parse_xml_tool};
use crate::config::ToolSyntax;

pub trait ToolGrammar: Send + Sync {
    fn start_delimiter(&self) -> &'static str;
    fn end_delimiter(&self) -> &'static str;
    /// Byte range of the next complete call at or after `start_at`.
    fn extract_one_call_from(&self, buffer: &str, start_at: usize) -> Option<(usize, usize)>;
    fn parse_call(&self, slice: &str) -> Option<ParsedToolCall>;
    /// Best-effort parse of a call cut off by the end of the stream.
    fn parse_partial(&self, tail: &str) -> Option<ParsedToolCall>;
}

pub struct XmlGrammar;

impl ToolGrammar for XmlGrammar {
    fn start_delimiter(&self) -> &'static str {
        "<function_calls>"
    }

    fn end_delimiter(&self) -> &'static str {
        "</function_calls>"
    }

    fn extract_one_call_from(&self, buffer: &str, start_at: usize) -> Option<(usize, usize)> {
        let bytes = buffer.as_bytes();
        let start = start_at + memmem::find(&bytes[start_at..], b"<invoke ")?;
        let end = start + memmem::find(&bytes[start..], b"</invoke>")? + b"</invoke>".len();
        Some((start, end))
    }

    fn parse_call(&self, slice: &str) -> Option<ParsedToolCall> {
        parse_xml_tool(slice)
    }

    fn parse_partial(&self, tail: &str) -> Option<ParsedToolCall> {
        let start = tail.rfind("<invoke ")?;
        let candidate = &tail[start..];
        if candidate.contains("</invoke>") {
            parse_xml_tool(candidate)
        } else {
            parse_xml_tool(&format!("{candidate}</invoke>"))
        }
    }
}

pub struct BracketGrammar;

impl ToolGrammar for BracketGrammar {
    fn start_delimiter(&self) -> &'static str {
        "---TOOLS---"
    }

    fn end_delimiter(&self) -> &'static str {
        "---END_TOOLS---"
    }

    fn extract_one_call_from(&self, buffer: &str, start_at: usize) -> Option<(usize, usize)> {
        let bytes = buffer.as_bytes();
        let start = start_at + memmem::find(&bytes[start_at..], b"[tool(")?;
        let is_triple = |i: usize| bytes.get(i..i + 3) == Some(b"\"\"\"".as_slice());

        let mut index = start + b"[tool(".len();
        let mut in_string = false;
        let mut in_triple = false;
        let mut escape_next = false;
        while index < bytes.len() {
            let byte = bytes[index];
            if in_triple {
                if is_triple(index) {
                    in_triple = false;
                    index += 3;
                } else {
                    index += 1;
                }
                continue;
            }
            if in_string {
                if !escape_next && byte == b'"' {
                    in_string = false;
                }
                escape_next = !escape_next && byte == b'\\';
                index += 1;
                continue;
            }
            match byte {
                b'"' if is_triple(index) => {
                    in_triple = true;
                    index += 3;
                }
                b'"' => {
                    in_string = true;
                    index += 1;
                }
                b')' if bytes.get(index + 1) == Some(&b']') => return Some((start, index + 2)),
                _ => index += 1,
            }
        }
        None
    }

    fn parse_call(&self, slice: &str) -> Option<ParsedToolCall> {
        parse_bracket_tool(slice)
    }

    fn parse_partial(&self, tail: &str) -> Option<ParsedToolCall> {
        let start = tail.rfind("[tool(")?;
        let candidate = tail[start..].trim_end();
        if candidate.ends_with(")]") {
            parse_bracket_tool(candidate)
        } else {
            parse_bracket_tool(&format!("{candidate})]"))
        }
    }
}

#[must_use]
pub fn grammar_for(syntax: ToolSyntax) -> Box<dyn ToolGrammar> {
    match syntax {
        ToolSyntax::Xml => Box::new(XmlGrammar),
        ToolSyntax::Bracket => Box::new(BracketGrammar),
    }
}

/// Finds tool calls in backend text as it streams in.
///
/// Text before the tools block is kept as prose. Calls are reported once, as soon
/// as they are complete. Nothing after the closing delimiter is scanned.
pub struct ToolCallScanner {
    grammar: Box<dyn ToolGrammar>,
    raw: String,
    block_start: Option<usize>,
    cursor: usize,
    closed: bool,
}

impl ToolCallScanner {
    #[must_use]
    pub fn new(syntax: ToolSyntax) -> Self {
        Self {
            grammar: grammar_for(syntax),
            raw: String::new(),
            block_start: None,
            cursor: 0,
            closed: false,
        }
    }

    /// Appends `chunk` and returns the calls it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<ParsedToolCall> {
        self.raw.push_str(chunk);
        if self.closed {
            return Vec::new();
        }

        if self.block_start.is_none() {
            let delimiter = self.grammar.start_delimiter();
            let Some(position) = self.raw.find(delimiter) else {
                return Vec::new();
            };
            debug!("Tool block opened at byte {position}");
            self.block_start = Some(position);
            self.cursor = position + delimiter.len();
        }

        let block_end = self.raw[self.cursor..]
            .find(self.grammar.end_delimiter())
            .map(|offset| self.cursor + offset);
        let scan_limit = block_end.unwrap_or(self.raw.len());

        let mut calls = Vec::new();
        while let Some((start, end)) = self
            .grammar
            .extract_one_call_from(&self.raw[..scan_limit], self.cursor)
        {
            match self.grammar.parse_call(&self.raw[start..end]) {
                Some(call) => calls.push(call),
                None => debug!("Skipping unparsable tool call: {}", &self.raw[start..end]),
            }
            self.cursor = end;
        }

        if let Some(end) = block_end {
            self.cursor = end;
            self.closed = true;
        }
        calls
    }

    /// Parses a call left open when the stream ended.
    pub fn finish(&mut self) -> Option<ParsedToolCall> {
        if self.closed || self.block_start.is_none() {
            return None;
        }
        self.closed = true;
        let tail = &self.raw[self.cursor..];
        self.grammar.parse_partial(tail)
    }

    #[must_use]
    pub fn in_block(&self) -> bool {
        self.block_start.is_some()
    }

    #[must_use]
    pub fn block_closed(&self) -> bool {
        self.block_start.is_some() && self.closed
    }

    /// Prose written before the tools block, or everything when there was none.
    #[must_use]
    pub fn text(&self) -> &str {
        let end = self.block_start.unwrap_or(self.raw.len());
        self.raw[..end].trim_end()
    }
}

/// Parses every tool call in a complete reply. Returns the prose and the calls.
#[must_use]
pub fn parse_tool_calls(text: &str, syntax: ToolSyntax) -> (String, Vec<ParsedToolCall>) {
    let mut scanner = ToolCallScanner::new(syntax);
    let mut calls = scanner.push(text);
    calls.extend(scanner.finish());
    (scanner.text().to_string(), calls)
}
