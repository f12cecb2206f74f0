use memchr::{memchr, memchr2};
use regex::Regex;
use std::sync::LazyLock;

use crate::lazy_regex;

static FENCED_BLOCK: LazyLock<Regex> = lazy_regex!(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```");

/// Which bracket a JSON payload may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    Object,
    Array,
    Either,
}

/// Returns the first complete JSON object or array in `text`.
///
/// Code-fenced blocks are searched first, then the whole text. The scan balances
/// braces and brackets and skips over string literals, so it never returns a span
/// whose delimiters do not match.
#[must_use]
pub fn locate_json(text: &str, opening: Opening) -> Option<&str> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .find_map(|block| first_balanced(block.as_str(), opening))
        .or_else(|| first_balanced(text, opening))
}

fn first_balanced(text: &str, opening: Opening) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0usize;
    while search_from < bytes.len() {
        let haystack = &bytes[search_from..];
        let relative = match opening {
            Opening::Object => memchr(b'{', haystack),
            Opening::Array => memchr(b'[', haystack),
            Opening::Either => memchr2(b'{', b'[', haystack),
        }?;
        let start = search_from + relative;
        if let Some(end) = balanced_end(bytes, start) {
            return Some(&text[start..end]);
        }
        search_from = start + 1;
    }
    None
}

fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut expected_closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if byte == b'\\' {
                escape_next = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => expected_closers.push(b'}'),
            b'[' => expected_closers.push(b']'),
            b'}' | b']' => {
                if expected_closers.pop() != Some(byte) {
                    return None;
                }
                if expected_closers.is_empty() {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}
