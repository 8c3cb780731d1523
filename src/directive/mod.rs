//! Directives embedded in generated text.
//!
//! Grammar (markers are configurable and matched case-insensitively):
//!
//! ```text
//! action  := ACTION_MARKER ":" name (positional)? ("--" key (value)?)*   to end of line
//! value   := '"' any '"' | "'" any "'" | "=" value | text up to the next " --key"
//! search  := SEARCH_MARKER ":" query                                    to end of line
//! memory  := "[" MEMORY_MARKER ":" fact "]"
//! ```
//!
//! A line without the action marker still yields an action when it starts
//! with a known command name followed by `--`, but only if the text has no
//! marker-based action at all.

mod parser;
pub(crate) mod scan;

pub use parser::DirectiveParser;

use std::ops::Range;

/// One extracted action call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Command name as written (matching is done by the registry).
    pub name: String,
    /// Arguments in text order. Positional text is stored under `_`.
    pub arguments: Vec<(String, String)>,
    /// Byte range of the directive in the parsed text.
    pub raw_span: Range<usize>,
}

impl Action {
    /// An action not tied to any source text.
    pub fn new<K, V>(name: impl Into<String>, arguments: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            raw_span: 0..0,
        }
    }

    /// First value for `key`, compared case-insensitively.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value for `key`, trimmed.
    pub fn non_empty_arg(&self, key: &str) -> Option<&str> {
        self.arg(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Whether `key` is present, with or without a value.
    pub fn has_arg(&self, key: &str) -> bool {
        self.arg(key).is_some()
    }

    /// Reassemble the call as a command line, quoting values with spaces.
    pub fn command_line(&self) -> String {
        let mut line = self.name.clone();
        for (key, value) in &self.arguments {
            line.push(' ');
            if key == "_" {
                line.push_str(value);
                continue;
            }
            line.push_str("--");
            line.push_str(key);
            if value.is_empty() {
                continue;
            }
            line.push(' ');
            if value.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(value);
                line.push('"');
            } else {
                line.push_str(value);
            }
        }
        line
    }
}

/// A machine-readable instruction found in generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Call a tool.
    Action(Action),
    /// Run a web search and answer from its results.
    SearchRequest {
        /// Free-text query.
        query: String,
    },
    /// Persist a fact about the user.
    MemoryWrite {
        /// Fact text.
        fact: String,
    },
}
