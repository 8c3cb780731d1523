//! Hand-written directive tokenizer.

use super::scan;
use super::{Action, Directive};
use crate::config::DirectiveConfig;

/// Extracts [`Directive`]s from the unfiltered text of a finished pass.
///
/// Precedence:
/// 1. A non-empty search request makes the search the only primary
///    directive; actions in the same text are not returned.
/// 2. Otherwise every marker action, in text order. Loose known-command
///    calls are used only when there is no marker action.
/// 3. Memory tags are always returned.
///
/// Results are ordered by their position in the text. Parsing is a pure
/// function of the text, so repeated calls give identical results.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    action_marker: String,
    search_marker: String,
    memory_marker: String,
    prose_suffix_len: usize,
    known_commands: Vec<String>,
}

impl DirectiveParser {
    /// A parser with no known commands (loose extraction disabled).
    pub fn new(config: &DirectiveConfig) -> Self {
        Self {
            action_marker: config.action_marker.trim().to_ascii_lowercase(),
            search_marker: config.search_marker.trim().to_ascii_lowercase(),
            memory_marker: config.memory_marker.trim().to_ascii_lowercase(),
            prose_suffix_len: config.prose_suffix_len,
            known_commands: Vec::new(),
        }
    }

    /// Enable loose extraction for these command names. Both `_` and `-`
    /// spellings are recognized.
    pub fn with_known_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let lower = name.as_ref().trim().to_ascii_lowercase();
            if lower.is_empty() {
                continue;
            }
            for variant in [lower.replace('_', "-"), lower.replace('-', "_"), lower] {
                if !self.known_commands.contains(&variant) {
                    self.known_commands.push(variant);
                }
            }
        }
        self.known_commands
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self
    }

    /// Lowercase action marker.
    pub fn action_marker(&self) -> &str {
        &self.action_marker
    }

    /// Lowercase search marker.
    pub fn search_marker(&self) -> &str {
        &self.search_marker
    }

    /// Lowercase memory marker.
    pub fn memory_marker(&self) -> &str {
        &self.memory_marker
    }

    /// Lowercase known command names, longest first.
    pub fn known_commands(&self) -> &[String] {
        &self.known_commands
    }

    /// Extract all directives from `text`.
    pub fn parse(&self, text: &str) -> Vec<Directive> {
        let lower = text.to_ascii_lowercase();
        let mut found = self.memory_writes(text, &lower);

        if let Some(search) = self.search(text, &lower) {
            found.push(search);
        } else {
            let mut actions = self.marker_actions(text, &lower);
            if actions.is_empty() {
                actions = self.loose_actions(text, &lower);
            }
            found.extend(
                actions
                    .into_iter()
                    .map(|action| (action.raw_span.start, Directive::Action(action))),
            );
        }

        found.sort_by_key(|(at, _)| *at);
        tracing::debug!(count = found.len(), "directives extracted");
        found.into_iter().map(|(_, d)| d).collect()
    }

    fn memory_writes(&self, text: &str, lower: &str) -> Vec<(usize, Directive)> {
        let mut writes = Vec::new();
        let mut from = 0;
        while let Some(i) = lower[from..].find('[') {
            let open = from + i;
            from = open + 1;
            let inner = &lower[open + 1..];
            let head = open + 1 + (inner.len() - inner.trim_start().len());
            if !lower[head..].starts_with(&self.memory_marker) {
                continue;
            }
            let body = head + self.memory_marker.len();
            let Some(close) = lower[body..].find(']').map(|j| body + j) else {
                continue;
            };
            let fact = text[body..close].trim();
            if !fact.is_empty() {
                writes.push((
                    open,
                    Directive::MemoryWrite {
                        fact: fact.to_owned(),
                    },
                ));
            }
            from = close + 1;
        }
        writes
    }

    fn search(&self, text: &str, lower: &str) -> Option<(usize, Directive)> {
        scan::find_all(lower, &self.search_marker)
            .into_iter()
            .find_map(|at| {
                let start = at + self.search_marker.len();
                let end = scan::line_end(text, start);
                let query = text[start..end]
                    .trim()
                    .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | ')' | ']'))
                    .trim();
                (!query.is_empty()).then(|| {
                    (
                        at,
                        Directive::SearchRequest {
                            query: query.to_owned(),
                        },
                    )
                })
            })
    }

    fn marker_actions(&self, text: &str, lower: &str) -> Vec<Action> {
        scan::find_all(lower, &self.action_marker)
            .into_iter()
            .filter_map(|at| {
                let body = at + self.action_marker.len();
                let end = scan::line_end(text, body);
                self.parse_call(text, body..end, at, closer_for(text, at))
            })
            .collect()
    }

    fn loose_actions(&self, text: &str, lower: &str) -> Vec<Action> {
        let mut hits: Vec<Action> = Vec::new();
        for name in &self.known_commands {
            for at in scan::find_all(lower, name) {
                let after = at + name.len();
                if !scan::ends_word(lower, after) {
                    continue;
                }
                let rest = &lower[after..];
                let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
                if gap == 0 || !rest[gap..].starts_with("--") {
                    continue;
                }
                if hits.iter().any(|a| a.raw_span.contains(&at)) {
                    continue;
                }
                let end = scan::line_end(text, at);
                if let Some(action) = self.parse_call(text, at..end, at, closer_for(text, at)) {
                    hits.push(action);
                }
            }
        }
        hits.sort_by_key(|a| a.raw_span.start);
        hits
    }

    /// Parse `name args...` in `text[body]`. `span_start` is where the
    /// directive (marker or loose name) begins.
    fn parse_call(
        &self,
        text: &str,
        body: std::ops::Range<usize>,
        span_start: usize,
        closer: Option<char>,
    ) -> Option<Action> {
        let end = body.end;
        let mut call = text[body].trim();
        if let Some(c) = closer {
            call = call.strip_suffix(c).unwrap_or(call).trim_end();
        }
        if let Some(open) = call.chars().next().filter(|c| matches!(*c, '"' | '\'' | '`' | '(')) {
            call = &call[open.len_utf8()..];
            let close = if open == '(' { ')' } else { open };
            if let Some(stripped) = call.trim_end().strip_suffix(close) {
                call = stripped;
            }
            call = call.trim();
        }

        let name_end = call
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '(' | ')'))
            .unwrap_or(call.len());
        let name = call[..name_end].trim_end_matches([',', ';', '.', ':']);
        if name.is_empty() || name.starts_with('-') {
            return None;
        }

        Some(Action {
            name: name.to_owned(),
            arguments: self.parse_arguments(&call[name_end..]),
            raw_span: span_start..end,
        })
    }

    fn parse_arguments(&self, args: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let first = scan::next_flag(args, 0);
        let positional = args[..first.unwrap_or(args.len())].trim();
        if !positional.is_empty() {
            out.push(("_".to_owned(), self.guard_prose(positional)));
        }

        let mut cursor = first;
        while let Some(at) = cursor {
            let key_start = at + 2;
            let key_end = args[key_start..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .map_or(args.len(), |i| key_start + i);
            let key = args[key_start..key_end].to_ascii_lowercase();

            let mut pos = key_end;
            if args[pos..].starts_with('=') {
                pos += 1;
            }
            let after = &args[pos..];
            let value_start = pos + (after.len() - after.trim_start().len());
            let rest = &args[value_start..];

            let (value, resume) = match rest.chars().next() {
                None => (String::new(), args.len()),
                Some(q @ ('"' | '\'')) => match rest[1..].find(q) {
                    Some(close) => (rest[1..1 + close].to_owned(), value_start + close + 2),
                    None => (rest[1..].trim_end().to_owned(), args.len()),
                },
                Some(_) => {
                    let stop = scan::next_flag(args, value_start).unwrap_or(args.len());
                    let raw = args[value_start..stop]
                        .trim()
                        .trim_end_matches(['"', '\'', '`'])
                        .trim_end();
                    (self.guard_prose(raw), stop)
                }
            };
            out.push((key, value));
            cursor = scan::next_flag(args, resume);
        }
        out
    }

    /// Cut trailing commentary appended after ` - `.
    fn guard_prose(&self, value: &str) -> String {
        if let Some(idx) = value.find(" - ")
            && value[idx + 3..].chars().count() > self.prose_suffix_len
        {
            return value[..idx].trim_end().to_owned();
        }
        value.to_owned()
    }
}

/// Closing wrapper expected at end of line when the directive is
/// immediately preceded by an opener.
fn closer_for(text: &str, at: usize) -> Option<char> {
    match text[..at].chars().next_back() {
        Some('(') => Some(')'),
        Some('[') => Some(']'),
        Some('`') => Some('`'),
        _ => None,
    }
}
