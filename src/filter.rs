//! Streaming output filter.
//!
//! Keeps directive markup out of user-visible text. Fragments are buffered
//! until `buffer_threshold` characters have arrived (or the stream ends),
//! the buffer is scrubbed and flushed once, and from then on each fragment
//! is scrubbed on its own.
//!
//! Removal rules, applied per line:
//! - bracket tags: `[wave]`, `[laugh]`, `[MEMORY: ...]`, `[ACTION: ...]` and
//!   similar, up to the closing `]` (an unclosed tag runs to end of line);
//! - an action or search marker through end of line;
//! - a known command followed by ` --` through end of line;
//! - a dangling `--flag` through end of line.
//!
//! When a rule runs off the end of a fragment, the following fragments are
//! dropped up to the next newline. In per-fragment mode a trailing partial
//! marker (`EXEC`, `[MEM`, `-`) is held back and joined with the next
//! fragment so a marker split across fragments is still recognized.

use crate::config::FilterConfig;
use crate::directive::DirectiveParser;
use crate::directive::scan;

/// Emotion and action cue tags removed when written as `[tag]`.
const CUE_TAGS: &[&str] = &[
    "wave", "execute", "love", "angry", "laugh", "cry", "blush", "wink",
];

/// Bracket tag heads removed together with their free-text payload.
const PAYLOAD_TAGS: &[&str] = &["action:", "mood:"];

/// An unclosed `[` this close to the end of a fragment is held back.
const MAX_HELD_TAG: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LineState {
    #[default]
    Visible,
    /// Drop text up to the next newline; drop the newline too when the
    /// suppressed line produced nothing.
    Suppressed { drop_newline: bool },
}

/// Stateless removal rules built from the directive grammar.
#[derive(Debug, Clone)]
pub struct Scrubber {
    line_markers: Vec<String>,
    memory_marker: String,
    known_commands: Vec<String>,
}

impl Scrubber {
    /// Rules for the markers and command names `parser` recognizes.
    pub fn new(parser: &DirectiveParser) -> Self {
        Self {
            line_markers: [parser.action_marker(), parser.search_marker()]
                .into_iter()
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect(),
            memory_marker: parser.memory_marker().to_owned(),
            known_commands: parser.known_commands().to_vec(),
        }
    }

    /// Scrub a complete, self-contained text.
    pub fn scrub(&self, text: &str) -> String {
        let mut state = LineState::Visible;
        self.scrub_with(text, &mut state)
    }

    fn scrub_with(&self, text: &str, state: &mut LineState) -> String {
        let mut rest = text;
        if let LineState::Suppressed { drop_newline } = *state {
            match rest.find('\n') {
                Some(i) => {
                    rest = if drop_newline {
                        &rest[i + 1..]
                    } else {
                        &rest[i..]
                    };
                    *state = LineState::Visible;
                }
                None => return String::new(),
            }
        }

        let mut out = String::with_capacity(rest.len());
        for line in rest.split_inclusive('\n') {
            let (body, newline) = match line.strip_suffix('\n') {
                Some(body) => (body, true),
                None => (line, false),
            };
            let (cleaned, cut) = self.scrub_line(body);
            let blank = cleaned.trim().is_empty();
            out.push_str(&cleaned);
            if newline {
                if !(cut && blank) {
                    out.push('\n');
                }
            } else if cut {
                *state = LineState::Suppressed {
                    drop_newline: blank,
                };
            }
        }
        out
    }

    /// Returns the cleaned line and whether text was cut to end of line.
    fn scrub_line(&self, line: &str) -> (String, bool) {
        let lower = line.to_ascii_lowercase();
        let cut = self.cut_point(&lower);
        let kept = &line[..cut.unwrap_or(line.len())];
        let (mut cleaned, unclosed) = self.strip_tags(kept);
        let cut = cut.is_some() || unclosed;
        if cut {
            cleaned.truncate(cleaned.trim_end_matches([' ', '\t']).len());
        }
        (cleaned, cut)
    }

    /// Earliest position from which the rest of the line is directive text.
    fn cut_point(&self, lower: &str) -> Option<usize> {
        let markers = self
            .line_markers
            .iter()
            .filter_map(|m| lower.find(m.as_str()));
        let loose = self
            .known_commands
            .iter()
            .filter_map(|name| first_loose_call(lower, name));
        let cut = markers
            .chain(loose)
            .chain(scan::next_flag(lower, 0))
            .min()?;
        Some(match lower[..cut].chars().next_back() {
            Some('(' | '`' | '[') => cut - 1,
            _ => cut,
        })
    }

    /// Remove bracket tags. The flag reports an unclosed tag, which
    /// swallows the rest of the segment.
    fn strip_tags(&self, segment: &str) -> (String, bool) {
        let lower = segment.to_ascii_lowercase();
        let mut out = String::with_capacity(segment.len());
        let mut i = 0;
        while let Some(rel) = segment[i..].find('[') {
            let open = i + rel;
            out.push_str(&segment[i..open]);
            if !self.is_tag_head(&lower[open + 1..]) {
                out.push('[');
                i = open + 1;
                continue;
            }
            let Some(close) = segment[open..].find(']').map(|c| open + c) else {
                return (out, true);
            };
            i = close + 1;
            if out.ends_with(' ') {
                let next = segment[i..].chars().next();
                if next == Some(' ') {
                    i += 1;
                } else if next.is_none_or(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':')) {
                    out.pop();
                }
            }
        }
        out.push_str(&segment[i..]);
        (out, false)
    }

    fn is_tag_head(&self, after_bracket: &str) -> bool {
        let head = after_bracket.trim_start();
        if (!self.memory_marker.is_empty() && head.starts_with(&self.memory_marker))
            || PAYLOAD_TAGS.iter().any(|t| head.starts_with(t))
        {
            return true;
        }
        let word_end = head
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(head.len());
        CUE_TAGS.contains(&&head[..word_end])
            && head[word_end..]
                .trim_start()
                .starts_with([']', ':'])
    }

    /// Start of a trailing partial marker or unclosed tag worth holding
    /// back until the next fragment arrives.
    fn held_tail_start(&self, text: &str) -> Option<usize> {
        let tail_start = text.rfind('\n').map_or(0, |i| i + 1);
        let lower = text[tail_start..].to_ascii_lowercase();
        let mut held: Option<usize> = None;
        let mut consider = |at: usize| {
            held = Some(held.map_or(at, |h| h.min(at)));
        };

        let prefixes = self
            .line_markers
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(
                self.memory_marker.as_str(),
            ))
            .chain(std::iter::once("--"));
        for marker in prefixes {
            for (end, _) in marker.char_indices().skip(1) {
                let partial = &marker[..end];
                if lower.ends_with(partial) {
                    let at = lower.len() - end;
                    if scan::starts_word(&lower, at) || partial.starts_with('-') {
                        consider(at);
                    }
                }
            }
        }

        if let Some(open) = lower.rfind('[')
            && !lower[open..].contains(']')
            && lower.len() - open <= MAX_HELD_TAG
        {
            consider(open);
        }

        held.map(|at| tail_start + at)
    }
}

/// Position of the first `name --...` call of `name` in `lower`.
fn first_loose_call(lower: &str, name: &str) -> Option<usize> {
    scan::find_all(lower, name).into_iter().find(|&at| {
        let after = at + name.len();
        if !scan::ends_word(lower, after) {
            return false;
        }
        let rest = &lower[after..];
        let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        gap > 0 && rest[gap..].starts_with("--")
    })
}

/// Incremental filter for one pass.
#[derive(Debug, Clone)]
pub struct OutputFilter {
    scrubber: Scrubber,
    threshold: usize,
    buffer: String,
    buffered_chars: usize,
    flushed: bool,
    carry: String,
    state: LineState,
}

impl OutputFilter {
    /// A filter flushing after `config.buffer_threshold` characters.
    pub fn new(config: &FilterConfig, scrubber: Scrubber) -> Self {
        Self {
            scrubber,
            threshold: config.buffer_threshold.max(1),
            buffer: String::new(),
            buffered_chars: 0,
            flushed: false,
            carry: String::new(),
            state: LineState::Visible,
        }
    }

    /// Whether the initial buffer has been released.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Feed one fragment; returns visible text, if any is ready.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        if self.flushed {
            let mut text = std::mem::take(&mut self.carry);
            text.push_str(fragment);
            return self.emit(text, false);
        }
        self.buffer.push_str(fragment);
        self.buffered_chars += fragment.chars().count();
        if self.buffered_chars < self.threshold {
            return None;
        }
        self.flushed = true;
        let buffered = std::mem::take(&mut self.buffer);
        self.emit(buffered, false)
    }

    /// End of stream; returns whatever is still held.
    pub fn finish(&mut self) -> Option<String> {
        let text = if self.flushed {
            std::mem::take(&mut self.carry)
        } else {
            self.flushed = true;
            std::mem::take(&mut self.buffer)
        };
        self.emit(text, true)
    }

    fn emit(&mut self, mut text: String, last: bool) -> Option<String> {
        if !last && let Some(at) = self.scrubber.held_tail_start(&text) {
            self.carry = text.split_off(at);
        }
        let out = self.scrubber.scrub_with(&text, &mut self.state);
        (!out.is_empty()).then_some(out)
    }
}
