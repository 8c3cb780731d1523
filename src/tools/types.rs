//! Core tool types.
//!
//! Defines the [`Tool`] trait every handler implements, [`ToolError`] for
//! handler failures, and [`ToolResult`], the record fed back into the
//! second generation pass.

use crate::collaborators::CollaboratorError;
use crate::directive::Action;
use async_trait::async_trait;
use std::time::Duration;

/// Separator between command records in a combined result.
pub const RECORD_SEPARATOR: &str = "\n---\n";

/// Failure of a single handler.
///
/// The `Display` text is what the next generation pass sees.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// A required argument was absent or empty.
    #[error("missing {arg} (usage: {usage})")]
    MissingArgument {
        /// Argument name without the leading `--`.
        arg: &'static str,
        /// Usage line of the tool.
        usage: &'static str,
    },
    /// An argument was present but could not be interpreted.
    #[error("invalid {arg}: {message}")]
    InvalidArgument {
        /// Argument name without the leading `--`.
        arg: &'static str,
        /// What was wrong with it.
        message: String,
    },
    /// The collaborator this tool needs is not attached.
    #[error("{0} is not available on this system")]
    Unavailable(&'static str),
    /// The collaborator reported a failure.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),
    /// The handler ran past its time limit.
    #[error("{tool} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// Command name.
        tool: String,
        /// Limit that was exceeded.
        after: Duration,
    },
    /// The handler task panicked or was aborted.
    #[error("{tool} crashed: {message}")]
    Crashed {
        /// Command name.
        tool: String,
        /// Panic payload or join error.
        message: String,
    },
    /// Any other handler-internal failure.
    #[error("{0}")]
    Failed(String),
}

/// Outcome of dispatching one action, or a combination of several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Command line that was run.
    pub command: String,
    /// Handler output or error text. Never empty.
    pub output_text: String,
    /// Whether the handler succeeded.
    pub ok: bool,
}

impl ToolResult {
    /// Combine results in dispatch order into one record.
    ///
    /// Each record renders as `CMD: <command>\nRESULT: <output>`; records
    /// are joined with [`RECORD_SEPARATOR`]. The combination is `ok` only
    /// if every part is.
    pub fn combined(results: &[ToolResult]) -> Option<ToolResult> {
        if results.is_empty() {
            return None;
        }
        let output_text = results
            .iter()
            .map(|r| format!("CMD: {}\nRESULT: {}", r.command, r.output_text))
            .collect::<Vec<_>>()
            .join(RECORD_SEPARATOR);
        let command = results
            .iter()
            .map(|r| r.command.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Some(ToolResult {
            command,
            output_text,
            ok: results.iter().all(|r| r.ok),
        })
    }
}

/// A side-effecting handler invoked by an action directive.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical command name (lowercase, `-` separated).
    fn name(&self) -> &str;

    /// One-line usage shown in the tool instructions.
    fn usage(&self) -> &str;

    /// Time limit overriding the dispatcher default, for handlers that
    /// legitimately run longer.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Run the handler.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for validation and execution failures; the
    /// dispatcher renders it as the result text.
    async fn execute(&self, action: &Action) -> Result<String, ToolError>;
}

/// Required non-empty argument, or [`ToolError::MissingArgument`].
pub(crate) fn required<'a>(
    action: &'a Action,
    arg: &'static str,
    usage: &'static str,
) -> Result<&'a str, ToolError> {
    action
        .non_empty_arg(arg)
        .ok_or(ToolError::MissingArgument { arg, usage })
}

/// First non-empty value among `keys`, falling back to positional text.
pub(crate) fn first_of<'a>(action: &'a Action, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| action.non_empty_arg(k))
        .or_else(|| action.non_empty_arg("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_argument_text_is_fixed() {
        let err = ToolError::MissingArgument {
            arg: "minutes",
            usage: "timer --minutes N",
        };
        assert_eq!(err.to_string(), "missing minutes (usage: timer --minutes N)");
    }

    #[test]
    fn timeout_text_reports_seconds() {
        let err = ToolError::Timeout {
            tool: "wait".into(),
            after: Duration::from_secs(65),
        };
        assert_eq!(err.to_string(), "wait timed out after 65s");

        let err = ToolError::Timeout {
            tool: "camera-view".into(),
            after: Duration::from_millis(2500),
        };
        assert_eq!(err.to_string(), "camera-view timed out after 2.5s");
    }

    #[test]
    fn combined_preserves_order() {
        let parts = vec![
            ToolResult {
                command: "a".into(),
                output_text: "one".into(),
                ok: true,
            },
            ToolResult {
                command: "b".into(),
                output_text: "two".into(),
                ok: false,
            },
        ];
        let combined = match ToolResult::combined(&parts) {
            Some(c) => c,
            None => unreachable!("non-empty input"),
        };
        assert_eq!(
            combined.output_text,
            "CMD: a\nRESULT: one\n---\nCMD: b\nRESULT: two"
        );
        assert_eq!(combined.command, "a; b");
        assert!(!combined.ok);
        assert!(ToolResult::combined(&[]).is_none());
    }

    #[test]
    fn required_and_first_of() {
        let action = Action::new("weather", [("_", "Kyoto"), ("city", " ")]);
        assert!(matches!(
            required(&action, "city", "weather --city NAME"),
            Err(ToolError::MissingArgument { arg: "city", .. })
        ));
        assert_eq!(first_of(&action, &["city"]), Some("Kyoto"));
    }
}
