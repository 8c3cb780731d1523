//! Sequential action dispatch.

use super::registry::ToolRegistry;
use super::types::{Tool, ToolError, ToolResult};
use crate::directive::Action;
use crate::observability::{FIELD_TOOL_NAME, SPAN_TOOL_DISPATCH};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Runs actions against a [`ToolRegistry`], one at a time.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    default_timeout: Duration,
    empty_output_sentinel: String,
}

impl ToolDispatcher {
    /// Create a dispatcher.
    pub fn new(
        registry: Arc<ToolRegistry>,
        default_timeout: Duration,
        empty_output_sentinel: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            default_timeout,
            empty_output_sentinel: empty_output_sentinel.into(),
        }
    }

    /// The command table.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one action. Never fails: errors become the result text.
    pub async fn dispatch(&self, action: &Action) -> ToolResult {
        let tool = self.registry.resolve(&action.name);
        let command = action.command_line();
        let span = tracing::debug_span!(
            SPAN_TOOL_DISPATCH,
            { FIELD_TOOL_NAME } = %tool.name(),
            command = %command
        );
        let outcome = self.run_isolated(tool, action).instrument(span).await;
        let (output_text, ok) = match outcome {
            Ok(text) if text.trim().is_empty() => (self.empty_output_sentinel.clone(), true),
            Ok(text) => (text.trim_end().to_owned(), true),
            Err(e) => {
                tracing::debug!(command = %command, error = %e, "tool reported failure");
                (e.to_string(), false)
            }
        };
        ToolResult {
            command,
            output_text,
            ok,
        }
    }

    /// Run the handler on its own task so a panic or hang stays contained.
    async fn run_isolated(&self, tool: Arc<dyn Tool>, action: &Action) -> Result<String, ToolError> {
        let limit = tool.timeout().unwrap_or(self.default_timeout);
        let name = tool.name().to_owned();
        let owned = action.clone();
        let mut handle = tokio::spawn(async move { tool.execute(&owned).await });
        match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ToolError::Crashed {
                tool: name,
                message: join_error.to_string(),
            }),
            Err(_) => {
                handle.abort();
                Err(ToolError::Timeout {
                    tool: name,
                    after: limit,
                })
            }
        }
    }
}
