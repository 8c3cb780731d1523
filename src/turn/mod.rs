//! One user turn, end to end.
//!
//! ```text
//! Idle -> ContextAssembled -> Pass1Streaming -> DirectivesExtracted
//!      -> ToolsDispatched -> Pass2Streaming -> Done
//! ```
//!
//! `Cancelled` is reachable from any streaming state. The controller
//! reports progress as a stream of [`TurnEvent`]s.

mod context;
mod controller;
mod pass;

pub use context::ContextBuilder;
pub use controller::{TurnController, TurnRequest, format_search_results};

use crate::tools::ToolResult;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

/// Turn controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// Not started.
    Idle,
    /// System context built.
    ContextAssembled,
    /// First generation pass is streaming.
    Pass1Streaming,
    /// Directives were found in the first pass.
    DirectivesExtracted,
    /// Actions or the search ran.
    ToolsDispatched,
    /// Second generation pass is streaming.
    Pass2Streaming,
    /// Finished, with or without a second pass.
    Done,
    /// Stopped by the cancellation token.
    Cancelled,
}

impl TurnState {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ContextAssembled => "context_assembled",
            Self::Pass1Streaming => "pass1_streaming",
            Self::DirectivesExtracted => "directives_extracted",
            Self::ToolsDispatched => "tools_dispatched",
            Self::Pass2Streaming => "pass2_streaming",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Progress reported while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The controller entered a state.
    State(TurnState),
    /// A pass committed to a provider.
    Provider {
        /// 1 or 2.
        pass: u8,
        /// Provider name.
        name: String,
    },
    /// Filtered, user-visible text.
    Text(String),
    /// One action or search finished.
    ToolResult(ToolResult),
    /// The turn was cancelled; carries the marker text.
    Cancelled(String),
}

/// Events of one turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// Drain a turn and return the user-visible text, cancellation marker
/// included on its own line.
pub async fn collect_text(mut events: TurnStream) -> String {
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Text(t) => text.push_str(&t),
            TurnEvent::Cancelled(marker) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&marker);
            }
            _ => {}
        }
    }
    text
}
