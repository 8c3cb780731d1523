//! The two-pass turn state machine.

use super::context::ContextBuilder;
use super::pass::{PassEvent, relay};
use super::{TurnEvent, TurnState, TurnStream};
use crate::cancel::CancelToken;
use crate::collaborators::{Collaborators, SearchHit};
use crate::config::{FilterConfig, TurnConfig};
use crate::conversation::{ConversationTurn, Message};
use crate::directive::{Action, Directive, DirectiveParser};
use crate::filter::{OutputFilter, Scrubber};
use crate::observability::{
    FIELD_PASS, FIELD_SESSION_ID, FIELD_TURN_ID, SPAN_PROVIDER_PASS, SPAN_TURN,
};
use crate::provider::ProviderChain;
use crate::tools::{ToolDispatcher, ToolResult};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Input of one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Session the turn belongs to, for logging.
    pub session_id: String,
    /// Prior messages, oldest first, without a system message.
    pub history: Vec<Message>,
    /// The new user message.
    pub user: Message,
}

impl TurnRequest {
    /// A request with no history in the default session.
    pub fn new(user: Message) -> Self {
        Self {
            session_id: "default".to_owned(),
            history: Vec::new(),
            user,
        }
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Set prior messages.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Format web search hits as numbered lines under a heading.
pub fn format_search_results(query: &str, hits: &[SearchHit]) -> String {
    let mut text = format!("Search results for '{query}':");
    if hits.is_empty() {
        text.push_str("\nNo results found.");
    }
    for (i, hit) in hits.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. {}: {} (URL: {})",
            i + 1,
            hit.title.trim(),
            hit.body.trim(),
            hit.href.trim()
        ));
    }
    text
}

struct Shared {
    chain: Arc<ProviderChain>,
    parser: DirectiveParser,
    scrubber: Scrubber,
    filter: FilterConfig,
    dispatcher: ToolDispatcher,
    context: ContextBuilder,
    collaborators: Collaborators,
    config: TurnConfig,
}

/// Runs turns. Cheap to clone; every turn gets its own buffers and token.
#[derive(Clone)]
pub struct TurnController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TurnController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnController")
            .field("providers", &self.shared.chain.descriptors().len())
            .field("tools", &self.shared.dispatcher.registry().names().len())
            .finish_non_exhaustive()
    }
}

/// Why a pass stopped before finishing normally.
enum PassStop {
    Cancelled,
    Failed,
}

impl TurnController {
    /// Assemble a controller from its parts.
    pub fn new(
        chain: Arc<ProviderChain>,
        parser: DirectiveParser,
        filter: FilterConfig,
        dispatcher: ToolDispatcher,
        context: ContextBuilder,
        collaborators: Collaborators,
        config: TurnConfig,
    ) -> Self {
        let scrubber = Scrubber::new(&parser);
        Self {
            shared: Arc::new(Shared {
                chain,
                parser,
                scrubber,
                filter,
                dispatcher,
                context,
                collaborators,
                config,
            }),
        }
    }

    /// Turn settings.
    pub fn config(&self) -> &TurnConfig {
        &self.shared.config
    }

    /// The directive parser used on pass output.
    pub fn parser(&self) -> &DirectiveParser {
        &self.shared.parser
    }

    /// Run one turn. The returned stream never fails; dropping it abandons
    /// the turn and the underlying provider connection.
    pub fn run(&self, request: TurnRequest, token: CancelToken) -> TurnStream {
        let shared = Arc::clone(&self.shared);
        Box::pin(async_stream::stream! {
            let turn_id = Uuid::new_v4();
            let span = tracing::info_span!(
                SPAN_TURN,
                { FIELD_TURN_ID } = %turn_id,
                { FIELD_SESSION_ID } = %request.session_id
            );
            let marker = shared.config.cancel_marker.clone();

            let system = shared
                .context
                .system_content(&request.user)
                .instrument(span.clone())
                .await;
            let mut messages = Vec::with_capacity(request.history.len() + 2);
            messages.push(Message::system(system));
            messages.extend(request.history.iter().cloned());
            messages.push(request.user.clone());
            let turn = ConversationTurn::new(messages);
            yield TurnEvent::State(TurnState::ContextAssembled);

            // Pass 1
            if token.is_cancelled() {
                yield TurnEvent::Cancelled(marker);
                yield TurnEvent::State(TurnState::Cancelled);
                return;
            }
            yield TurnEvent::State(TurnState::Pass1Streaming);
            let pass_span =
                tracing::debug_span!(parent: &span, SPAN_PROVIDER_PASS, { FIELD_PASS } = 1u8);
            let started = tokio::select! {
                biased;
                () = token.cancelled() => None,
                r = shared.chain.generate(&turn, turn.has_images()).instrument(pass_span) => Some(r),
            };
            let (stream, provider) = match started {
                None => {
                    yield TurnEvent::Cancelled(marker);
                    yield TurnEvent::State(TurnState::Cancelled);
                    return;
                }
                Some(Err(e)) => {
                    tracing::error!(parent: &span, error = %e, "first pass could not start");
                    yield TurnEvent::Text(shared.config.apology.clone());
                    yield TurnEvent::State(TurnState::Done);
                    return;
                }
                Some(Ok(started)) => started,
            };
            yield TurnEvent::Provider { pass: 1, name: provider };

            let mut raw = None;
            let mut stop = None;
            let mut events = Box::pin(relay(stream, shared.output_filter(), token.clone()));
            while let Some(event) = events.next().await {
                match event {
                    PassEvent::Text(text) => yield TurnEvent::Text(text),
                    PassEvent::Finished(text) => raw = Some(text),
                    PassEvent::Cancelled => stop = Some(PassStop::Cancelled),
                    PassEvent::StreamFailed(e) => {
                        tracing::warn!(parent: &span, error = %e, "first pass ended mid-stream");
                        stop = Some(PassStop::Failed);
                    }
                }
            }
            drop(events);
            match stop {
                Some(PassStop::Cancelled) => {
                    yield TurnEvent::Cancelled(marker);
                    yield TurnEvent::State(TurnState::Cancelled);
                    return;
                }
                Some(PassStop::Failed) => {
                    yield TurnEvent::State(TurnState::Done);
                    return;
                }
                None => {}
            }
            let raw = raw.unwrap_or_default();

            // Directives
            let directives = shared.parser.parse(&raw);
            if directives.is_empty() {
                yield TurnEvent::State(TurnState::Done);
                return;
            }
            tracing::debug!(parent: &span, count = directives.len(), "directives extracted");
            yield TurnEvent::State(TurnState::DirectivesExtracted);
            shared.store_memories(&directives);

            let mut search = None;
            let mut actions: Vec<&Action> = Vec::new();
            for directive in &directives {
                match directive {
                    Directive::SearchRequest { query } => search = Some(query.clone()),
                    Directive::Action(action) => actions.push(action),
                    Directive::MemoryWrite { .. } => {}
                }
            }

            let mut results: Vec<ToolResult> = Vec::new();
            if let Some(query) = search {
                let result = shared.search(&query).instrument(span.clone()).await;
                yield TurnEvent::ToolResult(result.clone());
                results.push(result);
            } else {
                for action in actions {
                    if token.is_cancelled() {
                        yield TurnEvent::Cancelled(marker);
                        yield TurnEvent::State(TurnState::Cancelled);
                        return;
                    }
                    let result = shared.dispatcher.dispatch(action).instrument(span.clone()).await;
                    yield TurnEvent::ToolResult(result.clone());
                    results.push(result);
                }
            }
            let Some(combined) = ToolResult::combined(&results) else {
                yield TurnEvent::State(TurnState::Done);
                return;
            };
            yield TurnEvent::State(TurnState::ToolsDispatched);

            // Pass 2
            if token.is_cancelled() {
                yield TurnEvent::Cancelled(marker);
                yield TurnEvent::State(TurnState::Cancelled);
                return;
            }
            let followup = turn.without_images().extended([
                Message::assistant(raw),
                Message::user(format!(
                    "{}\n\n{}",
                    combined.output_text, shared.config.followup_instruction
                )),
            ]);
            yield TurnEvent::State(TurnState::Pass2Streaming);
            let pass_span =
                tracing::debug_span!(parent: &span, SPAN_PROVIDER_PASS, { FIELD_PASS } = 2u8);
            let started = tokio::select! {
                biased;
                () = token.cancelled() => None,
                r = shared.chain.generate(&followup, false).instrument(pass_span) => Some(r),
            };
            let (stream, provider) = match started {
                None => {
                    yield TurnEvent::Cancelled(marker);
                    yield TurnEvent::State(TurnState::Cancelled);
                    return;
                }
                Some(Err(e)) => {
                    tracing::error!(parent: &span, error = %e, "second pass could not start");
                    yield TurnEvent::Text(shared.config.apology.clone());
                    yield TurnEvent::State(TurnState::Done);
                    return;
                }
                Some(Ok(started)) => started,
            };
            yield TurnEvent::Provider { pass: 2, name: provider };

            let mut cancelled = false;
            let mut events = Box::pin(relay(stream, shared.output_filter(), token.clone()));
            while let Some(event) = events.next().await {
                match event {
                    PassEvent::Text(text) => yield TurnEvent::Text(text),
                    PassEvent::Finished(text) => {
                        let late = shared.parser.parse(&text);
                        shared.store_memories(&late);
                    }
                    PassEvent::Cancelled => cancelled = true,
                    PassEvent::StreamFailed(e) => {
                        tracing::warn!(parent: &span, error = %e, "second pass ended mid-stream");
                    }
                }
            }
            if cancelled {
                yield TurnEvent::Cancelled(marker);
                yield TurnEvent::State(TurnState::Cancelled);
                return;
            }
            yield TurnEvent::State(TurnState::Done);
        })
    }
}

impl Shared {
    fn output_filter(&self) -> OutputFilter {
        OutputFilter::new(&self.filter, self.scrubber.clone())
    }

    fn store_memories(&self, directives: &[Directive]) {
        for directive in directives {
            if let Directive::MemoryWrite { fact } = directive
                && let Err(e) = self.collaborators.memory.add_fact(fact)
            {
                tracing::warn!(error = %e, "failed to store fact");
            }
        }
    }

    async fn search(&self, query: &str) -> ToolResult {
        let command = format!("{} {query}", self.parser.search_marker());
        let Some(web) = &self.collaborators.web else {
            return ToolResult {
                command,
                output_text: "web search is not available on this system".to_owned(),
                ok: false,
            };
        };
        let max = self.config.search_max_results;
        let outcome = match web.search(query, max).await {
            Ok(hits) => Ok(hits),
            Err(e) => {
                tracing::warn!(error = %e, "web search failed, retrying once");
                tokio::time::sleep(Duration::from_millis(self.config.search_retry_delay_ms)).await;
                web.search(query, max).await
            }
        };
        match outcome {
            Ok(hits) => {
                let hits: Vec<SearchHit> = hits.into_iter().take(max).collect();
                ToolResult {
                    command,
                    output_text: format_search_results(query, &hits),
                    ok: true,
                }
            }
            Err(e) => ToolResult {
                command,
                output_text: format!("web search failed: {e}"),
                ok: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_results_are_numbered() {
        let hits = vec![
            SearchHit {
                title: "Tea".into(),
                body: "A drink.".into(),
                href: "https://a.example".into(),
            },
            SearchHit {
                title: "Matcha".into(),
                body: "Powdered tea.".into(),
                href: "https://b.example".into(),
            },
        ];
        assert_eq!(
            format_search_results("tea", &hits),
            "Search results for 'tea':\n1. Tea: A drink. (URL: https://a.example)\n\
             2. Matcha: Powdered tea. (URL: https://b.example)"
        );
        assert_eq!(
            format_search_results("x", &[]),
            "Search results for 'x':\nNo results found."
        );
    }

    #[test]
    fn request_builder() {
        let request = TurnRequest::new(Message::user("hi"))
            .with_session("kitchen")
            .with_history(vec![Message::assistant("hello")]);
        assert_eq!(request.session_id, "kitchen");
        assert_eq!(request.history.len(), 1);
    }
}
