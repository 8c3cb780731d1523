//! Session facade.
//!
//! [`Assistant`] wires the provider chain, tools and turn controller
//! together and keeps one active [`CancelToken`] per session. Starting a
//! turn replaces the session's token without cancelling the previous one;
//! a stop phrase or [`Assistant::cancel`] cancels it.

use crate::cancel::CancelToken;
use crate::collaborators::Collaborators;
use crate::config::AssistantConfig;
use crate::conversation::Message;
use crate::directive::DirectiveParser;
use crate::error::{HarukoError, Result};
use crate::filter::Scrubber;
use crate::observability::FIELD_SESSION_ID;
use crate::provider::ProviderChain;
use crate::tools::{ToolDispatcher, ToolRegistry, builtin_registry};
use crate::turn::{
    ContextBuilder, TurnController, TurnEvent, TurnRequest, TurnState, TurnStream, collect_text,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Where [`Assistant::look`] takes its picture from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// The local camera.
    Device,
    /// A screenshot of the primary display.
    Display,
}

/// The turn engine behind one assistant instance.
pub struct Assistant {
    controller: TurnController,
    registry: Arc<ToolRegistry>,
    collaborators: Collaborators,
    sessions: Mutex<HashMap<String, CancelToken>>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("controller", &self.controller)
            .field("collaborators", &self.collaborators)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Build an assistant from configuration, constructing the provider
    /// chain from `config.providers`.
    ///
    /// # Errors
    ///
    /// Returns [`HarukoError::Config`] if validation fails, or
    /// [`HarukoError::Provider`] if a provider cannot be constructed.
    pub fn from_config(config: &AssistantConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let chain = ProviderChain::from_config(&config.providers)?;
        Ok(Self::with_chain(config, chain, collaborators))
    }

    /// Build an assistant around an existing provider chain.
    pub fn with_chain(
        config: &AssistantConfig,
        chain: ProviderChain,
        collaborators: Collaborators,
    ) -> Self {
        let chain = Arc::new(chain);
        let markers = DirectiveParser::new(&config.directives);
        let registry = Arc::new(builtin_registry(
            &config.tools,
            &collaborators,
            Arc::clone(&chain),
            Scrubber::new(&markers),
        ));
        let parser = markers.with_known_commands(registry.command_names());
        let context = ContextBuilder::new(
            &config.turn,
            &config.directives,
            &registry,
            collaborators.clone(),
        );
        let dispatcher = ToolDispatcher::new(
            Arc::clone(&registry),
            config.tools.tool_timeout(),
            config.tools.empty_output_sentinel.clone(),
        );
        let controller = TurnController::new(
            chain,
            parser,
            config.filter.clone(),
            dispatcher,
            context,
            collaborators.clone(),
            config.turn.clone(),
        );
        Self {
            controller,
            registry,
            collaborators,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The turn controller.
    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    /// The command table.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Start a turn.
    ///
    /// A stop phrase cancels the session's active turn, silences speech
    /// output and replies with the configured acknowledgement without
    /// invoking any provider.
    pub fn handle(&self, request: TurnRequest) -> TurnStream {
        let config = self.controller.config();
        if config.is_stop_phrase(&request.user.content) {
            let stopped = self.cancel(&request.session_id);
            if let Some(speech) = &self.collaborators.speech {
                speech.stop();
            }
            tracing::info!({ FIELD_SESSION_ID } = %request.session_id, stopped, "stop phrase");
            return Box::pin(futures_util::stream::iter([
                TurnEvent::Text(config.stop_reply.clone()),
                TurnEvent::State(TurnState::Done),
            ]));
        }

        let token = CancelToken::new();
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request.session_id.clone(), token.clone());
        self.controller.run(request, token)
    }

    /// Cancel the session's active turn. Returns whether one was running.
    pub fn cancel(&self, session_id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(session_id) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// The token of the session's most recent turn.
    pub fn active_token(&self, session_id: &str) -> Option<CancelToken> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Run a turn to completion and return its visible text.
    pub async fn respond(&self, request: TurnRequest) -> String {
        collect_text(self.handle(request)).await
    }

    /// Run a turn and speak the reply through the speech collaborator.
    pub async fn respond_aloud(&self, request: TurnRequest) -> String {
        let text = self.respond(request).await;
        if let Some(speech) = &self.collaborators.speech
            && !text.trim().is_empty()
            && let Err(e) = speech.speak(&text).await
        {
            tracing::warn!(error = %e, "speech output failed");
        }
        text
    }

    /// Capture an image from `source`, attach it to the user message, and
    /// start the turn.
    ///
    /// # Errors
    ///
    /// Returns [`HarukoError::Collaborator`] when no vision collaborator is
    /// attached or the capture produced no image.
    pub async fn look(&self, mut request: TurnRequest, source: CaptureSource) -> Result<TurnStream> {
        let vision = self
            .collaborators
            .vision
            .as_ref()
            .ok_or_else(|| HarukoError::Collaborator("vision is not available".into()))?;
        let captured = match source {
            CaptureSource::Device => vision.capture_device().await,
            CaptureSource::Display => vision.capture_display().await,
        }
        .map_err(|e| HarukoError::Collaborator(e.to_string()))?;
        let image =
            captured.ok_or_else(|| HarukoError::Collaborator("capture produced no image".into()))?;
        let user = std::mem::replace(&mut request.user, Message::user(String::new()));
        let mut images = user.images;
        images.push(image);
        request.user = Message::text(user.role, user.content).with_images(images);
        Ok(self.handle(request))
    }
}
