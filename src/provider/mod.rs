//! Generation backends and the failover chain.
//!
//! A backend implements [`TextProvider`]: given a [`ConversationTurn`] it
//! returns a lazy [`TextStream`] of fragments, or fails before the first
//! fragment. Backends are stateless across turns. A [`ProviderDescriptor`]
//! pairs a backend with its name, priority, capabilities and timeouts, and
//! the [`ProviderChain`] tries descriptors in priority order.

pub mod chain;
pub mod error;
pub mod openai_compat;
pub mod scripted;
pub mod sse;

pub use chain::ProviderChain;
pub use error::{ChainError, ProviderError};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use scripted::{ChannelFeeder, ChannelProvider, Script, ScriptedProvider};

use crate::config::{ProviderConfig, ProviderKind};
use crate::conversation::ConversationTurn;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A pinned, boxed stream of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// A text-generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Start generating a reply for `turn`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the request cannot be started.
    async fn invoke(&self, turn: &ConversationTurn) -> Result<TextStream, ProviderError>;
}

/// Capability flags used to filter descriptors per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts image attachments.
    pub supports_vision: bool,
    /// Streams fragments incrementally.
    pub supports_streaming: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_vision: false,
            supports_streaming: true,
        }
    }
}

/// A backend plus the metadata the chain needs to order and bound it.
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Unique name, reported in events and logs.
    pub name: String,
    /// Lower values are tried first.
    pub priority: u32,
    /// Capability flags.
    pub capabilities: Capabilities,
    /// Time allowed before the first fragment.
    pub first_fragment_timeout: Duration,
    /// Time allowed between fragments once committed.
    pub stall_timeout: Duration,
    provider: Arc<dyn TextProvider>,
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("capabilities", &self.capabilities)
            .field("first_fragment_timeout", &self.first_fragment_timeout)
            .field("stall_timeout", &self.stall_timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptor {
    /// Descriptor with default capabilities and timeouts.
    pub fn new(name: impl Into<String>, priority: u32, provider: Arc<dyn TextProvider>) -> Self {
        let defaults = ProviderConfig::default();
        Self {
            name: name.into(),
            priority,
            capabilities: Capabilities::default(),
            first_fragment_timeout: defaults.first_fragment_timeout(),
            stall_timeout: defaults.stall_timeout(),
            provider,
        }
    }

    /// Set the vision flag.
    pub fn with_vision(mut self, supports_vision: bool) -> Self {
        self.capabilities.supports_vision = supports_vision;
        self
    }

    /// Set the streaming flag.
    pub fn with_streaming(mut self, supports_streaming: bool) -> Self {
        self.capabilities.supports_streaming = supports_streaming;
        self
    }

    /// Override both timeouts.
    pub fn with_timeouts(mut self, first_fragment: Duration, stall: Duration) -> Self {
        self.first_fragment_timeout = first_fragment;
        self.stall_timeout = stall;
        self
    }

    /// The wrapped backend.
    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// Build a descriptor and its backend from a config entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the entry is unusable, e.g. the
    /// API key variable is named but unset.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let provider: Arc<dyn TextProvider> = match config.kind {
            ProviderKind::OpenAiCompat => {
                let api_key = match &config.api_key_env {
                    Some(var) => Some(std::env::var(var).map_err(|_| {
                        ProviderError::Config(format!(
                            "provider '{}': environment variable {var} is not set",
                            config.name
                        ))
                    })?),
                    None => None,
                };
                Arc::new(OpenAiCompatProvider::new(OpenAiCompatConfig {
                    base_url: config.base_url.clone(),
                    model: config.model.clone(),
                    api_key,
                    streaming: config.supports_streaming,
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                })?)
            }
            ProviderKind::Static => Arc::new(ScriptedProvider::new(Script::Fragments(
                config.fragments.clone(),
            ))),
        };
        Ok(Self::new(config.name.clone(), config.priority, provider)
            .with_vision(config.supports_vision)
            .with_streaming(config.supports_streaming)
            .with_timeouts(config.first_fragment_timeout(), config.stall_timeout()))
    }
}
