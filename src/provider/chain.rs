//! Ordered provider failover.
//!
//! [`ProviderChain::generate`] walks descriptors in ascending priority and
//! commits to the first one that produces its first fragment (or ends
//! cleanly) within its `first_fragment_timeout`. A failure or timeout
//! before that point advances to the next descriptor. After commitment
//! there is no failover: a mid-stream error or stall ends the stream with
//! a final `Err` item.

use super::{ChainError, ProviderDescriptor, ProviderError, TextStream};
use crate::config::ProviderConfig;
use crate::conversation::ConversationTurn;
use crate::observability::FIELD_PROVIDER;
use futures_util::StreamExt;
use std::time::Duration;

/// Descriptors sorted by priority.
#[derive(Debug, Clone, Default)]
pub struct ProviderChain {
    descriptors: Vec<ProviderDescriptor>,
}

enum FirstFragment {
    Fragment(String, TextStream),
    Empty,
}

impl ProviderChain {
    /// Build a chain. Equal priorities keep their given order.
    pub fn new(mut descriptors: Vec<ProviderDescriptor>) -> Self {
        descriptors.sort_by_key(|d| d.priority);
        Self { descriptors }
    }

    /// Build a chain from config entries.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor construction error.
    pub fn from_config(configs: &[ProviderConfig]) -> Result<Self, ProviderError> {
        let descriptors = configs
            .iter()
            .map(ProviderDescriptor::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(descriptors))
    }

    /// Descriptors in try order.
    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    /// Start one pass, returning the committed stream and provider name.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NoEligibleProvider`] when no descriptor meets
    /// the vision requirement, or [`ChainError::Exhausted`] when every
    /// eligible descriptor failed before its first fragment.
    pub async fn generate(
        &self,
        turn: &ConversationTurn,
        require_vision: bool,
    ) -> Result<(TextStream, String), ChainError> {
        let mut attempts = 0usize;
        for descriptor in &self.descriptors {
            if require_vision && !descriptor.capabilities.supports_vision {
                tracing::debug!({ FIELD_PROVIDER } = %descriptor.name, "skipping provider without vision");
                continue;
            }
            attempts += 1;

            let started = tokio::time::timeout(
                descriptor.first_fragment_timeout,
                first_fragment(descriptor, turn),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout(format!(
                    "no fragment within {}s",
                    descriptor.first_fragment_timeout.as_secs_f32()
                )))
            });

            match started {
                Ok(first) => {
                    tracing::info!({ FIELD_PROVIDER } = %descriptor.name, attempts, "provider committed");
                    let stream: TextStream = match first {
                        FirstFragment::Fragment(text, rest) => {
                            with_stall_timeout(Some(text), rest, descriptor.stall_timeout)
                        }
                        FirstFragment::Empty => {
                            Box::pin(futures_util::stream::empty::<Result<String, ProviderError>>())
                        }
                    };
                    return Ok((stream, descriptor.name.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        { FIELD_PROVIDER } = %descriptor.name,
                        error = %e,
                        "provider failed before streaming, trying next"
                    );
                }
            }
        }

        if attempts == 0 {
            tracing::error!(require_vision, "no eligible provider");
            return Err(ChainError::NoEligibleProvider { require_vision });
        }
        tracing::error!(attempts, "all providers failed");
        Err(ChainError::Exhausted { attempts })
    }
}

async fn first_fragment(
    descriptor: &ProviderDescriptor,
    turn: &ConversationTurn,
) -> Result<FirstFragment, ProviderError> {
    let mut stream = descriptor.provider().invoke(turn).await?;
    match stream.next().await {
        Some(Ok(text)) => Ok(FirstFragment::Fragment(text, stream)),
        Some(Err(e)) => Err(e),
        None => Ok(FirstFragment::Empty),
    }
}

/// Re-emit `first` followed by `rest`, ending with a timeout error if
/// `rest` stays silent for longer than `stall`. The stream ends after the
/// first error item.
fn with_stall_timeout(first: Option<String>, mut rest: TextStream, stall: Duration) -> TextStream {
    Box::pin(async_stream::stream! {
        if let Some(first) = first {
            yield Ok(first);
        }
        loop {
            match tokio::time::timeout(stall, rest.next()).await {
                Ok(Some(Ok(text))) => yield Ok(text),
                Ok(Some(Err(e))) => {
                    yield Err(e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    yield Err(ProviderError::Timeout(format!(
                        "stream stalled for {}s",
                        stall.as_secs_f32()
                    )));
                    break;
                }
            }
        }
    })
}
