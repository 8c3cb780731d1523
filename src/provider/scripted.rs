//! Scripted backends for offline runs and tests.
//!
//! [`ScriptedProvider`] replays a [`Script`] per invocation (the last one
//! repeats) and counts invocations. [`ChannelProvider`] streams whatever its
//! [`ChannelFeeder`] sends, which lets a caller interleave fragments with
//! other actions such as cancellation.

use super::{ProviderError, TextProvider, TextStream};
use crate::conversation::ConversationTurn;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// What a [`ScriptedProvider`] does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    /// Yield these fragments, then end.
    Fragments(Vec<String>),
    /// Fail before producing a stream.
    FailBeforeStream(String),
    /// Yield these fragments, then fail mid-stream.
    FailAfter(Vec<String>, String),
    /// Produce a stream that never yields.
    Hang,
}

/// A backend that replays a [`Script`].
#[derive(Debug)]
pub struct ScriptedProvider {
    scripts: Vec<Script>,
    fragment_delay: Option<Duration>,
    invocations: AtomicUsize,
    seen: Mutex<Vec<ConversationTurn>>,
}

impl ScriptedProvider {
    /// A provider replaying `script` without delays.
    pub fn new(script: Script) -> Self {
        Self::sequence([script])
    }

    /// A provider playing `scripts[n]` on its n-th invocation and the last
    /// script on every invocation after that.
    pub fn sequence(scripts: impl IntoIterator<Item = Script>) -> Self {
        let mut scripts: Vec<Script> = scripts.into_iter().collect();
        if scripts.is_empty() {
            scripts.push(Script::Fragments(Vec::new()));
        }
        Self {
            scripts,
            fragment_delay: None,
            invocations: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for [`Script::Fragments`].
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Script::Fragments(
            fragments.into_iter().map(Into::into).collect(),
        ))
    }

    /// Shorthand for [`Script::FailBeforeStream`].
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(Script::FailBeforeStream(message.into()))
    }

    /// Sleep this long before each fragment.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Number of times [`TextProvider::invoke`] was called.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Turns received so far, in call order.
    pub fn seen_turns(&self) -> Vec<ConversationTurn> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn replay(fragments: Vec<String>, failure: Option<String>, delay: Option<Duration>) -> TextStream {
    Box::pin(async_stream::stream! {
        for fragment in fragments {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            yield Ok(fragment);
        }
        if let Some(message) = failure {
            yield Err(ProviderError::Stream(message));
        }
    })
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    async fn invoke(&self, turn: &ConversationTurn) -> Result<TextStream, ProviderError> {
        let call = self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(turn.clone());
        let script = &self.scripts[call.min(self.scripts.len() - 1)];
        match script {
            Script::Fragments(fragments) => Ok(replay(fragments.clone(), None, self.fragment_delay)),
            Script::FailBeforeStream(message) => Err(ProviderError::Request(message.clone())),
            Script::FailAfter(fragments, message) => Ok(replay(
                fragments.clone(),
                Some(message.clone()),
                self.fragment_delay,
            )),
            Script::Hang => Ok(Box::pin(futures_util::stream::pending::<
                Result<String, ProviderError>,
            >())),
        }
    }
}

/// Sending half of a [`ChannelProvider`].
#[derive(Debug, Clone)]
pub struct ChannelFeeder {
    tx: mpsc::Sender<Result<String, ProviderError>>,
}

impl ChannelFeeder {
    /// Send one fragment. Returns `false` if the stream was dropped.
    pub async fn send(&self, fragment: impl Into<String>) -> bool {
        self.tx.send(Ok(fragment.into())).await.is_ok()
    }

    /// Send a mid-stream failure.
    pub async fn fail(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(Err(ProviderError::Stream(message.into())))
            .await
            .is_ok()
    }
}

/// A backend streaming fragments pushed through a channel.
///
/// Only the first invocation receives the channel; later ones fail.
#[derive(Debug)]
pub struct ChannelProvider {
    rx: Mutex<Option<mpsc::Receiver<Result<String, ProviderError>>>>,
}

impl ChannelProvider {
    /// A provider and its feeder.
    pub fn new() -> (Self, ChannelFeeder) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            ChannelFeeder { tx },
        )
    }
}

#[async_trait]
impl TextProvider for ChannelProvider {
    async fn invoke(&self, _turn: &ConversationTurn) -> Result<TextStream, ProviderError> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ProviderError::Request("channel provider already consumed".into()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
