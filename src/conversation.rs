//! Conversation types handed to generation backends.
//!
//! A [`ConversationTurn`] is immutable once built. The turn controller
//! derives the second-pass turn with [`ConversationTurn::extended`], which
//! copies the prior messages and appends new ones.
//!
//! # Examples
//!
//! ```
//! use haruko::conversation::{ConversationTurn, Message, Role};
//!
//! let turn = ConversationTurn::new(vec![
//!     Message::system("Be brief."),
//!     Message::user("Turn on the kitchen light"),
//! ]);
//! let next = turn.extended([Message::assistant("Okay.")]);
//! assert_eq!(turn.messages().len(), 2);
//! assert_eq!(next.messages().len(), 3);
//! assert_eq!(next.messages()[2].role, Role::Assistant);
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions and injected context.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Encoded image attached to a message for vision-capable passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    /// Encoded image bytes.
    pub data: Bytes,
}

impl ImageData {
    /// JPEG image from raw bytes.
    pub fn jpeg(data: impl Into<Bytes>) -> Self {
        Self {
            media_type: "image/jpeg".to_owned(),
            data: data.into(),
        }
    }

    /// PNG image from raw bytes.
    pub fn png(data: impl Into<Bytes>) -> Self {
        Self {
            media_type: "image/png".to_owned(),
            data: data.into(),
        }
    }
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Attached images (only meaningful for vision-capable providers).
    pub images: Vec<ImageData>,
}

impl Message {
    /// Create a text message with the given role.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: text.into(),
            images: Vec::new(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Attach images to this message.
    pub fn with_images(mut self, images: Vec<ImageData>) -> Self {
        self.images = images;
        self
    }

    /// Returns `true` if at least one image is attached.
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// An ordered, immutable sequence of messages for one generation pass.
///
/// Cloning is cheap: the message list is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    messages: Arc<[Message]>,
}

impl ConversationTurn {
    /// Build a turn from messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into(),
        }
    }

    /// The messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// A new turn holding these messages followed by `more`.
    pub fn extended(&self, more: impl IntoIterator<Item = Message>) -> Self {
        let mut messages = self.messages.to_vec();
        messages.extend(more);
        Self::new(messages)
    }

    /// Returns `true` if any message carries images.
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(Message::has_images)
    }

    /// The most recent user message, if any.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The same messages with every image attachment removed.
    pub fn without_images(&self) -> Self {
        if !self.has_images() {
            return self.clone();
        }
        Self::new(
            self.messages
                .iter()
                .map(|m| Message::text(m.role, m.content.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap_or_default();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn extended_leaves_original_untouched() {
        let base = ConversationTurn::new(vec![Message::user("hi")]);
        let next = base.extended([Message::assistant("hello"), Message::user("results")]);
        assert_eq!(base.messages().len(), 1);
        assert_eq!(next.messages().len(), 3);
        assert_eq!(next.messages()[0], base.messages()[0]);
    }

    #[test]
    fn image_detection() {
        let turn = ConversationTurn::new(vec![
            Message::system("ctx"),
            Message::user("who is at the door?").with_images(vec![ImageData::jpeg(vec![1, 2])]),
        ]);
        assert!(turn.has_images());
        assert_eq!(
            turn.last_user().map(|m| m.images[0].media_type.as_str()),
            Some("image/jpeg")
        );

        let plain = ConversationTurn::new(vec![Message::user("hi")]);
        assert!(!plain.has_images());

        let stripped = turn.without_images();
        assert!(!stripped.has_images());
        assert_eq!(stripped.messages()[1].content, "who is at the door?");
    }
}
