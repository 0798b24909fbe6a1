use serde::{Deserialize, Serialize};

use crate::reasoning::{ReasoningSplit, extract};

/// The author of a chat message.  Fixed when the message is created.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The operator asking about the claim.
    User,
    /// The assistant answering.
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Whether a message's content may still grow.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// The response stream is still being appended to this message.
    Streaming,
    /// The content is final.
    Complete,
    /// The stream failed; the content is the failure notice.
    Failed,
}

/// One entry of a conversation.
///
/// Content is only ever appended to while the message is [`MessageStatus::Streaming`], and only
/// by the owning session.  Once the stream ends the message is frozen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    role: ChatRole,
    content: String,
    status: MessageStatus,
}

impl ChatMessage {
    /// A complete user message carrying `content` verbatim.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant message waiting for its stream.
    pub fn pending_assistant() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            status: MessageStatus::Streaming,
        }
    }

    /// A complete assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            status: MessageStatus::Complete,
        }
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// Returns true while the message may still grow.
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    /// Split the current content into reasoning and answer.
    pub fn split(&self) -> ReasoningSplit {
        extract(&self.content)
    }

    /// Append streamed text.  Returns false, leaving the content untouched, once frozen.
    pub(crate) fn append(&mut self, text: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content.push_str(text);
        true
    }

    pub(crate) fn complete(&mut self) {
        if self.is_streaming() {
            self.status = MessageStatus::Complete;
        }
    }

    /// Replace whatever was streamed so far with `notice` and freeze.
    pub(crate) fn fail(&mut self, notice: &str) {
        if self.is_streaming() {
            self.content = notice.to_string();
            self.status = MessageStatus::Failed;
        }
    }
}
