//! Display projections of a conversation.
//!
//! Views are recomputed from the stored message text on every read and never cached, so a
//! message that is still streaming renders consistently with whatever has arrived so far.

use crate::chat::{ChatSession, SessionSnapshot, TurnPhase};
use crate::transport::ChatTransport;
use crate::types::{ChatMessage, ChatRole, MessageStatus};

/// One message as it should be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Who wrote the message.
    pub role: ChatRole,
    /// Reasoning to show collapsed above the answer.  Only assistant messages carry one.
    pub thought: Option<String>,
    /// The text to show, with reasoning segments removed.
    pub answer: String,
    /// Lifecycle of the underlying message.
    pub status: MessageStatus,
}

impl MessageView {
    /// True for an assistant message that has not received any text yet.
    pub fn is_placeholder(&self) -> bool {
        self.status == MessageStatus::Streaming && self.thought.is_none() && self.answer.is_empty()
    }
}

impl From<&ChatMessage> for MessageView {
    fn from(message: &ChatMessage) -> Self {
        // Reasoning is stripped from every message; only the agent's is worth showing.
        let split = message.split();
        let thought = match message.role() {
            ChatRole::Assistant => split.thought,
            ChatRole::User => None,
        };
        Self {
            role: message.role(),
            thought,
            answer: split.answer,
            status: message.status(),
        }
    }
}

/// The whole conversation as it should be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    /// The claim in context.
    pub subject: Option<String>,
    /// One view per message, in chat order.
    pub messages: Vec<MessageView>,
    /// True while a submission is in flight.
    pub pending: bool,
}

impl ConversationView {
    /// Projects a snapshot of a session.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            subject: snapshot.subject.clone(),
            messages: snapshot.history.iter().map(MessageView::from).collect(),
            pending: snapshot.phase != TurnPhase::Idle,
        }
    }

    /// Projects the current state of `session`.
    pub fn of<T: ChatTransport>(session: &ChatSession<T>) -> Self {
        Self::from_snapshot(&session.snapshot())
    }

    /// True if a new question may be submitted: a claim is open and nothing is in flight.
    pub fn can_submit(&self) -> bool {
        self.subject.is_some() && !self.pending
    }
}
