//! Client library for the claims assistant.
//!
//! Talks to a claims backend that serves ExplanationOfBenefit summaries and a streamed chat
//! agent, and keeps a claim-scoped conversation with that agent.

// Public modules
pub mod chat;
pub mod client;
pub mod decoder;
pub mod error;
pub mod observability;
pub mod reasoning;
pub mod render;
pub mod transport;
pub mod types;
pub mod view;

// Re-exports
pub use client::{API_URL_ENV, ClaimsClient};
pub use decoder::{Utf8StreamDecoder, decode_stream};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use reasoning::{ReasoningEvent, ReasoningScanner, ReasoningSplit, extract};
pub use transport::{ByteStream, ChatTransport};
pub use types::*;
pub use view::{ConversationView, MessageView};
