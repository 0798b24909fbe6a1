//! Chat module for conversations with the claims agent.
//!
//! This module provides the claim-scoped conversation and a streaming REPL
//! built on top of it. It supports:
//!
//! - Streaming responses rendered as they arrive
//! - Claim context attached to every question
//! - Slash commands for switching claims and inspecting them
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: The conversation state machine and stream driver
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{LiveMessagePrinter, PlainTextRenderer, Renderer, render_message};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{
    ChatSession, DEFAULT_THREAD_ID, FAILURE_NOTICE, IgnoredReason, SessionSnapshot,
    SubmitOutcome, TurnPhase, compose_query, correlation_token,
};
