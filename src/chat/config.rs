//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::ClaimsClient;
use crate::error::Result;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Command-line arguments for the claimsai-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the claims backend.
    #[arrrg(
        optional,
        "Backend base URL (default: $CLAIMSAI_API_URL or http://localhost:8000)",
        "URL"
    )]
    pub base_url: Option<String>,

    /// Claim to open on startup.
    #[arrrg(optional, "Claim ID to load on startup", "CLAIM_ID")]
    pub claim: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Start with reasoning hidden.
    #[arrrg(flag, "Hide the agent's reasoning")]
    pub hide_thinking: bool,

    /// Fetch claim summaries with patient details redacted.
    #[arrrg(flag, "Redact patient details in claim summaries")]
    pub redact: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL.  `None` defers to the environment and then the default.
    pub base_url: Option<String>,

    /// Connect timeout and per-request timeout for non-streaming calls.
    pub timeout: Duration,

    /// Claim in context at startup.
    pub subject: Option<String>,

    /// Whether claim summaries include patient details.
    pub include_pii: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether the agent's reasoning is printed.
    pub show_thinking: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Timeout: 60 seconds
    /// - Patient details: included
    /// - Color: enabled
    /// - Thinking: shown
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
            subject: None,
            include_pii: true,
            use_color: true,
            show_thinking: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the claim to open on startup.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Requests redacted claim summaries.
    pub fn redacted(mut self) -> Self {
        self.include_pii = false;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets whether reasoning is printed.
    pub fn with_thinking(mut self, show: bool) -> Self {
        self.show_thinking = show;
        self
    }

    /// Builds a backend client from this configuration.
    pub fn client(&self) -> Result<ClaimsClient> {
        ClaimsClient::with_options(self.base_url.clone(), Some(self.timeout))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let subject = args
            .claim
            .map(|claim| claim.trim().to_string())
            .filter(|claim| !claim.is_empty());
        ChatConfig {
            base_url: args.base_url,
            timeout: Duration::from_secs(args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS) as u64),
            subject,
            include_pii: !args.redact,
            use_color: !args.no_color,
            show_thinking: !args.hide_thinking,
        }
    }
}
