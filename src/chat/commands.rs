//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the session and inspect claims without
//! sending a question to the agent.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Put a claim in context, discarding the conversation about the previous one.
    Claim(String),

    /// List the claims the backend can serve.
    Claims,

    /// Show the summary of the claim in context.
    Summary,

    /// Show the raw ExplanationOfBenefit of the claim in context.
    Raw,

    /// Check backend and database health.
    Health,

    /// Reprint the conversation.
    History,

    /// Toggle thinking visibility.
    Thinking(bool),

    /// Clear the conversation history.
    Clear,

    /// Save the transcript to a file.
    Save(String),

    /// Load a transcript from a file.
    Load(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a question for the agent.
///
/// # Examples
///
/// ```
/// # use claimsai::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/claim 2500998765").is_some());
/// assert!(parse_command("What was denied and why?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "claim" | "open" => match argument {
            Some(id) if !id.contains(char::is_whitespace) => ChatCommand::Claim(id.to_string()),
            Some(_) => ChatCommand::Invalid("/claim expects a single claim ID".to_string()),
            None => ChatCommand::Invalid("/claim requires a claim ID".to_string()),
        },
        "claims" | "list" => ChatCommand::Claims,
        "summary" => ChatCommand::Summary,
        "raw" => ChatCommand::Raw,
        "health" => ChatCommand::Health,
        "history" => ChatCommand::History,
        "thinking" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Thinking(value),
            None => ChatCommand::Invalid("/thinking expects 'on' or 'off'".to_string()),
        },
        "clear" => ChatCommand::Clear,
        "save" => match argument {
            Some(arg) => ChatCommand::Save(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "load" => match argument {
            Some(arg) => ChatCommand::Load(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /claim <id>            Open a claim (clears the conversation)
  /claims                List available claims
  /summary               Show the open claim's summary
  /raw                   Show the open claim's raw ExplanationOfBenefit
  /health                Check backend and database health
  /history               Reprint the conversation
  /thinking on|off       Show or hide the agent's reasoning
  /clear                 Clear conversation history
  /save <file>           Save the transcript to a file
  /load <file>           Load a transcript from a file
  /help                  Show this help message
  /quit                  Exit the chat

Anything else is sent to the agent as a question about the open claim."#
}
