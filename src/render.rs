//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles. The default implementation uses ANSI
//! escape codes for styling the agent's reasoning differently from its answer.

use std::io::{self, Stdout, Write};

use crate::reasoning::{ReasoningEvent, ReasoningScanner};
use crate::types::{ChatMessage, ChatRole, MessageStatus};
use crate::view::MessageView;

/// ANSI escape code for dim text (used for reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user's questions).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Print a chunk of regular response text.
    ///
    /// This is called incrementally as text is streamed from the agent.
    fn print_text(&mut self, text: &str);

    /// Print a chunk of reasoning text.
    ///
    /// Reasoning is displayed differently (dim/italic) to
    /// distinguish it from the answer.
    fn print_thinking(&mut self, text: &str);

    /// Called when a reasoning segment ends.
    fn finish_thinking(&mut self) {}

    /// Print a question the user asked.
    fn print_user(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes to stdout by default; tests hand it a buffer.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    in_thinking: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            in_thinking: false,
        }
    }

    /// Consumes the renderer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    // Terminal output is best effort; a closed stdout is not worth failing a chat over.
    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            if self.use_color {
                self.write(ANSI_RESET);
            }
            self.write("\n");
            self.in_thinking = false;
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_text(&mut self, text: &str) {
        self.reset_thinking();
        self.write(text);
    }

    fn print_thinking(&mut self, text: &str) {
        if !self.in_thinking {
            if self.use_color {
                self.write(&format!("{ANSI_DIM}{ANSI_ITALIC}"));
            } else {
                self.write("[thinking] ");
            }
            self.in_thinking = true;
        }
        self.write(text);
    }

    fn finish_thinking(&mut self) {
        self.reset_thinking();
    }

    fn print_user(&mut self, text: &str) {
        self.reset_thinking();
        if self.use_color {
            self.write(&format!("{ANSI_CYAN}you>{ANSI_RESET} {text}\n"));
        } else {
            self.write(&format!("you> {text}\n"));
        }
    }

    fn print_error(&mut self, error: &str) {
        self.reset_thinking();
        if self.use_color {
            self.write(&format!("{ANSI_RED}{error}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("Error: {error}\n"));
        }
    }

    fn print_info(&mut self, info: &str) {
        self.reset_thinking();
        self.write(&format!("{info}\n"));
    }

    fn finish_response(&mut self) {
        self.reset_thinking();
        self.write("\n");
    }
}

/// Prints an assistant message progressively as it grows.
///
/// Feed it the same message after every session change; it prints only the text added since
/// the previous call, routing reasoning and answer to the matching renderer calls.
#[derive(Debug)]
pub struct LiveMessagePrinter {
    scanner: ReasoningScanner,
    printed: usize,
    show_thinking: bool,
    answer_started: bool,
    finished: bool,
}

impl LiveMessagePrinter {
    /// Creates a printer for one assistant message.
    pub fn new(show_thinking: bool) -> Self {
        Self {
            scanner: ReasoningScanner::new(),
            printed: 0,
            show_thinking,
            answer_started: false,
            finished: false,
        }
    }

    /// Returns true once the message reached a terminal status and was fully printed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Print whatever `message` gained since the last call.  Returns true once it is finished.
    pub fn update<R: Renderer + ?Sized>(
        &mut self,
        message: &ChatMessage,
        renderer: &mut R,
    ) -> bool {
        if self.finished {
            return true;
        }
        match message.status() {
            MessageStatus::Streaming => {
                self.advance(message, renderer);
            }
            MessageStatus::Complete => {
                self.advance(message, renderer);
                let events = self.scanner.finish();
                self.render(events, renderer);
                renderer.finish_response();
                self.finished = true;
            }
            MessageStatus::Failed => {
                if self.scanner.is_thinking() && self.show_thinking {
                    renderer.finish_thinking();
                }
                renderer.print_error(message.content());
                self.finished = true;
            }
        }
        self.finished
    }

    fn advance<R: Renderer + ?Sized>(&mut self, message: &ChatMessage, renderer: &mut R) {
        let Some(added) = message.content().get(self.printed..) else {
            return;
        };
        if added.is_empty() {
            return;
        }
        self.printed = message.content().len();
        let events = self.scanner.push(added);
        self.render(events, renderer);
    }

    fn render<R: Renderer + ?Sized>(&mut self, events: Vec<ReasoningEvent>, renderer: &mut R) {
        for event in events {
            match event {
                ReasoningEvent::ThoughtStart => {}
                ReasoningEvent::Thought(text) => {
                    if self.show_thinking {
                        renderer.print_thinking(&text);
                    }
                }
                ReasoningEvent::ThoughtEnd => {
                    if self.show_thinking {
                        renderer.finish_thinking();
                    }
                }
                ReasoningEvent::Answer(text) => {
                    let text = if self.answer_started {
                        text.as_str()
                    } else {
                        text.trim_start()
                    };
                    if !text.is_empty() {
                        self.answer_started = true;
                        renderer.print_text(text);
                    }
                }
            }
        }
    }
}

/// Render a finished message, as when reprinting history.
pub fn render_message<R: Renderer + ?Sized>(
    renderer: &mut R,
    view: &MessageView,
    show_thinking: bool,
) {
    match view.role {
        ChatRole::User => renderer.print_user(&view.answer),
        ChatRole::Assistant => {
            if view.is_placeholder() {
                return;
            }
            if let Some(thought) = view.thought.as_deref().filter(|_| show_thinking) {
                renderer.print_thinking(thought);
                renderer.finish_thinking();
            }
            match view.status {
                MessageStatus::Failed => renderer.print_error(&view.answer),
                MessageStatus::Streaming | MessageStatus::Complete => {
                    renderer.print_text(&view.answer);
                    renderer.finish_response();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> PlainTextRenderer<Vec<u8>> {
        PlainTextRenderer::with_writer(Vec::new(), false)
    }

    fn output(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn colored_thinking_is_dimmed() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.print_thinking("Checking");
        renderer.print_text("Denied.");
        assert_eq!(output(renderer), "\x1b[2m\x1b[3mChecking\x1b[0m\nDenied.");
    }

    #[test]
    fn live_printer_streams_reasoning_then_answer() {
        let mut renderer = plain();
        let mut printer = LiveMessagePrinter::new(true);
        let mut message = ChatMessage::pending_assistant();

        assert!(!printer.update(&message, &mut renderer));
        for chunk in [
            "<thi",
            "nk>Checking adj",
            "ustment codes</th",
            "ink>\nThe claim ",
            "was denied.",
        ] {
            message.append(chunk);
            assert!(!printer.update(&message, &mut renderer));
        }
        message.complete();
        assert!(printer.update(&message, &mut renderer));
        assert!(printer.is_finished());

        assert_eq!(
            output(renderer),
            "[thinking] Checking adjustment codes\nThe claim was denied.\n"
        );
    }

    #[test]
    fn live_printer_can_hide_reasoning() {
        let mut renderer = plain();
        let mut printer = LiveMessagePrinter::new(false);
        let mut message = ChatMessage::pending_assistant();
        message.append("<think>Checking</think>Paid in full.");
        message.complete();
        printer.update(&message, &mut renderer);
        assert_eq!(output(renderer), "Paid in full.\n");
    }

    #[test]
    fn live_printer_reports_failure() {
        let mut renderer = plain();
        let mut printer = LiveMessagePrinter::new(true);
        let mut message = ChatMessage::pending_assistant();
        message.append("<think>Looking");
        printer.update(&message, &mut renderer);
        message.fail("Sorry, connection to the agent was lost.");
        assert!(printer.update(&message, &mut renderer));
        assert_eq!(
            output(renderer),
            "[thinking] Looking\nError: Sorry, connection to the agent was lost.\n"
        );
    }

    #[test]
    fn history_rendering() {
        let mut renderer = plain();
        let question = MessageView::from(&ChatMessage::user("What was denied?"));
        let answer = MessageView::from(&ChatMessage::assistant(
            "<think>CO-96</think>The MRI line was denied.",
        ));
        render_message(&mut renderer, &question, true);
        render_message(&mut renderer, &answer, true);
        render_message(&mut renderer, &answer, false);
        assert_eq!(
            output(renderer),
            "you> What was denied?\n[thinking] CO-96\nThe MRI line was denied.\nThe MRI line was denied.\n"
        );
    }
}
