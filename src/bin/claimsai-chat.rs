//! Interactive chat application for asking questions about insurance claims.
//!
//! This binary provides a streaming REPL over the claims backend.  Open a claim, then ask the
//! agent about it; answers stream in as they are produced, with the agent's reasoning dimmed
//! above the answer.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost:8000
//! claimsai-chat
//!
//! # Open a claim on startup against another backend
//! claimsai-chat --base-url http://claims.internal:8000 --claim 2500998765
//!
//! # Disable colors (useful for piping output)
//! claimsai-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/claim <id>` - Open a claim
//! - `/claims` - List available claims
//! - `/summary` - Show the open claim's summary
//! - `/clear` - Clear conversation history
//! - `/quit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use claimsai::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, IgnoredReason, LiveMessagePrinter,
    PlainTextRenderer, Renderer, SubmitOutcome, help_text, parse_command, render_message,
};
use claimsai::view::ConversationView;
use claimsai::{ChatRole, ClaimSummary, ClaimsClient};

type Session = ChatSession<ClaimsClient>;

/// Main entry point for the claimsai-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("claimsai-chat [OPTIONS]");
    init_logging();

    let mut config = ChatConfig::from(args);
    let client = config.client()?;
    let session = ChatSession::new(client);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Claims Assistant ({})", session.transport().base_url());
    println!("Type /help for commands, /quit to exit\n");

    if let Some(claim_id) = config.subject.clone() {
        open_claim(&session, &config, &claim_id, &mut renderer).await;
    }

    loop {
        let prompt = match session.subject() {
            Some(claim_id) => format!("[{claim_id}] You: "),
            None => "You: ".to_string(),
        };
        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Claim(claim_id) => {
                            open_claim(&session, &config, &claim_id, &mut renderer).await;
                        }
                        ChatCommand::Claims => match session.transport().list_claims().await {
                            Ok(list) => {
                                println!("    {} claims available:", list.total);
                                for claim_id in &list.available_claims {
                                    println!("      {claim_id}");
                                }
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to list claims: {err}"))
                            }
                        },
                        ChatCommand::Summary => match session.subject() {
                            Some(claim_id) => match session
                                .transport()
                                .claim_summary(&claim_id, config.include_pii)
                                .await
                            {
                                Ok(summary) => print_summary(&summary),
                                Err(err) => {
                                    renderer.print_error(&format!("Failed to load summary: {err}"))
                                }
                            },
                            None => renderer.print_error("No claim is open; use /claim <id>"),
                        },
                        ChatCommand::Raw => match session.subject() {
                            Some(claim_id) => match session.transport().claim_raw(&claim_id).await {
                                Ok(raw) => match serde_json::to_string_pretty(&raw) {
                                    Ok(pretty) => println!("{pretty}"),
                                    Err(err) => renderer.print_error(&err.to_string()),
                                },
                                Err(err) => {
                                    renderer.print_error(&format!("Failed to load claim: {err}"))
                                }
                            },
                            None => renderer.print_error("No claim is open; use /claim <id>"),
                        },
                        ChatCommand::Health => match session.transport().health().await {
                            Ok(health) => renderer.print_info(&format!(
                                "Backend: {}  Database: {}",
                                health.status, health.db_status
                            )),
                            Err(err) => {
                                renderer.print_error(&format!("Backend unreachable: {err}"))
                            }
                        },
                        ChatCommand::History => {
                            let view = ConversationView::of(&session);
                            if view.messages.is_empty() {
                                renderer.print_info("No messages yet.");
                            }
                            for message in &view.messages {
                                render_message(&mut renderer, message, config.show_thinking);
                            }
                        }
                        ChatCommand::Thinking(show) => {
                            config.show_thinking = show;
                            if show {
                                renderer.print_info("Reasoning output enabled.");
                            } else {
                                renderer.print_info("Reasoning output hidden.");
                            }
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Save(path) => match session.save_transcript_to(&path) {
                            Ok(_) => renderer.print_info(&format!("Transcript saved to {}", path)),
                            Err(err) => {
                                renderer.print_error(&format!("Failed to save transcript: {}", err))
                            }
                        },
                        ChatCommand::Load(path) => match session.load_transcript_from(&path) {
                            Ok(_) => renderer.print_info(&format!(
                                "Transcript loaded from {} ({} messages)",
                                path,
                                session.message_count()
                            )),
                            Err(err) => {
                                renderer.print_error(&format!("Failed to load transcript: {}", err))
                            }
                        },
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                if !ConversationView::of(&session).can_submit() {
                    renderer.print_error("Open a claim first with /claim <id>");
                    continue;
                }
                println!("Assistant:");
                ask(&session, line, &mut renderer, config.show_thinking).await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Fetch the claim's summary and, if it exists, make it the subject of the conversation.
async fn open_claim(
    session: &Session,
    config: &ChatConfig,
    claim_id: &str,
    renderer: &mut PlainTextRenderer,
) {
    match session
        .transport()
        .claim_summary(claim_id, config.include_pii)
        .await
    {
        Ok(summary) => {
            if session.set_subject(Some(summary.claim_id.clone())) {
                renderer.print_info(&format!("Opened claim {}.", summary.claim_id));
            }
            print_summary(&summary);
        }
        Err(err) if err.is_not_found() => {
            renderer.print_error(&format!("Claim {claim_id} not found."));
        }
        Err(err) => {
            renderer.print_error(&format!("Failed to open claim {claim_id}: {err}"));
        }
    }
}

/// Submit a question and print the answer as it streams in.
async fn ask(
    session: &Session,
    question: &str,
    renderer: &mut PlainTextRenderer,
    show_thinking: bool,
) {
    let mut revisions = session.subscribe();
    let mut driver = tokio::spawn({
        let session = session.clone();
        let question = question.to_string();
        async move { session.submit(&question).await }
    });
    let mut printer = LiveMessagePrinter::new(show_thinking);

    let outcome = loop {
        tokio::select! {
            outcome = &mut driver => break outcome,
            changed = revisions.changed() => {
                if changed.is_err() {
                    break (&mut driver).await;
                }
                print_latest(session, &mut printer, renderer);
            }
        }
    };
    match outcome {
        Ok(SubmitOutcome::Completed) | Ok(SubmitOutcome::Failed) => {
            print_latest(session, &mut printer, renderer);
        }
        Ok(SubmitOutcome::Stale) => {}
        Ok(SubmitOutcome::Ignored(IgnoredReason::Busy)) => {
            renderer.print_info("Still waiting on the previous answer.");
        }
        Ok(SubmitOutcome::Ignored(IgnoredReason::EmptyQuery)) => {}
        Err(err) => {
            renderer.print_error(&format!("Chat task failed: {err}"));
        }
    }
}

fn print_latest(
    session: &Session,
    printer: &mut LiveMessagePrinter,
    renderer: &mut PlainTextRenderer,
) {
    if let Some(message) = session.last_message() {
        if message.role() == ChatRole::Assistant {
            printer.update(&message, renderer);
        }
    }
}

fn print_summary(summary: &ClaimSummary) {
    println!("    {}", summary.context_line());
    println!("      Patient: {}", summary.patient_name);
    let marker = if summary.is_denied() { "  [DENIED]" } else { "" };
    println!(
        "      Status: {} ({}){marker}",
        summary.claim_status, summary.processing_status
    );
    println!("      Payment date: {}", summary.payment_date);
    println!(
        "      Service period: {} to {}",
        summary.service_period.start.as_deref().unwrap_or("?"),
        summary.service_period.end.as_deref().unwrap_or("?")
    );
    println!("      Primary diagnosis: {}", summary.primary_diagnosis);
    if let Some(drg) = summary.drg_code.as_deref() {
        println!("      DRG: {drg}");
    }
    let coded: Vec<_> = summary.coded_adjustments().collect();
    if coded.is_empty() {
        println!("      Adjustments: (none)");
    } else {
        println!("      Adjustments:");
        for adjustment in coded {
            println!(
                "        - {} {}: {} (${:.2})",
                adjustment.category_code.as_deref().unwrap_or("--"),
                adjustment.reason_code.as_deref().unwrap_or("--"),
                adjustment
                    .description
                    .as_deref()
                    .unwrap_or("no description"),
                adjustment.amount
            );
        }
    }
    if !summary.line_items.is_empty() {
        println!("      Line items:");
        for item in &summary.line_items {
            println!("        - {}", item.service);
        }
    }
}
