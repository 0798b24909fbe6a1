//! Core chat session management.
//!
//! This module provides the `ChatSession` struct, which owns the conversation about one claim
//! and drives streamed responses into it.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use tokio::sync::watch;

use crate::Error;
use crate::decoder::decode_stream;
use crate::error::Result;
use crate::observability::{
    SESSION_SUBMITS_IGNORED, SESSION_TURN_DURATION, SESSION_TURNS_COMPLETED,
    SESSION_TURNS_FAILED, SESSION_TURNS_STALE,
};
use crate::transport::ChatTransport;
use crate::types::{ChatMessage, ChatRequest};

/// Text that replaces an assistant message whose stream failed.
pub const FAILURE_NOTICE: &str = "Sorry, connection to the agent was lost.";

/// Correlation token used when no claim is in context.
pub const DEFAULT_THREAD_ID: &str = "default_session";

/// Compose the query sent to the backend, prefixed with the claim in context.
pub fn compose_query(subject: Option<&str>, query: &str) -> String {
    match subject {
        Some(subject) => format!("[Context: User is viewing Claim ID {subject}] {query}"),
        None => query.to_string(),
    }
}

/// The correlation token for a conversation about `subject`.  Stable for the subject's lifetime.
pub fn correlation_token(subject: Option<&str>) -> String {
    match subject {
        Some(subject) => format!("session-{subject}"),
        None => DEFAULT_THREAD_ID.to_string(),
    }
}

/// Where the session is within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Nothing in flight; `submit` is accepted.
    Idle,
    /// The request is issued and no response body has arrived yet.
    AwaitingResponse,
    /// The response body is being appended to the last assistant message.
    Streaming,
}

/// Why a submission was dropped without touching history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// The query was empty after trimming.
    EmptyQuery,
    /// Another submission is still in flight.
    Busy,
}

/// How a call to [`ChatSession::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The stream ended and the assistant message holds the full answer.
    Completed,
    /// The request or stream failed; the assistant message holds [`FAILURE_NOTICE`].
    Failed,
    /// The subject changed or the session was cleared mid-flight; the response was discarded.
    Stale,
    /// The submission was rejected locally.
    Ignored(IgnoredReason),
}

/// A consistent copy of the session taken under one lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The claim in context.
    pub subject: Option<String>,
    /// The conversation, in chat order.
    pub history: Vec<ChatMessage>,
    /// The submission phase.
    pub phase: TurnPhase,
    /// The generation tag; bumped on every subject switch or clear.
    pub generation: u64,
}

struct SessionState {
    subject: Option<String>,
    history: Vec<ChatMessage>,
    phase: TurnPhase,
    generation: u64,
}

impl SessionState {
    fn reset(&mut self) {
        self.history.clear();
        self.phase = TurnPhase::Idle;
        self.generation += 1;
    }
}

// An accepted submission.  `index` addresses the assistant message; it stays valid for as long
// as `generation` matches, because history is only ever truncated by a reset.
struct Turn {
    generation: u64,
    index: usize,
    request: ChatRequest,
    started: Instant,
}

/// A conversation about one claim.
///
/// The session exclusively owns its history.  Clones share the same conversation, so one clone
/// can drive [`ChatSession::submit`] while another switches the subject or renders.  At most one
/// submission is in flight at a time; the pending check and the history append happen under a
/// single lock.
///
/// Switching the subject does not tear down an in-flight stream.  Every turn carries the
/// generation it started in, and chunks or completions from an older generation are discarded.
pub struct ChatSession<T: ChatTransport> {
    transport: Arc<T>,
    state: Arc<Mutex<SessionState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<T: ChatTransport> Clone for ChatSession<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<T: ChatTransport> ChatSession<T> {
    /// Creates a session with no claim in context.
    pub fn new(transport: T) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(SessionState {
                subject: None,
                history: Vec::new(),
                phase: TurnPhase::Idle,
                generation: 0,
            })),
            revision: Arc::new(revision),
        }
    }

    /// Creates a session about `subject`.
    pub fn with_subject(transport: T, subject: impl Into<String>) -> Self {
        let session = Self::new(transport);
        session.state.lock().subject = Some(subject.into());
        session
    }

    /// Returns the transport this session sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a user query and streams the answer into the conversation.
    ///
    /// This method:
    /// 1. Ignores the call if the query is blank or another submission is in flight
    /// 2. Appends the user message and an empty assistant message
    /// 3. Opens the chat stream with the claim context and correlation token
    /// 4. Appends each decoded chunk to the assistant message as it arrives
    ///
    /// A failure replaces the partial answer with [`FAILURE_NOTICE`].  Nothing is retried.
    pub async fn submit(&self, query: &str) -> SubmitOutcome {
        let turn = match self.begin_turn(query) {
            Ok(turn) => turn,
            Err(reason) => {
                SESSION_SUBMITS_IGNORED.click();
                tracing::debug!(?reason, "submission ignored");
                return SubmitOutcome::Ignored(reason);
            }
        };

        let stream = match self.transport.open_chat(turn.request.clone()).await {
            Ok(stream) => stream,
            Err(err) => return self.fail_turn(&turn, &err),
        };
        if self
            .apply(&turn, |state| state.phase = TurnPhase::Streaming)
            .is_none()
        {
            return self.stale_turn(&turn);
        }

        let chunks = decode_stream(stream);
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    let appended = self.apply(&turn, |state| {
                        if let Some(message) = state.history.get_mut(turn.index) {
                            message.append(&text);
                        }
                    });
                    if appended.is_none() {
                        // Dropping the stream is the only teardown we attempt.
                        return self.stale_turn(&turn);
                    }
                }
                Err(err) => return self.fail_turn(&turn, &err),
            }
        }
        self.complete_turn(&turn)
    }

    /// Switches the claim in context.
    ///
    /// A different subject discards the whole history, returns the session to idle, and orphans
    /// any in-flight stream.  Returns false if `subject` is already in context.
    pub fn set_subject(&self, subject: Option<String>) -> bool {
        {
            let mut state = self.state.lock();
            if state.subject == subject {
                return false;
            }
            tracing::info!(
                from = state.subject.as_deref().unwrap_or("-"),
                to = subject.as_deref().unwrap_or("-"),
                "switching subject"
            );
            state.subject = subject;
            state.reset();
        }
        self.bump_revision();
        true
    }

    /// Discards the history, keeping the subject.  Orphans any in-flight stream.
    pub fn clear(&self) {
        self.state.lock().reset();
        self.bump_revision();
    }

    /// Returns the claim in context.
    pub fn subject(&self) -> Option<String> {
        self.state.lock().subject.clone()
    }

    /// Returns a copy of the conversation.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().history.clone()
    }

    /// Returns a copy of the most recent message.
    pub fn last_message(&self) -> Option<ChatMessage> {
        self.state.lock().history.last().cloned()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Returns the submission phase.
    pub fn phase(&self) -> TurnPhase {
        self.state.lock().phase
    }

    /// Returns true while a submission is in flight.  Submission should be disabled meanwhile.
    pub fn is_pending(&self) -> bool {
        self.phase() != TurnPhase::Idle
    }

    /// Returns the current generation tag.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Returns subject, history, phase and generation as of one instant.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            subject: state.subject.clone(),
            history: state.history.clone(),
            phase: state.phase,
            generation: state.generation,
        }
    }

    /// Subscribe to change notifications.  The value is a revision counter bumped after every
    /// mutation; receivers re-read the session when it changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Saves the subject and conversation to `path` as JSON.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.snapshot();
        let transcript = TranscriptFile::new(snapshot.subject, snapshot.history);
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Loads a transcript from disk, replacing subject and conversation.
    ///
    /// Behaves like a subject switch: any in-flight stream is orphaned.  Messages saved while
    /// still streaming are loaded as failed, since their stream cannot resume.
    pub fn load_transcript_from<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        {
            let mut state = self.state.lock();
            state.reset();
            state.subject = transcript.subject;
            state.history = transcript.messages;
            for message in state.history.iter_mut() {
                message.fail(FAILURE_NOTICE);
            }
        }
        self.bump_revision();
        Ok(())
    }

    fn begin_turn(&self, query: &str) -> std::result::Result<Turn, IgnoredReason> {
        let turn = {
            let mut state = self.state.lock();
            if state.phase != TurnPhase::Idle {
                return Err(IgnoredReason::Busy);
            }
            if query.trim().is_empty() {
                return Err(IgnoredReason::EmptyQuery);
            }
            let subject = state.subject.as_deref();
            let request = ChatRequest::new(
                compose_query(subject, query),
                correlation_token(subject),
            );
            state.history.push(ChatMessage::user(query));
            state.history.push(ChatMessage::pending_assistant());
            state.phase = TurnPhase::AwaitingResponse;
            Turn {
                generation: state.generation,
                index: state.history.len() - 1,
                request,
                started: Instant::now(),
            }
        };
        tracing::debug!(
            thread_id = %turn.request.thread_id,
            generation = turn.generation,
            "submitting query"
        );
        self.bump_revision();
        Ok(turn)
    }

    // Runs `f` on the state if `turn` is still current, then notifies subscribers.
    fn apply<R>(&self, turn: &Turn, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let result = {
            let mut state = self.state.lock();
            if state.generation != turn.generation {
                return None;
            }
            f(&mut state)
        };
        self.bump_revision();
        Some(result)
    }

    fn complete_turn(&self, turn: &Turn) -> SubmitOutcome {
        let completed = self.apply(turn, |state| {
            if let Some(message) = state.history.get_mut(turn.index) {
                message.complete();
            }
            state.phase = TurnPhase::Idle;
        });
        if completed.is_none() {
            return self.stale_turn(turn);
        }
        SESSION_TURNS_COMPLETED.click();
        SESSION_TURN_DURATION.add(turn.started.elapsed().as_secs_f64());
        tracing::debug!(thread_id = %turn.request.thread_id, "turn completed");
        SubmitOutcome::Completed
    }

    fn fail_turn(&self, turn: &Turn, err: &Error) -> SubmitOutcome {
        tracing::warn!(
            error = %err,
            thread_id = %turn.request.thread_id,
            "chat stream failed"
        );
        let failed = self.apply(turn, |state| {
            if let Some(message) = state.history.get_mut(turn.index) {
                message.fail(FAILURE_NOTICE);
            }
            state.phase = TurnPhase::Idle;
        });
        if failed.is_none() {
            return self.stale_turn(turn);
        }
        SESSION_TURNS_FAILED.click();
        SubmitOutcome::Failed
    }

    fn stale_turn(&self, turn: &Turn) -> SubmitOutcome {
        SESSION_TURNS_STALE.click();
        tracing::debug!(
            thread_id = %turn.request.thread_id,
            generation = turn.generation,
            "discarding response for a previous subject"
        );
        SubmitOutcome::Stale
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    subject: Option<String>,
    messages: Vec<ChatMessage>,
}

impl TranscriptFile {
    fn new(subject: Option<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            version: 1,
            subject,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use bytes::Bytes;
    use futures::channel::{mpsc, oneshot};
    use futures::stream;

    use super::*;
    use crate::transport::ByteStream;
    use crate::types::{ChatRole, MessageStatus};

    enum Script {
        Chunks(Vec<Result<Bytes>>),
        Channel(mpsc::UnboundedReceiver<Result<Bytes>>),
        OpenError(Error),
        Deferred(oneshot::Receiver<Result<ByteStream>>),
    }

    #[derive(Default)]
    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn with(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open_chat(&self, request: ChatRequest) -> Result<ByteStream> {
            self.requests.lock().push(request);
            let script = self
                .scripts
                .lock()
                .pop_front()
                .expect("no scripted response left");
            match script {
                Script::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks))),
                Script::Channel(rx) => Ok(Box::pin(rx)),
                Script::OpenError(err) => Err(err),
                Script::Deferred(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(Error::connection("scripted reply dropped", None))),
            }
        }
    }

    fn text_chunks(parts: &[&str]) -> Script {
        Script::Chunks(
            parts
                .iter()
                .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes())))
                .collect(),
        )
    }

    async fn wait_until<T: ChatTransport>(
        session: &ChatSession<T>,
        condition: impl Fn(&ChatSession<T>) -> bool,
    ) {
        let mut revisions = session.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(session) {
                revisions.changed().await.unwrap();
            }
        })
        .await
        .expect("condition not reached");
    }

    fn assistant_content<T: ChatTransport>(session: &ChatSession<T>) -> String {
        session
            .last_message()
            .map(|message| message.content().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn query_composition() {
        assert_eq!(
            compose_query(Some("2500998765"), "What was denied and why?"),
            "[Context: User is viewing Claim ID 2500998765] What was denied and why?"
        );
        assert_eq!(compose_query(None, "hello"), "hello");
        assert_eq!(correlation_token(Some("2500998765")), "session-2500998765");
        assert_eq!(correlation_token(None), DEFAULT_THREAD_ID);
    }

    #[tokio::test]
    async fn denial_question_streams_and_splits() {
        let transport = ScriptedTransport::with(vec![text_chunks(&[
            "<think>Checking adj",
            "ustment codes</think>The claim was denied ",
            "under category CO, reason code 96.",
        ])]);
        let session = ChatSession::with_subject(transport, "2500998765");

        let outcome = session.submit("What was denied and why?").await;
        assert_eq!(outcome, SubmitOutcome::Completed);
        assert_eq!(session.phase(), TurnPhase::Idle);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role(), ChatRole::User);
        assert_eq!(history[0].content(), "What was denied and why?");
        assert_eq!(history[1].role(), ChatRole::Assistant);
        assert_eq!(history[1].status(), MessageStatus::Complete);
        assert_eq!(
            history[1].content(),
            "<think>Checking adjustment codes</think>The claim was denied under category CO, reason code 96."
        );
        let split = history[1].split();
        assert_eq!(split.thought.as_deref(), Some("Checking adjustment codes"));
        assert_eq!(
            split.answer,
            "The claim was denied under category CO, reason code 96."
        );

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].query,
            "[Context: User is viewing Claim ID 2500998765] What was denied and why?"
        );
        assert_eq!(requests[0].thread_id, "session-2500998765");
    }

    #[tokio::test]
    async fn assistant_message_grows_in_place() {
        let (tx, rx) = mpsc::unbounded();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Channel(rx)]),
            "2500998765",
        );
        let driver = tokio::spawn({
            let session = session.clone();
            async move { session.submit("Why?").await }
        });

        wait_until(&session, |s| s.phase() == TurnPhase::Streaming).await;
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content(), "");
        assert!(history[1].is_streaming());
        assert!(session.is_pending());

        tx.unbounded_send(Ok(Bytes::from_static(b"The claim "))).unwrap();
        wait_until(&session, |s| assistant_content(s) == "The claim ").await;
        tx.unbounded_send(Ok(Bytes::from_static(b"was denied.")))
            .unwrap();
        wait_until(&session, |s| assistant_content(s) == "The claim was denied.").await;
        assert!(session.last_message().unwrap().is_streaming());
        drop(tx);

        assert_eq!(driver.await.unwrap(), SubmitOutcome::Completed);
        assert!(!session.is_pending());
        assert_eq!(session.message_count(), 2);
        assert_eq!(
            session.last_message().unwrap().status(),
            MessageStatus::Complete
        );
    }

    #[tokio::test]
    async fn blank_query_ignored() {
        let session = ChatSession::with_subject(ScriptedTransport::default(), "2500998765");
        assert_eq!(
            session.submit("   \n").await,
            SubmitOutcome::Ignored(IgnoredReason::EmptyQuery)
        );
        assert_eq!(session.message_count(), 0);
        assert!(session.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_noop() {
        let (tx, rx) = mpsc::unbounded();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Channel(rx)]),
            "2500998765",
        );
        let driver = tokio::spawn({
            let session = session.clone();
            async move { session.submit("first").await }
        });
        wait_until(&session, |s| s.is_pending()).await;

        assert_eq!(
            session.submit("second").await,
            SubmitOutcome::Ignored(IgnoredReason::Busy)
        );
        assert_eq!(session.message_count(), 2);

        tx.unbounded_send(Ok(Bytes::from_static(b"answer"))).unwrap();
        drop(tx);
        assert_eq!(driver.await.unwrap(), SubmitOutcome::Completed);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content(), "first");
        assert_eq!(history[1].content(), "answer");
        assert_eq!(session.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_submits_accept_exactly_one() {
        let (tx, rx) = mpsc::unbounded();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Channel(rx)]),
            "2500998765",
        );
        let (first, second) = tokio::join!(session.submit("one"), async {
            let outcome = session.submit("two").await;
            tx.unbounded_send(Ok(Bytes::from_static(b"ok"))).unwrap();
            drop(tx);
            outcome
        });
        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Ignored(IgnoredReason::Busy));
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn open_failure_sets_notice() {
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::OpenError(Error::connection(
                "connection refused",
                None,
            ))]),
            "2500998765",
        );
        assert_eq!(session.submit("hello").await, SubmitOutcome::Failed);
        let last = session.last_message().unwrap();
        assert_eq!(last.content(), FAILURE_NOTICE);
        assert_eq!(last.status(), MessageStatus::Failed);
        assert_eq!(session.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn midstream_failure_discards_partial_answer() {
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![
                Script::Chunks(vec![
                    Ok(Bytes::from_static(b"<think>Looking at CARC")),
                    Ok(Bytes::from_static(b" 96</think>The claim was")),
                    Err(Error::streaming("connection reset", None)),
                ]),
                text_chunks(&["Retried answer."]),
            ]),
            "2500998765",
        );
        assert_eq!(session.submit("Why denied?").await, SubmitOutcome::Failed);
        assert_eq!(assistant_content(&session), FAILURE_NOTICE);
        assert_eq!(session.message_count(), 2);

        // The operator may resubmit manually once idle.
        assert_eq!(session.submit("Why denied?").await, SubmitOutcome::Completed);
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content(), FAILURE_NOTICE);
        assert_eq!(history[3].content(), "Retried answer.");
    }

    #[tokio::test]
    async fn multibyte_characters_survive_chunking() {
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Chunks(vec![
                Ok(Bytes::from_static(b"Coinsurance \xe2")),
                Ok(Bytes::from_static(b"\x80")),
                Ok(Bytes::from_static(b"\x93 20% for M\xc3")),
                Ok(Bytes::from_static(b"\xbcller")),
            ])]),
            "2500998765",
        );
        assert_eq!(session.submit("Coinsurance?").await, SubmitOutcome::Completed);
        assert_eq!(assistant_content(&session), "Coinsurance – 20% for Müller");
    }

    #[tokio::test]
    async fn subject_switch_discards_stale_stream() {
        let (tx, rx) = mpsc::unbounded();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![
                Script::Channel(rx),
                text_chunks(&["Claim 1000003786 was paid."]),
            ]),
            "2500998765",
        );
        let driver = tokio::spawn({
            let session = session.clone();
            async move { session.submit("What was denied and why?").await }
        });
        tx.unbounded_send(Ok(Bytes::from_static(b"<think>Checking")))
            .unwrap();
        wait_until(&session, |s| assistant_content(s) == "<think>Checking").await;
        let generation = session.generation();

        assert!(session.set_subject(Some("1000003786".to_string())));
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.phase(), TurnPhase::Idle);

        tx.unbounded_send(Ok(Bytes::from_static(b" adjustment codes</think>Denied.")))
            .unwrap();
        assert_eq!(driver.await.unwrap(), SubmitOutcome::Stale);
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.subject().as_deref(), Some("1000003786"));

        assert_eq!(session.submit("Was it paid?").await, SubmitOutcome::Completed);
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content(), "Claim 1000003786 was paid.");
        assert_eq!(
            session.transport().requests()[1].thread_id,
            "session-1000003786"
        );
    }

    async fn switch_subject_before_response(reply: Result<ByteStream>) {
        let (tx, rx) = oneshot::channel();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Deferred(rx)]),
            "2500998765",
        );
        let driver = tokio::spawn({
            let session = session.clone();
            async move { session.submit("What was denied and why?").await }
        });
        wait_until(&session, |s| s.phase() == TurnPhase::AwaitingResponse).await;
        assert_eq!(session.message_count(), 2);

        assert!(session.set_subject(Some("1000003786".to_string())));
        assert!(tx.send(reply).is_ok());
        assert_eq!(driver.await.unwrap(), SubmitOutcome::Stale);
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.phase(), TurnPhase::Idle);
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn subject_switch_while_awaiting_response_drops_stream() {
        let chunks = vec![Ok(Bytes::from_static(b"Denied."))];
        switch_subject_before_response(Ok(Box::pin(stream::iter(chunks)))).await;
    }

    #[tokio::test]
    async fn subject_switch_while_awaiting_response_drops_open_error() {
        switch_subject_before_response(Err(Error::connection("connection refused", None))).await;
    }

    #[tokio::test]
    async fn clear_while_streaming_orphans_turn() {
        let (tx, rx) = mpsc::unbounded();
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![Script::Channel(rx)]),
            "2500998765",
        );
        let driver = tokio::spawn({
            let session = session.clone();
            async move { session.submit("hello").await }
        });
        wait_until(&session, |s| s.phase() == TurnPhase::Streaming).await;
        session.clear();
        drop(tx);
        assert_eq!(driver.await.unwrap(), SubmitOutcome::Stale);
        assert_eq!(session.message_count(), 0);
        assert_eq!(session.subject().as_deref(), Some("2500998765"));
    }

    #[tokio::test]
    async fn same_subject_keeps_history() {
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![text_chunks(&["hi"])]),
            "2500998765",
        );
        session.submit("hello").await;
        assert!(!session.set_subject(Some("2500998765".to_string())));
        assert_eq!(session.message_count(), 2);
        assert!(session.set_subject(None));
        assert_eq!(session.message_count(), 0);
    }

    #[tokio::test]
    async fn no_subject_sends_plain_query() {
        let session = ChatSession::new(ScriptedTransport::with(vec![text_chunks(&["hi"])]));
        assert_eq!(session.submit("hello").await, SubmitOutcome::Completed);
        let request = &session.transport().requests()[0];
        assert_eq!(request.query, "hello");
        assert_eq!(request.thread_id, DEFAULT_THREAD_ID);
    }

    #[tokio::test]
    async fn transcript_round_trip() {
        let session = ChatSession::with_subject(
            ScriptedTransport::with(vec![text_chunks(&["<think>x</think>Paid."])]),
            "2500998765",
        );
        session.submit("Paid?").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        session.save_transcript_to(&path).unwrap();

        let restored = ChatSession::new(ScriptedTransport::default());
        restored.load_transcript_from(&path).unwrap();
        assert_eq!(restored.subject().as_deref(), Some("2500998765"));
        assert_eq!(restored.history(), session.history());
        assert_eq!(restored.generation(), 1);
    }
}
