//! Separation of in-band reasoning from answer text.
//!
//! Assistant output may carry any number of `<think>...</think>` segments.  [`extract`] splits a
//! complete (or partially streamed) message into its reasoning and its answer; it is recomputed on
//! every render and never fails.  [`ReasoningScanner`] is the incremental counterpart for
//! terminals that print text as it arrives and cannot re-render what they already printed.

/// Marker opening a reasoning segment.
pub const THINK_OPEN: &str = "<think>";

/// Marker closing a reasoning segment.
pub const THINK_CLOSE: &str = "</think>";

/// Separator placed between reasoning segments when they are joined into one thought.
pub const THOUGHT_SEPARATOR: &str = "\n\n---\n\n";

/// The reasoning/answer split of one message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReasoningSplit {
    /// Every reasoning segment, trimmed and joined with [`THOUGHT_SEPARATOR`].  `None` when the
    /// content has no complete segment.
    pub thought: Option<String>,
    /// The content with all segments removed.
    pub answer: String,
    segments: Vec<String>,
}

impl ReasoningSplit {
    /// Returns the individual reasoning segments, trimmed, in document order.
    pub fn segments(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }
}

/// Split `content` into reasoning and answer.
///
/// With no complete segment the content is returned untouched as the answer.  Otherwise each
/// segment's inner text is trimmed and joined in document order, and the answer is what remains
/// once every segment (delimiters included) is cut out, trimmed once.  An opening marker without
/// a matching close is not a segment and stays in the answer.
///
/// Cutting a segment out can join the text around it into a fresh marker pair; excision repeats
/// until none remain, so `extract(&extract(c).answer).thought` is always `None`.
pub fn extract(content: &str) -> ReasoningSplit {
    let mut segments = Vec::new();
    let mut remaining = excise(content, &mut segments);
    if segments.is_empty() {
        return ReasoningSplit {
            thought: None,
            answer: content.to_string(),
            segments,
        };
    }
    loop {
        let found = segments.len();
        let next = excise(&remaining, &mut segments);
        if segments.len() == found {
            break;
        }
        remaining = next;
    }
    let segments: Vec<String> = segments
        .iter()
        .map(|segment| segment.trim().to_string())
        .collect();
    ReasoningSplit {
        thought: Some(segments.join(THOUGHT_SEPARATOR)),
        answer: remaining.trim().to_string(),
        segments,
    }
}

// One left-to-right pass: push the inner text of each non-overlapping segment and return the
// content with those segments removed.
fn excise(content: &str, segments: &mut Vec<String>) -> String {
    let mut answer = String::with_capacity(content.len());
    let mut cursor = 0;
    while let Some(offset) = content[cursor..].find(THINK_OPEN) {
        let open = cursor + offset;
        let inner = open + THINK_OPEN.len();
        let Some(offset) = content[inner..].find(THINK_CLOSE) else {
            // No close after this open means no close after any later open either.
            break;
        };
        let close = inner + offset;
        answer.push_str(&content[cursor..open]);
        segments.push(content[inner..close].to_string());
        cursor = close + THINK_CLOSE.len();
    }
    answer.push_str(&content[cursor..]);
    answer
}

///////////////////////////////////////// Streaming /////////////////////////////////////////

/// Classified output of a [`ReasoningScanner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReasoningEvent {
    /// An opening marker was consumed.
    ThoughtStart,
    /// Text inside a reasoning segment.
    Thought(String),
    /// A closing marker was consumed, or the stream ended inside a segment.
    ThoughtEnd,
    /// Text outside any reasoning segment.
    Answer(String),
}

/// Incremental reasoning detector for text that arrives in chunks.
///
/// Markers may be split across chunks; the scanner holds back the shortest tail that could still
/// become a marker and releases it with the next chunk or [`ReasoningScanner::finish`].  Unlike
/// [`extract`] it cannot look ahead, so an opening marker that is never closed is reported as
/// thought until the stream ends.
#[derive(Debug, Default)]
pub struct ReasoningScanner {
    in_thought: bool,
    held: String,
}

impl ReasoningScanner {
    /// Creates a scanner positioned outside any segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while the scanner is inside a reasoning segment.
    pub fn is_thinking(&self) -> bool {
        self.in_thought
    }

    /// Feed the next chunk of text.
    pub fn push(&mut self, text: &str) -> Vec<ReasoningEvent> {
        let mut buffer = std::mem::take(&mut self.held);
        buffer.push_str(text);
        let mut events = Vec::new();
        loop {
            let marker = if self.in_thought {
                THINK_CLOSE
            } else {
                THINK_OPEN
            };
            if let Some(pos) = buffer.find(marker) {
                self.emit(&buffer[..pos], &mut events);
                if self.in_thought {
                    events.push(ReasoningEvent::ThoughtEnd);
                } else {
                    events.push(ReasoningEvent::ThoughtStart);
                }
                self.in_thought = !self.in_thought;
                buffer.drain(..pos + marker.len());
                continue;
            }
            let keep = partial_marker_len(&buffer, marker);
            let split = buffer.len() - keep;
            self.emit(&buffer[..split], &mut events);
            self.held = buffer[split..].to_string();
            return events;
        }
    }

    /// Flush held text at end of stream.
    pub fn finish(&mut self) -> Vec<ReasoningEvent> {
        let mut events = Vec::new();
        let held = std::mem::take(&mut self.held);
        self.emit(&held, &mut events);
        if self.in_thought {
            events.push(ReasoningEvent::ThoughtEnd);
            self.in_thought = false;
        }
        events
    }

    fn emit(&self, text: &str, events: &mut Vec<ReasoningEvent>) {
        if text.is_empty() {
            return;
        }
        if self.in_thought {
            events.push(ReasoningEvent::Thought(text.to_string()));
        } else {
            events.push(ReasoningEvent::Answer(text.to_string()));
        }
    }
}

// Length of the longest proper prefix of `marker` that `text` ends with.  Markers are ASCII, so
// the split point is always a char boundary.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markers_is_identity() {
        let content = "  The claim was paid in full.  ";
        let split = extract(content);
        assert_eq!(split.thought, None);
        assert_eq!(split.answer, content);
    }

    #[test]
    fn single_segment() {
        let split = extract(
            "<think>Checking adjustment codes</think>The claim was denied under category CO, reason code 96.",
        );
        assert_eq!(split.thought.as_deref(), Some("Checking adjustment codes"));
        assert_eq!(
            split.answer,
            "The claim was denied under category CO, reason code 96."
        );
    }

    #[test]
    fn multiple_segments_in_document_order() {
        let content = "<think> first </think>Paid $120.<think>\nsecond\n</think> Patient owes $0.";
        let split = extract(content);
        assert_eq!(split.thought.as_deref(), Some("first\n\n---\n\nsecond"));
        assert_eq!(split.segments(), vec!["first", "second"]);
        assert_eq!(split.answer, "Paid $120. Patient owes $0.");
        assert!(!split.answer.contains(THINK_OPEN));
        assert!(!split.answer.contains(THINK_CLOSE));
    }

    #[test]
    fn separator_inside_segment_is_not_a_boundary() {
        let split = extract("<think>step one\n\n---\n\nstep two</think>Denied.");
        assert_eq!(split.segments(), vec!["step one\n\n---\n\nstep two"]);
        assert_eq!(split.thought.as_deref(), Some("step one\n\n---\n\nstep two"));
        assert_eq!(split.answer, "Denied.");
    }

    #[test]
    fn empty_segment_counts() {
        let split = extract("<think></think> answer ");
        assert_eq!(split.thought.as_deref(), Some(""));
        assert_eq!(split.answer, "answer");
    }

    #[test]
    fn unterminated_open_stays_in_answer() {
        let content = "Looking<think>still reasoning about CARC 96";
        let split = extract(content);
        assert_eq!(split.thought, None);
        assert_eq!(split.answer, content);
    }

    #[test]
    fn unterminated_open_after_segment() {
        let split = extract("<think>a</think> Denied. <think>partial");
        assert_eq!(split.thought.as_deref(), Some("a"));
        assert_eq!(split.answer, "Denied. <think>partial");
    }

    #[test]
    fn stray_close_stays_in_answer() {
        let split = extract("done</think> here");
        assert_eq!(split.thought, None);
        assert_eq!(split.answer, "done</think> here");
    }

    #[test]
    fn nested_open_runs_to_first_close() {
        let split = extract("<think>a<think>b</think>c</think>d");
        assert_eq!(split.thought.as_deref(), Some("a<think>b"));
        assert_eq!(split.answer, "c</think>d");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "",
            "plain",
            "<think>x</think>y",
            "<think>x</think>y<think>z",
            "<thi<think>x</think>nk>y</think>z",
            "a</think><think>b</think>c",
        ];
        for input in inputs {
            let first = extract(input);
            assert_eq!(extract(input), first);
            assert_eq!(extract(&first.answer).thought, None, "input: {input:?}");
        }
    }

    #[test]
    fn spliced_markers_are_excised() {
        let split = extract("<thi<think>x</think>nk>y</think>z");
        assert_eq!(split.thought.as_deref(), Some("x\n\n---\n\ny"));
        assert_eq!(split.answer, "z");
    }

    #[test]
    fn scanner_splits_thought_and_answer() {
        let mut scanner = ReasoningScanner::new();
        let mut events = scanner.push("<think>Checking</think>Denied.");
        events.extend(scanner.finish());
        assert_eq!(
            events,
            vec![
                ReasoningEvent::ThoughtStart,
                ReasoningEvent::Thought("Checking".to_string()),
                ReasoningEvent::ThoughtEnd,
                ReasoningEvent::Answer("Denied.".to_string()),
            ]
        );
    }

    #[test]
    fn scanner_handles_markers_split_across_chunks() {
        let mut scanner = ReasoningScanner::new();
        let mut events = Vec::new();
        for chunk in ["Hi <th", "ink>why", "</thi", "nk> because"] {
            events.extend(scanner.push(chunk));
        }
        events.extend(scanner.finish());
        assert_eq!(
            events,
            vec![
                ReasoningEvent::Answer("Hi ".to_string()),
                ReasoningEvent::ThoughtStart,
                ReasoningEvent::Thought("why".to_string()),
                ReasoningEvent::ThoughtEnd,
                ReasoningEvent::Answer(" because".to_string()),
            ]
        );
    }

    #[test]
    fn scanner_releases_false_marker_prefix() {
        let mut scanner = ReasoningScanner::new();
        assert_eq!(
            scanner.push("a <t"),
            vec![ReasoningEvent::Answer("a ".to_string())]
        );
        assert_eq!(
            scanner.push("able>"),
            vec![ReasoningEvent::Answer("<table>".to_string())]
        );
        assert!(scanner.finish().is_empty());
    }

    #[test]
    fn scanner_closes_unterminated_thought_on_finish() {
        let mut scanner = ReasoningScanner::new();
        let mut events = scanner.push("<think>never closed <");
        assert!(scanner.is_thinking());
        events.extend(scanner.finish());
        assert_eq!(
            events,
            vec![
                ReasoningEvent::ThoughtStart,
                ReasoningEvent::Thought("never closed ".to_string()),
                ReasoningEvent::Thought("<".to_string()),
                ReasoningEvent::ThoughtEnd,
            ]
        );
        assert!(!scanner.is_thinking());
    }
}
