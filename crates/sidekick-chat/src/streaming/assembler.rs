//! Reply assembly from decoded text chunks
//!
//! The backend interleaves two literal markers with the reply text:
//! [`THINKING_START`] and [`THINKING_END`]. Under the default
//! [`SentinelPolicy::WholeChunk`] a chunk that contains a marker anywhere is
//! treated as that marker alone, and its other text is dropped. The
//! [`SentinelPolicy::Split`] policy cuts markers out of a chunk instead and
//! keeps the text around them.
//!
//! Markers are only recognised inside a single chunk. A marker split across
//! two chunks is ordinary content.
//!
//! Text that arrives while thinking is kept unless
//! [`StreamingReplyAssembler::hide_thinking_text`] is set.

use serde::{Deserialize, Serialize};
use sidekick_common::{Message, SentinelPolicy, THINKING_END, THINKING_START};
use tracing::debug;

/// Text assembled so far and whether the backend is thinking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub accumulated_text: String,
    pub thinking: bool,
}

/// What a single chunk did to the state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A marker set the thinking flag to this value
    Thinking(bool),
    /// Content was appended; carries the updated provisional snapshot
    Snapshot(StreamState),
    /// Content arrived while thinking and was discarded
    Hidden,
}

/// Builds one assistant reply out of the chunks of a single response.
#[derive(Debug, Default)]
pub struct StreamingReplyAssembler {
    state: StreamState,
    policy: SentinelPolicy,
    hide_thinking_text: bool,
    chunks_seen: u64,
}

impl StreamingReplyAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: SentinelPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Discard content received between the start and end markers
    pub fn hide_thinking_text(mut self, hide: bool) -> Self {
        self.hide_thinking_text = hide;
        self
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Feed one decoded chunk
    pub fn process_chunk(&mut self, text: &str) -> Vec<ChunkOutcome> {
        self.chunks_seen += 1;
        match self.policy {
            SentinelPolicy::WholeChunk => vec![self.process_whole(text)],
            SentinelPolicy::Split => self.process_split(text),
        }
    }

    /// End of stream: the final assistant message. Consumes the assembler,
    /// so no provisional state outlives the reply.
    pub fn finish(self) -> Message {
        debug!(
            chunks = self.chunks_seen,
            chars = self.state.accumulated_text.chars().count(),
            "Reply complete"
        );
        Message::assistant(self.state.accumulated_text)
    }

    fn process_whole(&mut self, text: &str) -> ChunkOutcome {
        if text.contains(THINKING_START) {
            self.set_thinking(true)
        } else if text.contains(THINKING_END) {
            self.set_thinking(false)
        } else {
            self.append(text)
        }
    }

    fn process_split(&mut self, text: &str) -> Vec<ChunkOutcome> {
        let mut outcomes = Vec::new();
        let mut rest = text;
        let mut saw_marker = false;

        loop {
            let next = [(THINKING_START, true), (THINKING_END, false)]
                .into_iter()
                .filter_map(|(marker, flag)| rest.find(marker).map(|idx| (idx, marker, flag)))
                .min_by_key(|(idx, _, _)| *idx);

            match next {
                Some((idx, marker, flag)) => {
                    saw_marker = true;
                    if idx > 0 {
                        outcomes.push(self.append(&rest[..idx]));
                    }
                    outcomes.push(self.set_thinking(flag));
                    rest = &rest[idx + marker.len()..];
                }
                None => {
                    // a marker-free chunk always yields a snapshot, even when empty
                    if !rest.is_empty() || !saw_marker {
                        outcomes.push(self.append(rest));
                    }
                    break;
                }
            }
        }
        outcomes
    }

    fn set_thinking(&mut self, thinking: bool) -> ChunkOutcome {
        debug!(thinking, "Thinking marker");
        self.state.thinking = thinking;
        ChunkOutcome::Thinking(thinking)
    }

    fn append(&mut self, text: &str) -> ChunkOutcome {
        if self.hide_thinking_text && self.state.thinking {
            return ChunkOutcome::Hidden;
        }
        self.state.accumulated_text.push_str(text);
        ChunkOutcome::Snapshot(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidekick_common::Role;

    fn run(policy: SentinelPolicy, chunks: &[&str]) -> (Vec<ChunkOutcome>, Message) {
        let mut assembler = StreamingReplyAssembler::with_policy(policy);
        let outcomes = chunks
            .iter()
            .flat_map(|chunk| assembler.process_chunk(chunk))
            .collect();
        (outcomes, assembler.finish())
    }

    #[test]
    fn test_plain_chunks_concatenate() {
        let chunks = ["The ", "quick ", "brown ", "fox"];
        let (outcomes, message) = run(SentinelPolicy::WholeChunk, &chunks);

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text, chunks.concat());
        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[1],
            ChunkOutcome::Snapshot(StreamState {
                accumulated_text: "The quick ".to_string(),
                thinking: false,
            })
        );
    }

    #[test]
    fn test_exact_markers_toggle_without_text() {
        let mut assembler = StreamingReplyAssembler::new();
        assert_eq!(
            assembler.process_chunk(THINKING_START),
            vec![ChunkOutcome::Thinking(true)]
        );
        assert!(assembler.state().thinking);
        assert_eq!(assembler.state().accumulated_text, "");

        assert_eq!(
            assembler.process_chunk(THINKING_END),
            vec![ChunkOutcome::Thinking(false)]
        );
        assert!(!assembler.state().thinking);
        assert_eq!(assembler.finish().text, "");
    }

    #[test]
    fn test_mixed_chunks_drop_content_by_default() {
        let chunks = [
            "Hello, ",
            "world__THINKING_START__",
            "ignored",
            "__THINKING_END__",
            "!",
        ];
        let mut assembler = StreamingReplyAssembler::new();
        let mut thinking_after = Vec::new();
        for chunk in chunks {
            assembler.process_chunk(chunk);
            thinking_after.push(assembler.state().thinking);
        }

        // "ignored" arrives while thinking but has no marker, so it is content
        assert_eq!(thinking_after, vec![false, true, true, false, false]);
        assert_eq!(assembler.finish().text, "Hello, ignored!");
    }

    #[test]
    fn test_end_marker_with_content_drops_content() {
        let mut assembler = StreamingReplyAssembler::new();
        assembler.process_chunk(THINKING_START);
        assert_eq!(
            assembler.process_chunk("x__THINKING_END__y"),
            vec![ChunkOutcome::Thinking(false)]
        );
        assert!(!assembler.state().thinking);
        assert_eq!(assembler.state().accumulated_text, "");
        assert_eq!(assembler.finish().text, "");
    }

    #[test]
    fn test_hidden_thinking_text() {
        let chunks = [
            "Hello, ",
            "world__THINKING_START__",
            "ignored",
            "__THINKING_END__",
            "!",
        ];
        let mut assembler = StreamingReplyAssembler::new().hide_thinking_text(true);
        let outcomes: Vec<_> = chunks
            .iter()
            .flat_map(|chunk| assembler.process_chunk(chunk))
            .collect();

        assert_eq!(outcomes[2], ChunkOutcome::Hidden);
        assert_eq!(assembler.finish().text, "Hello, !");
    }

    #[test]
    fn test_start_marker_wins_when_both_present() {
        let mut assembler = StreamingReplyAssembler::new();
        let outcomes = assembler.process_chunk("__THINKING_END__ then __THINKING_START__");
        assert_eq!(outcomes, vec![ChunkOutcome::Thinking(true)]);
    }

    #[test]
    fn test_near_miss_markers_are_content() {
        let chunks = ["__THINKING__", "__thinking_start__", "THINKING_END"];
        let (outcomes, message) = run(SentinelPolicy::WholeChunk, &chunks);
        assert!(outcomes.iter().all(|o| matches!(o, ChunkOutcome::Snapshot(_))));
        assert_eq!(message.text, chunks.concat());
    }

    #[test]
    fn test_marker_split_across_chunks_is_content() {
        let (_, message) = run(SentinelPolicy::WholeChunk, &["__THINKING_", "START__"]);
        assert_eq!(message.text, "__THINKING_START__");
    }

    #[test]
    fn test_empty_chunk_still_snapshots() {
        let mut assembler = StreamingReplyAssembler::new();
        assert_eq!(
            assembler.process_chunk(""),
            vec![ChunkOutcome::Snapshot(StreamState::default())]
        );
    }

    #[test]
    fn test_no_chunks_gives_empty_reply() {
        let (outcomes, message) = run(SentinelPolicy::WholeChunk, &[]);
        assert!(outcomes.is_empty());
        assert_eq!(message, Message::assistant(""));
    }

    #[test]
    fn test_same_input_same_reply() {
        let chunks = ["a", THINKING_START, "b", THINKING_END, "c"];
        let (first_outcomes, first) = run(SentinelPolicy::WholeChunk, &chunks);
        let (second_outcomes, second) = run(SentinelPolicy::WholeChunk, &chunks);
        assert_eq!(first, second);
        assert_eq!(first_outcomes, second_outcomes);
    }

    #[test]
    fn test_split_policy_keeps_surrounding_text() {
        let chunks = [
            "Hello, ",
            "world__THINKING_START__",
            "ignored",
            "__THINKING_END__",
            "!",
        ];
        let (outcomes, message) = run(SentinelPolicy::Split, &chunks);
        assert_eq!(message.text, "Hello, worldignored!");
        assert_eq!(
            outcomes
                .iter()
                .filter_map(|o| match o {
                    ChunkOutcome::Thinking(flag) => Some(*flag),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![true, false]
        );
    }

    #[test]
    fn test_split_policy_orders_markers_within_chunk() {
        let mut assembler = StreamingReplyAssembler::with_policy(SentinelPolicy::Split);
        let outcomes = assembler.process_chunk("a__THINKING_START__b__THINKING_END__c");
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[1], ChunkOutcome::Thinking(true));
        assert_eq!(outcomes[3], ChunkOutcome::Thinking(false));
        assert!(!assembler.state().thinking);
        assert_eq!(assembler.finish().text, "abc");
    }

    #[test]
    fn test_split_policy_bare_marker_matches_whole_chunk() {
        let (split, split_msg) = run(SentinelPolicy::Split, &[THINKING_START, "x", THINKING_END]);
        let (whole, whole_msg) =
            run(SentinelPolicy::WholeChunk, &[THINKING_START, "x", THINKING_END]);
        assert_eq!(split, whole);
        assert_eq!(split_msg, whole_msg);
    }
}
