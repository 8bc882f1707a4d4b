use crate::metadata::{GenerationUpdate, extract_update_generation, parse_arguments};
use weave_core::{Result, WeaveError};

/// Content after this marker is treated as conversational text followed by
/// a JSON trailer carrying the update directly (legacy path).
const DELIMITER: &str = "---";
/// Content after this marker is a JSON array of tool calls (primary path),
/// the convention several local models use to emit function calls inline.
const TOOL_CALLS_MARKER: &str = "[TOOL_CALLS]";

/// The longer of the two markers' byte lengths, minus one: the most bytes
/// a straddling marker could have sitting, unscanned, at the very tail of
/// the accumulator while still being incomplete.
const MAX_UNSAFE_TAIL: usize = TOOL_CALLS_MARKER.len() - 1;

const MAX_ACCUMULATOR_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    DelimiterFired,
    ToolCallsFired,
}

/// Accumulates streamed content tokens and recognizes whichever of the two
/// terminal markers appears first. Once one fires, the other is no longer
/// looked for — they're mutually exclusive from that point.
pub struct ChatStreamParser {
    accumulator: String,
    consumed: usize,
    state: State,
}

impl ChatStreamParser {
    pub fn new() -> Self {
        Self {
            accumulator: String::new(),
            consumed: 0,
            state: State::Streaming,
        }
    }

    pub fn accumulator(&self) -> &str {
        &self.accumulator
    }

    /// Appends one content delta. While still in `Streaming` state, any
    /// consumer-visible prefix (text before whichever marker fires first)
    /// is handed to `on_token`. A delta straddling a marker is split: the
    /// prefix goes to the consumer, the marker and everything after stay
    /// in the accumulator only.
    ///
    /// When no marker has fired yet, a tail that could itself be the
    /// start of a marker split across the next delta is held back rather
    /// than emitted. It reaches the consumer once a later push resolves
    /// it one way or the other, or via [`ChatStreamParser::flush`] at end
    /// of stream.
    ///
    /// Returning an error from `on_token` aborts the push immediately and
    /// is propagated to the caller.
    pub fn push_delta(&mut self, delta: &str, mut on_token: impl FnMut(&str) -> Result<()>) -> Result<()> {
        if self.accumulator.len() + delta.len() > MAX_ACCUMULATOR_BYTES {
            return Err(WeaveError::TooLarge);
        }
        self.accumulator.push_str(delta);

        if self.state != State::Streaming {
            return Ok(());
        }

        let unscanned = &self.accumulator[self.consumed..];
        let delimiter_pos = unscanned.find(DELIMITER);
        let marker_pos = unscanned.find(TOOL_CALLS_MARKER);

        let fire = match (delimiter_pos, marker_pos) {
            (Some(d), Some(m)) if m < d => Some((m, State::ToolCallsFired)),
            (Some(d), _) => Some((d, State::DelimiterFired)),
            (None, Some(m)) => Some((m, State::ToolCallsFired)),
            (None, None) => None,
        };

        match fire {
            Some((offset, new_state)) => {
                let prefix = &unscanned[..offset];
                if !prefix.is_empty() {
                    on_token(prefix)?;
                }
                self.consumed = self.accumulator.len();
                self.state = new_state;
            }
            None => {
                let safe_len = unscanned.len() - unsafe_tail_len(unscanned);
                if safe_len > 0 {
                    on_token(&unscanned[..safe_len])?;
                    self.consumed += safe_len;
                }
            }
        }
        Ok(())
    }

    /// Emits whatever tail is still held back, once the caller knows no
    /// more deltas are coming. A no-op once a marker has already fired —
    /// everything up to that point was flushed when it fired.
    pub fn flush(&mut self, mut on_token: impl FnMut(&str) -> Result<()>) -> Result<()> {
        if self.state != State::Streaming {
            return Ok(());
        }
        let unscanned = &self.accumulator[self.consumed..];
        if !unscanned.is_empty() {
            on_token(unscanned)?;
            self.consumed = self.accumulator.len();
        }
        Ok(())
    }

    /// Extracts the `update_generation` metadata once a marker has fired.
    /// Returns `NoToolCalls` if the stream ended without either firing.
    pub fn finish(&self) -> Result<GenerationUpdate> {
        match self.state {
            State::DelimiterFired => {
                let idx = self
                    .accumulator
                    .find(DELIMITER)
                    .expect("delimiter position tracked by state");
                let trailer = self.accumulator[idx + DELIMITER.len()..].trim();
                let value: serde_json::Value =
                    serde_json::from_str(trailer).map_err(|e| WeaveError::ParseError(e.to_string()))?;
                parse_arguments(&value)
            }
            State::ToolCallsFired => {
                let idx = self
                    .accumulator
                    .find(TOOL_CALLS_MARKER)
                    .expect("marker position tracked by state");
                let tail = self.accumulator[idx + TOOL_CALLS_MARKER.len()..].trim();
                extract_update_generation(tail)
            }
            State::Streaming => Err(WeaveError::NoToolCalls),
        }
    }
}

impl Default for ChatStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// The length of the longest suffix of `s` that is itself a proper prefix
/// of either marker — i.e. the number of trailing bytes of `s` that could
/// still grow into a marker if the next delta continues them. Zero when no
/// such suffix exists, in which case the whole of `s` is safe to emit now.
fn unsafe_tail_len(s: &str) -> usize {
    let max_k = MAX_UNSAFE_TAIL.min(s.len());
    for k in (1..=max_k).rev() {
        let idx = s.len() - k;
        if !s.is_char_boundary(idx) {
            continue;
        }
        let suffix = &s[idx..];
        if DELIMITER.starts_with(suffix) || TOOL_CALLS_MARKER.starts_with(suffix) {
            return k;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(seen: &mut Vec<String>) -> impl FnMut(&str) -> Result<()> + '_ {
        move |t| {
            seen.push(t.to_string());
            Ok(())
        }
    }

    #[test]
    fn tokens_before_delimiter_reach_the_consumer_only() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();

        parser.push_delta("Hello", collect(&mut seen)).unwrap();
        parser.push_delta(" there", collect(&mut seen)).unwrap();
        parser.push_delta("---", collect(&mut seen)).unwrap();

        let trailer = serde_json::json!({
            "prompt": "cat",
            "generate_image": true,
            "steps": 20,
            "cfg": 4.3,
            "seed": -1,
        })
        .to_string();
        parser.push_delta(&trailer, collect(&mut seen)).unwrap();

        assert_eq!(seen, vec!["Hello", " there"]);
        let update = parser.finish().unwrap();
        assert_eq!(update.prompt, "cat");
        assert_eq!(update.steps, 20);
    }

    #[test]
    fn delimiter_split_within_single_token() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();
        parser
            .push_delta("draft text---{\"x\":1}", collect(&mut seen))
            .unwrap();
        assert_eq!(seen, vec!["draft text"]);
    }

    #[test]
    fn delimiter_split_across_multiple_deltas_is_still_recognized() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();

        // Neither "draft text-" nor the trailing "--" contains the full
        // delimiter on its own; only the concatenation does.
        parser.push_delta("draft text-", collect(&mut seen)).unwrap();
        parser.push_delta("--", collect(&mut seen)).unwrap();

        let trailer = serde_json::json!({
            "prompt": "cat", "generate_image": true, "steps": 5, "cfg": 1.0, "seed": 3
        })
        .to_string();
        parser.push_delta(&trailer, collect(&mut seen)).unwrap();

        assert_eq!(seen, vec!["draft text"]);
        let update = parser.finish().unwrap();
        assert_eq!(update.prompt, "cat");
    }

    #[test]
    fn tool_calls_marker_split_across_multiple_deltas_is_still_recognized() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();

        parser.push_delta("thinking...[TOOL", collect(&mut seen)).unwrap();
        let array = serde_json::json!([
            { "function": { "name": "update_generation", "arguments": {
                "prompt": "dog", "generate_image": false, "steps": 10, "cfg": 1.0, "seed": 7
            }}}
        ])
        .to_string();
        parser
            .push_delta(&format!("_CALLS]{array}"), collect(&mut seen))
            .unwrap();

        assert_eq!(seen, vec!["thinking..."]);
        let update = parser.finish().unwrap();
        assert_eq!(update.prompt, "dog");
    }

    #[test]
    fn tool_calls_marker_takes_the_other_path() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();
        parser.push_delta("thinking...", collect(&mut seen)).unwrap();

        let array = serde_json::json!([
            { "function": { "name": "update_generation", "arguments": {
                "prompt": "dog", "generate_image": false, "steps": 10, "cfg": 1.0, "seed": 7
            }}}
        ])
        .to_string();
        parser
            .push_delta(&format!("[TOOL_CALLS]{array}"), collect(&mut seen))
            .unwrap();

        assert_eq!(seen, vec!["thinking..."]);
        let update = parser.finish().unwrap();
        assert_eq!(update.prompt, "dog");
        assert_eq!(update.seed, 7);
    }

    #[test]
    fn consumer_not_called_after_marker_fires() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();
        parser.push_delta("---", collect(&mut seen)).unwrap();
        parser
            .push_delta("more trailing json that must not reach the consumer", collect(&mut seen))
            .unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn accumulator_cap_is_enforced() {
        let mut parser = ChatStreamParser::new();
        let big = "a".repeat(MAX_ACCUMULATOR_BYTES);
        parser.push_delta(&big, |_| Ok(())).unwrap();
        assert!(matches!(
            parser.push_delta("one more byte", |_| Ok(())),
            Err(WeaveError::TooLarge)
        ));
    }

    #[test]
    fn unfired_stream_has_no_metadata() {
        let mut parser = ChatStreamParser::new();
        parser.push_delta("just talking, no tool call", |_| Ok(())).unwrap();
        assert!(matches!(parser.finish(), Err(WeaveError::NoToolCalls)));
    }

    #[test]
    fn flush_emits_the_held_back_tail_when_stream_ends_without_a_marker() {
        let mut parser = ChatStreamParser::new();
        let mut seen = Vec::new();
        // Ends in "--", a proper prefix of the delimiter, so it's held
        // back pending a third "-" that never arrives.
        parser
            .push_delta("just chatting, nothing else--", collect(&mut seen))
            .unwrap();
        assert_eq!(seen, vec!["just chatting, nothing else"]);

        parser.flush(collect(&mut seen)).unwrap();
        assert_eq!(seen.join(""), "just chatting, nothing else--");
    }

    #[test]
    fn flush_is_a_no_op_once_a_marker_has_fired() {
        let mut parser = ChatStreamParser::new();
        parser.push_delta("---{}", |_| Ok(())).unwrap();
        let mut seen = Vec::new();
        parser.flush(collect(&mut seen)).unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn consumer_error_aborts_push_delta() {
        let mut parser = ChatStreamParser::new();
        let result = parser.push_delta("some very long plain text with no marker in it at all", |_| {
            Err(WeaveError::Internal("consumer gave up".into()))
        });
        assert!(matches!(result, Err(WeaveError::Internal(_))));
    }
}
