//! Incremental parser for streamed chat-completion frames
//!
//! The endpoint sends `data: {json}` lines; `json.choices[0].delta.content`
//! is the next text fragment and `data: [DONE]` ends the stream. Chunks from
//! the network may split a line anywhere, so bytes are buffered until a
//! newline arrives.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Fragment(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns every complete frame they finish.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.take_line(&line, &mut frames);
        }
        frames
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.take_line(&rest, &mut frames);
        }
        frames
    }

    fn take_line(&mut self, line: &[u8], frames: &mut Vec<Frame>) {
        if self.done {
            return;
        }
        let text = String::from_utf8_lossy(line);
        if let Some(frame) = parse_line(&text) {
            if frame == Frame::Done {
                self.done = true;
            }
            frames.push(frame);
        }
    }
}

/// Parse one event line. Keep-alives, comments, malformed JSON and
/// empty deltas yield `None`.
pub fn parse_line(line: &str) -> Option<Frame> {
    let data = line.trim().strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(Frame::Done);
    }
    let json: Value = serde_json::from_str(data).ok()?;
    let text = json["choices"]
        .get(0)
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)?;
    if text.is_empty() {
        None
    } else {
        Some(Frame::Fragment(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> Frame {
        Frame::Fragment(text.to_string())
    }

    #[test]
    fn parses_fragments_until_done() {
        let body = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\
                     data: [DONE]\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n";
        let mut parser = SseFrameParser::new();
        let frames = parser.push(body);
        assert_eq!(frames, vec![fragment("Hello"), fragment(" world"), Frame::Done]);
        assert!(parser.is_done());
    }

    #[test]
    fn buffers_lines_split_across_chunks() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"data: {\"choices\":[{\"del").is_empty());
        let frames = parser.push(b"ta\":{\"content\":\"joined\"}}]}\n");
        assert_eq!(frames, vec![fragment("joined")]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"接下来\"}}]}\n".as_bytes();
        let (head, tail) = line.split_at(43);
        let mut parser = SseFrameParser::new();
        let mut frames = parser.push(head);
        frames.extend(parser.push(tail));
        assert_eq!(frames, vec![fragment("接下来")]);
    }

    #[test]
    fn malformed_and_keepalive_lines_are_skipped() {
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("data: {not json"), None);
        assert_eq!(parse_line("data: {\"choices\":[{\"delta\":{}}]}"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"data: [DONE]").is_empty());
        assert_eq!(parser.finish(), vec![Frame::Done]);
    }
}
