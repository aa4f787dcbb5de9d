//! Incremental line decoder for server-sent events.
//!
//! Bytes are buffered until a newline arrives; only complete lines are ever decoded,
//! so a frame (or a multibyte character) split across reads is reassembled rather
//! than misparsed. The trailing partial line always stays in the buffer.

/// Payload carried by one SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `data: <payload>` with the payload as sent.
    Data(String),
    /// The `data: [DONE]` terminator. Never parsed as JSON.
    Done,
}

#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning the payload lines it completed.
    ///
    /// `event:` lines, comments and blank lines are dropped; only `data:` lines
    /// carry anything in the responses protocol.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(line) = parse_line(&self.buffer[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        lines
    }

    /// Bytes of the incomplete line still waiting for its newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);

    if line.trim().is_empty() || line.starts_with("event:") {
        return None;
    }

    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data == "[DONE]" {
        return Some(SseLine::Done);
    }
    Some(SseLine::Data(data.to_string()))
}
