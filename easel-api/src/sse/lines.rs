use bytes::BytesMut;
use std::io;
use tokio_util::codec::Decoder;
use tracing::trace;

/// Splits a streamed body into `\n`-terminated lines.
///
/// Bytes are buffered until a newline arrives, so a line (or a multi-byte
/// character) split across chunks decodes exactly as if it had arrived in
/// one piece. A trailing `\r` is dropped. An unterminated fragment left when
/// the body ends is discarded.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    /// Offset in the buffer already scanned for a newline.
    next_index: usize,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for SseLineDecoder {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = buf.len();
            return Ok(None);
        };

        let newline_index = self.next_index + offset;
        self.next_index = 0;
        let mut line = buf.split_to(newline_index + 1);
        line.truncate(newline_index);
        if line.last() == Some(&b'\r') {
            line.truncate(newline_index - 1);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if !buf.is_empty() {
            trace!(bytes = buf.len(), "discarding unterminated trailing line");
            buf.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

/// Classification of one decoded body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// `data: <payload>` with the prefix stripped.
    Data(&'a str),
    /// `data: [DONE]`.
    Done,
    /// Blank lines, comments, `event:`/`id:` fields and anything else.
    Ignored,
}

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

pub fn classify_line(line: &str) -> SseLine<'_> {
    if line.trim().is_empty() {
        return SseLine::Ignored;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(DONE_SENTINEL) => SseLine::Done,
        Some(payload) => SseLine::Data(payload),
        None => SseLine::Ignored,
    }
}
