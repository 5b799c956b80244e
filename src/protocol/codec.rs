//! Newline-delimited JSON framing.
//!
//! A frame is one compact JSON document followed by a single `\n`. serde_json
//! escapes newlines inside strings, so an encoded message never spans lines.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Result, ShopError};

/// Upper bound for a single line (16 MB).
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Encode a message as one line, without the terminator.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String> {
    let line = serde_json::to_string(msg)?;
    if line.len() > MAX_LINE_BYTES {
        return Err(ShopError::Transport(format!(
            "Message too large: {} > {}",
            line.len(),
            MAX_LINE_BYTES
        )));
    }
    Ok(line)
}

/// Decode one line. Failures keep the raw text so callers can report it.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    let trimmed = strip_terminator(line);
    serde_json::from_str(trimmed).map_err(|e| ShopError::protocol(format!("invalid JSON: {}", e), trimmed))
}

/// Outcome of [`read_bounded_line`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// No bytes before end-of-stream
    Eof,
    /// A complete line (or a final unterminated one) is in the buffer
    Line,
    /// The line ran past the limit; the buffer holds its first `limit + 1`
    /// bytes and the remainder up to the next `\n` has been discarded
    Oversized,
}

/// Read one line into `buf` without ever buffering more than `limit + 1`
/// bytes of it. An oversized line is consumed in full so the next read
/// starts on a frame boundary.
pub async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(limit as u64 + 1).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.len() <= limit || buf.ends_with(b"\n") {
        return Ok(LineRead::Line);
    }

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if done {
            break;
        }
    }
    Ok(LineRead::Oversized)
}

/// Drop a trailing `\n` or `\r\n`.
pub fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}
