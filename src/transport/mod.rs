//! Line transports between the client and a tool server
//!
//! Defines the [`LineTransport`] trait plus two implementations:
//! - [`ProcessTransport`] drives a spawned child over its stdin/stdout
//! - [`InMemoryTransport`] runs a [`crate::server::ToolServer`] in-process

mod memory;
mod process;

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use crate::error::{Result, ShopError};
use crate::protocol::{LineRead, MAX_LINE_BYTES, read_bounded_line, strip_terminator};

pub use memory::InMemoryTransport;
pub use process::ProcessTransport;

/// A bidirectional channel carrying one JSON document per line
#[async_trait]
pub trait LineTransport: Send {
    /// Write one line. The terminator is appended by the transport.
    async fn send(&mut self, line: &str) -> Result<()>;

    /// Read the next line without its terminator; `None` at end-of-stream.
    async fn receive_line(&mut self) -> Result<Option<String>>;

    /// Close the channel and release the peer. Safe to call more than once.
    async fn terminate(&mut self) -> Result<()>;
}

/// Reject lines that would break framing.
pub(crate) fn check_frame(line: &str) -> Result<()> {
    if line.contains('\n') {
        return Err(ShopError::Transport(
            "refusing to send a line containing a newline".to_string(),
        ));
    }
    Ok(())
}

/// Bytes of an oversized reply kept for diagnostics
const OVERSIZED_PREVIEW: usize = 256;

/// Read one reply line from `peer`, capped at [`MAX_LINE_BYTES`].
///
/// Oversized and non-UTF-8 replies are protocol faults carrying the
/// offending text (lossily decoded, truncated when oversized).
pub(crate) async fn read_reply<R>(reader: &mut R, peer: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut buf = Vec::new();
    let read = read_bounded_line(reader, &mut buf, MAX_LINE_BYTES)
        .await
        .map_err(|e| ShopError::Transport(format!("Failed to read from {}: {}", peer, e)))?;
    match read {
        LineRead::Eof => Ok(None),
        LineRead::Oversized => {
            let preview = String::from_utf8_lossy(&buf[..buf.len().min(OVERSIZED_PREVIEW)]).into_owned();
            Err(ShopError::protocol(format!("reply exceeds {} bytes", MAX_LINE_BYTES), preview))
        }
        LineRead::Line => match String::from_utf8(buf) {
            Ok(line) => Ok(Some(strip_terminator(&line).to_string())),
            Err(e) => Err(ShopError::protocol(
                "reply is not valid UTF-8",
                strip_terminator(&String::from_utf8_lossy(e.as_bytes())).to_string(),
            )),
        },
    }
}
