use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use super::{LineTransport, check_frame, read_reply};
use crate::error::{Result, ShopError};
use crate::server::{ServeStats, ToolServer};

const PIPE_CAPACITY: usize = 256 * 1024;

/// Runs a [`ToolServer`] on a background task over an in-memory pipe.
///
/// Same framing and same server loop as the process transport, minus the
/// child process.
pub struct InMemoryTransport {
    writer: Option<WriteHalf<DuplexStream>>,
    reader: BufReader<ReadHalf<DuplexStream>>,
    task: Option<JoinHandle<Result<ServeStats>>>,
}

impl InMemoryTransport {
    pub fn start(server: ToolServer) -> Self {
        let (client_end, server_end) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_read, server_write) = tokio::io::split(server_end);
        let task = tokio::spawn(async move {
            server
                .serve(BufReader::new(server_read), server_write, std::future::pending())
                .await
        });

        let (client_read, client_write) = tokio::io::split(client_end);
        Self {
            writer: Some(client_write),
            reader: BufReader::new(client_read),
            task: Some(task),
        }
    }
}

#[async_trait]
impl LineTransport for InMemoryTransport {
    async fn send(&mut self, line: &str) -> Result<()> {
        check_frame(line)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ShopError::Transport("in-process server already closed".to_string()))?;
        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| ShopError::Transport(e.to_string()))?;
        writer.flush().await.map_err(|e| ShopError::Transport(e.to_string()))
    }

    async fn receive_line(&mut self) -> Result<Option<String>> {
        read_reply(&mut self.reader, "in-process server").await
    }

    async fn terminate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            // EOF on the server's input ends its loop
            let _ = writer.shutdown().await;
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Ok(stats)) => {
                log::debug!("In-process server stopped after {} requests", stats.requests);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(ShopError::Transport(format!("in-process server task failed: {}", e))),
        }
    }
}
