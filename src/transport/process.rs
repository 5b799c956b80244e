use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{LineTransport, check_frame, read_reply};
use crate::error::{Result, ShopError};

/// Child process spoken to over its stdin/stdout.
///
/// The child's stderr is inherited so its diagnostics reach the terminal
/// without touching the protocol stream.
pub struct ProcessTransport {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    grace: Duration,
    terminated: bool,
}

impl ProcessTransport {
    /// Spawn `program` with `args`. Either both pipes are connected or the
    /// child is killed and an error returned.
    pub fn spawn<S: AsRef<OsStr>>(program: impl AsRef<OsStr>, args: &[S]) -> Result<Self> {
        let program_name = program.as_ref().to_string_lossy().into_owned();
        let mut child = Command::new(program.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShopError::Spawn {
                program: program_name.clone(),
                reason: e.to_string(),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.start_kill();
            return Err(ShopError::Spawn {
                program: program_name,
                reason: "child pipes were not captured".to_string(),
            });
        };

        log::info!("Spawned tool server {} (pid {:?})", program_name, child.id());
        Ok(Self {
            program: program_name,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            grace: Duration::from_secs(5),
            terminated: false,
        })
    }

    /// How long `terminate` waits for a voluntary exit before killing.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl LineTransport for ProcessTransport {
    async fn send(&mut self, line: &str) -> Result<()> {
        check_frame(line)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShopError::Transport("tool server input already closed".to_string()))?;

        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');

        stdin
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| ShopError::Transport(format!("Failed to write to {}: {}", self.program, e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| ShopError::Transport(format!("Failed to flush to {}: {}", self.program, e)))?;
        Ok(())
    }

    async fn receive_line(&mut self) -> Result<Option<String>> {
        read_reply(&mut self.stdout, &self.program).await
    }

    async fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        // Closing stdin is the server's cue to finish
        drop(self.stdin.take());

        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                log::info!("Tool server {} exited with {}", self.program, status);
                Ok(())
            }
            Ok(Err(e)) => Err(ShopError::Transport(format!("Failed to reap {}: {}", self.program, e))),
            Err(_) => {
                log::warn!(
                    "Tool server {} did not exit within {}ms, killing it",
                    self.program,
                    self.grace.as_millis()
                );
                self.child
                    .kill()
                    .await
                    .map_err(|e| ShopError::Transport(format!("Failed to kill {}: {}", self.program, e)))
            }
        }
    }
}
