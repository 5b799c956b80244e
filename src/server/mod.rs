//! Tool server runtime
//!
//! Reads one request per line, dispatches it against the [`ToolCatalog`] and
//! writes exactly one response line back. Malformed input never ends the
//! loop; only end-of-input or the shutdown future does.

mod signal;

use std::future::Future;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::error::{Result, ShopError};
use crate::protocol::{
    LineRead, MAX_LINE_BYTES, Methods, PROTOCOL_VERSION, ResponseEnvelope, RpcError, encode_line, read_bounded_line,
};
use crate::tools::ToolCatalog;

pub use signal::ShutdownSignal;

/// Why [`ToolServer::serve`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    Shutdown,
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub requests: u64,
    pub errors: u64,
    pub reason: StopReason,
}

/// Stdio tool server
#[derive(Debug, Clone)]
pub struct ToolServer {
    catalog: Arc<ToolCatalog>,
    name: String,
    version: String,
}

impl ToolServer {
    pub fn new(catalog: Arc<ToolCatalog>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            catalog,
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ToolCatalog::from_config(&config.catalog)),
            config.server.name.clone(),
            config.server.version.clone(),
        )
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Handle one raw frame. Bytes that are not UTF-8 get a parse error.
    pub fn handle_bytes(&self, bytes: &[u8]) -> Option<ResponseEnvelope> {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.handle_line(line),
            Err(e) => {
                log::warn!("Request line is not valid UTF-8: {}", e);
                Some(ResponseEnvelope::error(
                    Value::Null,
                    RpcError::parse_error(format!("Parse error: request is not valid UTF-8 ({})", e)),
                ))
            }
        }
    }

    /// Handle one raw input line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<ResponseEnvelope> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Unparseable request line: {}", e);
                return Some(ResponseEnvelope::error(
                    Value::Null,
                    RpcError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let Some(obj) = value.as_object() else {
            return Some(ResponseEnvelope::error(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = obj.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Some(ResponseEnvelope::error(
                id,
                RpcError::invalid_request("Request is missing a string 'method'"),
            ));
        };

        Some(self.dispatch(id, method, obj.get("params")))
    }

    fn dispatch(&self, id: Value, method: &str, params: Option<&Value>) -> ResponseEnvelope {
        log::debug!("Dispatching {} (id {})", method, id);
        match method {
            Methods::INITIALIZE => ResponseEnvelope::success(id, self.initialize_result()),
            Methods::TOOLS_LIST => ResponseEnvelope::success(id, json!({ "tools": self.catalog.descriptors() })),
            Methods::TOOLS_CALL => self.handle_tools_call(id, params),
            other => {
                log::warn!("Unknown method: {}", other);
                ResponseEnvelope::error(id, RpcError::method_not_found(other))
            }
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            }
        })
    }

    fn handle_tools_call(&self, id: Value, params: Option<&Value>) -> ResponseEnvelope {
        let Some(params) = params.and_then(Value::as_object) else {
            return ResponseEnvelope::error(id, RpcError::invalid_params("tools/call requires params {name, arguments}"));
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return ResponseEnvelope::error(id, RpcError::invalid_params("params.name must be a string"));
        };

        match self.catalog.call(name, params.get("arguments")) {
            Ok(result) => {
                if result.is_error {
                    log::info!("Tool {} rejected its arguments", name);
                }
                match serde_json::to_value(&result) {
                    Ok(value) => ResponseEnvelope::success(id, value),
                    Err(e) => ResponseEnvelope::error(id, RpcError::internal(e.to_string())),
                }
            }
            Err(e) => {
                log::warn!("Malformed arguments for {}: {}", name, e);
                ResponseEnvelope::error(id, RpcError::invalid_params(e.to_string()))
            }
        }
    }

    /// Run the request loop until end-of-input or until `shutdown` resolves.
    pub async fn serve<R, W, S>(&self, mut reader: R, mut writer: W, shutdown: S) -> Result<ServeStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = ServeStats {
            requests: 0,
            errors: 0,
            reason: StopReason::EndOfInput,
        };
        let mut buf = Vec::new();

        log::info!("{} v{} serving {} tools", self.name, self.version, self.catalog.len());

        loop {
            let read = tokio::select! {
                _ = &mut shutdown => {
                    stats.reason = StopReason::Shutdown;
                    break;
                }
                read = read_bounded_line(&mut reader, &mut buf, MAX_LINE_BYTES) => read?,
            };

            let response = match read {
                LineRead::Eof => break,
                LineRead::Oversized => {
                    log::warn!("Discarded a request line over {} bytes", MAX_LINE_BYTES);
                    Some(ResponseEnvelope::error(
                        Value::Null,
                        RpcError::parse_error(format!("Parse error: request exceeds {} bytes", MAX_LINE_BYTES)),
                    ))
                }
                LineRead::Line => self.handle_bytes(&buf),
            };
            let Some(response) = response else {
                continue;
            };

            stats.requests += 1;
            if !response.is_success() {
                stats.errors += 1;
            }

            let mut frame = encode_line(&response)?;
            frame.push('\n');
            writer
                .write_all(frame.as_bytes())
                .await
                .map_err(|e| ShopError::Transport(format!("Failed to write response: {}", e)))?;
            writer
                .flush()
                .await
                .map_err(|e| ShopError::Transport(format!("Failed to flush response: {}", e)))?;
        }

        log::info!(
            "Server loop finished ({:?}): {} requests, {} errors",
            stats.reason,
            stats.requests,
            stats.errors
        );
        Ok(stats)
    }

    /// Serve on the process's own stdin/stdout until EOF or SIGINT/SIGTERM.
    pub async fn serve_stdio(&self) -> Result<ServeStats> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        let mut shutdown = ShutdownSignal::install();
        self.serve(stdin, stdout, async move { shutdown.recv().await }).await
    }
}
