//! Protocol client: handshake, tool discovery and tool calls over a
//! [`LineTransport`]
//!
//! The channel is strictly half-duplex. Each request is written and then the
//! very next line read is taken as its reply; there is no id correlation.
//! After a timeout the pairing can no longer be trusted, so the client
//! refuses further requests.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Result, ShopError};
use crate::protocol::{RequestEnvelope, ResponseEnvelope, ServerIdentity, ToolDescriptor, decode_line, encode_line};
use crate::transport::LineTransport;

/// Client half of the tool-server channel
pub struct ProtocolClient<T: LineTransport> {
    transport: T,
    next_id: u64,
    timeout: Option<Duration>,
    client_name: String,
    poisoned: bool,
    last_latency: Option<Duration>,
}

impl<T: LineTransport> ProtocolClient<T> {
    pub fn new(transport: T) -> Self {
        let defaults = ClientConfig::default();
        Self {
            transport,
            next_id: 1,
            timeout: defaults.request_timeout(),
            client_name: defaults.client_name,
            poisoned: false,
            last_latency: None,
        }
    }

    pub fn with_config(transport: T, config: &ClientConfig) -> Self {
        Self::new(transport)
            .with_timeout(config.request_timeout())
            .with_client_name(config.client_name.clone())
    }

    /// Per-exchange deadline; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// True once a timeout has left a reply unread on the channel.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Round-trip time of the most recent completed exchange.
    pub fn last_latency(&self) -> Option<Duration> {
        self.last_latency
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn round_trip(transport: &mut T, line: &str) -> Result<Option<String>> {
        transport.send(line).await?;
        transport.receive_line().await
    }

    /// Send one request and return the next line verbatim.
    async fn exchange(&mut self, request: RequestEnvelope) -> Result<String> {
        if self.poisoned {
            return Err(ShopError::Transport(
                "channel is out of step after an earlier timeout".to_string(),
            ));
        }

        let line = encode_line(&request)?;
        log::debug!("-> {}", line);
        let started = Instant::now();

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, Self::round_trip(&mut self.transport, &line)).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.poisoned = true;
                    log::warn!("{} timed out after {}ms", request.method, limit.as_millis());
                    return Err(ShopError::Timeout {
                        method: request.method,
                        after_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => Self::round_trip(&mut self.transport, &line).await,
        }?;

        let reply = reply.ok_or(ShopError::StreamClosed)?;
        self.last_latency = Some(started.elapsed());
        log::debug!("<- {} ({:?})", reply, started.elapsed());
        Ok(reply)
    }

    /// Send `initialize` and read the server's identity. A reply lacking
    /// server info still completes the handshake.
    pub async fn handshake(&mut self) -> Result<ServerIdentity> {
        let id = self.allocate_id();
        let request = RequestEnvelope::initialize(id, &self.client_name, env!("CARGO_PKG_VERSION"));
        let line = self.exchange(request).await?;
        let response: ResponseEnvelope = decode_line(&line)?;
        let identity = ServerIdentity::from_result(&response.into_result()?);
        if identity.is_known() {
            log::info!("Connected to {}", identity);
        } else {
            log::warn!("Handshake reply carried no server info");
        }
        Ok(identity)
    }

    /// Ask for the advertised tools. Entries that do not parse as descriptors
    /// are skipped.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let id = self.allocate_id();
        let line = self.exchange(RequestEnvelope::list_tools(id)).await?;
        let response: ResponseEnvelope = decode_line(&line)?;
        let result = response.into_result()?;

        let entries = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| ShopError::protocol("tools/list result has no 'tools' array", line.as_str()))?;

        let mut tools = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<ToolDescriptor>(entry.clone()) {
                Ok(tool) => tools.push(tool),
                Err(e) => log::warn!("Skipping malformed tool descriptor: {}", e),
            }
        }
        log::info!("Server advertises {} tools", tools.len());
        Ok(tools)
    }

    /// Invoke a tool and return the raw reply line for the caller to decode.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String> {
        let id = self.allocate_id();
        self.exchange(RequestEnvelope::call_tool(id, name, arguments)).await
    }

    /// Close the channel and release the server.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transport.terminate().await
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::error::Result;
    use crate::transport::LineTransport;

    /// Transport that answers from a script and records what was sent.
    /// `None` entries simulate end-of-stream; a hang is simulated once the
    /// script runs dry if `hang_when_empty` is set.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub replies: VecDeque<Option<String>>,
        pub sent: Vec<String>,
        pub hang_when_empty: bool,
        pub terminated: bool,
    }

    impl ScriptedTransport {
        pub fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
            Self {
                replies: replies.into_iter().map(|r| Some(r.to_string())).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LineTransport for ScriptedTransport {
        async fn send(&mut self, line: &str) -> Result<()> {
            self.sent.push(line.to_string());
            Ok(())
        }

        async fn receive_line(&mut self) -> Result<Option<String>> {
            match self.replies.pop_front() {
                Some(reply) => Ok(reply),
                None if self.hang_when_empty => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn terminate(&mut self) -> Result<()> {
            self.terminated = true;
            Ok(())
        }
    }
}
