//! Wire message types for the parent ↔ tool-server channel.
//!
//! One JSON object per line. Field names follow JSON-RPC 2.0 (`jsonrpc`, `id`,
//! `method`, `params`, `result`, `error`) but responses are matched to requests
//! purely by order: exactly one response line per request line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ShopError};

/// Marker carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Request sent from the client to the tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Caller-assigned id; echoed back but not used for correlation.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestEnvelope {
    /// Create a new request with the given method and params.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Value::from(id),
            method: method.into(),
            params,
        }
    }

    /// `initialize` request carrying protocol version, capabilities and client identity.
    pub fn initialize(id: u64, client_name: &str, client_version: &str) -> Self {
        Self::new(
            id,
            Methods::INITIALIZE,
            Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": client_name,
                    "version": client_version
                }
            })),
        )
    }

    /// `tools/list` request; carries no params.
    pub fn list_tools(id: u64) -> Self {
        Self::new(id, Methods::TOOLS_LIST, None)
    }

    /// `tools/call` request.
    pub fn call_tool(id: u64, name: &str, arguments: Value) -> Self {
        Self::new(
            id,
            Methods::TOOLS_CALL,
            Some(serde_json::json!({
                "name": name,
                "arguments": arguments
            })),
        )
    }
}

/// Response sent from the tool server back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl ResponseEnvelope {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this response indicates success.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Unwrap the `result` payload, turning an error object into [`ShopError::Rpc`].
    pub fn into_result(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(ShopError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PARSE_ERROR, message)
    }

    /// Invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST, message)
    }

    /// Method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// Invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    /// Internal error (-32603).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }
}

/// Standard error codes.
pub struct ErrorCode;

impl ErrorCode {
    /// Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Server could not produce a reply.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Known method names as constants.
pub struct Methods;

impl Methods {
    pub const INITIALIZE: &'static str = "initialize";
    pub const TOOLS_LIST: &'static str = "tools/list";
    pub const TOOLS_CALL: &'static str = "tools/call";
}

/// One content item of a [`CallResult`]; only text is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentItem {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ContentItem {
    pub fn text(&self) -> &str {
        match self {
            ContentItem::Text { text } => text,
        }
    }
}

/// Outcome of a `tools/call`. Application faults travel here with `is_error`
/// set, never as a top-level error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallResult {
    /// Successful result with a plain-text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Successful result whose text payload is a JSON-encoded record.
    pub fn structured(record: &Value) -> Self {
        Self::text(record.to_string())
    }

    /// Error-shaped result whose text payload is a JSON-encoded record.
    pub fn structured_error(record: &Value) -> Self {
        Self {
            content: vec![ContentItem::Text {
                text: record.to_string(),
            }],
            is_error: true,
        }
    }

    /// Text of the first content item, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(ContentItem::text)
    }
}

/// Advertised tool: name, description and the JSON-schema-like parameter shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed in the schema's top-level `required` array.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Names listed under the schema's top-level `properties`.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.input_schema.get("properties").and_then(Value::as_object)
    }
}

/// Identity reported by the server in its `initialize` reply. Every field is
/// optional; a reply without them still counts as a completed handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: Option<String>,
    pub version: Option<String>,
    pub protocol_version: Option<String>,
}

impl ServerIdentity {
    /// Best-effort extraction from an `initialize` result payload.
    pub fn from_result(result: &Value) -> Self {
        let info = result.get("serverInfo");
        let field = |v: Option<&Value>, key: &str| {
            v.and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            name: field(info, "name"),
            version: field(info, "version"),
            protocol_version: result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn is_known(&self) -> bool {
        self.name.is_some() || self.version.is_some()
    }
}

impl std::fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} v{}",
            self.name.as_deref().unwrap_or("unknown server"),
            self.version.as_deref().unwrap_or("?")
        )
    }
}
