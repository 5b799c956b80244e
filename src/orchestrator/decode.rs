//! Turning a raw `tools/call` reply line into a [`StructuredResult`]
//!
//! The payload is encoded twice: the response line is JSON, and the text of
//! its first content item is JSON again. Both layers are peeled here and
//! nowhere else.

use serde_json::{Map, Value};

use crate::error::{Result, ShopError};
use crate::protocol::{CallResult, ResponseEnvelope, decode_line};

/// Field carrying a running total between chained calls.
pub const TOTAL_PRICE: &str = "total_price";

/// Decoded tool payload
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResult {
    /// The record's own `success` flag, or `true` for plain-text payloads
    pub success: bool,
    /// The CallResult's `isError` flag
    pub is_error: bool,
    pub message: Option<String>,
    /// Every field of the record, `success` and `message` included
    pub fields: Map<String, Value>,
}

impl StructuredResult {
    /// Interpret the inner text of a CallResult. Text that is not a JSON
    /// object becomes `{success: true, message: <text>}`.
    pub fn from_text(text: &str, is_error: bool) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => {
                let success = fields.get("success").and_then(Value::as_bool).unwrap_or(!is_error);
                let message = fields
                    .get("message")
                    .or_else(|| fields.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Self {
                    success,
                    is_error,
                    message,
                    fields,
                }
            }
            _ => {
                let mut fields = Map::new();
                fields.insert("success".to_string(), Value::Bool(true));
                fields.insert("message".to_string(), Value::String(text.to_string()));
                Self {
                    success: true,
                    is_error,
                    message: Some(text.to_string()),
                    fields,
                }
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// A numeric field; strings that look like numbers do not count.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    pub fn total_price(&self) -> Option<f64> {
        self.number(TOTAL_PRICE)
    }

    pub fn succeeded(&self) -> bool {
        self.success && !self.is_error
    }
}

/// Decode a raw `tools/call` reply line.
///
/// A line that is not JSON, or a result without content, is a protocol
/// fault. A top-level error object is surfaced as [`ShopError::Rpc`].
pub fn decode_call_reply(line: &str) -> Result<StructuredResult> {
    let response: ResponseEnvelope = decode_line(line)?;
    let result = response.into_result()?;
    let call: CallResult = serde_json::from_value(result)
        .map_err(|e| ShopError::protocol(format!("result is not a CallResult: {}", e), line))?;
    let text = call
        .first_text()
        .ok_or_else(|| ShopError::protocol("CallResult has no content", line))?;
    Ok(StructuredResult::from_text(text, call.is_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use serde_json::json;

    fn reply_line(text: &str, is_error: bool) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": text}], "isError": is_error}
        })
        .to_string()
    }

    #[test]
    fn test_double_encoded_record() {
        let line = reply_line(r#"{"success":true,"total_price":20000.0,"message":"Total price is $20000.00"}"#, false);
        let result = decode_call_reply(&line).unwrap();
        assert!(result.succeeded());
        assert_eq!(result.total_price(), Some(20000.0));
        assert_eq!(result.message.as_deref(), Some("Total price is $20000.00"));
    }

    #[test]
    fn test_plain_text_payload_is_implicit_success() {
        let result = decode_call_reply(&reply_line("Available tools: ...", false)).unwrap();
        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("Available tools: ..."));
        assert_eq!(result.get("success"), Some(&json!(true)));
    }

    #[test]
    fn test_error_shaped_record() {
        let line = reply_line(r#"{"success":false,"error":"Product not found: 9","message":"Product not found: 9"}"#, true);
        let result = decode_call_reply(&line).unwrap();
        assert!(!result.success);
        assert!(result.is_error);
        assert!(!result.succeeded());
    }

    #[test]
    fn test_string_total_is_not_numeric() {
        let result = StructuredResult::from_text(r#"{"total_price":"20000"}"#, false);
        assert_eq!(result.total_price(), None);
    }

    #[test]
    fn test_truncated_line_is_protocol_fault() {
        let err = decode_call_reply(r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"te"#).unwrap_err();
        assert_eq!(err.fault_kind(), FaultKind::Protocol);
        assert!(err.to_string().contains("raw:"));
    }

    #[test]
    fn test_top_level_error_surfaces() {
        let err = decode_call_reply(r#"{"id":1,"error":{"code":-32602,"message":"product_id must be a string"}}"#)
            .unwrap_err();
        assert!(matches!(err, ShopError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn test_empty_content_is_protocol_fault() {
        let err = decode_call_reply(r#"{"id":1,"result":{"content":[]}}"#).unwrap_err();
        assert_eq!(err.fault_kind(), FaultKind::Protocol);
    }
}
