//! Wire protocol - message envelopes and line framing
//!
//! This module provides:
//! - Request/response envelopes (`initialize`, `tools/list`, `tools/call`)
//! - CallResult and ToolDescriptor payload types
//! - Newline-delimited JSON codec

pub mod codec;
pub mod messages;

pub use codec::{LineRead, MAX_LINE_BYTES, decode_line, encode_line, read_bounded_line, strip_terminator};
pub use messages::{
    CallResult, ContentItem, ErrorCode, JSONRPC_VERSION, Methods, PROTOCOL_VERSION, RequestEnvelope,
    ResponseEnvelope, RpcError, ServerIdentity, ToolDescriptor,
};
