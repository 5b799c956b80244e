//! LLM Layer - translating utterances into tool calls and polishing replies
//!
//! This module provides:
//! - Message types for chat completions
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation
//! - LlmTranslator and LlmPresenter, the orchestrator's collaborators

pub mod client;
pub mod openai;
pub mod prompts;
pub mod translator;
pub mod types;

pub use client::{LlmClient, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use translator::{LlmPresenter, LlmTranslator};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
