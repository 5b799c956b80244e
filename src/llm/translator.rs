//! Translator and presenter backed by an [`LlmClient`]

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, ShopError};
use crate::llm::client::LlmClient;
use crate::llm::prompts::{PRESENTER_SYSTEM_PROMPT, presenter_input, translator_system_prompt};
use crate::llm::types::{CompletionRequest, ToolDefinition};
use crate::orchestrator::{Invocation, Presenter, Translation, Translator};
use crate::protocol::ToolDescriptor;
use crate::tools::ProductTable;

/// Asks the model to pick tools for an utterance
pub struct LlmTranslator {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
    max_tokens: u32,
}

impl LlmTranslator {
    pub fn new(client: Arc<dyn LlmClient>, products: &ProductTable, max_tokens: u32) -> Self {
        Self {
            client,
            system_prompt: translator_system_prompt(products),
            max_tokens,
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, utterance: &str, tools: &[ToolDescriptor]) -> Result<Translation> {
        let request = CompletionRequest::new(self.system_prompt.clone())
            .with_user_message(utterance)
            .with_tools(tools.iter().map(ToolDefinition::from).collect())
            .with_max_tokens(self.max_tokens);

        let response = self.client.complete(request).await?;
        log::debug!(
            "Translator chose {} tool call(s) ({} tokens)",
            response.tool_calls.len(),
            response.usage.total()
        );

        let invocations = response
            .tool_calls
            .into_iter()
            .map(|call| Invocation::new(call.name, call.input))
            .collect();
        let reply = Some(response.content).filter(|c| !c.trim().is_empty());

        Ok(Translation { invocations, reply })
    }
}

/// Rewrites the final tool message as a friendly reply
pub struct LlmPresenter {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmPresenter {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

#[async_trait]
impl Presenter for LlmPresenter {
    async fn present(&self, utterance: &str, message: &str) -> Result<String> {
        let request = CompletionRequest::new(PRESENTER_SYSTEM_PROMPT)
            .with_user_message(presenter_input(utterance, message))
            .with_max_tokens(self.max_tokens);

        let response = self.client.complete(request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(ShopError::Llm("presenter returned an empty reply".to_string()));
        }
        Ok(text.to_string())
    }
}
