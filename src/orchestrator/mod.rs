//! Orchestrator - runs one user turn end to end
//!
//! A turn goes `Idle → AwaitingInvocations → (Executing)* → Idle`. Each
//! executing step propagates the chained total, dispatches the call, decodes
//! the reply and records it as the turn's latest result. A failed step is
//! reported and the next one still runs.

pub mod chain;
pub mod decode;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::ProtocolClient;
use crate::error::{Result, ShopError};
use crate::protocol::{ServerIdentity, ToolDescriptor};
use crate::transport::LineTransport;

pub use chain::ChainState;
pub use decode::{StructuredResult, TOTAL_PRICE, decode_call_reply};

/// One tool selected for one step of a turn
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool_name: String,
    pub arguments: Value,
}

impl Invocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What the translator made of an utterance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub invocations: Vec<Invocation>,
    /// Free text from the translator; the answer when no tool was chosen
    pub reply: Option<String>,
}

/// Maps an utterance to tool invocations
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, utterance: &str, tools: &[ToolDescriptor]) -> Result<Translation>;
}

/// Optionally rewrites the final message for the user
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, utterance: &str, message: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Dispatch,
    Decode,
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingInvocations,
    Executing { step: usize, phase: StepPhase },
}

/// Result of one invocation within a turn
#[derive(Debug)]
pub struct StepReport {
    pub tool_name: String,
    /// Arguments as dispatched, after propagation
    pub arguments: Value,
    /// Total injected by the chaining rule, if it fired
    pub chained_total: Option<f64>,
    pub outcome: Result<StructuredResult>,
    pub elapsed: Duration,
}

impl StepReport {
    /// User-visible text for this step.
    pub fn message(&self) -> Option<String> {
        match &self.outcome {
            Ok(result) => result.message.clone(),
            Err(e) => Some(format!("{} failed: {}", self.tool_name, e)),
        }
    }
}

/// Everything one turn produced
#[derive(Debug, Default)]
pub struct TurnReport {
    pub reply: Option<String>,
    pub steps: Vec<StepReport>,
    /// Message of the last step that surfaced one
    pub final_message: Option<String>,
    /// Presenter rewrite of `final_message`, when it succeeded
    pub presented: Option<String>,
    pub translate_elapsed: Duration,
}

impl TurnReport {
    /// What to show the user: the rewrite, else the last message, else the
    /// translator's own reply.
    pub fn answer(&self) -> Option<&str> {
        self.presented
            .as_deref()
            .or(self.final_message.as_deref())
            .or(self.reply.as_deref())
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_err()).count()
    }
}

/// Drives turns against one tool server
pub struct Orchestrator<T: LineTransport> {
    client: ProtocolClient<T>,
    translator: Box<dyn Translator>,
    presenter: Option<Box<dyn Presenter>>,
    tools: Vec<ToolDescriptor>,
    state: TurnState,
}

impl<T: LineTransport> Orchestrator<T> {
    pub fn new(client: ProtocolClient<T>, translator: Box<dyn Translator>) -> Self {
        Self {
            client,
            translator,
            presenter: None,
            tools: Vec::new(),
            state: TurnState::Idle,
        }
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Handshake and fetch the tool catalog offered to the translator.
    pub async fn connect(&mut self) -> Result<ServerIdentity> {
        let identity = self.client.handshake().await?;
        self.tools = self.client.list_tools().await?;
        Ok(identity)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn client_mut(&mut self) -> &mut ProtocolClient<T> {
        &mut self.client
    }

    fn enter(&mut self, state: TurnState) {
        log::trace!("turn state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run one turn. Only a translator failure fails the turn as a whole.
    pub async fn run_turn(&mut self, utterance: &str) -> Result<TurnReport> {
        self.enter(TurnState::AwaitingInvocations);
        let started = Instant::now();
        let translation = match self.translator.translate(utterance, &self.tools).await {
            Ok(t) => t,
            Err(e) => {
                self.enter(TurnState::Idle);
                return Err(e);
            }
        };
        let translate_elapsed = started.elapsed();
        log::info!(
            "Translated into {} invocation(s) in {:?}",
            translation.invocations.len(),
            translate_elapsed
        );

        if translation.invocations.is_empty() {
            self.enter(TurnState::Idle);
            return Ok(TurnReport {
                reply: translation.reply,
                translate_elapsed,
                ..Default::default()
            });
        }

        let steps = self.execute(translation.invocations).await;
        let final_message = steps.iter().rev().find_map(StepReport::message);

        let presented = match (&self.presenter, &final_message) {
            (Some(presenter), Some(message)) => match presenter.present(utterance, message).await {
                Ok(text) => Some(text),
                Err(e) => {
                    log::warn!("Presentation failed, using raw message: {}", e);
                    None
                }
            },
            _ => None,
        };

        Ok(TurnReport {
            reply: translation.reply,
            steps,
            final_message,
            presented,
            translate_elapsed,
        })
    }

    /// Execute invocations in order with a chain state local to this call.
    pub async fn execute(&mut self, invocations: Vec<Invocation>) -> Vec<StepReport> {
        let mut chain = ChainState::new();
        let mut reports = Vec::with_capacity(invocations.len());

        for (step, mut invocation) in invocations.into_iter().enumerate() {
            let started = Instant::now();

            self.enter(TurnState::Executing {
                step,
                phase: StepPhase::Propagate,
            });
            let chained_total = chain.propagate(&mut invocation);
            if let Some(total) = chained_total {
                log::info!("Chained total_price {} into {}", total, invocation.tool_name);
            }

            let outcome = self.run_step(step, &invocation).await;
            match &outcome {
                Ok(result) => chain.record(result.clone()),
                Err(e) => log::warn!("Step {} ({}) failed: {}", step + 1, invocation.tool_name, e),
            }

            reports.push(StepReport {
                tool_name: invocation.tool_name,
                arguments: invocation.arguments,
                chained_total,
                outcome,
                elapsed: started.elapsed(),
            });
        }

        self.enter(TurnState::Idle);
        reports
    }

    async fn run_step(&mut self, step: usize, invocation: &Invocation) -> Result<StructuredResult> {
        let arguments = match &invocation.arguments {
            Value::Object(_) => invocation.arguments.clone(),
            Value::Null => Value::Object(Map::new()),
            other => {
                return Err(ShopError::InvalidArguments(format!(
                    "arguments for {} must be an object, got {}",
                    invocation.tool_name, other
                )));
            }
        };

        self.enter(TurnState::Executing {
            step,
            phase: StepPhase::Dispatch,
        });
        let line = self.client.call_tool(&invocation.tool_name, arguments).await?;

        self.enter(TurnState::Executing {
            step,
            phase: StepPhase::Decode,
        });
        decode_call_reply(&line)
    }

    /// Release the tool server.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.enter(TurnState::Idle);
        self.client.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::error::FaultKind;
    use crate::server::ToolServer;
    use crate::transport::InMemoryTransport;
    use serde_json::json;

    struct FixedTranslator(Translation);

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, _utterance: &str, _tools: &[ToolDescriptor]) -> Result<Translation> {
            Ok(self.0.clone())
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _utterance: &str, _tools: &[ToolDescriptor]) -> Result<Translation> {
            Err(ShopError::Llm("quota exceeded".to_string()))
        }
    }

    struct RecordingPresenter {
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Presenter for RecordingPresenter {
        async fn present(&self, _utterance: &str, message: &str) -> Result<String> {
            self.seen.lock().unwrap().push(message.to_string());
            if self.fail {
                Err(ShopError::Llm("unavailable".to_string()))
            } else {
                Ok(format!("polished: {}", message))
            }
        }
    }

    fn in_process(translator: Box<dyn Translator>) -> Orchestrator<InMemoryTransport> {
        let transport = InMemoryTransport::start(ToolServer::from_config(&Config::default()));
        Orchestrator::new(ProtocolClient::new(transport), translator)
    }

    fn translation(invocations: Vec<Invocation>) -> Box<dyn Translator> {
        Box::new(FixedTranslator(Translation {
            invocations,
            reply: None,
        }))
    }

    fn order_then_discount() -> Vec<Invocation> {
        vec![
            Invocation::new(
                "calculate_total",
                json!({"items": [{"product_id": "1", "quantity": 5}, {"product_id": "2", "quantity": 30}]}),
            ),
            Invocation::new("apply_discount", json!({"discount_percentage": 30})),
        ]
    }

    #[tokio::test]
    async fn test_connect_lists_tools() {
        let mut orch = in_process(translation(vec![]));
        let identity = orch.connect().await.unwrap();
        assert_eq!(identity.name.as_deref(), Some("Product Price Server"));
        assert_eq!(orch.tools().len(), 4);
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_chained_discount() {
        let mut orch = in_process(translation(order_then_discount()));
        orch.connect().await.unwrap();

        let report = orch.run_turn("5台笔记本和30台手机，打3折").await.unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].outcome.as_ref().unwrap().total_price(), Some(20000.0));

        let discount = &report.steps[1];
        assert_eq!(discount.chained_total, Some(20000.0));
        assert_eq!(discount.arguments["total_price"], 20000.0);
        let result = discount.outcome.as_ref().unwrap();
        assert_eq!(result.number("discounted_price"), Some(6000.0));
        assert_eq!(
            report.answer(),
            Some("Original price: $20000.00, After 30% discount: $6000.00 (You save: $14000.00)")
        );
        assert_eq!(orch.state(), TurnState::Idle);
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_chain_state_does_not_cross_turns() {
        let mut orch = in_process(translation(vec![]));
        orch.connect().await.unwrap();
        orch.execute(order_then_discount()[..1].to_vec()).await;

        let steps = orch
            .execute(vec![Invocation::new("apply_discount", json!({"discount_percentage": 30}))])
            .await;
        assert_eq!(steps[0].chained_total, None);
        let result = steps[0].outcome.as_ref().unwrap();
        assert!(result.is_error);
        assert_eq!(result.get("field"), Some(&json!("total_price")));
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_chain() {
        let mut orch = in_process(translation(vec![]));
        orch.connect().await.unwrap();
        let steps = orch
            .execute(vec![
                Invocation::new("get_price", json!("1")),
                Invocation::new("get_price", json!({"product_id": 7})),
                Invocation::new("get_price", json!({"product_id": "3"})),
            ])
            .await;
        assert_eq!(steps[0].outcome.as_ref().unwrap_err().fault_kind(), FaultKind::Application);
        assert_eq!(steps[1].outcome.as_ref().unwrap_err().fault_kind(), FaultKind::Protocol);
        assert_eq!(steps[2].outcome.as_ref().unwrap().get("product_name"), Some(&json!("Tablet")));
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_invocations_surfaces_reply() {
        let translator = FixedTranslator(Translation {
            invocations: vec![],
            reply: Some("你好！请问想查询什么商品？".to_string()),
        });
        let mut orch = in_process(Box::new(translator));
        orch.connect().await.unwrap();
        let report = orch.run_turn("你好").await.unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(report.answer(), Some("你好！请问想查询什么商品？"));
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_translator_failure_fails_turn() {
        let mut orch = in_process(Box::new(FailingTranslator));
        let err = orch.run_turn("hello").await.unwrap_err();
        assert_eq!(err.fault_kind(), FaultKind::Translator);
        assert_eq!(orch.state(), TurnState::Idle);
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_presenter_rewrites_last_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let presenter = RecordingPresenter {
            seen: seen.clone(),
            fail: false,
        };
        let mut orch = in_process(translation(vec![Invocation::new("get_price", json!({"product_id": "1"}))]))
            .with_presenter(Box::new(presenter));
        orch.connect().await.unwrap();

        let report = orch.run_turn("笔记本多少钱").await.unwrap();
        assert_eq!(report.answer(), Some("polished: The price of Laptop is $1000.00"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["The price of Laptop is $1000.00"]);
        orch.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_presenter_failure_falls_back() {
        let presenter = RecordingPresenter {
            seen: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut orch = in_process(translation(vec![Invocation::new("get_price", json!({"product_id": "2"}))]))
            .with_presenter(Box::new(presenter));
        orch.connect().await.unwrap();

        let report = orch.run_turn("手机多少钱").await.unwrap();
        assert!(report.presented.is_none());
        assert_eq!(report.answer(), Some("The price of Smartphone is $500.00"));
        orch.shutdown().await.unwrap();
    }
}
