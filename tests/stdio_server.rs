//! Tool server integration tests
//!
//! Drives the real `shopmcp serve` child process over its stdin/stdout.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use shopmcp::client::ProtocolClient;
use shopmcp::error::{FaultKind, Result};
use shopmcp::orchestrator::{Invocation, Orchestrator, Translation, Translator, decode_call_reply};
use shopmcp::protocol::{ErrorCode, RequestEnvelope, ResponseEnvelope, ToolDescriptor, decode_line, encode_line};
use shopmcp::transport::{LineTransport, ProcessTransport};

fn spawn_server() -> ProcessTransport {
    ProcessTransport::spawn(env!("CARGO_BIN_EXE_shopmcp"), &["serve"]).expect("spawn shopmcp serve")
}

/// Translator that always returns the same invocations
struct Scripted(Vec<Invocation>);

#[async_trait]
impl Translator for Scripted {
    async fn translate(&self, _utterance: &str, _tools: &[ToolDescriptor]) -> Result<Translation> {
        Ok(Translation {
            invocations: self.0.clone(),
            reply: None,
        })
    }
}

/// A plausible value for a schema property, by its declared type
fn sample_value(schema: &Value) -> Value {
    match schema["type"].as_str() {
        Some("string") => json!("1"),
        Some("integer") => json!(1),
        Some("number") => json!(100),
        Some("array") => json!([{"product_id": "1", "quantity": 1}]),
        _ => Value::Null,
    }
}

#[tokio::test]
async fn test_handshake_and_discovery() -> Result<()> {
    let mut client = ProtocolClient::new(spawn_server());

    let identity = client.handshake().await?;
    assert_eq!(identity.name.as_deref(), Some("Product Price Server"));
    assert_eq!(identity.version.as_deref(), Some("1.0.0"));
    assert_eq!(identity.protocol_version.as_deref(), Some("2024-11-05"));

    let tools = client.list_tools().await?;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["help", "get_price", "calculate_total", "apply_discount"]);

    client.shutdown().await
}

#[tokio::test]
async fn test_every_descriptor_yields_a_valid_call() -> Result<()> {
    let mut client = ProtocolClient::new(spawn_server());
    client.handshake().await?;
    let tools = client.list_tools().await?;

    for tool in &tools {
        let mut arguments = Map::new();
        let properties = tool.properties().cloned().unwrap_or_default();
        for name in tool.required_arguments() {
            arguments.insert(name.to_string(), sample_value(&properties[name]));
        }

        let request = RequestEnvelope::call_tool(1, &tool.name, Value::Object(arguments.clone()));
        let params = request.params.as_ref().unwrap();
        assert_eq!(params["name"], tool.name.as_str());
        let sent: Vec<&String> = params["arguments"].as_object().unwrap().keys().collect();
        assert_eq!(sent.len(), tool.required_arguments().len());

        let line = client.call_tool(&tool.name, Value::Object(arguments)).await?;
        let result = decode_call_reply(&line)?;
        assert!(result.message.is_some(), "{} produced no message", tool.name);
    }

    client.shutdown().await
}

#[tokio::test]
async fn test_chained_discount_over_pipe() -> Result<()> {
    let invocations = vec![
        Invocation::new(
            "calculate_total",
            json!({"items": [{"product_id": "1", "quantity": 5}, {"product_id": "2", "quantity": 30}]}),
        ),
        Invocation::new("apply_discount", json!({"discount_percentage": 30})),
    ];
    let mut orchestrator = Orchestrator::new(ProtocolClient::new(spawn_server()), Box::new(Scripted(invocations)));
    orchestrator.connect().await?;

    let report = orchestrator.run_turn("五台筆電加上三十台手機再打三折").await?;
    assert_eq!(report.failed_steps(), 0);
    let total = report.steps[0].outcome.as_ref().unwrap();
    assert_eq!(total.total_price(), Some(20000.0));
    assert_eq!(total.number("item_count"), Some(2.0));

    let discount = report.steps[1].outcome.as_ref().unwrap();
    assert_eq!(report.steps[1].chained_total, Some(20000.0));
    assert_eq!(discount.number("discounted_price"), Some(6000.0));
    assert_eq!(discount.number("saved_amount"), Some(14000.0));

    orchestrator.shutdown().await
}

#[tokio::test]
async fn test_get_price_for_all_products() -> Result<()> {
    let mut client = ProtocolClient::new(spawn_server());
    client.handshake().await?;

    for (id, name, message) in [
        ("1", "Laptop", "The price of Laptop is $1000.00"),
        ("2", "Smartphone", "The price of Smartphone is $500.00"),
        ("3", "Tablet", "The price of Tablet is $300.00"),
    ] {
        let result = decode_call_reply(&client.call_tool("get_price", json!({"product_id": id})).await?)?;
        assert!(result.succeeded());
        assert_eq!(result.get("product_name"), Some(&json!(name)));
        assert_eq!(result.message.as_deref(), Some(message));
    }

    let missing = decode_call_reply(&client.call_tool("get_price", json!({"product_id": "42"})).await?)?;
    assert!(missing.is_error);
    assert!(!missing.success);
    assert_eq!(missing.get("product_id"), Some(&json!("42")));

    client.shutdown().await
}

#[tokio::test]
async fn test_server_survives_malformed_lines() -> Result<()> {
    let mut transport = spawn_server();

    transport.send("this is not json").await?;
    let reply: ResponseEnvelope = decode_line(&transport.receive_line().await?.unwrap())?;
    assert_eq!(reply.id, Value::Null);
    assert_eq!(reply.error.unwrap().code, ErrorCode::PARSE_ERROR);

    transport.send(r#"{"jsonrpc":"2.0","id":9}"#).await?;
    let reply: ResponseEnvelope = decode_line(&transport.receive_line().await?.unwrap())?;
    assert_eq!(reply.error.unwrap().code, ErrorCode::INVALID_REQUEST);

    transport.send(&encode_line(&RequestEnvelope::list_tools(10))?).await?;
    let reply: ResponseEnvelope = decode_line(&transport.receive_line().await?.unwrap())?;
    assert_eq!(reply.id, json!(10));
    assert!(reply.is_success());

    transport.terminate().await
}

#[tokio::test]
async fn test_closing_input_ends_server() -> Result<()> {
    let mut transport = spawn_server();
    let started = std::time::Instant::now();
    transport.terminate().await?;
    // The default grace period is 5s; a clean exit is well inside it
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(transport.receive_line().await?, None);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_truncated_reply_is_protocol_fault() -> Result<()> {
    let script = r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"te'"#;
    let transport = ProcessTransport::spawn("sh", &["-c", script])?;
    let mut client = ProtocolClient::new(transport);

    let line = client.call_tool("get_price", json!({"product_id": "1"})).await?;
    let err = decode_call_reply(&line).unwrap_err();
    assert_eq!(err.fault_kind(), FaultKind::Protocol);
    assert!(err.to_string().contains(r#""type":"te"#));

    let err = client.call_tool("get_price", json!({"product_id": "1"})).await.unwrap_err();
    assert_eq!(err.fault_kind(), FaultKind::Transport);

    client.shutdown().await
}

#[tokio::test]
async fn test_missing_binary_fails_to_spawn() {
    let err = ProcessTransport::spawn("/nonexistent/shopmcp", &["serve"]).err().unwrap();
    assert_eq!(err.fault_kind(), FaultKind::Transport);
}
