//! Client-side command handlers
//!
//! Every handler owns the tool server for its lifetime and releases it on
//! all exit paths, Ctrl-C and SIGTERM included.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use shopmcp::client::ProtocolClient;
use shopmcp::config::Config;
use shopmcp::llm::{LlmClient, LlmPresenter, LlmTranslator, OpenAiClient, OpenAiConfig};
use shopmcp::orchestrator::{Orchestrator, TurnReport, decode_call_reply};
use shopmcp::server::{ShutdownSignal, ToolServer};
use shopmcp::tools::ProductTable;
use shopmcp::transport::{InMemoryTransport, LineTransport, ProcessTransport};

use super::Cli;
use super::commands::Commands;

/// What the session will do once connected
enum Plan {
    Tools,
    Call { tool: String, arguments: Value },
    Ask { utterance: String, orchestrator: Collaborators },
    Chat { orchestrator: Collaborators },
}

struct Collaborators {
    translator: LlmTranslator,
    presenter: Option<LlmPresenter>,
}

impl Collaborators {
    fn from_config(config: &Config) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(
            OpenAiClient::from_env(OpenAiConfig::from(&config.llm), &config.llm.api_key_env)
                .context("Translator is not available")?,
        );
        let products = ProductTable::new(config.catalog.products.clone());
        let translator = LlmTranslator::new(llm.clone(), &products, config.llm.max_tokens);
        let presenter = config
            .llm
            .polish_responses
            .then(|| LlmPresenter::new(llm, config.llm.max_tokens));
        Ok(Self { translator, presenter })
    }

    fn into_orchestrator<T: LineTransport>(self, client: ProtocolClient<T>) -> Orchestrator<T> {
        let orchestrator = Orchestrator::new(client, Box::new(self.translator));
        match self.presenter {
            Some(presenter) => orchestrator.with_presenter(Box::new(presenter)),
            None => orchestrator,
        }
    }
}

/// Entry point for every subcommand except `serve`
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    // Resolve everything that can fail before a server is started
    let plan = match cli.command.clone().unwrap_or(Commands::Chat) {
        Commands::Serve => return Err(eyre!("serve is not a client command")),
        Commands::Tools => Plan::Tools,
        Commands::Call { tool, arguments } => Plan::Call {
            tool,
            arguments: serde_json::from_str(&arguments).context("Tool arguments must be JSON")?,
        },
        Commands::Ask { utterance } => Plan::Ask {
            utterance: utterance.join(" "),
            orchestrator: Collaborators::from_config(config)?,
        },
        Commands::Chat => Plan::Chat {
            orchestrator: Collaborators::from_config(config)?,
        },
    };

    // Listen before the server exists so no signal can skip its cleanup
    let mut signal = ShutdownSignal::install();

    if cli.in_process {
        info!("Running tool server in-process");
        let transport = InMemoryTransport::start(ToolServer::from_config(config));
        execute(transport, plan, config, &mut signal).await
    } else {
        let transport = spawn_server(cli, config)?;
        execute(transport, plan, config, &mut signal).await
    }
}

fn spawn_server(cli: &Cli, config: &Config) -> Result<ProcessTransport> {
    let mut args: Vec<String> = Vec::new();
    let program = match &config.server.command {
        Some(command) => command.clone(),
        None => {
            // The child is this binary; hand it the same config file
            if let Some(path) = &cli.config {
                args.push("--config".to_string());
                args.push(path.display().to_string());
            }
            std::env::current_exe().context("Failed to locate the running executable")?
        }
    };
    args.extend(config.server.args.iter().cloned());

    let transport = ProcessTransport::spawn(&program, args.as_slice())?
        .with_grace(Duration::from_millis(config.server.shutdown_grace_ms));
    Ok(transport)
}

async fn execute<T: LineTransport>(
    transport: T,
    plan: Plan,
    config: &Config,
    signal: &mut ShutdownSignal,
) -> Result<()> {
    let mut client = ProtocolClient::with_config(transport, &config.client);

    match plan {
        Plan::Tools => {
            let result = until_signal(signal, list_tools(&mut client)).await;
            client.shutdown().await?;
            result
        }
        Plan::Call { tool, arguments } => {
            let result = until_signal(signal, call_tool(&mut client, &tool, arguments)).await;
            client.shutdown().await?;
            result
        }
        Plan::Ask {
            utterance,
            orchestrator,
        } => {
            let mut orchestrator = orchestrator.into_orchestrator(client);
            let result = until_signal(signal, ask(&mut orchestrator, &utterance)).await;
            orchestrator.shutdown().await?;
            result
        }
        Plan::Chat { orchestrator } => {
            let mut orchestrator = orchestrator.into_orchestrator(client);
            let result = until_signal(signal, chat(&mut orchestrator)).await;
            orchestrator.shutdown().await?;
            result
        }
    }
}

/// Run `work` unless a shutdown signal arrives first. The caller still
/// releases the server either way.
async fn until_signal<F>(signal: &mut ShutdownSignal, work: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = work => result,
        _ = signal.recv() => {
            println!("\n{}", "Interrupted".yellow());
            Ok(())
        }
    }
}

async fn list_tools<T: LineTransport>(client: &mut ProtocolClient<T>) -> Result<()> {
    let identity = client.handshake().await?;
    let tools = client.list_tools().await?;

    println!("{} {}", "Connected to".cyan(), identity);
    for tool in &tools {
        println!("\n{}", tool.name.green().bold());
        for line in tool.description.lines() {
            println!("  {}", line);
        }
        let required = tool.required_arguments();
        if !required.is_empty() {
            println!("  {} {}", "required:".dimmed(), required.join(", "));
        }
    }
    Ok(())
}

async fn call_tool<T: LineTransport>(client: &mut ProtocolClient<T>, tool: &str, arguments: Value) -> Result<()> {
    client.handshake().await?;
    let line = client.call_tool(tool, arguments).await?;
    let result = decode_call_reply(&line)?;

    let rendered = serde_json::to_string_pretty(&result.fields)?;
    if result.succeeded() {
        println!("{}", rendered);
        Ok(())
    } else {
        println!("{}", rendered.red());
        Err(eyre!(
            "{} rejected the call: {}",
            tool,
            result.message.unwrap_or_default()
        ))
    }
}

async fn ask<T: LineTransport>(orchestrator: &mut Orchestrator<T>, utterance: &str) -> Result<()> {
    let identity = orchestrator.connect().await?;
    info!("Ask session connected to {}", identity);

    let report = orchestrator.run_turn(utterance).await?;
    print_report(&report);
    Ok(())
}

async fn chat<T: LineTransport>(orchestrator: &mut Orchestrator<T>) -> Result<()> {
    let identity = orchestrator.connect().await?;
    println!("{} {}", "Connected to".cyan(), identity);
    println!("Available tools: {}", orchestrator.tools().iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "));
    println!("Type 'help' for supported operations, 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nPlease enter your question: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match orchestrator.run_turn(input).await {
            Ok(report) => print_report(&report),
            Err(e) => println!("{} {}", "Translator error:".red(), e),
        }

        if orchestrator.client_mut().is_poisoned() {
            println!("{}", "The tool server stopped answering; ending the session.".red());
            break;
        }
    }

    info!("Chat session ended");
    Ok(())
}

fn print_report(report: &TurnReport) {
    println!("{}", format!("Translator response time: {:?}", report.translate_elapsed).dimmed());

    for step in &report.steps {
        if let Some(total) = step.chained_total {
            println!("{}", format!("自動使用前一步的總價: ${:.2}", total).cyan());
        }
        match &step.outcome {
            Ok(result) if result.succeeded() => {
                if let Some(message) = &result.message {
                    println!("\n{}", message);
                }
                log::debug!("{} fields: {:?}", step.tool_name, result.fields);
            }
            Ok(result) => {
                println!("\n{}", result.message.as_deref().unwrap_or("tool reported an error").yellow());
            }
            Err(e) => println!("\n{} {}", format!("{} failed:", step.tool_name).red(), e),
        }
        println!("{}", format!("({} took {:?})", step.tool_name, step.elapsed).dimmed());
    }

    if report.failed_steps() > 0 {
        println!("{}", format!("{} of {} step(s) failed", report.failed_steps(), report.steps.len()).red());
    }

    // Step messages are already printed; only a rewrite or a tool-less reply remains
    let closing = report
        .presented
        .as_deref()
        .or(if report.steps.is_empty() { report.reply.as_deref() } else { None });
    if let Some(text) = closing {
        println!("\n{}", text);
    }
}
