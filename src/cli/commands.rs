//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the tool server on stdin/stdout
//! - tools: list advertised tools
//! - call: invoke one tool directly
//! - ask / chat: natural-language turns through the orchestrator

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// shopmcp - product price tools over a stdio JSON-RPC channel
#[derive(Parser, Debug)]
#[command(name = "shopmcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run the tool server inside this process instead of spawning it
    #[arg(long, global = true)]
    pub in_process: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Name used for the log file
    pub fn mode(&self) -> &'static str {
        match &self.command {
            Some(Commands::Serve) => "server",
            _ => "client",
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the tool server on stdin/stdout
    Serve,

    /// List the tools the server advertises
    Tools,

    /// Call one tool directly, bypassing the translator
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Answer one question and exit
    Ask {
        /// The question, e.g. "五台筆電加上三十台手機再打三折"
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },

    /// Interactive session (the default)
    Chat,
}
