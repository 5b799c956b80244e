//! shopmcp - product price tools behind a process-isolated stdio JSON-RPC server
//!
//! The server side exposes `get_price`, `calculate_total`, `apply_discount` and
//! `help`. The client side spawns the server, discovers its tools and runs
//! chained tool calls chosen by a language-model translator.

pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use error::{FaultKind, Result, ShopError};
